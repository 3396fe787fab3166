mod common;

use axum::http::StatusCode;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use sakan_backend::entities::beds::BedStatus;
use sakan_backend::entities::booking_orders::{OrderStatus, PaymentMethod};
use sakan_backend::entities::bookings::{self, BookingStatus, PaymentStatus};
use sakan_backend::entities::payments::{self, CardPaymentStatus};
use sakan_backend::entities::prelude::*;
use sakan_backend::error::ServiceError;
use sakan_backend::services::booking::{self, Stay};
use sakan_backend::services::gateway::sign_payload;
use sakan_backend::services::reconciliation::{
    self, handle_webhook, MarkPaidOutcome, WebhookOutcome,
};

use crate::common::{
    checkout_completed_event, date, reserve, seed_bed, seed_scenario, TestApp, WEBHOOK_SECRET,
};

async fn booking_state(app: &TestApp, id: i32) -> bookings::Model {
    Bookings::find_by_id(id).one(&app.db).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_checkout_webhook_marks_booking_paid() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let event = checkout_completed_event(
        "evt_1",
        "cs_1",
        json!({ "booking_id": created.id.to_string() }),
    );
    let (status, body) = app.deliver_webhook(&event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(body["duplicate"], false);

    let paid = booking_state(&app, created.id).await;
    assert_eq!(paid.status, BookingStatus::Confirmed);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    let payment = Payments::find()
        .filter(payments::Column::BookingId.eq(created.id))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, CardPaymentStatus::Succeeded);
    assert_eq!(payment.amount, dec!(100));
    assert_eq!(payment.payment_intent_id.as_deref(), Some("pi_cs_1"));

    let bed = Beds::find_by_id(s.bed.id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(bed.status, BedStatus::Booked);
}

#[tokio::test]
async fn test_duplicate_webhook_is_idempotent() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let event = checkout_completed_event(
        "evt_dup",
        "cs_dup",
        json!({ "booking_id": created.id.to_string() }),
    );

    let (first, _) = app.deliver_webhook(&event).await;
    let (second, body) = app.deliver_webhook(&event).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["duplicate"], true);

    assert_eq!(Payments::find().count(&app.db).await.unwrap(), 1);
    assert_eq!(WebhookEvents::find().count(&app.db).await.unwrap(), 1);
    assert_eq!(booking_state(&app, created.id).await.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_bad_signature_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let payload = checkout_completed_event(
        "evt_forged",
        "cs_forged",
        json!({ "booking_id": created.id.to_string() }),
    )
    .to_string();
    let forged = sign_payload("whsec_wrong", Utc::now().timestamp(), payload.as_bytes()).unwrap();

    let (status, body) = app.deliver_raw_webhook(payload.clone(), Some(forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_WEBHOOK");

    let (status, _) = app.deliver_raw_webhook(payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(booking_state(&app, created.id).await.payment_status, PaymentStatus::Pending);
    assert_eq!(WebhookEvents::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_stale_signature_rejected() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let payload = checkout_completed_event(
        "evt_old",
        "cs_old",
        json!({ "booking_id": created.id.to_string() }),
    )
    .to_string();
    let old = Utc::now().timestamp() - 3600;
    let signature = sign_payload(WEBHOOK_SECRET, old, payload.as_bytes()).unwrap();

    let (status, _) = app.deliver_raw_webhook(payload, Some(signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_webhook_secret_is_server_error() {
    let config = sakan_backend::config::AppConfig {
        gateway_webhook_secret: String::new(),
        ..common::test_config()
    };
    let app = TestApp::with_config(config).await;

    let payload = json!({"id": "evt_x", "type": "checkout.session.completed", "data": {"object": {}}})
        .to_string();
    let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), payload.as_bytes()).unwrap();

    let (status, body) = app.deliver_raw_webhook(payload, Some(signature)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CONFIG_ERROR");
}

#[tokio::test]
async fn test_unhandled_event_type_acknowledged() {
    let app = TestApp::new().await;

    let payload = json!({
        "id": "evt_refund",
        "type": "charge.refunded",
        "data": { "object": { "id": "ch_1" } }
    })
    .to_string();
    let now = Utc::now().timestamp();
    let signature = sign_payload(WEBHOOK_SECRET, now, payload.as_bytes()).unwrap();

    let outcome = handle_webhook(&app.db, &app.config, payload.as_bytes(), Some(&signature), now)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let again = handle_webhook(&app.db, &app.config, payload.as_bytes(), Some(&signature), now)
        .await
        .unwrap();
    assert_eq!(again, WebhookOutcome::Duplicate);
}

#[tokio::test]
async fn test_unpaid_completed_session_ignored() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let event = json!({
        "id": "evt_unpaid",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_unpaid",
            "payment_status": "unpaid",
            "metadata": { "booking_id": created.id.to_string() }
        }}
    });
    let (status, _) = app.deliver_webhook(&event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking_state(&app, created.id).await.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_success_page_then_webhook_applies_once() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let (status, body) = app
        .post(
            "/payments/create-checkout-session",
            Some(s.renter.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["session_url"].as_str().unwrap().starts_with("https://checkout.test/pay/"));

    let session = app.gateway.last_session().unwrap();
    let request = app.gateway.checkout_requests().pop().unwrap();
    assert_eq!(request.line_items.len(), 1);
    assert_eq!(request.line_items[0].name, format!("Booking #{}", created.id));
    assert_eq!(request.line_items[0].unit_amount, 10_000);
    assert!(request.success_url.ends_with("session_id={CHECKOUT_SESSION_ID}"));

    assert!(app.gateway.mark_paid(&session.id));

    let (status, body) = app
        .get(&format!("/payments/success?session_id={}", session.id), Some(s.renter.id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["id"], created.id);
    assert_eq!(body["booking"]["payment_status"], "paid");
    assert_eq!(body["payment"]["status"], "succeeded");

    // the webhook for the same session arrives afterwards
    let event = checkout_completed_event(
        "evt_late",
        &session.id,
        json!({ "booking_id": created.id.to_string() }),
    );
    let (status, _) = app.deliver_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(Payments::find().count(&app.db).await.unwrap(), 1);
    let paid = booking_state(&app, created.id).await;
    assert_eq!(paid.status, BookingStatus::Confirmed);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_success_page_ignores_foreign_session() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let intruder = common::seed_buyer(&app.db, "intruder").await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    app.post(
        "/payments/create-checkout-session",
        Some(s.renter.id),
        json!({ "booking_id": created.id }),
    )
    .await;
    let session = app.gateway.last_session().unwrap();
    app.gateway.mark_paid(&session.id);

    let (status, body) = app
        .get(&format!("/payments/success?session_id={}", session.id), Some(intruder.id))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["booking"].is_null());
    assert_eq!(booking_state(&app, created.id).await.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_success_page_falls_back_when_gateway_down() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;
    reconciliation::mark_booking_paid(&app.db, created.id, None, "egp").await.unwrap();

    app.gateway.set_unavailable(true);
    let (status, body) = app
        .get("/payments/success?session_id=cs_unknown", Some(s.renter.id))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["id"], created.id);
}

#[tokio::test]
async fn test_checkout_for_paid_booking_rejected() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;
    reconciliation::mark_booking_paid(&app.db, created.id, None, "egp").await.unwrap();

    let (status, _) = app
        .post(
            "/payments/create-checkout-session",
            Some(s.renter.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.gateway.last_session().is_none());
}

#[tokio::test]
async fn test_checkout_for_someone_elses_booking_forbidden() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let (status, _) = app
        .post(
            "/payments/create-checkout-session",
            Some(s.owner.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_gateway_outage_on_checkout_is_bad_gateway() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;
    app.gateway.set_unavailable(true);

    let (status, body) = app
        .post(
            "/payments/create-checkout-session",
            Some(s.renter.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "GATEWAY_ERROR");
}

#[tokio::test]
async fn test_status_poll_reconciles_paid_session() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    app.post(
        "/payments/create-checkout-session",
        Some(s.renter.id),
        json!({ "booking_id": created.id }),
    )
    .await;
    let session = app.gateway.last_session().unwrap();

    let (status, body) = app
        .post(
            "/payments/check-payment-status",
            Some(s.renter.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    app.gateway.mark_paid(&session.id);

    let (_, body) = app
        .post(
            "/payments/check-payment-status",
            Some(s.renter.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["payment_status"], "paid");

    let (_, body) = app
        .post(
            "/payments/check-payment-status",
            Some(s.renter.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(body["message"], "Payment already confirmed");
    assert_eq!(Payments::find().count(&app.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_order_checkout_pays_every_member() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let second_bed = seed_bed(&app.db, s.listing.room.id, "B2", dec!(650), Some(dec!(80))).await;

    let stay = Stay::parse("2025-03-01", "2025-04-15", date("2025-02-01")).unwrap();
    let reservation = booking::reserve_beds(
        &app.db,
        s.renter.id,
        &[s.bed.id, second_bed.id],
        stay,
        PaymentMethod::Card,
        dec!(100),
    )
    .await
    .unwrap();

    let session = reconciliation::start_order_checkout(
        &app.db,
        app.gateway.as_ref(),
        &app.config,
        &reservation.order,
        &reservation.bookings,
    )
    .await
    .unwrap();

    let request = app.gateway.checkout_requests().pop().unwrap();
    assert_eq!(request.line_items.len(), 2);
    assert_eq!(
        request.line_items[0].name,
        format!("Bed {} (Booking #{})", s.bed.id, reservation.bookings[0].id)
    );
    assert_eq!(request.line_items[1].unit_amount, 8_000);

    let order = BookingOrders::find_by_id(reservation.order.id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.checkout_session_id.as_deref(), Some(session.id.as_str()));

    let event = checkout_completed_event(
        "evt_order",
        &session.id,
        json!({ "order_id": reservation.order.id.to_string() }),
    );
    let (status, _) = app.deliver_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);

    for member in &reservation.bookings {
        let paid = booking_state(&app, member.id).await;
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }
    let order = BookingOrders::find_by_id(reservation.order.id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(Payments::find().count(&app.db).await.unwrap(), 2);
}

#[tokio::test]
async fn test_multi_booking_endpoint_returns_session_url() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let second_bed = seed_bed(&app.db, s.listing.room.id, "B2", dec!(650), None).await;
    let (start, end) = common::future_stay_dates(7, 45);

    let (status, body) = app
        .post(
            "/bookings/multi",
            Some(s.renter.id),
            json!({
                "bed_ids": [s.bed.id, second_bed.id],
                "start_date": start,
                "end_date": end,
                "payment_method": "card"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["session_url"].as_str().unwrap().starts_with("https://checkout.test/pay/"));
    assert!(body.get("manual_url").is_none());

    let session = app.gateway.last_session().unwrap();
    assert_eq!(
        session.metadata.get("order_id").map(String::as_str),
        Some(body["order_id"].to_string().as_str())
    );
}

#[tokio::test]
async fn test_mark_paid_twice_reports_already_paid() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let first = reconciliation::mark_booking_paid(&app.db, created.id, Some("pi_1".to_string()), "egp")
        .await
        .unwrap();
    let second = reconciliation::mark_booking_paid(&app.db, created.id, Some("pi_1".to_string()), "egp")
        .await
        .unwrap();

    assert_eq!(first, MarkPaidOutcome::Applied { bookings: 1 });
    assert_eq!(second, MarkPaidOutcome::AlreadyPaid);
    assert_eq!(Payments::find().count(&app.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mark_paid_unknown_booking_not_found() {
    let app = TestApp::new().await;
    let result = reconciliation::mark_booking_paid(&app.db, 4242, None, "egp").await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_payment_intent_lifecycle() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;

    let (status, body) = app
        .post(
            "/payments/create-payment-intent",
            Some(s.renter.id),
            json!({ "booking_id": created.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let intent_id = body["payment_intent_id"].as_str().unwrap().to_string();
    assert!(body["client_secret"].as_str().unwrap().contains("_secret_"));
    assert_eq!(app.gateway.intent_count(), 1);

    let pending = Payments::find()
        .filter(payments::Column::BookingId.eq(created.id))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status, CardPaymentStatus::Pending);

    let failed = json!({
        "id": "evt_fail",
        "type": "payment_intent.payment_failed",
        "data": { "object": {
            "id": intent_id,
            "last_payment_error": { "message": "Your card was declined." }
        }}
    });
    app.deliver_webhook(&failed).await;

    let after_failure = Payments::find_by_id(pending.id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(after_failure.status, CardPaymentStatus::Failed);
    assert_eq!(after_failure.failure_reason.as_deref(), Some("Your card was declined."));
    assert_eq!(booking_state(&app, created.id).await.payment_status, PaymentStatus::Failed);

    let succeeded = json!({
        "id": "evt_ok",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": intent_id,
            "latest_charge": "ch_123",
            "metadata": { "booking_id": created.id.to_string() }
        }}
    });
    let (status, _) = app.deliver_webhook(&succeeded).await;
    assert_eq!(status, StatusCode::OK);

    let settled = Payments::find_by_id(pending.id).one(&app.db).await.unwrap().unwrap();
    assert_eq!(settled.status, CardPaymentStatus::Succeeded);
    assert_eq!(settled.charge_id.as_deref(), Some("ch_123"));
    assert!(settled.failure_reason.is_none());

    let paid = booking_state(&app, created.id).await;
    assert_eq!(paid.status, BookingStatus::Confirmed);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_failed_intent_never_downgrades_paid_booking() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let created = reserve(&app.db, s.renter.id, s.bed.id).await;
    reconciliation::mark_booking_paid(&app.db, created.id, Some("pi_paid".to_string()), "egp")
        .await
        .unwrap();

    reconciliation::mark_payment_failed(&app.db, "pi_other", Some(created.id), None)
        .await
        .unwrap();

    let still_paid = booking_state(&app, created.id).await;
    assert_eq!(still_paid.payment_status, PaymentStatus::Paid);
    assert_eq!(still_paid.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_payment_page_shows_order_total() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let second_bed = seed_bed(&app.db, s.listing.room.id, "B2", dec!(650), Some(dec!(80))).await;

    let stay = Stay::parse("2025-03-01", "2025-04-15", date("2025-02-01")).unwrap();
    let reservation = booking::reserve_beds(
        &app.db,
        s.renter.id,
        &[s.bed.id, second_bed.id],
        stay,
        PaymentMethod::Manual,
        dec!(100),
    )
    .await
    .unwrap();

    let page = reconciliation::payment_page(&app.db, &app.config, s.renter.id, reservation.bookings[1].id)
        .await
        .unwrap();
    assert_eq!(page.amount_due, dec!(180));
    assert_eq!(page.manual_payment_url, format!("/payments/manual/{}", reservation.bookings[1].id));
}

#[tokio::test]
async fn test_second_renter_cannot_pay_for_a_won_bed() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let rival = common::seed_buyer(&app.db, "rival-renter").await;

    let winner = reserve(&app.db, s.renter.id, s.bed.id).await;
    let loser = reserve(&app.db, rival.id, s.bed.id).await;
    reconciliation::mark_booking_paid(&app.db, winner.id, None, "egp").await.unwrap();

    let (status, body) = app
        .post(
            "/payments/create-checkout-session",
            Some(rival.id),
            json!({ "booking_id": loser.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(app.gateway.last_session().is_none());

    let (status, _) = app
        .post(
            "/payments/create-payment-intent",
            Some(rival.id),
            json!({ "booking_id": loser.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.intent_count(), 0);

    // a gateway confirmation arriving anyway changes nothing
    let event = checkout_completed_event(
        "evt_late",
        "cs_late",
        json!({ "booking_id": loser.id.to_string() }),
    );
    let (status, _) = app.deliver_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);

    let outcome = reconciliation::mark_booking_paid(&app.db, loser.id, None, "egp").await.unwrap();
    assert_eq!(outcome, MarkPaidOutcome::BedTaken { booking_id: loser.id });

    let still_pending = booking_state(&app, loser.id).await;
    assert_eq!(still_pending.status, BookingStatus::Pending);
    assert_eq!(still_pending.payment_status, PaymentStatus::Pending);

    let paid_on_bed = Bookings::find()
        .filter(bookings::Column::BedId.eq(s.bed.id))
        .filter(bookings::Column::PaymentStatus.eq(PaymentStatus::Paid))
        .count(&app.db)
        .await
        .unwrap();
    assert_eq!(paid_on_bed, 1);

    let loser_payments = Payments::find()
        .filter(payments::Column::BookingId.eq(loser.id))
        .count(&app.db)
        .await
        .unwrap();
    assert_eq!(loser_payments, 0);
}

#[tokio::test]
async fn test_later_stay_on_a_won_bed_can_still_pay() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let other = common::seed_buyer(&app.db, "autumn-renter").await;

    let spring = reserve(&app.db, s.renter.id, s.bed.id).await;
    let autumn_stay = Stay::parse("2025-09-01", "2025-10-15", date("2025-02-01")).unwrap();
    let autumn = booking::reserve_bed(&app.db, other.id, s.bed.id, autumn_stay, None, dec!(100))
        .await
        .unwrap();

    reconciliation::mark_booking_paid(&app.db, spring.id, None, "egp").await.unwrap();

    let (status, _) = app
        .post(
            "/payments/create-checkout-session",
            Some(other.id),
            json!({ "booking_id": autumn.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let outcome = reconciliation::mark_booking_paid(&app.db, autumn.id, None, "egp").await.unwrap();
    assert_eq!(outcome, MarkPaidOutcome::Applied { bookings: 1 });
}

#[tokio::test]
async fn test_webhook_for_unknown_booking_is_acknowledged_once() {
    let app = TestApp::new().await;

    let event = checkout_completed_event(
        "evt_ghost",
        "cs_ghost",
        json!({ "booking_id": "9999" }),
    );

    let (status, body) = app.deliver_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duplicate"], false);

    let recorded = WebhookEvents::find()
        .filter(sakan_backend::entities::webhook_events::Column::EventId.eq("evt_ghost"))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(recorded.processed);

    let (status, body) = app.deliver_webhook(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duplicate"], true);
}

#[tokio::test]
async fn test_intent_for_unknown_booking_is_ignored() {
    let app = TestApp::new().await;
    let payload = json!({
        "id": "evt_ghost_intent",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_ghost",
            "metadata": { "booking_id": "9999" }
        }}
    })
    .to_string();
    let now = Utc::now().timestamp();
    let signature = sign_payload(WEBHOOK_SECRET, now, payload.as_bytes()).unwrap();

    let outcome = handle_webhook(&app.db, &app.config, payload.as_bytes(), Some(&signature), now)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn test_order_intent_records_member_share() {
    let app = TestApp::new().await;
    let s = seed_scenario(&app.db).await;
    let second_bed = seed_bed(&app.db, s.listing.room.id, "B2", dec!(650), Some(dec!(80))).await;

    let stay = Stay::parse("2025-03-01", "2025-04-15", date("2025-02-01")).unwrap();
    let reservation = booking::reserve_beds(
        &app.db,
        s.renter.id,
        &[s.bed.id, second_bed.id],
        stay,
        PaymentMethod::Card,
        dec!(100),
    )
    .await
    .unwrap();
    let lead = &reservation.bookings[0];

    let (status, body) = app
        .post(
            "/payments/create-payment-intent",
            Some(s.renter.id),
            json!({ "booking_id": lead.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let intent_id = body["payment_intent_id"].as_str().unwrap().to_string();

    // the card is charged for the whole order
    assert_eq!(app.gateway.last_intent_amount(), Some(18_000));

    let pending = Payments::find()
        .filter(payments::Column::BookingId.eq(lead.id))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.amount, lead.commission_amount);

    let succeeded = json!({
        "id": "evt_order_intent",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": intent_id,
            "metadata": { "booking_id": lead.id.to_string() }
        }}
    });
    let (status, _) = app.deliver_webhook(&succeeded).await;
    assert_eq!(status, StatusCode::OK);

    let recorded: rust_decimal::Decimal = Payments::find()
        .all(&app.db)
        .await
        .unwrap()
        .iter()
        .map(|p| p.amount)
        .sum();
    assert_eq!(recorded, dec!(180));
    assert_eq!(Payments::find().count(&app.db).await.unwrap(), 2);
}
