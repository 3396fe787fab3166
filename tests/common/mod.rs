#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use chrono::{Duration, NaiveDate, Utc};
use migration::MigratorTrait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use sakan_backend::config::AppConfig;
use sakan_backend::entities::{
    apartments, beds, bookings, rooms, seller_verifications, users,
};
use sakan_backend::entities::beds::BedStatus;
use sakan_backend::entities::seller_verifications::VerificationStatus;
use sakan_backend::entities::users::UserRole;
use sakan_backend::handlers::auth::{API_KEY_HEADER, USER_ID_HEADER};
use sakan_backend::handlers::routes::build_router;
use sakan_backend::services::booking::{self, Stay};
use sakan_backend::services::gateway::{sign_payload, SIGNATURE_HEADER};
use sakan_backend::services::mock_gateway::MockGateway;
use sakan_backend::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";
pub const ADMIN_KEY: &str = "test-admin-key";

/// Set up an in-memory database with every migration applied.
///
/// A single pooled connection keeps the in-memory database alive for the
/// whole test.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        public_base_url: "https://sakan.test".to_string(),
        gateway_webhook_secret: WEBHOOK_SECRET.to_string(),
        admin_api_key: Some(ADMIN_KEY.to_string()),
        ..Default::default()
    }
}

pub struct TestApp {
    pub db: DatabaseConnection,
    pub gateway: Arc<MockGateway>,
    pub config: Arc<AppConfig>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = setup_test_db().await.expect("Failed to set up test DB");
        Self {
            db,
            gateway: Arc::new(MockGateway::new()),
            config: Arc::new(config),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            db: self.db.clone(),
            gateway: self.gateway.clone(),
            config: self.config.clone(),
        }
    }

    /// Send one request through the full router and decode the JSON body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<i32>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header(USER_ID_HEADER, user_id.to_string());
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        send(self.state(), request).await
    }

    pub async fn get(&self, uri: &str, user_id: Option<i32>) -> (StatusCode, Value) {
        let (status, _, body) = self.request(Method::GET, uri, user_id, None).await;
        (status, body)
    }

    pub async fn get_with_headers(&self, uri: &str, user_id: Option<i32>) -> (StatusCode, HeaderMap, Value) {
        self.request(Method::GET, uri, user_id, None).await
    }

    pub async fn post(&self, uri: &str, user_id: Option<i32>, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.request(Method::POST, uri, user_id, Some(body)).await;
        (status, body)
    }

    /// POST as a reviewer
    pub async fn admin_post(&self, uri: &str, key: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let (status, _, body) = send(self.state(), request).await;
        (status, body)
    }

    /// Deliver a webhook signed with the configured secret
    pub async fn deliver_webhook(&self, event: &Value) -> (StatusCode, Value) {
        let payload = event.to_string();
        let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), payload.as_bytes()).unwrap();
        self.deliver_raw_webhook(payload, Some(signature)).await
    }

    pub async fn deliver_raw_webhook(&self, payload: String, signature: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/payments/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        let request = builder.body(Body::from(payload)).unwrap();

        let (status, _, body) = send(self.state(), request).await;
        (status, body)
    }
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = build_router(state).oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, headers, body)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A stay starting `offset_days` from today, valid for real-clock handlers
pub fn future_stay_dates(offset_days: i64, nights: i64) -> (String, String) {
    let start = Utc::now().date_naive() + Duration::days(offset_days);
    let end = start + Duration::days(nights);
    (start.format("%Y-%m-%d").to_string(), end.format("%Y-%m-%d").to_string())
}

pub async fn seed_user(db: &DatabaseConnection, username: &str, role: UserRole) -> users::Model {
    users::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@sakan.test", username)),
        role: Set(role),
        phone: Set(None),
        is_verified: Set(false),
        contract_accepted: Set(false),
        contract_accepted_at: Set(None),
        contract_accepted_ip: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_buyer(db: &DatabaseConnection, username: &str) -> users::Model {
    seed_user(db, username, UserRole::Buyer).await
}

/// A seller who has accepted the contract and been verified
pub async fn seed_approved_seller(db: &DatabaseConnection, username: &str) -> users::Model {
    let now = Utc::now();
    let seller = users::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@sakan.test", username)),
        role: Set(UserRole::Seller),
        phone: Set(None),
        is_verified: Set(true),
        contract_accepted: Set(true),
        contract_accepted_at: Set(Some(now)),
        contract_accepted_ip: Set(Some("127.0.0.1".to_string())),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    seller_verifications::ActiveModel {
        seller_id: Set(seller.id),
        id_document_path: Set("verification/id.jpg".to_string()),
        ownership_document_path: Set("verification/deed.pdf".to_string()),
        status: Set(VerificationStatus::Approved),
        rejection_reason: Set(None),
        submitted_at: Set(now),
        reviewed_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    seller
}

pub struct Listing {
    pub apartment: apartments::Model,
    pub room: rooms::Model,
}

pub async fn seed_apartment(db: &DatabaseConnection, owner_id: i32, name: &str) -> Listing {
    let apartment = apartments::ActiveModel {
        name: Set(name.to_string()),
        owner_id: Set(owner_id),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let room = rooms::ActiveModel {
        apartment_id: Set(apartment.id),
        name: Set("Room A".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    Listing { apartment, room }
}

pub async fn seed_bed(
    db: &DatabaseConnection,
    room_id: i32,
    bed_number: &str,
    monthly_price: Decimal,
    commission: Option<Decimal>,
) -> beds::Model {
    beds::ActiveModel {
        room_id: Set(room_id),
        bed_number: Set(bed_number.to_string()),
        monthly_price: Set(monthly_price),
        commission_amount: Set(commission),
        status: Set(BedStatus::Available),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Owner, renter and one available bed priced 700 with a 100 commission
pub struct Scenario {
    pub owner: users::Model,
    pub renter: users::Model,
    pub listing: Listing,
    pub bed: beds::Model,
}

pub async fn seed_scenario(db: &DatabaseConnection) -> Scenario {
    let owner = seed_approved_seller(db, "owner").await;
    let renter = seed_buyer(db, "renter").await;
    let listing = seed_apartment(db, owner.id, "Nile View").await;
    let bed = seed_bed(db, listing.room.id, "B1", dec!(700.00), Some(dec!(100.00))).await;

    Scenario {
        owner,
        renter,
        listing,
        bed,
    }
}

/// Reserve a bed for 2025-03-01 .. 2025-04-15 as seen on 2025-02-01
pub async fn reserve(db: &DatabaseConnection, renter_id: i32, bed_id: i32) -> bookings::Model {
    let stay = Stay::parse("2025-03-01", "2025-04-15", date("2025-02-01")).unwrap();
    booking::reserve_bed(db, renter_id, bed_id, stay, None, dec!(100.00))
        .await
        .unwrap()
}

pub fn checkout_completed_event(event_id: &str, session_id: &str, metadata: Value) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "payment_status": "paid",
                "payment_intent": format!("pi_{}", session_id),
                "metadata": metadata,
            }
        }
    })
}
