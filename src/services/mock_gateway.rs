//! In-memory payment gateway for tests and offline development
//!
//! Sessions are created unpaid; `mark_paid` flips one the way a renter
//! completing checkout would.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, PaymentIntent, SessionDetails,
};

#[derive(Default)]
pub struct MockGateway {
    /// Insertion order, oldest first
    sessions: Mutex<Vec<SessionDetails>>,
    requests: Mutex<Vec<CheckoutRequest>>,
    intents: Mutex<Vec<(i64, HashMap<String, String>)>>,
    unavailable: Mutex<bool>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a transport error
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    pub fn mark_paid(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.payment_status = "paid".to_string();
                session.payment_intent = Some(format!("pi_{}", session_id));
                true
            }
            None => false,
        }
    }

    pub fn session(&self, session_id: &str) -> Option<SessionDetails> {
        self.sessions.lock().iter().find(|s| s.id == session_id).cloned()
    }

    pub fn last_session(&self) -> Option<SessionDetails> {
        self.sessions.lock().last().cloned()
    }

    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().clone()
    }

    pub fn intent_count(&self) -> usize {
        self.intents.lock().len()
    }

    /// Amount in minor units of the most recent payment intent
    pub fn last_intent_amount(&self) -> Option<i64> {
        self.intents.lock().last().map(|(amount, _)| *amount)
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if *self.unavailable.lock() {
            return Err(GatewayError::Http("mock gateway unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.check_available()?;

        let id = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
        let session = SessionDetails {
            id: id.clone(),
            payment_status: "unpaid".to_string(),
            metadata: request.target.to_metadata(),
            payment_intent: None,
        };

        self.sessions.lock().push(session);
        self.requests.lock().push(request);

        Ok(CheckoutSession {
            url: format!("https://checkout.test/pay/{}", id),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails, GatewayError> {
        self.check_available()?;
        self.session(session_id).ok_or_else(|| GatewayError::Api {
            status: 404,
            message: format!("No such checkout session: {}", session_id),
        })
    }

    async fn list_recent_sessions(&self, limit: u32) -> Result<Vec<SessionDetails>, GatewayError> {
        self.check_available()?;
        Ok(self
            .sessions
            .lock()
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        _currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError> {
        self.check_available()?;

        let id = format!("pi_test_{}", uuid::Uuid::new_v4().simple());
        self.intents.lock().push((amount_minor, metadata));

        Ok(PaymentIntent {
            client_secret: format!("{}_secret_test", id),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::PaymentTarget;

    fn request(target: PaymentTarget) -> CheckoutRequest {
        CheckoutRequest {
            line_items: vec![],
            currency: "egp".to_string(),
            success_url: "s".to_string(),
            cancel_url: "c".to_string(),
            target,
        }
    }

    #[tokio::test]
    async fn test_sessions_start_unpaid_and_can_be_paid() {
        let gateway = MockGateway::new();
        let session = gateway
            .create_checkout_session(request(PaymentTarget::Booking(4)))
            .await
            .unwrap();

        let details = gateway.retrieve_session(&session.id).await.unwrap();
        assert!(!details.is_paid());
        assert_eq!(details.target(), Some(PaymentTarget::Booking(4)));

        assert!(gateway.mark_paid(&session.id));
        assert!(gateway.retrieve_session(&session.id).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let gateway = MockGateway::new();
        gateway.create_checkout_session(request(PaymentTarget::Booking(1))).await.unwrap();
        gateway.create_checkout_session(request(PaymentTarget::Booking(2))).await.unwrap();

        let listed = gateway.list_recent_sessions(10).await.unwrap();
        assert_eq!(listed[0].target(), Some(PaymentTarget::Booking(2)));
    }

    #[tokio::test]
    async fn test_unavailable_gateway_errors() {
        let gateway = MockGateway::new();
        gateway.set_unavailable(true);
        let err = gateway.list_recent_sessions(10).await.unwrap_err();
        assert!(matches!(err, GatewayError::Http(_)));
    }
}
