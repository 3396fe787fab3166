//! Card payment gateway client
//!
//! `PaymentGateway` is the seam the reconciliation core talks to. The
//! production implementation speaks the Stripe-compatible REST API with
//! form-encoded requests; the credential lives inside the client value,
//! never in process-wide state.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;

use crate::config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

/// Metadata key carrying a single booking id
pub const METADATA_BOOKING_ID: &str = "booking_id";

/// Metadata key carrying a multi-bed order id
pub const METADATA_ORDER_ID: &str = "order_id";

/// Metadata key carrying the renter id on payment intents
pub const METADATA_USER_ID: &str = "user_id";

/// Header the gateway signs webhook deliveries with
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Credential missing or malformed
    Configuration(String),
    /// Transport failure talking to the gateway
    Http(String),
    /// Gateway answered with a non-success status
    Api { status: u16, message: String },
    /// Gateway answered with something we could not parse
    Decode(String),
    /// Webhook signature missing, stale or wrong
    Signature(String),
    /// Webhook body is not a gateway event
    MalformedPayload(String),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Configuration(msg) => write!(f, "Gateway configuration error: {}", msg),
            GatewayError::Http(msg) => write!(f, "Gateway transport error: {}", msg),
            GatewayError::Api { status, message } => {
                write!(f, "Gateway API error {}: {}", status, message)
            }
            GatewayError::Decode(msg) => write!(f, "Gateway response decode error: {}", msg),
            GatewayError::Signature(msg) => write!(f, "Webhook signature error: {}", msg),
            GatewayError::MalformedPayload(msg) => write!(f, "Malformed webhook payload: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Http(err.to_string())
        }
    }
}

/// What a checkout session pays for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Booking(i32),
    Order(i32),
}

impl PaymentTarget {
    pub fn to_metadata(self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        match self {
            PaymentTarget::Booking(id) => {
                metadata.insert(METADATA_BOOKING_ID.to_string(), id.to_string());
            }
            PaymentTarget::Order(id) => {
                metadata.insert(METADATA_ORDER_ID.to_string(), id.to_string());
            }
        }
        metadata
    }

    /// Order wins when both keys are present; unparsable ids are ignored
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        if let Some(id) = metadata
            .get(METADATA_ORDER_ID)
            .and_then(|v| v.trim().parse().ok())
        {
            return Some(PaymentTarget::Order(id));
        }
        metadata
            .get(METADATA_BOOKING_ID)
            .and_then(|v| v.trim().parse().ok())
            .map(PaymentTarget::Booking)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    /// Amount in minor currency units
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub line_items: Vec<LineItem>,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub target: PaymentTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub id: String,
    /// "paid" | "unpaid" | "no_payment_required"
    pub payment_status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

impl SessionDetails {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn target(&self) -> Option<PaymentTarget> {
        PaymentTarget::from_metadata(&self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails, GatewayError>;

    /// Most recent sessions first
    async fn list_recent_sessions(&self, limit: u32) -> Result<Vec<SessionDetails>, GatewayError>;

    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError>;
}

/// Convert a decimal amount into integer minor units (piastres, cents)
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| GatewayError::Configuration(format!("Amount {} out of range", amount)))
}

#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionList {
    data: Vec<SessionDetails>,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.gateway_secret_key.clone(),
            config.gateway_api_base.clone(),
        )
    }

    fn credential(&self) -> Result<&str, GatewayError> {
        if self.secret_key.is_empty() || !self.secret_key.starts_with("sk_") {
            tracing::error!("Gateway secret key missing or not an sk_ key");
            return Err(GatewayError::Configuration(
                "gateway secret key is missing or invalid".to_string(),
            ));
        }
        Ok(&self.secret_key)
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Flatten a checkout request into the gateway's bracketed form encoding
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((
            format!("{}[price_data][currency]", prefix),
            request.currency.clone(),
        ));
        form.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.name.clone(),
        ));
        form.push((
            format!("{}[price_data][unit_amount]", prefix),
            item.unit_amount.to_string(),
        ));
        form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }

    for (key, value) in request.target.to_metadata() {
        form.push((format!("metadata[{}]", key), value));
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let key = self.credential()?;
        let url = format!("{}/checkout/sessions", self.api_base);

        tracing::info!(
            target_ref = ?request.target,
            line_items = request.line_items.len(),
            "Creating checkout session"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .form(&checkout_form(&request))
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails, GatewayError> {
        let key = self.credential()?;
        let url = format!("{}/checkout/sessions/{}", self.api_base, session_id);

        let response = self.client.get(&url).bearer_auth(key).send().await?;
        Self::decode(response).await
    }

    async fn list_recent_sessions(&self, limit: u32) -> Result<Vec<SessionDetails>, GatewayError> {
        let key = self.credential()?;
        let url = format!("{}/checkout/sessions", self.api_base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(key)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;

        let list: SessionList = Self::decode(response).await?;
        Ok(list.data)
    }

    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError> {
        let key = self.credential()?;
        let url = format!("{}/payment_intents", self.api_base);

        let mut form = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
        ];
        for (k, v) in metadata {
            form.push((format!("metadata[{}]", k), v));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .form(&form)
            .send()
            .await?;

        Self::decode(response).await
    }
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

/// Inbound gateway event `{id, type, data: {object}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::Configuration(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produce a signature header value for `payload`, as the gateway would
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, GatewayError> {
    let mac = compute_signature(secret, timestamp, payload)?;
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Check a `t=<unix>,v1=<hex>` header against `payload`.
///
/// Any of several `v1` entries may match (secret rotation). Comparison is
/// constant-time. `now` is the current unix time in seconds.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), GatewayError> {
    if secret.is_empty() {
        return Err(GatewayError::Configuration(
            "webhook signing secret is not configured".to_string(),
        ));
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(value)) => timestamp = value.parse().ok(),
            (Some("v1"), Some(value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| GatewayError::Signature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(GatewayError::Signature("missing v1 signature".to_string()));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(GatewayError::Signature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    for candidate in &signatures {
        let mac = compute_signature(secret, timestamp, payload)?;
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(GatewayError::Signature("no matching signature".to_string()))
}

/// Verify and parse a webhook delivery
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<WebhookEvent, GatewayError> {
    verify_signature(payload, header, secret, tolerance_secs, now)?;
    serde_json::from_slice(payload).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
}
