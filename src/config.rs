//! Application configuration loaded from environment variables
//!
//! Read once at startup and shared read-only through `AppState`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;

/// Environment variable for the database connection string
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Environment variable for the listen address
const ENV_BIND_ADDR: &str = "BIND_ADDR";

/// Environment variable for the absolute base URL used in redirect URLs
const ENV_PUBLIC_BASE_URL: &str = "PUBLIC_BASE_URL";

/// Environment variable for the card gateway secret key
const ENV_GATEWAY_SECRET_KEY: &str = "GATEWAY_SECRET_KEY";

/// Environment variable for the webhook signing secret
const ENV_GATEWAY_WEBHOOK_SECRET: &str = "GATEWAY_WEBHOOK_SECRET";

/// Environment variable for the gateway REST base URL
const ENV_GATEWAY_API_BASE: &str = "GATEWAY_API_BASE";

/// Environment variable for the commission currency
const ENV_PAYMENT_CURRENCY: &str = "PAYMENT_CURRENCY";

/// Environment variable for the flat per-bed commission fallback
const ENV_DEFAULT_COMMISSION: &str = "DEFAULT_COMMISSION";

/// Environment variable for the mobile-money wallet shown to renters
const ENV_MANUAL_PAYMENT_RECEIVER: &str = "MANUAL_PAYMENT_RECEIVER";

/// Environment variable for the reviewer API key
const ENV_ADMIN_API_KEY: &str = "ADMIN_API_KEY";

/// Environment variable for the webhook timestamp tolerance
const ENV_WEBHOOK_TOLERANCE: &str = "WEBHOOK_TOLERANCE_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_GATEWAY_API_BASE: &str = "https://api.stripe.com/v1";
const DEFAULT_CURRENCY: &str = "egp";
const DEFAULT_COMMISSION: Decimal = dec!(100.00);
const DEFAULT_MANUAL_RECEIVER: &str = "01069476417";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub public_base_url: String,
    /// Already stripped of quotes/whitespace; may be empty
    pub gateway_secret_key: String,
    pub gateway_webhook_secret: String,
    pub gateway_api_base: String,
    pub currency: String,
    /// Used when a bed has no commission of its own
    pub default_commission: Decimal,
    pub manual_payment_receiver: String,
    pub admin_api_key: Option<String>,
    pub webhook_tolerance_secs: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            gateway_secret_key: String::new(),
            gateway_webhook_secret: String::new(),
            gateway_api_base: DEFAULT_GATEWAY_API_BASE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            default_commission: DEFAULT_COMMISSION,
            manual_payment_receiver: DEFAULT_MANUAL_RECEIVER.to_string(),
            admin_api_key: None,
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl AppConfig {
    /// Build configuration from the process environment.
    ///
    /// Missing optional values fall back to defaults; a malformed
    /// `DEFAULT_COMMISSION` is logged and replaced by the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_commission = match env::var(ENV_DEFAULT_COMMISSION) {
            Ok(raw) => match Decimal::from_str(raw.trim()) {
                Ok(value) if value > Decimal::ZERO => value,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        fallback = %defaults.default_commission,
                        "Invalid DEFAULT_COMMISSION, using fallback"
                    );
                    defaults.default_commission
                }
            },
            Err(_) => defaults.default_commission,
        };

        let webhook_tolerance_secs = env::var(ENV_WEBHOOK_TOLERANCE)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.webhook_tolerance_secs);

        Self {
            bind_addr: env::var(ENV_BIND_ADDR).unwrap_or(defaults.bind_addr),
            public_base_url: env::var(ENV_PUBLIC_BASE_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            gateway_secret_key: env::var(ENV_GATEWAY_SECRET_KEY)
                .map(|raw| clean_secret(&raw))
                .unwrap_or_default(),
            gateway_webhook_secret: env::var(ENV_GATEWAY_WEBHOOK_SECRET)
                .map(|raw| clean_secret(&raw))
                .unwrap_or_default(),
            gateway_api_base: env::var(ENV_GATEWAY_API_BASE).unwrap_or(defaults.gateway_api_base),
            currency: env::var(ENV_PAYMENT_CURRENCY)
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
            default_commission,
            manual_payment_receiver: env::var(ENV_MANUAL_PAYMENT_RECEIVER)
                .unwrap_or(defaults.manual_payment_receiver),
            admin_api_key: env::var(ENV_ADMIN_API_KEY).ok().filter(|k| !k.is_empty()),
            webhook_tolerance_secs,
        }
    }

    pub fn success_url(&self) -> String {
        format!(
            "{}/payments/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.public_base_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/payments/cancel", self.public_base_url)
    }
}

/// Strip whitespace and one layer of surrounding quotes, as left by some `.env` editors
fn clean_secret(raw: &str) -> String {
    raw.trim().trim_matches('"').trim_matches('\'').trim().to_string()
}
