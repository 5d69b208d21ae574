//! Typed configuration loaded from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads one `Config` at startup (after `.env` via dotenvy) and hands
//! it to `AppState`. Integrations (payments, media, OAuth, mail) are optional:
//! a missing variable disables that feature instead of failing startup.

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_SHIPPING_FLAT_FEE: i64 = 4900;
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: i64 = 99_900;
pub const DEFAULT_MAX_LINE_QUANTITY: i32 = 10;
pub const DEFAULT_PENDING_ORDER_TTL_MINS: i64 = 30;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;
pub const DEFAULT_PAYMENT_API_BASE: &str = "https://api.razorpay.com/v1";
pub const DEFAULT_MEDIA_API_BASE: &str = "https://api.cloudinary.com/v1_1";
pub const DEFAULT_MEDIA_FOLDER: &str = "storefront/products";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Parse a boolean flag. Accepts `1/true/yes/on` and `0/false/no/off`.
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Comma-separated list, trimmed, lowercased, empty entries dropped.
pub(crate) fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|raw| parse_list(&raw))
        .unwrap_or_default()
}

pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// PRICING
// =============================================================================

/// Currency and shipping rules applied to carts and orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricing {
    pub currency: String,
    /// Flat shipping fee in minor units.
    pub shipping_flat_fee: i64,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: i64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_owned(),
            shipping_flat_fee: DEFAULT_SHIPPING_FLAT_FEE,
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
        }
    }
}

// =============================================================================
// INTEGRATIONS
// =============================================================================

/// Payment gateway credentials.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    /// Webhook secret; webhooks are rejected when absent.
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

impl PaymentConfig {
    /// Load from `PAYMENT_KEY_ID` and `PAYMENT_KEY_SECRET`.
    /// Returns `None` if either is missing (checkout will be disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let key_id = env_string("PAYMENT_KEY_ID")?;
        let key_secret = env_string("PAYMENT_KEY_SECRET")?;
        Some(Self {
            key_id,
            key_secret,
            webhook_secret: env_string("PAYMENT_WEBHOOK_SECRET"),
            api_base: env_string("PAYMENT_API_BASE")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_BASE.to_owned())
                .trim_end_matches('/')
                .to_owned(),
        })
    }
}

/// Image host credentials.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub api_base: String,
}

impl MediaConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Some(Self {
            cloud_name: env_string("MEDIA_CLOUD_NAME")?,
            api_key: env_string("MEDIA_API_KEY")?,
            api_secret: env_string("MEDIA_API_SECRET")?,
            folder: env_string("MEDIA_FOLDER").unwrap_or_else(|| DEFAULT_MEDIA_FOLDER.to_owned()),
            api_base: env_string("MEDIA_API_BASE")
                .unwrap_or_else(|| DEFAULT_MEDIA_API_BASE.to_owned())
                .trim_end_matches('/')
                .to_owned(),
        })
    }
}

/// Outbound mail for login codes.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub resend_api_key: String,
    pub from: String,
}

impl MailConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Some(Self { resend_api_key: env_string("RESEND_API_KEY")?, from: env_string("RESEND_FROM")? })
    }
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Absolute origin used for canonical URLs, the sitemap and cookie security.
    pub public_base_url: String,
    pub cookie_secure: bool,
    pub pricing: Pricing,
    pub max_line_quantity: i32,
    pub pending_order_ttl_mins: i64,
    pub sweep_interval_secs: u64,
    pub low_stock_threshold: i32,
    /// Lowercased emails promoted to admin at login.
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or `PORT` is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env_string("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = match env_string("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };
        let public_base_url = env_string("PUBLIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let cookie_secure = env_bool("COOKIE_SECURE").unwrap_or_else(|| public_base_url.starts_with("https://"));

        Ok(Self {
            database_url,
            port,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            public_base_url,
            cookie_secure,
            pricing: Pricing {
                currency: env_string("CURRENCY")
                    .map(|c| c.to_ascii_uppercase())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
                shipping_flat_fee: env_parse("SHIPPING_FLAT_FEE", DEFAULT_SHIPPING_FLAT_FEE),
                free_shipping_threshold: env_parse("FREE_SHIPPING_THRESHOLD", DEFAULT_FREE_SHIPPING_THRESHOLD),
            },
            max_line_quantity: env_parse("MAX_LINE_QUANTITY", DEFAULT_MAX_LINE_QUANTITY).max(1),
            pending_order_ttl_mins: env_parse("PENDING_ORDER_TTL_MINS", DEFAULT_PENDING_ORDER_TTL_MINS).max(1),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1),
            low_stock_threshold: env_parse("LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD),
            admin_emails: env_list("ADMIN_EMAILS"),
        })
    }

    /// Config with defaults for everything but the database URL.
    #[must_use]
    pub fn with_database_url(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_owned(),
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_owned(),
            cookie_secure: false,
            pricing: Pricing::default(),
            max_line_quantity: DEFAULT_MAX_LINE_QUANTITY,
            pending_order_ttl_mins: DEFAULT_PENDING_ORDER_TTL_MINS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            admin_emails: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_ascii_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
