//! Payment gateway client and signature checks.
//!
//! The gateway flow: we create a gateway order for the amount, the browser
//! completes payment with the gateway, and we learn the result either from
//! the redirect (`order_id|payment_id` signed with the key secret) or from a
//! webhook (raw body signed with the webhook secret). Both signatures are
//! hex HMAC-SHA256 and are checked in constant time.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment gateway request failed: {0}")]
    Gateway(String),
    #[error("invalid payment signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    MalformedWebhook(String),
}

impl crate::error::ErrorCode for PaymentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Gateway(_) => "E_PAYMENT_GATEWAY",
            Self::InvalidSignature => "E_INVALID_SIGNATURE",
            Self::MalformedWebhook(_) => "E_MALFORMED_WEBHOOK",
        }
    }
}

/// Order created on the gateway side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    config: PaymentConfig,
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("key_id", &self.config.key_id)
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}

impl From<PaymentConfig> for PaymentClient {
    fn from(config: PaymentConfig) -> Self {
        Self { http: reqwest::Client::new(), config }
    }
}

impl PaymentClient {
    /// Public key id handed to the browser checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    #[must_use]
    pub fn webhook_secret(&self) -> Option<&str> {
        self.config.webhook_secret.as_deref()
    }

    /// Create a gateway order for `amount` minor units.
    ///
    /// # Errors
    ///
    /// `Gateway` on transport failure, non-2xx status, or an unexpected body.
    pub async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, PaymentError> {
        let resp = self
            .http
            .post(format!("{}/orders", self.config.api_base))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderRequest { amount, currency, receipt })
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(format!("{status}: {body}")));
        }

        resp.json::<GatewayOrder>()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))
    }

    /// Check the redirect signature with this client's key secret.
    ///
    /// # Errors
    ///
    /// `InvalidSignature` if it does not match.
    pub fn verify_payment(&self, gateway_order_id: &str, payment_id: &str, signature_hex: &str) -> Result<(), PaymentError> {
        verify_payment_signature(&self.config.key_secret, gateway_order_id, payment_id, signature_hex)
    }
}

// =============================================================================
// SIGNATURES
// =============================================================================

fn verify_hmac(secret: &str, message: &[u8], signature_hex: &str) -> Result<(), PaymentError> {
    let provided = hex::decode(signature_hex.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(message);
    mac.verify_slice(&provided).map_err(|_| PaymentError::InvalidSignature)
}

/// Verify the checkout redirect: HMAC over `"{gateway_order_id}|{payment_id}"`.
///
/// # Errors
///
/// `InvalidSignature` for bad hex or a mismatched MAC.
pub fn verify_payment_signature(
    secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature_hex: &str,
) -> Result<(), PaymentError> {
    verify_hmac(secret, format!("{gateway_order_id}|{payment_id}").as_bytes(), signature_hex)
}

/// Verify a webhook delivery: HMAC over the raw request body.
///
/// # Errors
///
/// `InvalidSignature` for bad hex or a mismatched MAC.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> Result<(), PaymentError> {
    verify_hmac(secret, body, signature_hex)
}

// =============================================================================
// WEBHOOKS
// =============================================================================

/// Webhook events we act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A payment was captured (or an order fully paid).
    Paid { gateway_order_id: String, payment_id: String },
    /// Any other event type, acknowledged and dropped.
    Ignored(String),
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

fn payment_entity(payload: &serde_json::Value) -> Option<(String, String)> {
    let entity = payload.get("payment")?.get("entity")?;
    let payment_id = entity.get("id")?.as_str()?.to_owned();
    let order_id = entity.get("order_id")?.as_str()?.to_owned();
    Some((order_id, payment_id))
}

/// Decode a webhook body.
///
/// # Errors
///
/// `MalformedWebhook` if the JSON is invalid or a handled event lacks its
/// payment entity.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let envelope: WebhookEnvelope =
        serde_json::from_slice(body).map_err(|e| PaymentError::MalformedWebhook(e.to_string()))?;

    match envelope.event.as_str() {
        "payment.captured" | "order.paid" => {
            let (gateway_order_id, payment_id) = payment_entity(&envelope.payload)
                .ok_or_else(|| PaymentError::MalformedWebhook(format!("{} without payment entity", envelope.event)))?;
            Ok(WebhookEvent::Paid { gateway_order_id, payment_id })
        }
        _ => Ok(WebhookEvent::Ignored(envelope.event)),
    }
}

#[cfg(test)]
#[path = "payment_test.rs"]
mod tests;
