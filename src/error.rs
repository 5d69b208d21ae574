//! HTTP error envelope shared by all route modules.
//!
//! DESIGN
//! ======
//! Service modules return their own `thiserror` enums. Each implements
//! `ErrorCode` so the route layer can turn any of them into a stable
//! `{"error": "E_...", "message": "..."}` body with a matching status.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::rate_limit::RateLimitError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::email_auth::EmailAuthError;
use crate::services::media::MediaError;
use crate::services::order::OrderError;
use crate::services::payment::PaymentError;

/// Stable machine-readable code for a service error.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}

/// Error returned by every REST handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Sent as `Retry-After` when set.
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retry_after_secs: None }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "authentication required")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", "admin access required")
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_BAD_REQUEST", message)
    }

    #[must_use]
    pub fn unavailable(feature: &str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "E_UNAVAILABLE", format!("{feature} not configured"))
    }

    /// Log the underlying error and hide it from the client.
    #[must_use]
    pub fn internal(err: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL", "internal server error")
    }

    /// Build from a service error, hiding the message of 5xx responses.
    pub fn from_service<E>(status: StatusCode, err: &E) -> Self
    where
        E: ErrorCode + std::fmt::Display,
    {
        if status.is_server_error() {
            tracing::error!(error = %err, code = err.error_code(), "service error");
            return Self::new(status, err.error_code(), "internal server error");
        }
        Self::new(status, err.error_code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.code, "message": self.message });
        let mut resp = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            resp.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        resp
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(&err)
    }
}

// =============================================================================
// SERVICE ERROR MAPPING
// =============================================================================

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::NotFound(_) | CatalogError::ImageNotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::InvalidSize(_)
            | CatalogError::DuplicateSize(_)
            | CatalogError::NegativeStock(_)
            | CatalogError::InvalidProduct(_) => StatusCode::BAD_REQUEST,
            CatalogError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_service(status, &err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        let status = match err {
            CartError::Catalog(inner) => return Self::from(inner),
            CartError::ProductNotFound(_) | CartError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            CartError::UnknownSize(_) | CartError::QuantityOutOfRange { .. } => StatusCode::BAD_REQUEST,
            CartError::InsufficientStock(_) => StatusCode::CONFLICT,
            CartError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_service(status, &err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        let status = match err {
            OrderError::Cart(inner) => return Self::from(inner),
            OrderError::EmptyCart | OrderError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::ProductUnavailable(_)
            | OrderError::InvalidTransition { .. }
            | OrderError::InsufficientStock(_)
            | OrderError::PaymentMismatch => StatusCode::CONFLICT,
            OrderError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_service(status, &err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let status = match &err {
            PaymentError::InvalidSignature | PaymentError::MalformedWebhook(_) => StatusCode::BAD_REQUEST,
            PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
        };
        Self::from_service(status, &err)
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        let status = match &err {
            MediaError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            MediaError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        Self::from_service(status, &err)
    }
}

impl From<EmailAuthError> for ApiError {
    fn from(err: EmailAuthError) -> Self {
        let status = match &err {
            EmailAuthError::InvalidEmail | EmailAuthError::InvalidCode => StatusCode::BAD_REQUEST,
            EmailAuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
            EmailAuthError::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
            EmailAuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_service(status, &err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::TokenExchange(_) | AuthError::ProfileFetch(_) => StatusCode::BAD_GATEWAY,
            AuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_service(status, &err)
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        let mut api = Self::from_service(StatusCode::TOO_MANY_REQUESTS, &err);
        api.retry_after_secs = Some(err.retry_after_secs());
        api
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum Sample {
        #[error("thing missing")]
        Missing,
        #[error("db exploded")]
        Db,
    }

    impl ErrorCode for Sample {
        fn error_code(&self) -> &'static str {
            match self {
                Self::Missing => "E_MISSING",
                Self::Db => "E_DATABASE",
            }
        }
    }

    #[test]
    fn from_service_keeps_client_error_message() {
        let err = ApiError::from_service(StatusCode::NOT_FOUND, &Sample::Missing);
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "E_MISSING");
        assert_eq!(err.message, "thing missing");
    }

    #[test]
    fn from_service_hides_server_error_message() {
        let err = ApiError::from_service(StatusCode::INTERNAL_SERVER_ERROR, &Sample::Db);
        assert_eq!(err.code, "E_DATABASE");
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn into_response_uses_status() {
        let resp = ApiError::forbidden().into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unavailable_names_feature() {
        let err = ApiError::unavailable("payments");
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.message.contains("payments"));
    }

    #[test]
    fn insufficient_stock_maps_to_conflict() {
        let shortfall = crate::services::inventory::Shortfall {
            product_id: uuid::Uuid::nil(),
            size: "M".into(),
            requested: 2,
            available: 1,
        };
        let err = ApiError::from(OrderError::InsufficientStock(shortfall));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "E_INSUFFICIENT_STOCK");
        assert!(err.message.contains("only 1 left"));
    }

    #[test]
    fn nested_cart_errors_keep_catalog_status() {
        let err = ApiError::from(OrderError::from(CartError::Catalog(CatalogError::InvalidSize("?".into()))));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "E_INVALID_SIZE");
    }

    #[test]
    fn payment_signature_failure_is_bad_request() {
        let err = ApiError::from(PaymentError::InvalidSignature);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err = ApiError::from(PaymentError::Gateway("timeout".into()));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn rate_limit_maps_to_429() {
        let err = ApiError::from(RateLimitError::PerKeyExceeded { limit: 5, window_secs: 900 });
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code, "E_RATE_LIMITED");
        assert_eq!(err.retry_after_secs, Some(900));

        let resp = err.into_response();
        assert_eq!(resp.headers().get("retry-after").and_then(|v| v.to_str().ok()), Some("900"));
    }

    #[test]
    fn ordinary_errors_carry_no_retry_after() {
        let resp = ApiError::bad_request("nope").into_response();
        assert!(resp.headers().get("retry-after").is_none());
    }

    #[test]
    fn failed_code_verification_is_unauthorized() {
        let err = ApiError::from(EmailAuthError::VerificationFailed);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
