//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the REST API, OAuth redirects and SEO documents under a
//! single Axum router. Page rendering lives in a separate frontend; CORS
//! admits only the configured public origin, with credentials, so the
//! session and cart cookies travel on cross-origin API calls.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod seo;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{delete, get, patch, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::media::MAX_DATA_URI_BYTES;
use crate::state::AppState;

/// Body limit for image uploads: the data URI plus JSON framing.
const IMAGE_UPLOAD_BODY_LIMIT: usize = MAX_DATA_URI_BYTES + 64 * 1024;

fn cors_layer(public_base_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);
    match HeaderValue::from_str(public_base_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(public_base_url, "public base url is not a valid origin; CORS disabled");
            cors
        }
    }
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.public_base_url);

    Router::new()
        // auth
        .route("/auth/google", get(auth::google_redirect))
        .route("/auth/google/callback", get(auth::google_callback))
        .route("/api/auth/email/request-code", post(auth::request_email_code))
        .route("/api/auth/email/verify-code", post(auth::verify_email_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        // catalog
        .route("/api/products", get(products::list_products))
        .route("/api/products/{slug}", get(products::get_product))
        .route("/api/products/{slug}/meta", get(seo::product_meta))
        .route("/api/categories", get(products::list_categories))
        // cart
        .route("/api/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/cart/items", post(cart::add_item))
        .route("/api/cart/items/{item_id}", patch(cart::update_item).delete(cart::remove_item))
        // checkout and orders
        .route("/api/checkout", post(orders::checkout))
        .route("/api/checkout/verify", post(orders::verify_payment))
        .route("/api/payments/webhook", post(orders::payment_webhook))
        .route("/api/orders", get(orders::list_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/cancel", post(orders::cancel_order))
        // admin
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/products", get(admin::list_products).post(admin::create_product))
        .route(
            "/api/admin/products/{id}",
            get(admin::get_product)
                .patch(admin::update_product)
                .delete(admin::archive_product),
        )
        .route("/api/admin/products/{id}/stock", put(admin::set_stock))
        .route(
            "/api/admin/products/{id}/images",
            post(admin::upload_image).layer(DefaultBodyLimit::max(IMAGE_UPLOAD_BODY_LIMIT)),
        )
        .route("/api/admin/products/{id}/images/{index}", delete(admin::delete_image))
        .route("/api/admin/orders", get(admin::list_orders))
        .route("/api/admin/orders/{id}/status", patch(admin::set_order_status))
        .route("/api/admin/users", get(admin::list_users))
        // seo
        .route("/robots.txt", get(seo::robots_txt))
        .route("/sitemap.xml", get(seo::sitemap_xml))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub(crate) mod test_helpers {
    use axum::body::Body;
    use axum::http::{Request, Response};
    use tower::ServiceExt;

    use crate::state::AppState;

    /// Drive one request through the full router.
    pub async fn send(state: AppState, req: Request<Body>) -> Response<Body> {
        super::app(state).oneshot(req).await.expect("router is infallible")
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("valid request")
    }

    pub fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request")
    }

    pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    pub async fn body_text(resp: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }
}
