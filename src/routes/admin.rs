//! Admin routes — catalog management, stock, images, orders, users.
//!
//! All handlers take `AdminUser`, so signed-out callers get 401 and
//! signed-in customers get 403 before any body is parsed.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::AdminUser;
use crate::error::ApiError;
use crate::services::catalog::{
    self, ListQuery, LowStockEntry, NewProduct, Page, Product, ProductImage, ProductPatch, StockMap,
};
use crate::services::order::{self, Order, OrderStats, OrderStatus};
use crate::services::session::{self, UserSummary};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AdminStats {
    #[serde(flatten)]
    pub orders: OrderStats,
    pub low_stock_threshold: i32,
    pub low_stock: Vec<LowStockEntry>,
}

/// `GET /api/admin/stats`
pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<AdminStats>, ApiError> {
    let orders = order::order_stats(&state.pool).await?;
    let threshold = state.config.low_stock_threshold;
    let low_stock = catalog::low_stock(&state.pool, threshold).await?;
    Ok(Json(AdminStats { orders, low_stock_threshold: threshold, low_stock }))
}

// =============================================================================
// PRODUCTS
// =============================================================================

/// `GET /api/admin/products` — like the public listing, archived included.
pub async fn list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    Ok(Json(catalog::list_products(&state.pool, &query, true).await?))
}

/// `POST /api/admin/products`
pub async fn create_product(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(body): Json<NewProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let product = catalog::create_product(&state.pool, &body).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, admin = %admin.0.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /api/admin/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(catalog::get_by_id(&state.pool, product_id).await?))
}

/// `PATCH /api/admin/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(catalog::update_product(&state.pool, product_id, &patch).await?))
}

/// `DELETE /api/admin/products/{id}` — archive; order history keeps the row.
pub async fn archive_product(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    catalog::archive_product(&state.pool, product_id).await?;
    tracing::info!(product_id = %product_id, admin = %admin.0.id, "product archived");
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/admin/products/{id}/stock` — replace the size → quantity map.
pub async fn set_stock(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
    Json(stock): Json<StockMap>,
) -> Result<Json<StockMap>, ApiError> {
    Ok(Json(catalog::set_stock(&state.pool, product_id, &stock).await?))
}

#[derive(Deserialize)]
pub struct UploadImageBody {
    data_uri: String,
}

/// `POST /api/admin/products/{id}/images` — upload to the image host and
/// append to the product's gallery.
pub async fn upload_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<Uuid>,
    Json(body): Json<UploadImageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let media = state.media.as_ref().ok_or_else(|| ApiError::unavailable("image uploads"))?;
    catalog::get_by_id(&state.pool, product_id).await?;

    let uploaded = media.upload(&body.data_uri).await?;
    let public_id = uploaded.public_id.clone();
    match catalog::add_image(&state.pool, product_id, ProductImage::from(uploaded)).await {
        Ok(images) => Ok((StatusCode::CREATED, Json(images))),
        Err(e) => {
            if let Err(cleanup) = media.destroy(&public_id).await {
                tracing::warn!(error = %cleanup, public_id = %public_id, "orphaned image after failed save");
            }
            Err(e.into())
        }
    }
}

/// `DELETE /api/admin/products/{id}/images/{index}`
pub async fn delete_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((product_id, index)): Path<(Uuid, usize)>,
) -> Result<StatusCode, ApiError> {
    let removed = catalog::remove_image(&state.pool, product_id, index).await?;
    match &state.media {
        Some(media) => {
            if let Err(e) = media.destroy(&removed.public_id).await {
                tracing::warn!(error = %e, public_id = %removed.public_id, "image host delete failed");
            }
        }
        None => tracing::warn!(public_id = %removed.public_id, "media not configured; hosted image left in place"),
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ORDERS
// =============================================================================

#[derive(Deserialize)]
pub struct OrderListQuery {
    status: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

/// Parse the optional `status` filter; empty means no filter.
fn parse_status_filter(raw: Option<&str>) -> Result<Option<OrderStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => OrderStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("unknown order status: {s}"))),
    }
}

/// `GET /api/admin/orders?status=&page=`
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Page<Order>>, ApiError> {
    let status = parse_status_filter(query.status.as_deref())?;
    let page = order::list_orders(&state.pool, status, query.page.unwrap_or(1), query.per_page.unwrap_or(25)).await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
pub struct SetStatusBody {
    status: OrderStatus,
}

/// `PATCH /api/admin/orders/{id}/status`
pub async fn set_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
    Json(body): Json<SetStatusBody>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(order::set_status(&state.pool, order_id, body.status).await?))
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Deserialize)]
pub struct UserListQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

/// `GET /api/admin/users` — newest accounts first, with order counts.
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<UserSummary>>, ApiError> {
    let page = session::list_users(&state.pool, query.page.unwrap_or(1), query.per_page.unwrap_or(25)).await?;
    Ok(Json(page))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
