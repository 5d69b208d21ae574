//! Public catalog routes.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use crate::error::ApiError;
use crate::services::catalog::{self, CategoryCount, ListQuery, Page, Product};
use crate::state::AppState;

/// `GET /api/products` — active products with filters, sort and paging.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    Ok(Json(catalog::list_products(&state.pool, &query, false).await?))
}

/// `GET /api/products/{slug}`
pub async fn get_product(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Product>, ApiError> {
    Ok(Json(catalog::get_by_slug(&state.pool, &slug).await?))
}

/// `GET /api/categories`
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryCount>>, ApiError> {
    Ok(Json(catalog::list_categories(&state.pool).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_helpers::{get, send};
    use crate::state::test_helpers::test_app_state;

    #[tokio::test]
    async fn malformed_filters_are_rejected_before_query() {
        for uri in ["/api/products?min_price=cheap", "/api/products?sort=sideways", "/api/products?featured=maybe"] {
            let resp = send(test_app_state(), get(uri)).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}
