//! Cart routes. Signed-in shoppers use their account cart; anonymous ones
//! are tracked by the `cart_session` cookie, issued on their first add.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use time::Duration;
use uuid::Uuid;

use super::auth::{CART_COOKIE, MaybeUser, build_cookie};
use crate::error::ApiError;
use crate::services::cart::{self, CartError, CartOwner, CartView};
use crate::services::{pricing, session};
use crate::state::AppState;

const CART_COOKIE_MAX_AGE: Duration = Duration::days(cart::SESSION_CART_MAX_AGE_DAYS);

/// Owner for this request, if there is one yet.
fn existing_owner(user: &MaybeUser, jar: &CookieJar) -> Option<CartOwner> {
    if let Some(auth) = &user.0 {
        return Some(CartOwner::User(auth.user.id));
    }
    jar.get(CART_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|key| session::is_valid_cart_key(key))
        .map(CartOwner::Session)
}

/// Owner for this request, minting a session cart key when needed.
fn owner_or_issue(state: &AppState, user: &MaybeUser, jar: CookieJar) -> (CartOwner, CookieJar) {
    if let Some(owner) = existing_owner(user, &jar) {
        return (owner, jar);
    }
    let key = session::generate_cart_key();
    let jar = jar.add(build_cookie(CART_COOKIE, key.clone(), state.config.cookie_secure, CART_COOKIE_MAX_AGE));
    (CartOwner::Session(key), jar)
}

fn empty_cart(state: &AppState) -> CartView {
    CartView { id: None, items: Vec::new(), quote: pricing::quote(0, &state.config.pricing) }
}

/// `GET /api/cart`
pub async fn get_cart(State(state): State<AppState>, user: MaybeUser, jar: CookieJar) -> Result<Json<CartView>, ApiError> {
    let Some(owner) = existing_owner(&user, &jar) else {
        return Ok(Json(empty_cart(&state)));
    };
    Ok(Json(cart::view_cart(&state.pool, &owner, &state.config.pricing).await?))
}

/// `DELETE /api/cart`
pub async fn clear_cart(State(state): State<AppState>, user: MaybeUser, jar: CookieJar) -> Result<StatusCode, ApiError> {
    if let Some(owner) = existing_owner(&user, &jar) {
        cart::clear_cart(&state.pool, &owner).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

fn default_quantity() -> i32 {
    1
}

#[derive(Deserialize)]
pub struct AddItemBody {
    product_id: Uuid,
    size: String,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

/// `POST /api/cart/items` — add to the cart, returning the updated cart.
pub async fn add_item(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
    Json(body): Json<AddItemBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (owner, jar) = owner_or_issue(&state, &user, jar);
    let max = state.config.max_line_quantity;
    cart::add_item(&state.pool, &owner, body.product_id, &body.size, body.quantity, max).await?;
    let view = cart::view_cart(&state.pool, &owner, &state.config.pricing).await?;
    Ok((jar, Json(view)))
}

#[derive(Deserialize)]
pub struct UpdateItemBody {
    quantity: i32,
}

/// `PATCH /api/cart/items/{item_id}` — set quantity; 0 removes the line.
pub async fn update_item(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
    Path(item_id): Path<Uuid>,
    Json(body): Json<UpdateItemBody>,
) -> Result<Json<CartView>, ApiError> {
    let owner = existing_owner(&user, &jar).ok_or(CartError::ItemNotFound(item_id))?;
    let max = state.config.max_line_quantity;
    cart::update_item(&state.pool, &owner, item_id, body.quantity, max).await?;
    Ok(Json(cart::view_cart(&state.pool, &owner, &state.config.pricing).await?))
}

/// `DELETE /api/cart/items/{item_id}`
pub async fn remove_item(
    State(state): State<AppState>,
    user: MaybeUser,
    jar: CookieJar,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CartView>, ApiError> {
    let owner = existing_owner(&user, &jar).ok_or(CartError::ItemNotFound(item_id))?;
    cart::remove_item(&state.pool, &owner, item_id).await?;
    Ok(Json(cart::view_cart(&state.pool, &owner, &state.config.pricing).await?))
}

#[cfg(test)]
#[path = "cart_test.rs"]
mod tests;
