//! Checkout, payment confirmation and customer order routes.
//!
//! Checkout places the order, then opens a gateway order for its total. The
//! browser pays against that gateway order and reports back through
//! `/api/checkout/verify`; the gateway also calls `/api/payments/webhook`.
//! Whichever arrives first confirms the order; the other is a no-op.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::services::order::{self, Actor, Order, OrderError, PaymentRef, ShippingAddress};
use crate::services::payment::{self, PaymentClient, PaymentError, WebhookEvent};
use crate::state::AppState;

pub(crate) const SIGNATURE_HEADER: &str = "x-gateway-signature";
const REASON_GATEWAY_ERROR: &str = "payment_gateway_error";

fn payments(state: &AppState) -> Result<&PaymentClient, ApiError> {
    state.payments.as_ref().ok_or_else(|| ApiError::unavailable("payments"))
}

#[derive(Deserialize)]
pub struct CheckoutBody {
    shipping_address: ShippingAddress,
}

/// What the browser needs to open the gateway's checkout widget.
#[derive(Debug, Serialize)]
pub struct PaymentIntent {
    pub key_id: String,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub payment: PaymentIntent,
}

/// `POST /api/checkout` — place an order from the cart and open a payment.
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CheckoutBody>,
) -> Result<impl IntoResponse, ApiError> {
    let client = payments(&state)?;
    state.checkout_limiter.check_and_record(&auth.user.id.to_string())?;

    let mut placed = order::place_order(&state.pool, auth.user.id, &body.shipping_address, &state.config.pricing).await?;

    let receipt = placed.id.simple().to_string();
    let gateway_order = match client.create_order(placed.total, &placed.currency, &receipt).await {
        Ok(g) => g,
        Err(e) => {
            if let Err(cancel_err) =
                order::cancel_order(&state.pool, placed.id, Actor::Admin, REASON_GATEWAY_ERROR).await
            {
                tracing::error!(error = %cancel_err, order_id = %placed.id, "failed to cancel order after gateway error");
            }
            return Err(e.into());
        }
    };
    order::attach_gateway_order(&state.pool, placed.id, &gateway_order.id).await?;
    placed.gateway_order_id = Some(gateway_order.id.clone());

    let payment = PaymentIntent {
        key_id: client.key_id().to_owned(),
        gateway_order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
    };
    Ok((StatusCode::CREATED, Json(CheckoutResponse { order: placed, payment })))
}

#[derive(Deserialize)]
pub struct VerifyBody {
    order_id: Uuid,
    gateway_order_id: String,
    payment_id: String,
    signature: String,
}

/// `POST /api/checkout/verify` — confirm an order from the checkout redirect.
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<VerifyBody>,
) -> Result<Json<Order>, ApiError> {
    let client = payments(&state)?;
    let existing = order::get_order_for(&state.pool, body.order_id, Actor::Customer(auth.user.id)).await?;
    if existing.gateway_order_id.as_deref() != Some(body.gateway_order_id.as_str()) {
        return Err(ApiError::bad_request("payment does not belong to this order"));
    }
    client.verify_payment(&body.gateway_order_id, &body.payment_id, &body.signature)?;

    let confirmed = order::confirm_payment(&state.pool, &PaymentRef::Order(existing.id), &body.payment_id).await?;
    Ok(Json(confirmed))
}

/// `POST /api/payments/webhook` — gateway event delivery. Signed over the raw body.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let client = payments(&state)?;
    let secret = client.webhook_secret().ok_or_else(|| ApiError::unavailable("payment webhooks"))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;
    payment::verify_webhook_signature(secret, &body, signature)?;

    match payment::parse_webhook(&body)? {
        WebhookEvent::Paid { gateway_order_id, payment_id } => {
            let outcome =
                order::confirm_payment(&state.pool, &PaymentRef::Gateway(gateway_order_id.clone()), &payment_id).await;
            acknowledge_paid_event(&gateway_order_id, &payment_id, outcome)?;
        }
        WebhookEvent::Ignored(event) => tracing::debug!(event = %event, "ignoring webhook event"),
    }
    Ok(StatusCode::OK)
}

/// Settle a paid event. Only database failures go back to the gateway as an
/// error so that it redelivers.
fn acknowledge_paid_event(
    gateway_order_id: &str,
    payment_id: &str,
    outcome: Result<Order, OrderError>,
) -> Result<(), ApiError> {
    match outcome {
        Ok(confirmed) => {
            tracing::info!(order_id = %confirmed.id, payment_id, "webhook confirmed order");
        }
        Err(OrderError::NotFound(_)) => {
            tracing::warn!(gateway_order_id, payment_id, "webhook for unknown gateway order");
        }
        Err(OrderError::Database(e)) => return Err(OrderError::Database(e).into()),
        Err(e) => {
            tracing::error!(
                gateway_order_id,
                payment_id,
                error = %e,
                "payment captured for an order that cannot be confirmed; needs manual refund"
            );
        }
    }
    Ok(())
}

/// `GET /api/orders` — the caller's orders, newest first.
pub async fn list_orders(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(order::list_orders_for_user(&state.pool, auth.user.id).await?))
}

/// `GET /api/orders/{id}` — owner or admin.
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let actor = if auth.user.is_admin() { Actor::Admin } else { Actor::Customer(auth.user.id) };
    Ok(Json(order::get_order_for(&state.pool, order_id, actor).await?))
}

/// `POST /api/orders/{id}/cancel` — customer cancellation before shipping.
pub async fn cancel_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let cancelled =
        order::cancel_order(&state.pool, order_id, Actor::Customer(auth.user.id), order::REASON_CUSTOMER).await?;
    Ok(Json(cancelled))
}

#[cfg(test)]
#[path = "orders_test.rs"]
mod tests;
