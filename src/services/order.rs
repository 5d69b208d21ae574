//! Order service — placement, payment confirmation, cancellation, status.
//!
//! DESIGN
//! ======
//! Orders move through `placed → confirmed → shipped → delivered`, with
//! `cancelled` reachable from `placed` and `confirmed`. Placement snapshots
//! the cart (names, sizes, unit prices) but does not touch stock.
//!
//! Stock is taken at confirmation and given back when a confirmed order is
//! cancelled. The `stock_committed` flag flips in the same transaction as
//! the stock change, so a restore can never run twice for one order.
//!
//! ERROR HANDLING
//! ==============
//! Payment confirmation is idempotent per payment id: the redirect-verify
//! path and the gateway webhook can race, and the loser sees the already
//! confirmed order. If stock ran out between placement and payment, the
//! whole confirmation rolls back and the order stays `placed`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::config::Pricing;
use crate::error::ErrorCode;
use crate::services::cart::{self, CartError, CartOwner};
use crate::services::catalog::Page;
use crate::services::inventory::{self, InventoryError, Shortfall, StockLine};
use crate::services::pricing;

const ORDER_COLUMNS: &str = r#"id, user_id, status, subtotal, shipping_fee, total, currency, shipping_address,
    gateway_order_id, gateway_payment_id, stock_committed, cancel_reason,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at"#;

pub const REASON_PAYMENT_TIMEOUT: &str = "payment_timeout";
pub const REASON_CUSTOMER: &str = "cancelled_by_customer";
pub const REASON_ADMIN: &str = "cancelled_by_admin";

// =============================================================================
// STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 5] = [Self::Placed, Self::Confirmed, Self::Shipped, Self::Delivered, Self::Cancelled];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `to`.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Placed, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }
}

/// Who is acting on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(Uuid),
    Admin,
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("invalid shipping address: {0}")]
    InvalidAddress(String),
    #[error("order not found: {0}")]
    NotFound(Uuid),
    #[error("product {0} is no longer available")]
    ProductUnavailable(Uuid),
    #[error("cannot move order from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("only {} left in size {}", .0.available, .0.size)]
    InsufficientStock(Shortfall),
    #[error("order already paid with a different payment")]
    PaymentMismatch,
    #[error(transparent)]
    Cart(CartError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for OrderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyCart => "E_EMPTY_CART",
            Self::InvalidAddress(_) => "E_INVALID_ADDRESS",
            Self::NotFound(_) => "E_ORDER_NOT_FOUND",
            Self::ProductUnavailable(_) => "E_PRODUCT_UNAVAILABLE",
            Self::InvalidTransition { .. } => "E_INVALID_TRANSITION",
            Self::InsufficientStock(_) => "E_INSUFFICIENT_STOCK",
            Self::PaymentMismatch => "E_PAYMENT_MISMATCH",
            Self::Cart(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }
}

impl From<InventoryError> for OrderError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock(shortfall) => Self::InsufficientStock(shortfall),
            InventoryError::Database(e) => Self::Database(e),
        }
    }
}

impl From<CartError> for OrderError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Database(e) => Self::Database(e),
            other => Self::Cart(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

impl ShippingAddress {
    /// # Errors
    ///
    /// Returns `InvalidAddress` naming the first bad field.
    pub fn validate(&self) -> Result<(), OrderError> {
        let required = [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
            ("phone", &self.phone),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(OrderError::InvalidAddress(format!("{field} is required")));
        }
        let postal_len = self.postal_code.trim().chars().count();
        if !(3..=10).contains(&postal_len) {
            return Err(OrderError::InvalidAddress("postal_code must be 3 to 10 characters".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub size: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub total: i64,
    pub currency: String,
    pub shipping_address: ShippingAddress,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub stock_committed: bool,
    pub cancel_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItem>,
}

impl From<&OrderItem> for StockLine {
    fn from(item: &OrderItem) -> Self {
        Self { product_id: item.product_id, size: item.size.clone(), quantity: item.quantity }
    }
}

/// How a payment confirmation identifies its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRef {
    Order(Uuid),
    Gateway(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub orders_by_status: BTreeMap<String, i64>,
    /// Sum of totals for confirmed, shipped and delivered orders.
    pub revenue: i64,
    pub customers: i64,
}

// =============================================================================
// TRANSITION RULES
// =============================================================================

/// Validate a cancellation request for an order in `status`.
///
/// # Errors
///
/// `InvalidTransition` when the actor may not cancel from this status.
pub fn check_cancel(status: OrderStatus, actor: Actor) -> Result<(), OrderError> {
    let allowed = match actor {
        Actor::Customer(_) => matches!(status, OrderStatus::Placed | OrderStatus::Confirmed),
        Actor::Admin => status.can_transition(OrderStatus::Cancelled),
    };
    if allowed {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from: status, to: OrderStatus::Cancelled })
    }
}

/// Validate an admin status change other than cancellation. Confirmation
/// is reserved for the payment path.
///
/// # Errors
///
/// `InvalidTransition` for anything the lifecycle or payment rule forbids.
pub fn check_admin_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if to == OrderStatus::Confirmed || !from.can_transition(to) {
        return Err(OrderError::InvalidTransition { from, to });
    }
    Ok(())
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn order_from_row(row: &sqlx::postgres::PgRow, items: Vec<OrderItem>) -> Order {
    let Json(shipping_address): Json<ShippingAddress> = row.get("shipping_address");
    let status: String = row.get("status");
    Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        status: OrderStatus::parse(&status).unwrap_or(OrderStatus::Placed),
        subtotal: row.get("subtotal"),
        shipping_fee: row.get("shipping_fee"),
        total: row.get("total"),
        currency: row.get("currency"),
        shipping_address,
        gateway_order_id: row.get("gateway_order_id"),
        gateway_payment_id: row.get("gateway_payment_id"),
        stock_committed: row.get("stock_committed"),
        cancel_reason: row.get("cancel_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        items,
    }
}

async fn load_items(
    executor: impl sqlx::Executor<'_, Database = Postgres>,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItem>>, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, String, i64, i32)>(
        r"SELECT order_id, product_id, product_name, size, unit_price, quantity
          FROM order_items
          WHERE order_id = ANY($1)
          ORDER BY product_name ASC, size ASC",
    )
    .bind(order_ids)
    .fetch_all(executor)
    .await?;

    let mut out: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for (order_id, product_id, product_name, size, unit_price, quantity) in rows {
        out.entry(order_id).or_default().push(OrderItem {
            product_id,
            product_name,
            size,
            unit_price,
            quantity,
            line_total: pricing::line_total(unit_price, quantity),
        });
    }
    Ok(out)
}

async fn hydrate(pool: &PgPool, rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Order>, sqlx::Error> {
    let ids = rows.iter().map(|r| r.get::<Uuid, _>("id")).collect::<Vec<_>>();
    let mut items = load_items(pool, &ids).await?;
    Ok(rows
        .iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            order_from_row(row, items.remove(&id).unwrap_or_default())
        })
        .collect())
}

/// Fetch one order by id regardless of owner.
///
/// # Errors
///
/// `NotFound` if the id is unknown.
pub async fn get_order(pool: &PgPool, order_id: Uuid) -> Result<Order, OrderError> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(OrderError::NotFound(order_id))?;
    hydrate(pool, vec![row]).await?.pop().ok_or(OrderError::NotFound(order_id))
}

/// Fetch an order visible to `actor`. Other customers' orders look missing.
///
/// # Errors
///
/// `NotFound` if the order is unknown or not visible.
pub async fn get_order_for(pool: &PgPool, order_id: Uuid, actor: Actor) -> Result<Order, OrderError> {
    let order = get_order(pool, order_id).await?;
    match actor {
        Actor::Customer(user_id) if order.user_id != user_id => Err(OrderError::NotFound(order_id)),
        _ => Ok(order),
    }
}

/// A customer's orders, newest first.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_orders_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Order>, OrderError> {
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(hydrate(pool, rows).await?)
}

/// All orders for the admin panel, optionally filtered by status.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_orders(
    pool: &PgPool,
    status: Option<OrderStatus>,
    page: i64,
    per_page: i64,
) -> Result<Page<Order>, OrderError> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let status = status.map(OrderStatus::as_str);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
        .bind(status)
        .fetch_one(pool)
        .await?;
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE ($1::text IS NULL OR status = $1)
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(status)
    .bind(per_page)
    .bind((page - 1).saturating_mul(per_page))
    .fetch_all(pool)
    .await?;

    Ok(Page { items: hydrate(pool, rows).await?, page, per_page, total })
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// Turn the user's cart into a `placed` order. Stock is checked, not taken.
///
/// # Errors
///
/// `EmptyCart`, `InvalidAddress`, `ProductUnavailable`, `InsufficientStock`,
/// or a database error.
pub async fn place_order(
    pool: &PgPool,
    user_id: Uuid,
    address: &ShippingAddress,
    pricing_rules: &Pricing,
) -> Result<Order, OrderError> {
    address.validate()?;
    let lines = cart::cart_lines(pool, &CartOwner::User(user_id)).await?;
    if lines.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    let product_ids = lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
    let inactive = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM products WHERE id = ANY($1) AND NOT is_active LIMIT 1",
    )
    .bind(&product_ids)
    .fetch_optional(pool)
    .await?;
    if let Some(product_id) = inactive {
        return Err(OrderError::ProductUnavailable(product_id));
    }

    let stock_lines = lines
        .iter()
        .map(|l| StockLine { product_id: l.product_id, size: l.size.clone(), quantity: l.quantity })
        .collect::<Vec<_>>();
    if let Some(shortfall) = inventory::check_availability(pool, &stock_lines).await? {
        return Err(OrderError::InsufficientStock(shortfall));
    }

    let quote = pricing::quote(cart::subtotal(&lines), pricing_rules);
    let order_id = Uuid::new_v4();

    let mut tx = pool.begin().await?;
    sqlx::query(
        r"INSERT INTO orders (id, user_id, status, subtotal, shipping_fee, total, currency, shipping_address)
          VALUES ($1, $2, 'placed', $3, $4, $5, $6, $7)",
    )
    .bind(order_id)
    .bind(user_id)
    .bind(quote.subtotal)
    .bind(quote.shipping_fee)
    .bind(quote.total)
    .bind(&quote.currency)
    .bind(Json(address))
    .execute(tx.as_mut())
    .await?;

    for line in &lines {
        sqlx::query(
            r"INSERT INTO order_items (order_id, product_id, product_name, size, unit_price, quantity)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(&line.name)
        .bind(&line.size)
        .bind(line.unit_price)
        .bind(line.quantity)
        .execute(tx.as_mut())
        .await?;
    }
    tx.commit().await?;

    tracing::info!(order_id = %order_id, user_id = %user_id, total = quote.total, "order placed");
    get_order(pool, order_id).await
}

/// Record the gateway's order id on a placed order.
///
/// # Errors
///
/// `NotFound` if the order is unknown.
pub async fn attach_gateway_order(pool: &PgPool, order_id: Uuid, gateway_order_id: &str) -> Result<(), OrderError> {
    let result = sqlx::query("UPDATE orders SET gateway_order_id = $2, updated_at = now() WHERE id = $1")
        .bind(order_id)
        .bind(gateway_order_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(OrderError::NotFound(order_id));
    }
    Ok(())
}

// =============================================================================
// LIFECYCLE
// =============================================================================

struct LockedOrder {
    id: Uuid,
    user_id: Uuid,
    status: OrderStatus,
    gateway_payment_id: Option<String>,
    stock_committed: bool,
}

async fn lock_order(tx: &mut Transaction<'_, Postgres>, by: &PaymentRef) -> Result<Option<LockedOrder>, sqlx::Error> {
    const COLUMNS: &str = "SELECT id, user_id, status, gateway_payment_id, stock_committed FROM orders";
    let row = match by {
        PaymentRef::Order(id) => {
            sqlx::query(&format!("{COLUMNS} WHERE id = $1 FOR UPDATE"))
                .bind(id)
                .fetch_optional(tx.as_mut())
                .await?
        }
        PaymentRef::Gateway(gateway_order_id) => {
            sqlx::query(&format!("{COLUMNS} WHERE gateway_order_id = $1 FOR UPDATE"))
                .bind(gateway_order_id)
                .fetch_optional(tx.as_mut())
                .await?
        }
    };
    Ok(row.map(|r| {
        let status: String = r.get("status");
        LockedOrder {
            id: r.get("id"),
            user_id: r.get("user_id"),
            status: OrderStatus::parse(&status).unwrap_or(OrderStatus::Placed),
            gateway_payment_id: r.get("gateway_payment_id"),
            stock_committed: r.get("stock_committed"),
        }
    }))
}

async fn locked_stock_lines(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<Vec<StockLine>, sqlx::Error> {
    let mut items = load_items(tx.as_mut(), &[order_id]).await?;
    Ok(items.remove(&order_id).unwrap_or_default().iter().map(StockLine::from).collect())
}

/// Mark an order paid: take stock, confirm, and empty the buyer's cart.
///
/// Repeating the call with the same payment id returns the order unchanged.
///
/// # Errors
///
/// `NotFound`, `PaymentMismatch`, `InvalidTransition`, `InsufficientStock`
/// (order left `placed`), or a database error.
pub async fn confirm_payment(pool: &PgPool, by: &PaymentRef, payment_id: &str) -> Result<Order, OrderError> {
    let mut tx = pool.begin().await?;
    let Some(order) = lock_order(&mut tx, by).await? else {
        return Err(match by {
            PaymentRef::Order(id) => OrderError::NotFound(*id),
            PaymentRef::Gateway(_) => OrderError::NotFound(Uuid::nil()),
        });
    };

    if order.status != OrderStatus::Placed {
        return match order.gateway_payment_id.as_deref() {
            Some(existing) if existing == payment_id && order.status != OrderStatus::Cancelled => {
                drop(tx);
                get_order(pool, order.id).await
            }
            Some(_) if order.status != OrderStatus::Cancelled => Err(OrderError::PaymentMismatch),
            _ => Err(OrderError::InvalidTransition { from: order.status, to: OrderStatus::Confirmed }),
        };
    }

    let lines = locked_stock_lines(&mut tx, order.id).await?;
    if let Err(err) = inventory::commit_stock(&mut tx, &lines).await {
        tracing::warn!(order_id = %order.id, payment_id, error = %err, "payment received but stock commit failed");
        return Err(err.into());
    }

    sqlx::query(
        r"UPDATE orders
          SET status = 'confirmed', stock_committed = TRUE, gateway_payment_id = $2, updated_at = now()
          WHERE id = $1",
    )
    .bind(order.id)
    .bind(payment_id)
    .execute(tx.as_mut())
    .await?;
    cart::clear_user_cart(&mut tx, order.user_id).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, payment_id, "order confirmed");
    get_order(pool, order.id).await
}

/// Cancel an order, restoring stock if it had been committed.
///
/// # Errors
///
/// `NotFound` (including other customers' orders), `InvalidTransition`, or a
/// database error.
pub async fn cancel_order(pool: &PgPool, order_id: Uuid, actor: Actor, reason: &str) -> Result<Order, OrderError> {
    let mut tx = pool.begin().await?;
    let order = lock_order(&mut tx, &PaymentRef::Order(order_id))
        .await?
        .ok_or(OrderError::NotFound(order_id))?;
    if let Actor::Customer(user_id) = actor {
        if order.user_id != user_id {
            return Err(OrderError::NotFound(order_id));
        }
    }
    check_cancel(order.status, actor)?;

    if order.stock_committed {
        let lines = locked_stock_lines(&mut tx, order_id).await?;
        inventory::release_stock(&mut tx, &lines).await?;
    }

    sqlx::query(
        r"UPDATE orders
          SET status = 'cancelled', stock_committed = FALSE, cancel_reason = $2, updated_at = now()
          WHERE id = $1",
    )
    .bind(order_id)
    .bind(reason)
    .execute(tx.as_mut())
    .await?;
    tx.commit().await?;

    tracing::info!(order_id = %order_id, reason, restored = order.stock_committed, "order cancelled");
    get_order(pool, order_id).await
}

/// Admin status change. Cancellation goes through `cancel_order`.
///
/// # Errors
///
/// `NotFound`, `InvalidTransition`, or a database error.
pub async fn set_status(pool: &PgPool, order_id: Uuid, to: OrderStatus) -> Result<Order, OrderError> {
    if to == OrderStatus::Cancelled {
        return cancel_order(pool, order_id, Actor::Admin, REASON_ADMIN).await;
    }

    let mut tx = pool.begin().await?;
    let order = lock_order(&mut tx, &PaymentRef::Order(order_id))
        .await?
        .ok_or(OrderError::NotFound(order_id))?;
    check_admin_transition(order.status, to)?;

    sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
        .bind(order_id)
        .bind(to.as_str())
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    tracing::info!(order_id = %order_id, from = order.status.as_str(), to = to.as_str(), "order status changed");
    get_order(pool, order_id).await
}

/// Cancel `placed` orders older than `ttl_mins`. They never held stock.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn expire_stale_orders(pool: &PgPool, ttl_mins: i64) -> Result<u64, OrderError> {
    let result = sqlx::query(
        r"UPDATE orders
          SET status = 'cancelled', cancel_reason = $2, updated_at = now()
          WHERE status = 'placed'
            AND NOT stock_committed
            AND created_at < now() - make_interval(mins => $1::int)",
    )
    .bind(ttl_mins)
    .bind(REASON_PAYMENT_TIMEOUT)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Headline numbers for the admin dashboard.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn order_stats(pool: &PgPool) -> Result<OrderStats, OrderError> {
    let rows = sqlx::query_as::<_, (String, i64)>("SELECT status, COUNT(*) FROM orders GROUP BY status")
        .fetch_all(pool)
        .await?;
    let mut orders_by_status = OrderStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_owned(), 0))
        .collect::<BTreeMap<_, _>>();
    orders_by_status.extend(rows);

    let revenue: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total), 0)::bigint FROM orders WHERE status IN ('confirmed', 'shipped', 'delivered')",
    )
    .fetch_one(pool)
    .await?;
    let customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'customer'")
        .fetch_one(pool)
        .await?;

    Ok(OrderStats { orders_by_status, revenue, customers })
}

#[cfg(test)]
#[path = "order_test.rs"]
mod tests;
