//! Cart service — per-owner carts, line edits, and login-time merge.
//!
//! DESIGN
//! ======
//! A cart belongs to exactly one owner: a signed-in user or an anonymous
//! cart key issued by cookie. At login the anonymous cart is folded into the
//! user's cart in one transaction and then deleted.
//!
//! Line quantities are bounded by the configured per-line maximum and by
//! stock on hand at the time of the edit. Stock is only reserved later,
//! when an order's payment is confirmed.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::config::Pricing;
use crate::error::ErrorCode;
use crate::services::catalog::{self, CatalogError};
use crate::services::inventory::Shortfall;
use crate::services::pricing::{self, Quote};

/// Lifetime of the anonymous cart cookie, and of an idle session cart.
pub const SESSION_CART_MAX_AGE_DAYS: i64 = 30;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Session(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("product not found: {0}")]
    ProductNotFound(Uuid),
    #[error("size {0} is not offered for this product")]
    UnknownSize(String),
    #[error("quantity must be between 1 and {max}")]
    QuantityOutOfRange { max: i32 },
    #[error("only {} left in size {}", .0.available, .0.size)]
    InsufficientStock(Shortfall),
    #[error("cart item not found: {0}")]
    ItemNotFound(Uuid),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for CartError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ProductNotFound(_) => "E_PRODUCT_NOT_FOUND",
            Self::UnknownSize(_) => "E_UNKNOWN_SIZE",
            Self::QuantityOutOfRange { .. } => "E_QUANTITY_OUT_OF_RANGE",
            Self::InsufficientStock(_) => "E_INSUFFICIENT_STOCK",
            Self::ItemNotFound(_) => "E_CART_ITEM_NOT_FOUND",
            Self::Catalog(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub slug: String,
    pub name: String,
    pub size: String,
    pub unit_price: i64,
    pub quantity: i32,
    /// Stock on hand for this size; 0 when the product is archived.
    pub available: i32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: Option<Uuid>,
    pub items: Vec<CartLine>,
    #[serde(flatten)]
    pub quote: Quote,
}

/// Minimal line used by the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeLine {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i32,
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Combine a user's lines with an anonymous cart's lines.
///
/// Quantities for the same (product, size) are summed and clamped to `max`.
/// Existing user lines keep their order; new session lines are appended.
#[must_use]
pub fn merge_lines(user_lines: &[MergeLine], session_lines: &[MergeLine], max: i32) -> Vec<MergeLine> {
    let mut merged = user_lines.to_vec();
    for incoming in session_lines {
        match merged
            .iter_mut()
            .find(|l| l.product_id == incoming.product_id && l.size == incoming.size)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(incoming.quantity),
            None => merged.push(incoming.clone()),
        }
    }
    for line in &mut merged {
        line.quantity = line.quantity.clamp(1, max.max(1));
    }
    merged
}

/// Validate a line's resulting quantity.
///
/// # Errors
///
/// `QuantityOutOfRange` outside `1..=max`; `InsufficientStock` above `available`.
pub fn check_line_quantity(product_id: Uuid, size: &str, quantity: i32, max: i32, available: i32) -> Result<(), CartError> {
    if quantity < 1 || quantity > max {
        return Err(CartError::QuantityOutOfRange { max });
    }
    if quantity > available {
        return Err(CartError::InsufficientStock(Shortfall {
            product_id,
            size: size.to_owned(),
            requested: quantity,
            available,
        }));
    }
    Ok(())
}

#[must_use]
pub fn subtotal(lines: &[CartLine]) -> i64 {
    lines
        .iter()
        .map(|l| pricing::line_total(l.unit_price, l.quantity))
        .fold(0_i64, i64::saturating_add)
}

// =============================================================================
// LOOKUPS
// =============================================================================

async fn find_cart(pool: &PgPool, owner: &CartOwner) -> Result<Option<Uuid>, sqlx::Error> {
    match owner {
        CartOwner::User(user_id) => {
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM carts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await
        }
        CartOwner::Session(key) => {
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM carts WHERE session_key = $1")
                .bind(key)
                .fetch_optional(pool)
                .await
        }
    }
}

/// Return the owner's cart id, creating the cart on first use.
///
/// # Errors
///
/// Returns a database error if the upsert fails.
pub async fn resolve_cart(
    executor: impl sqlx::Executor<'_, Database = Postgres>,
    owner: &CartOwner,
) -> Result<Uuid, sqlx::Error> {
    match owner {
        CartOwner::User(user_id) => {
            sqlx::query_scalar::<_, Uuid>(
                r"INSERT INTO carts (user_id) VALUES ($1)
                  ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
                  RETURNING id",
            )
            .bind(user_id)
            .fetch_one(executor)
            .await
        }
        CartOwner::Session(key) => {
            sqlx::query_scalar::<_, Uuid>(
                r"INSERT INTO carts (session_key) VALUES ($1)
                  ON CONFLICT (session_key) DO UPDATE SET updated_at = now()
                  RETURNING id",
            )
            .bind(key)
            .fetch_one(executor)
            .await
        }
    }
}

async fn load_lines(pool: &PgPool, cart_id: Uuid) -> Result<Vec<CartLine>, sqlx::Error> {
    let rows = sqlx::query(
        r"SELECT ci.id AS item_id, ci.product_id, p.slug, p.name, ci.size, p.price AS unit_price, ci.quantity,
                 CASE WHEN p.is_active THEN COALESCE(s.quantity, 0) ELSE 0 END AS available,
                 p.images -> 0 ->> 'url' AS image
          FROM cart_items ci
          JOIN products p ON p.id = ci.product_id
          LEFT JOIN product_stock s ON s.product_id = ci.product_id AND s.size = ci.size
          WHERE ci.cart_id = $1
          ORDER BY ci.position ASC",
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| CartLine {
            item_id: r.get("item_id"),
            product_id: r.get("product_id"),
            slug: r.get("slug"),
            name: r.get("name"),
            size: r.get("size"),
            unit_price: r.get("unit_price"),
            quantity: r.get("quantity"),
            available: r.get("available"),
            image: r.get("image"),
        })
        .collect())
}

/// Current stock for a size of an active product.
async fn stock_for(pool: &PgPool, product_id: Uuid, size: &str) -> Result<i32, CartError> {
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    if active != Some(true) {
        return Err(CartError::ProductNotFound(product_id));
    }
    sqlx::query_scalar::<_, i32>("SELECT quantity FROM product_stock WHERE product_id = $1 AND size = $2")
        .bind(product_id)
        .bind(size)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| CartError::UnknownSize(size.to_owned()))
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Render the owner's cart with live prices, stock, and totals.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn view_cart(pool: &PgPool, owner: &CartOwner, pricing: &Pricing) -> Result<CartView, CartError> {
    let Some(cart_id) = find_cart(pool, owner).await? else {
        return Ok(CartView { id: None, items: Vec::new(), quote: pricing::quote(0, pricing) });
    };
    let items = load_lines(pool, cart_id).await?;
    let quote = pricing::quote(subtotal(&items), pricing);
    Ok(CartView { id: Some(cart_id), items, quote })
}

/// Lines of the owner's cart, empty when no cart exists.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn cart_lines(pool: &PgPool, owner: &CartOwner) -> Result<Vec<CartLine>, CartError> {
    match find_cart(pool, owner).await? {
        Some(cart_id) => Ok(load_lines(pool, cart_id).await?),
        None => Ok(Vec::new()),
    }
}

/// Add `quantity` of a size to the cart, merging with an existing line.
///
/// # Errors
///
/// Product/size lookup failures, bounds violations, or database errors.
pub async fn add_item(
    pool: &PgPool,
    owner: &CartOwner,
    product_id: Uuid,
    size: &str,
    quantity: i32,
    max: i32,
) -> Result<(), CartError> {
    if quantity < 1 {
        return Err(CartError::QuantityOutOfRange { max });
    }
    let size = catalog::normalize_size(size)?;
    let available = stock_for(pool, product_id, &size).await?;

    let mut tx = pool.begin().await?;
    let cart_id = resolve_cart(&mut *tx, owner).await?;
    let existing = sqlx::query_scalar::<_, i32>(
        "SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2 AND size = $3 FOR UPDATE",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(&size)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(0);

    // Dropping `tx` on a bounds error rolls back a freshly created cart.
    let next = existing.saturating_add(quantity);
    check_line_quantity(product_id, &size, next, max, available)?;

    sqlx::query(
        r"INSERT INTO cart_items (cart_id, product_id, size, quantity) VALUES ($1, $2, $3, $4)
          ON CONFLICT (cart_id, product_id, size) DO UPDATE SET quantity = EXCLUDED.quantity",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(&size)
    .bind(next)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Set a line's quantity; zero removes the line.
///
/// # Errors
///
/// `ItemNotFound` if the line is not in the owner's cart, bounds violations,
/// or database errors.
pub async fn update_item(pool: &PgPool, owner: &CartOwner, item_id: Uuid, quantity: i32, max: i32) -> Result<(), CartError> {
    if quantity == 0 {
        return remove_item(pool, owner, item_id).await;
    }
    let cart_id = find_cart(pool, owner).await?.ok_or(CartError::ItemNotFound(item_id))?;
    let (product_id, size) = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT product_id, size FROM cart_items WHERE id = $1 AND cart_id = $2",
    )
    .bind(item_id)
    .bind(cart_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CartError::ItemNotFound(item_id))?;

    let available = stock_for(pool, product_id, &size).await?;
    check_line_quantity(product_id, &size, quantity, max, available)?;

    sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .bind(quantity)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove one line from the owner's cart.
///
/// # Errors
///
/// `ItemNotFound` if the line is not in the owner's cart.
pub async fn remove_item(pool: &PgPool, owner: &CartOwner, item_id: Uuid) -> Result<(), CartError> {
    let cart_id = find_cart(pool, owner).await?.ok_or(CartError::ItemNotFound(item_id))?;
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CartError::ItemNotFound(item_id));
    }
    Ok(())
}

/// Remove every line from the owner's cart.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn clear_cart(pool: &PgPool, owner: &CartOwner) -> Result<(), CartError> {
    if let Some(cart_id) = find_cart(pool, owner).await? {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Empty a user's cart as part of a larger transaction.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn clear_user_cart(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = (SELECT id FROM carts WHERE user_id = $1)")
        .bind(user_id)
        .execute(tx.as_mut())
        .await?;
    Ok(())
}

async fn merge_lines_of(tx: &mut Transaction<'_, Postgres>, cart_id: Uuid) -> Result<Vec<MergeLine>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, i32)>(
        "SELECT product_id, size, quantity FROM cart_items WHERE cart_id = $1 ORDER BY position ASC",
    )
    .bind(cart_id)
    .fetch_all(tx.as_mut())
    .await?;
    Ok(rows
        .into_iter()
        .map(|(product_id, size, quantity)| MergeLine { product_id, size, quantity })
        .collect())
}

/// Fold the anonymous cart for `session_key` into the user's cart and delete
/// it. Returns the number of lines carried over; 0 when there was no cart.
///
/// # Errors
///
/// Returns a database error; the transaction leaves both carts untouched.
pub async fn merge_session_cart(pool: &PgPool, session_key: &str, user_id: Uuid, max: i32) -> Result<usize, CartError> {
    let mut tx = pool.begin().await?;
    let session_cart = sqlx::query_scalar::<_, Uuid>("SELECT id FROM carts WHERE session_key = $1 FOR UPDATE")
        .bind(session_key)
        .fetch_optional(tx.as_mut())
        .await?;
    let Some(session_cart) = session_cart else {
        return Ok(0);
    };

    let session_lines = merge_lines_of(&mut tx, session_cart).await?;
    let user_cart = resolve_cart(tx.as_mut(), &CartOwner::User(user_id)).await?;
    let user_lines = merge_lines_of(&mut tx, user_cart).await?;

    for line in merge_lines(&user_lines, &session_lines, max) {
        sqlx::query(
            r"INSERT INTO cart_items (cart_id, product_id, size, quantity) VALUES ($1, $2, $3, $4)
              ON CONFLICT (cart_id, product_id, size) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(user_cart)
        .bind(line.product_id)
        .bind(&line.size)
        .bind(line.quantity)
        .execute(tx.as_mut())
        .await?;
    }

    sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(session_cart)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, lines = session_lines.len(), "session cart merged");
    Ok(session_lines.len())
}

/// Delete anonymous carts untouched for `max_age_days`. Their cookie has
/// expired by then, so nobody can reach them.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn purge_idle_session_carts(pool: &PgPool, max_age_days: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"DELETE FROM carts
          WHERE session_key IS NOT NULL
            AND updated_at < now() - make_interval(days => $1::int)",
    )
    .bind(max_age_days)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "cart_test.rs"]
mod tests;
