//! Inventory service — guarded per-size stock decrement and restore.
//!
//! DESIGN
//! ======
//! Stock changes run inside the caller's transaction. A decrement is a single
//! conditional `UPDATE ... WHERE quantity >= n`; zero affected rows means the
//! size cannot cover the request, and the caller's rollback discards every
//! decrement already applied for the order. Quantities therefore never go
//! negative, even transiently.
//!
//! Lines are aggregated by (product, size) first so duplicate lines cannot
//! slip past the guard one at a time.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// One (product, size, quantity) request against stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: i32,
}

/// Details of the first line that stock could not cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub product_id: Uuid,
    pub size: String,
    pub requested: i32,
    pub available: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("insufficient stock for product {} size {}: requested {}, available {}",
        .0.product_id, .0.size, .0.requested, .0.available)]
    InsufficientStock(Shortfall),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for InventoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientStock(_) => "E_INSUFFICIENT_STOCK",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Sum quantities per (product, size); drops non-positive totals.
/// Output is sorted so concurrent transactions lock rows in the same order.
#[must_use]
pub fn aggregate(lines: &[StockLine]) -> Vec<StockLine> {
    let mut totals: BTreeMap<(Uuid, String), i32> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.product_id, line.size.clone()))
            .or_insert(0) += line.quantity;
    }
    totals
        .into_iter()
        .filter(|(_, qty)| *qty > 0)
        .map(|((product_id, size), quantity)| StockLine { product_id, size, quantity })
        .collect()
}

async fn available(
    executor: impl sqlx::Executor<'_, Database = Postgres>,
    product_id: Uuid,
    size: &str,
) -> Result<i32, sqlx::Error> {
    let qty = sqlx::query_scalar::<_, i32>("SELECT quantity FROM product_stock WHERE product_id = $1 AND size = $2")
        .bind(product_id)
        .bind(size)
        .fetch_optional(executor)
        .await?;
    Ok(qty.unwrap_or(0))
}

/// Read-only pre-check. Returns the first line stock cannot cover.
///
/// # Errors
///
/// Returns a database error if a lookup fails.
pub async fn check_availability(pool: &PgPool, lines: &[StockLine]) -> Result<Option<Shortfall>, sqlx::Error> {
    for line in aggregate(lines) {
        let on_hand = available(pool, line.product_id, &line.size).await?;
        if on_hand < line.quantity {
            return Ok(Some(Shortfall {
                product_id: line.product_id,
                size: line.size,
                requested: line.quantity,
                available: on_hand,
            }));
        }
    }
    Ok(None)
}

/// Decrement stock for every line inside `tx`.
///
/// # Errors
///
/// Returns `InsufficientStock` on the first line that cannot be covered. The
/// caller must roll back `tx` (dropping it is enough).
pub async fn commit_stock(tx: &mut Transaction<'_, Postgres>, lines: &[StockLine]) -> Result<(), InventoryError> {
    for line in aggregate(lines) {
        let result = sqlx::query(
            r"UPDATE product_stock
              SET quantity = quantity - $3
              WHERE product_id = $1 AND size = $2 AND quantity >= $3",
        )
        .bind(line.product_id)
        .bind(&line.size)
        .bind(line.quantity)
        .execute(tx.as_mut())
        .await?;

        if result.rows_affected() == 0 {
            let on_hand = available(tx.as_mut(), line.product_id, &line.size).await?;
            return Err(InventoryError::InsufficientStock(Shortfall {
                product_id: line.product_id,
                size: line.size,
                requested: line.quantity,
                available: on_hand,
            }));
        }
    }
    Ok(())
}

/// Return stock for every line inside `tx`. A size removed from the product
/// since the decrement is re-created with the restored quantity.
///
/// # Errors
///
/// Returns a database error if an update fails.
pub async fn release_stock(tx: &mut Transaction<'_, Postgres>, lines: &[StockLine]) -> Result<(), InventoryError> {
    for line in aggregate(lines) {
        sqlx::query(
            r"INSERT INTO product_stock (product_id, size, quantity) VALUES ($1, $2, $3)
              ON CONFLICT (product_id, size) DO UPDATE
              SET quantity = product_stock.quantity + EXCLUDED.quantity",
        )
        .bind(line.product_id)
        .bind(&line.size)
        .bind(line.quantity)
        .execute(tx.as_mut())
        .await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "inventory_test.rs"]
mod tests;
