//! Session and cart-key management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses long-lived opaque session tokens stored in Postgres and
//! carried in an HttpOnly cookie. Anonymous shoppers get a separate random
//! cart key cookie so their cart survives until login, when it is merged.

use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::catalog::Page;

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

/// Generate a 16-byte hex key for an anonymous cart.
#[must_use]
pub fn generate_cart_key() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Cart keys are exactly what `generate_cart_key` produces.
#[must_use]
pub fn is_valid_cart_key(key: &str) -> bool {
    key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "admin" { Self::Admin } else { Self::Customer }
    }
}

/// User row returned from session validation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl SessionUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Create a session for the given user, returning the token.
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO sessions (token, user_id) VALUES ($1, $2)")
        .bind(&token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return the associated user.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.name, u.email, u.avatar_url, u.role
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| SessionUser {
        id: r.get("id"),
        name: r.get("name"),
        email: r.get("email"),
        avatar_url: r.get("avatar_url"),
        role: Role::parse(r.get::<String, _>("role").as_str()),
    }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Account row for the admin user list.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub order_count: i64,
    pub created_at: String,
}

/// Accounts newest first, with their order counts.
pub async fn list_users(pool: &PgPool, page: i64, per_page: i64) -> Result<Page<UserSummary>, sqlx::Error> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await?;
    let rows = sqlx::query(
        r#"SELECT u.id, u.name, u.email, u.role,
                  (SELECT COUNT(*) FROM orders o WHERE o.user_id = u.id) AS order_count,
                  to_char(u.created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
           FROM users u
           ORDER BY u.created_at DESC, u.id
           LIMIT $1 OFFSET $2"#,
    )
    .bind(per_page)
    .bind((page - 1).saturating_mul(per_page))
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(|r| UserSummary {
            id: r.get("id"),
            name: r.get("name"),
            email: r.get("email"),
            role: Role::parse(r.get::<String, _>("role").as_str()),
            order_count: r.get("order_count"),
            created_at: r.get("created_at"),
        })
        .collect();
    Ok(Page { items, page, per_page, total })
}

/// Remove expired sessions and stale login codes. Returns rows removed.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?
        .rows_affected();
    let codes = sqlx::query("DELETE FROM email_login_codes WHERE expires_at <= now() - INTERVAL '1 day'")
        .execute(pool)
        .await?
        .rows_affected();
    Ok(sessions + codes)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
