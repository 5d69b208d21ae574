//! Email access-code auth service.
//!
//! Creates and verifies short-lived six-character codes linked to an email.
//! Only the SHA-256 of a code is stored; a code is burnt after too many
//! failed attempts.

use rand::Rng;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::{Config, MailConfig};
use crate::services::session::Role;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;
const LOGIN_CODE_TEMPLATE: &str = include_str!("../../templates/login_code.html");

#[derive(Debug, thiserror::Error)]
pub enum EmailAuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("email delivery failed: {0}")]
    EmailDelivery(String),
}

impl crate::error::ErrorCode for EmailAuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::InvalidCode => "E_INVALID_CODE",
            Self::VerificationFailed => "E_VERIFICATION_FAILED",
            Self::Db(_) => "E_DATABASE",
            Self::EmailDelivery(_) => "E_EMAIL_DELIVERY",
        }
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != CODE_LEN || !normalized.bytes().all(|c| CODE_ALPHABET.contains(&c)) {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[must_use]
pub fn hash_access_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("shopper")
        .to_owned()
}

/// Issue a fresh code for `email`, creating the user on first contact.
/// Any previous unconsumed code for the email is discarded.
pub async fn request_access_code(pool: &PgPool, email: &str, config: &Config) -> Result<String, EmailAuthError> {
    let email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let role = if config.is_admin_email(&email) { Role::Admin } else { Role::Customer };
    let code = generate_access_code();

    let mut tx = pool.begin().await?;
    sqlx::query(
        r"INSERT INTO users (email, name, role)
          VALUES ($1, $2, $3)
          ON CONFLICT (email) DO UPDATE
          SET role = CASE WHEN EXCLUDED.role = 'admin' THEN 'admin' ELSE users.role END",
    )
    .bind(&email)
    .bind(name_from_email(&email))
    .bind(role.as_str())
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE email_login_codes SET consumed_at = now() WHERE email = $1 AND consumed_at IS NULL")
        .bind(&email)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO email_login_codes (email, code_hash) VALUES ($1, $2)")
        .bind(&email)
        .bind(hash_access_code(&code))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(code)
}

/// Consume the live code for `email`. Returns the user id on success.
///
/// A wrong guess counts against the code; the code is burnt once
/// `MAX_FAILED_ATTEMPTS` is reached.
pub async fn verify_access_code(pool: &PgPool, email: &str, code: &str) -> Result<Uuid, EmailAuthError> {
    let email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let code = normalize_code(code).ok_or(EmailAuthError::InvalidCode)?;

    let mut tx = pool.begin().await?;
    let live = sqlx::query(
        r"SELECT id, code_hash, attempts
          FROM email_login_codes
          WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
          ORDER BY created_at DESC
          LIMIT 1
          FOR UPDATE",
    )
    .bind(&email)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(live) = live else {
        return Err(EmailAuthError::VerificationFailed);
    };
    let code_id: Uuid = live.get("id");

    if live.get::<String, _>("code_hash") != hash_access_code(&code) {
        let attempts = live.get::<i32, _>("attempts") + 1;
        sqlx::query(
            r"UPDATE email_login_codes
              SET attempts = $2,
                  consumed_at = CASE WHEN $2 >= $3 THEN now() ELSE NULL END
              WHERE id = $1",
        )
        .bind(code_id)
        .bind(attempts)
        .bind(MAX_FAILED_ATTEMPTS)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        return Err(EmailAuthError::VerificationFailed);
    }

    sqlx::query("UPDATE email_login_codes SET consumed_at = now() WHERE id = $1")
        .bind(code_id)
        .execute(&mut *tx)
        .await?;
    let user_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&mut *tx)
        .await?;
    tx.commit().await?;

    user_id.ok_or(EmailAuthError::VerificationFailed)
}

/// Mail `code` to `to_email` through Resend.
pub async fn send_access_code_email(mail: &MailConfig, to_email: &str, code: &str) -> Result<(), EmailAuthError> {
    let html = render_login_code_template(to_email, code);
    let message = CreateEmailBaseOptions::new(&mail.from, [to_email], format!("Your sign-in code: {code}")).with_html(&html);

    Resend::new(&mail.resend_api_key)
        .emails
        .send(message)
        .await
        .map(|_| ())
        .map_err(|e| EmailAuthError::EmailDelivery(e.to_string()))
}

#[must_use]
pub fn render_login_code_template(email: &str, code: &str) -> String {
    LOGIN_CODE_TEMPLATE
        .replace("{{EMAIL}}", email)
        .replace("{{CODE}}", code)
}

#[cfg(test)]
#[path = "email_auth_test.rs"]
mod tests;
