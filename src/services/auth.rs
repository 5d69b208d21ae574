//! Google OAuth service — code exchange, profile fetch, user upsert.

use reqwest::Url;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::Config;
use crate::services::session::Role;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google OAuth configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl GoogleConfig {
    /// Load from `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI`.
    /// Returns `None` if any are missing (OAuth login will be disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok()?;
        let redirect_uri = std::env::var("GOOGLE_REDIRECT_URI").ok()?;
        Some(Self { client_id, client_secret, redirect_uri })
    }

    /// Build the authorization URL carrying the CSRF `state`.
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> String {
        Url::parse_with_params(
            AUTHORIZE_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map(String::from)
        .unwrap_or_else(|_| AUTHORIZE_ENDPOINT.to_owned())
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl GoogleProfile {
    /// Verified, lowercased email if Google vouches for it.
    #[must_use]
    pub fn verified_email(&self) -> Option<String> {
        if !self.email_verified {
            return None;
        }
        self.email.as_deref().and_then(crate::services::email_auth::normalize_email)
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| "Shopper".to_owned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("oauth token exchange failed: {0}")]
    TokenExchange(String),
    #[error("oauth profile fetch failed: {0}")]
    ProfileFetch(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TokenExchange(_) => "E_OAUTH_EXCHANGE",
            Self::ProfileFetch(_) => "E_OAUTH_PROFILE",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

/// Exchange an OAuth code for an access token.
pub async fn exchange_code(config: &GoogleConfig, code: &str) -> Result<String, AuthError> {
    let client = reqwest::Client::new();
    let resp = client
        .post(TOKEN_ENDPOINT)
        .header("Accept", "application/json")
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    let body = resp
        .text()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
    let token_resp: TokenResponse =
        serde_json::from_str(&body).map_err(|_| AuthError::TokenExchange(format!("unexpected response: {body}")))?;
    Ok(token_resp.access_token)
}

/// Fetch the authenticated user's OpenID profile.
pub async fn fetch_profile(access_token: &str) -> Result<GoogleProfile, AuthError> {
    let client = reqwest::Client::new();
    let resp = client
        .get(USERINFO_ENDPOINT)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| AuthError::ProfileFetch(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::ProfileFetch(format!("{status}: {body}")));
    }

    resp.json::<GoogleProfile>()
        .await
        .map_err(|e| AuthError::ProfileFetch(e.to_string()))
}

/// Upsert a user from their Google profile. Returns the user's UUID.
///
/// An existing email-only account with the same verified email is linked
/// rather than duplicated.
pub async fn upsert_user(pool: &PgPool, profile: &GoogleProfile, config: &Config) -> Result<Uuid, AuthError> {
    let email = profile.verified_email();
    let role = match &email {
        Some(e) if config.is_admin_email(e) => Role::Admin,
        _ => Role::Customer,
    };

    let mut tx = pool.begin().await?;

    if let Some(email) = &email {
        sqlx::query(
            r"UPDATE users
              SET google_id = $1, avatar_url = COALESCE(avatar_url, $3)
              WHERE email = $2 AND google_id IS NULL",
        )
        .bind(&profile.sub)
        .bind(email)
        .bind(&profile.picture)
        .execute(tx.as_mut())
        .await?;
    }

    let row = sqlx::query(
        r"INSERT INTO users (google_id, email, name, avatar_url, role)
          VALUES ($1, $2, $3, $4, $5)
          ON CONFLICT (google_id) DO UPDATE
          SET avatar_url = EXCLUDED.avatar_url,
              role = CASE WHEN EXCLUDED.role = 'admin' THEN 'admin' ELSE users.role END
          RETURNING id",
    )
    .bind(&profile.sub)
    .bind(&email)
    .bind(profile.display_name())
    .bind(&profile.picture)
    .bind(role.as_str())
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;
    Ok(row.get("id"))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
