//! Auth routes — Google OAuth, email access codes, session management.
//!
//! Every successful login (either flow) goes through `complete_login`, which
//! creates the session, folds the anonymous `cart_session` cart into the
//! user's cart, and clears the cart cookie.

use axum::extract::{FromRef, FromRequestParts, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::{auth as auth_svc, cart, email_auth, session};
use crate::state::AppState;

pub(crate) const SESSION_COOKIE: &str = "session_token";
pub(crate) const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub(crate) const CART_COOKIE: &str = "cart_session";

const SESSION_MAX_AGE: Duration = Duration::days(30);

pub(crate) fn build_cookie(name: &'static str, value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

pub(crate) fn clear_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    build_cookie(name, String::new(), secure, Duration::ZERO)
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

async fn session_from_parts(parts: &Parts, app_state: &AppState) -> Result<Option<AuthUser>, ApiError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar.get(SESSION_COOKIE).map(Cookie::value).unwrap_or_default();
    if token.is_empty() {
        return Ok(None);
    }
    let user = session::validate_session(&app_state.pool, token).await?;
    Ok(user.map(|user| AuthUser { user, token: token.to_owned() }))
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        session_from_parts(parts, &app_state)
            .await?
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Session user if one is signed in. Never rejects for a missing or stale
/// cookie; used by the cart routes, which also serve anonymous shoppers.
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(Self(session_from_parts(parts, &app_state).await?))
    }
}

/// Signed-in user with the admin role. 401 when signed out, 403 otherwise.
pub struct AdminUser(pub session::SessionUser);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.user.is_admin() {
            return Err(ApiError::forbidden());
        }
        Ok(Self(auth.user))
    }
}

// =============================================================================
// LOGIN COMPLETION
// =============================================================================

/// Create a session for `user_id`, merge any anonymous cart, and return the
/// jar with the session cookie set and the cart cookie cleared.
async fn complete_login(state: &AppState, jar: CookieJar, user_id: Uuid) -> Result<(CookieJar, String), ApiError> {
    let token = session::create_session(&state.pool, user_id).await?;
    let secure = state.config.cookie_secure;

    let mut jar = jar.add(build_cookie(SESSION_COOKIE, token.clone(), secure, SESSION_MAX_AGE));
    if let Some(key) = jar.get(CART_COOKIE).map(|c| c.value().to_owned()) {
        if session::is_valid_cart_key(&key) {
            match cart::merge_session_cart(&state.pool, &key, user_id, state.config.max_line_quantity).await {
                Ok(merged) if merged > 0 => tracing::info!(user_id = %user_id, merged, "merged session cart"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, user_id = %user_id, "session cart merge failed"),
            }
        }
        jar = jar.add(clear_cookie(CART_COOKIE, secure));
    }
    Ok((jar, token))
}

// =============================================================================
// GOOGLE OAUTH
// =============================================================================

/// `GET /auth/google` — redirect to the Google consent screen.
pub async fn google_redirect(State(state): State<AppState>, jar: CookieJar) -> Result<Response, ApiError> {
    let config = state.google.as_ref().ok_or_else(|| ApiError::unavailable("Google sign-in"))?;

    let oauth_state = session::generate_token();
    let cookie = build_cookie(OAUTH_STATE_COOKIE, oauth_state.clone(), state.config.cookie_secure, Duration::minutes(10));
    Ok((jar.add(cookie), Redirect::temporary(&config.authorize_url(&oauth_state))).into_response())
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: Option<String>,
}

/// `GET /auth/google/callback` — exchange code, upsert user, set cookie, redirect to `/`.
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let config = state.google.as_ref().ok_or_else(|| ApiError::unavailable("Google sign-in"))?;

    // Verify OAuth CSRF state from cookie.
    let callback_state = params.state.as_deref().ok_or_else(|| ApiError::bad_request("missing oauth state"))?;
    let expected_state = jar.get(OAUTH_STATE_COOKIE).map(Cookie::value).unwrap_or_default();
    if expected_state.is_empty() || expected_state != callback_state {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "E_OAUTH_STATE", "invalid oauth state"));
    }

    let access_token = auth_svc::exchange_code(config, &params.code).await?;
    let profile = auth_svc::fetch_profile(&access_token).await?;
    let user_id = auth_svc::upsert_user(&state.pool, &profile, &state.config).await?;

    let jar = jar.add(clear_cookie(OAUTH_STATE_COOKIE, state.config.cookie_secure));
    let (jar, _) = complete_login(&state, jar, user_id).await?;
    tracing::info!(user_id = %user_id, "google login");
    Ok((jar, Redirect::temporary("/")).into_response())
}

// =============================================================================
// EMAIL CODES
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    email: String,
}

/// `POST /api/auth/email/request-code` — issue and mail a one-time code.
pub async fn request_email_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let email = email_auth::normalize_email(&body.email).ok_or(email_auth::EmailAuthError::InvalidEmail)?;
    state.login_limiter.check_and_record(&email)?;

    let code = email_auth::request_access_code(&state.pool, &email, &state.config).await?;
    match &state.mail {
        Some(mail) => email_auth::send_access_code_email(mail, &email, &code).await?,
        None => {
            tracing::warn!(email = %email, "mail not configured; login code not delivered");
            tracing::debug!(email = %email, code = %code, "undelivered login code");
        }
    }

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "ok": true }))))
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    email: String,
    code: String,
}

/// `POST /api/auth/email/verify-code` — consume a code and start a session.
pub async fn verify_email_code(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyCodeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = email_auth::verify_access_code(&state.pool, &body.email, &body.code).await?;
    let (jar, token) = complete_login(&state, jar, user_id).await?;
    let user = session::validate_session(&state.pool, &token)
        .await?
        .ok_or_else(ApiError::unauthorized)?;
    tracing::info!(user_id = %user_id, "email login");
    Ok((jar, Json(user)))
}

// =============================================================================
// SESSION
// =============================================================================

/// `GET /api/auth/me` — return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed");
    }
    let jar = jar.add(clear_cookie(SESSION_COOKIE, state.config.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
