use super::*;
use crate::routes::test_helpers::{body_json, get, json_request, send};
use crate::state::test_helpers::test_app_state;

fn with_google() -> AppState {
    test_app_state().with_google(Some(auth_svc::GoogleConfig {
        client_id: "client-123".into(),
        client_secret: "secret".into(),
        redirect_uri: "http://localhost:3000/auth/google/callback".into(),
    }))
}

// =============================================================================
// cookies
// =============================================================================

#[test]
fn build_cookie_sets_session_attributes() {
    let cookie = build_cookie(SESSION_COOKIE, "tok".into(), true, Duration::days(30));
    assert_eq!(cookie.name(), "session_token");
    assert_eq!(cookie.value(), "tok");
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.max_age(), Some(Duration::days(30)));
}

#[test]
fn clear_cookie_expires_immediately() {
    let cookie = clear_cookie(CART_COOKIE, false);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    assert_eq!(cookie.secure(), Some(false));
}

// =============================================================================
// extractors
// =============================================================================

#[tokio::test]
async fn me_without_cookie_is_unauthorized() {
    let resp = send(test_app_state(), get("/api/auth/me")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "E_UNAUTHORIZED");
}

#[tokio::test]
async fn logout_without_cookie_is_unauthorized() {
    let resp = send(test_app_state(), json_request("POST", "/api/auth/logout", &serde_json::json!({}))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// google oauth
// =============================================================================

#[tokio::test]
async fn google_redirect_unavailable_without_config() {
    let resp = send(test_app_state(), get("/auth/google")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["error"], "E_UNAVAILABLE");
}

#[tokio::test]
async fn google_redirect_sets_state_cookie() {
    let resp = send(with_google(), get("/auth/google")).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = resp.headers().get("location").unwrap().to_str().unwrap().to_owned();
    assert!(location.starts_with("https://accounts.google.com/"));
    assert!(location.contains("client_id=client-123"));

    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("oauth_state="));
    let state_value = set_cookie.trim_start_matches("oauth_state=").split(';').next().unwrap();
    assert!(location.contains(&format!("state={state_value}")));
}

#[tokio::test]
async fn google_callback_rejects_missing_state() {
    let resp = send(with_google(), get("/auth/google/callback?code=abc")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn google_callback_rejects_mismatched_state() {
    let req = axum::http::Request::builder()
        .uri("/auth/google/callback?code=abc&state=forged")
        .header("cookie", "oauth_state=expected")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = send(with_google(), req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "E_OAUTH_STATE");
}

// =============================================================================
// email codes
// =============================================================================

#[tokio::test]
async fn request_code_rejects_invalid_email_before_rate_limit() {
    let state = test_app_state();
    for _ in 0..20 {
        let resp = send(
            state.clone(),
            json_request("POST", "/api/auth/email/request-code", &serde_json::json!({ "email": "nope" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "E_INVALID_EMAIL");
    }
}

#[tokio::test]
async fn request_code_is_rate_limited_per_email() {
    let state = test_app_state();
    let limit = state.login_limiter.config().per_key_limit;
    let window = state.login_limiter.config().per_key_window.as_secs();
    for _ in 0..limit {
        state.login_limiter.check_and_record("limited@example.com").unwrap();
    }
    let resp = send(
        state,
        json_request("POST", "/api/auth/email/request-code", &serde_json::json!({ "email": "Limited@Example.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        resp.headers().get("retry-after").and_then(|v| v.to_str().ok()),
        Some(window.to_string().as_str())
    );
    assert_eq!(body_json(resp).await["error"], "E_RATE_LIMITED");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn email_login_sets_session_and_me_works_live() {
    let state = crate::state::test_helpers::live_app_state().await;
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    let code = email_auth::request_access_code(&state.pool, &email, &state.config).await.unwrap();

    let resp = send(
        state.clone(),
        json_request(
            "POST",
            "/api/auth/email/verify-code",
            &serde_json::json!({ "email": email, "code": code }),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap().to_owned();
    let pair = set_cookie.split(';').next().unwrap().to_owned();
    assert!(pair.starts_with("session_token="));

    let req = axum::http::Request::builder()
        .uri("/api/auth/me")
        .header("cookie", pair)
        .body(axum::body::Body::empty())
        .unwrap();
    let body = body_json(send(state, req).await).await;
    assert_eq!(body["email"], email);
    assert_eq!(body["role"], "customer");
}
