use super::*;
use crate::routes::test_helpers::{body_json, get, json_request, send};
use crate::state::test_helpers::test_app_state;
use axum_extra::extract::cookie::Cookie;

fn anon() -> MaybeUser {
    MaybeUser(None)
}

// =============================================================================
// owner resolution
// =============================================================================

#[tokio::test]
async fn valid_cart_cookie_resolves_session_owner() {
    let key = session::generate_cart_key();
    let jar = CookieJar::new().add(Cookie::new(CART_COOKIE, key.clone()));
    assert_eq!(existing_owner(&anon(), &jar), Some(CartOwner::Session(key)));
}

#[tokio::test]
async fn malformed_cart_cookie_is_ignored() {
    let jar = CookieJar::new().add(Cookie::new(CART_COOKIE, "../../etc"));
    assert_eq!(existing_owner(&anon(), &jar), None);
}

#[tokio::test]
async fn first_add_issues_cart_cookie() {
    let state = test_app_state();
    let (owner, jar) = owner_or_issue(&state, &anon(), CookieJar::new());
    let CartOwner::Session(key) = owner else {
        panic!("expected a session owner");
    };
    assert!(session::is_valid_cart_key(&key));
    let cookie = jar.get(CART_COOKIE).expect("cart cookie set");
    assert_eq!(cookie.value(), key);
    assert_eq!(cookie.http_only(), Some(true));
}

#[tokio::test]
async fn existing_cookie_is_reused() {
    let state = test_app_state();
    let key = session::generate_cart_key();
    let jar = CookieJar::new().add(Cookie::new(CART_COOKIE, key.clone()));
    let (owner, _) = owner_or_issue(&state, &anon(), jar);
    assert_eq!(owner, CartOwner::Session(key));
}

// =============================================================================
// HTTP, no database
// =============================================================================

#[tokio::test]
async fn anonymous_get_returns_empty_cart() {
    let resp = send(test_app_state(), get("/api/cart")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("set-cookie").is_none());
    let body = body_json(resp).await;
    assert_eq!(body["items"], serde_json::json!([]));
    assert_eq!(body["subtotal"], 0);
    assert_eq!(body["shipping_fee"], 0);
    assert_eq!(body["currency"], "INR");
}

#[tokio::test]
async fn anonymous_clear_is_no_content() {
    let req = axum::http::Request::builder()
        .method("DELETE")
        .uri("/api/cart")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = send(test_app_state(), req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn anonymous_update_without_cart_is_not_found() {
    let uri = format!("/api/cart/items/{}", Uuid::new_v4());
    let resp = send(test_app_state(), json_request("PATCH", &uri, &serde_json::json!({ "quantity": 2 }))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "E_CART_ITEM_NOT_FOUND");
}

#[tokio::test]
async fn add_item_rejects_malformed_body() {
    let resp = send(
        test_app_state(),
        json_request("POST", "/api/cart/items", &serde_json::json!({ "size": "M" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn anonymous_add_then_get_round_trip_live() {
    use crate::services::catalog::{self, NewProduct, StockMap};

    let state = crate::state::test_helpers::live_app_state().await;
    let mut stock = StockMap::new();
    stock.insert("L".into(), 4);
    let product = catalog::create_product(
        &state.pool,
        &NewProduct {
            name: format!("Route cart {}", Uuid::new_v4()),
            slug: None,
            description: String::new(),
            category: "Test".into(),
            price: 1500,
            compare_at_price: None,
            featured: false,
            stock,
        },
    )
    .await
    .unwrap();

    let resp = send(
        state.clone(),
        json_request("POST", "/api/cart/items", &serde_json::json!({ "product_id": product.id, "size": "l" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap().to_owned();
    let pair = set_cookie.split(';').next().unwrap().to_owned();
    let body = body_json(resp).await;
    assert_eq!(body["items"][0]["size"], "L");
    assert_eq!(body["subtotal"], 1500);

    let req = axum::http::Request::builder()
        .uri("/api/cart")
        .header("cookie", pair)
        .body(axum::body::Body::empty())
        .unwrap();
    let body = body_json(send(state, req).await).await;
    assert_eq!(body["items"][0]["quantity"], 1);
}
