use super::*;

fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Asha Rao".into(),
        line1: "12 MG Road".into(),
        line2: None,
        city: "Bengaluru".into(),
        state: "KA".into(),
        postal_code: "560001".into(),
        country: "IN".into(),
        phone: "+91 98450 00000".into(),
    }
}

// =============================================================================
// OrderStatus
// =============================================================================

#[test]
fn status_round_trips_through_str() {
    for status in OrderStatus::ALL {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("refunded"), None);
}

#[test]
fn lifecycle_allows_forward_moves() {
    use OrderStatus::*;
    assert!(Placed.can_transition(Confirmed));
    assert!(Placed.can_transition(Cancelled));
    assert!(Confirmed.can_transition(Shipped));
    assert!(Confirmed.can_transition(Cancelled));
    assert!(Shipped.can_transition(Delivered));
}

#[test]
fn lifecycle_rejects_skips_and_reversals() {
    use OrderStatus::*;
    assert!(!Placed.can_transition(Shipped));
    assert!(!Shipped.can_transition(Cancelled));
    assert!(!Confirmed.can_transition(Placed));
    for to in OrderStatus::ALL {
        assert!(!Delivered.can_transition(to));
        assert!(!Cancelled.can_transition(to));
    }
}

#[test]
fn terminal_states() {
    assert!(OrderStatus::Delivered.is_terminal());
    assert!(OrderStatus::Cancelled.is_terminal());
    assert!(!OrderStatus::Shipped.is_terminal());
}

#[test]
fn status_serializes_lowercase() {
    assert_eq!(serde_json::to_value(OrderStatus::Shipped).unwrap(), "shipped");
}

// =============================================================================
// TRANSITION RULES
// =============================================================================

#[test]
fn customer_may_cancel_before_shipping() {
    let actor = Actor::Customer(Uuid::new_v4());
    assert!(check_cancel(OrderStatus::Placed, actor).is_ok());
    assert!(check_cancel(OrderStatus::Confirmed, actor).is_ok());
    assert!(matches!(
        check_cancel(OrderStatus::Shipped, actor),
        Err(OrderError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Cancelled })
    ));
}

#[test]
fn cancelled_order_cannot_be_cancelled_again() {
    assert!(check_cancel(OrderStatus::Cancelled, Actor::Admin).is_err());
    assert!(check_cancel(OrderStatus::Delivered, Actor::Admin).is_err());
}

#[test]
fn admin_cannot_confirm_without_payment() {
    assert!(check_admin_transition(OrderStatus::Placed, OrderStatus::Confirmed).is_err());
    assert!(check_admin_transition(OrderStatus::Confirmed, OrderStatus::Shipped).is_ok());
    assert!(check_admin_transition(OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
    assert!(check_admin_transition(OrderStatus::Placed, OrderStatus::Shipped).is_err());
}

// =============================================================================
// ShippingAddress
// =============================================================================

#[test]
fn complete_address_validates() {
    assert!(address().validate().is_ok());
}

#[test]
fn blank_required_field_is_named() {
    let mut a = address();
    a.city = "   ".into();
    match a.validate() {
        Err(OrderError::InvalidAddress(msg)) => assert!(msg.contains("city")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn postal_code_length_bounds() {
    let mut a = address();
    a.postal_code = "12".into();
    assert!(a.validate().is_err());
    a.postal_code = "12345678901".into();
    assert!(a.validate().is_err());
    a.postal_code = "123".into();
    assert!(a.validate().is_ok());
}

#[test]
fn address_line2_is_optional_in_json() {
    let json = serde_json::json!({
        "name": "A", "line1": "B", "city": "C", "state": "D",
        "postal_code": "10001", "country": "US", "phone": "1"
    });
    let a: ShippingAddress = serde_json::from_value(json).unwrap();
    assert!(a.line2.is_none());
}

// =============================================================================
// ERRORS
// =============================================================================

#[test]
fn inventory_errors_convert() {
    let shortfall = Shortfall { product_id: Uuid::nil(), size: "M".into(), requested: 2, available: 0 };
    let err: OrderError = InventoryError::InsufficientStock(shortfall).into();
    assert_eq!(err.error_code(), "E_INSUFFICIENT_STOCK");
}

#[test]
fn cart_errors_keep_their_codes() {
    let err: OrderError = CartError::ItemNotFound(Uuid::nil()).into();
    assert_eq!(err.error_code(), "E_CART_ITEM_NOT_FOUND");
}

#[test]
fn transition_error_message_names_states() {
    let err = OrderError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Cancelled };
    assert_eq!(err.to_string(), "cannot move order from shipped to cancelled");
}

#[test]
fn order_item_becomes_stock_line() {
    let item = OrderItem {
        product_id: Uuid::nil(),
        product_name: "Linen Shirt".into(),
        size: "L".into(),
        unit_price: 1500,
        quantity: 3,
        line_total: 4500,
    };
    let line = StockLine::from(&item);
    assert_eq!(line.product_id, Uuid::nil());
    assert_eq!(line.size, "L");
    assert_eq!(line.quantity, 3);
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::catalog::{self, NewProduct, StockMap};

    async fn seed(pool: &PgPool, qty: i32) -> (Uuid, Uuid) {
        let mut stock = StockMap::new();
        stock.insert("M".into(), qty);
        let product = catalog::create_product(
            pool,
            &NewProduct {
                name: format!("Order {}", Uuid::new_v4()),
                slug: None,
                description: String::new(),
                category: "Test".into(),
                price: 1000,
                compare_at_price: None,
                featured: false,
                stock,
            },
        )
        .await
        .unwrap();
        let user_id: Uuid = sqlx::query_scalar("INSERT INTO users (name) VALUES ('buyer') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();
        (product.id, user_id)
    }

    #[tokio::test]
    async fn confirm_takes_stock_and_cancel_restores_it() {
        let state = crate::state::test_helpers::live_app_state().await;
        let pool = &state.pool;
        let (product_id, user_id) = seed(pool, 3).await;
        let owner = CartOwner::User(user_id);
        cart::add_item(pool, &owner, product_id, "M", 2, 10).await.unwrap();

        let order = place_order(pool, user_id, &address(), &Pricing::default()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.subtotal, 2000);
        assert!(!order.stock_committed);

        let confirmed = confirm_payment(pool, &PaymentRef::Order(order.id), "pay_1").await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert!(confirmed.stock_committed);
        assert!(cart::cart_lines(pool, &owner).await.unwrap().is_empty());

        let again = confirm_payment(pool, &PaymentRef::Order(order.id), "pay_1").await.unwrap();
        assert_eq!(again.status, OrderStatus::Confirmed);
        assert!(matches!(
            confirm_payment(pool, &PaymentRef::Order(order.id), "pay_2").await,
            Err(OrderError::PaymentMismatch)
        ));

        let line = [StockLine { product_id, size: "M".into(), quantity: 2 }];
        assert_eq!(inventory::check_availability(pool, &line).await.unwrap().map(|s| s.available), Some(1));

        let cancelled = cancel_order(pool, order.id, Actor::Customer(user_id), REASON_CUSTOMER).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(!cancelled.stock_committed);
        assert!(inventory::check_availability(pool, &line).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn confirm_without_stock_leaves_order_placed() {
        let state = crate::state::test_helpers::live_app_state().await;
        let pool = &state.pool;
        let (product_id, user_id) = seed(pool, 1).await;
        cart::add_item(pool, &CartOwner::User(user_id), product_id, "M", 1, 10).await.unwrap();
        let order = place_order(pool, user_id, &address(), &Pricing::default()).await.unwrap();

        let mut empty = StockMap::new();
        empty.insert("M".into(), 0);
        catalog::set_stock(pool, product_id, &empty).await.unwrap();

        let err = confirm_payment(pool, &PaymentRef::Order(order.id), "pay_x").await.unwrap_err();
        assert!(matches!(err, OrderError::InsufficientStock(_)));
        assert_eq!(get_order(pool, order.id).await.unwrap().status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn other_customers_cannot_see_or_cancel() {
        let state = crate::state::test_helpers::live_app_state().await;
        let pool = &state.pool;
        let (product_id, user_id) = seed(pool, 5).await;
        cart::add_item(pool, &CartOwner::User(user_id), product_id, "M", 1, 10).await.unwrap();
        let order = place_order(pool, user_id, &address(), &Pricing::default()).await.unwrap();

        let stranger = Actor::Customer(Uuid::new_v4());
        assert!(matches!(get_order_for(pool, order.id, stranger).await, Err(OrderError::NotFound(_))));
        assert!(matches!(
            cancel_order(pool, order.id, stranger, REASON_CUSTOMER).await,
            Err(OrderError::NotFound(_))
        ));
    }
}
