//! Checkout, order history, and order status management.

use axum::http::{Method, StatusCode};
use kaaya_core::UserRole;
use serde_json::{Value, json};

use kaaya_integration_tests::{TestContext, address, money};

fn guest_order(items: Value) -> Value {
    json!({
        "customer_name": "Meera Iyer",
        "customer_email": "meera@example.com",
        "customer_phone": "+91 99000 12345",
        "shipping_address": address(),
        "items": items
    })
}

#[tokio::test]
async fn test_guest_checkout_prices_and_reserves_stock() {
    let ctx = TestContext::new();

    let placed = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([
                { "product_id": 1, "quantity": 1 },
                { "product_id": 1, "quantity": 1 }
            ]))),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.message(), Some("Order placed"));

    let order = placed.data();
    assert!(order["order_number"].as_str().is_some_and(|n| n.starts_with("KL-")));
    assert_eq!(order["user_id"], Value::Null);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_method"], "cod");
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(order["items"][0]["quantity"], 2);
    assert!((money(&order["subtotal"]) - 598.0).abs() < f64::EPSILON);
    assert!((money(&order["shipping_fee"]) - 79.0).abs() < f64::EPSILON);
    assert!((money(&order["total"]) - 677.0).abs() < f64::EPSILON);
    assert_eq!(order["shipping_address"]["country"], "India");

    let product = ctx.get("/api/products/1").await;
    assert_eq!(product.data()["stock_quantity"], 118);
}

#[tokio::test]
async fn test_free_shipping_above_threshold() {
    let ctx = TestContext::new();

    let placed = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([{ "product_id": 3, "quantity": 1 }]))),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert!(money(&placed.data()["shipping_fee"]).abs() < f64::EPSILON);
    assert!((money(&placed.data()["total"]) - 1299.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let ctx = TestContext::new();

    let empty = ctx
        .send(Method::POST, "/api/orders", None, Some(guest_order(json!([]))))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let zero = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([{ "product_id": 1, "quantity": 0 }]))),
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let out_of_stock = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([{ "product_id": 7, "quantity": 1 }]))),
        )
        .await;
    assert_eq!(out_of_stock.status, StatusCode::CONFLICT);

    let discontinued = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([{ "product_id": 14, "quantity": 1 }]))),
        )
        .await;
    assert_eq!(discontinued.status, StatusCode::BAD_REQUEST);

    let anonymous = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(json!({
                "shipping_address": address(),
                "items": [{ "product_id": 1, "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::BAD_REQUEST);

    let mut no_city = guest_order(json!([{ "product_id": 1, "quantity": 1 }]));
    no_city["shipping_address"]["city"] = json!("  ");
    let blank_city = ctx
        .send(Method::POST, "/api/orders", None, Some(no_city))
        .await;
    assert_eq!(blank_city.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank_city.message(), Some("shipping_address.city is required"));

    // Nothing was reserved by the failed attempts.
    let product = ctx.get("/api/products/1").await;
    assert_eq!(product.data()["stock_quantity"], 120);
}

#[tokio::test]
async fn test_signed_in_order_uses_token_identity_and_clears_cart() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token();

    let added = ctx
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&customer),
            Some(json!({ "product_id": 2, "quantity": 1 })),
        )
        .await;
    assert_eq!(added.status, StatusCode::OK);

    let placed = ctx
        .send(
            Method::POST,
            "/api/orders",
            Some(&customer),
            Some(json!({
                "shipping_address": address(),
                "items": [{ "product_id": 2, "quantity": 1 }],
                "payment_method": "upi"
            })),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.data()["user_id"], 2);
    assert_eq!(placed.data()["customer_name"], "Priya Raman");
    assert_eq!(placed.data()["customer_email"], "priya@example.com");
    assert_eq!(placed.data()["payment_method"], "upi");

    let cart = ctx.get_as("/api/cart", &customer).await;
    assert_eq!(cart.data()["item_count"], 0);
}

#[tokio::test]
async fn test_order_history_is_scoped_to_the_caller() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token();
    let admin = ctx.admin_token();

    let unauthenticated = ctx.get("/api/orders").await;
    assert_eq!(unauthenticated.status, StatusCode::UNAUTHORIZED);

    let guest = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([{ "product_id": 11, "quantity": 2 }]))),
        )
        .await;
    let guest_id = guest.data()["id"].as_i64().unwrap_or_default();

    let mine = ctx
        .send(
            Method::POST,
            "/api/orders",
            Some(&customer),
            Some(json!({
                "shipping_address": address(),
                "items": [{ "product_id": 12, "quantity": 1 }]
            })),
        )
        .await;
    let mine_id = mine.data()["id"].as_i64().unwrap_or_default();

    let own = ctx.get_as("/api/orders", &customer).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["pagination"]["total"], 1);
    assert_eq!(own.data()[0]["id"], mine_id);

    let all = ctx.get_as("/api/orders", &admin).await;
    assert_eq!(all.body["pagination"]["total"], 2);

    let pending = ctx.get_as("/api/orders?status=pending", &admin).await;
    assert_eq!(pending.body["pagination"]["total"], 2);
    let bad_status = ctx.get_as("/api/orders?status=lost", &admin).await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);

    let others = ctx
        .get_as(&format!("/api/orders/{guest_id}"), &customer)
        .await;
    assert_eq!(others.status, StatusCode::FORBIDDEN);

    let stranger = ctx.token(&TestContext::claims(
        3,
        "ravi@example.com",
        "Ravi",
        UserRole::Customer,
    ));
    let not_theirs = ctx
        .get_as(&format!("/api/orders/{mine_id}"), &stranger)
        .await;
    assert_eq!(not_theirs.status, StatusCode::FORBIDDEN);

    let as_admin = ctx.get_as(&format!("/api/orders/{guest_id}"), &admin).await;
    assert_eq!(as_admin.status, StatusCode::OK);

    let missing = ctx.get_as("/api/orders/9999", &admin).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_updates_and_cancellation_restock() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token();
    let customer = ctx.customer_token();

    let placed = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([{ "product_id": 5, "quantity": 3 }]))),
        )
        .await;
    let id = placed.data()["id"].as_i64().unwrap_or_default();
    let stock_after_order = ctx.get("/api/products/5").await.data()["stock_quantity"]
        .as_i64()
        .unwrap_or_default();
    let status_uri = format!("/api/orders/{id}/status");

    let forbidden = ctx
        .send(
            Method::PATCH,
            &status_uri,
            Some(&customer),
            Some(json!({ "status": "shipped" })),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let shipped = ctx
        .send(
            Method::PATCH,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "shipped", "payment_status": "paid" })),
        )
        .await;
    assert_eq!(shipped.status, StatusCode::OK);
    assert_eq!(shipped.data()["status"], "shipped");
    assert_eq!(shipped.data()["payment_status"], "paid");

    let cancelled = ctx
        .send(
            Method::PATCH,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(cancelled.data()["status"], "cancelled");
    let restocked = ctx.get("/api/products/5").await;
    assert_eq!(restocked.data()["stock_quantity"], stock_after_order + 3);

    let unknown = ctx
        .send(
            Method::PATCH,
            "/api/orders/9999/status",
            Some(&admin),
            Some(json!({ "status": "confirmed" })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let invalid = ctx
        .send(
            Method::PATCH,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_maintenance_mode_blocks_checkout() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token();

    let toggled = ctx
        .send(
            Method::PUT,
            "/api/settings",
            Some(&admin),
            Some(json!({ "maintenance_mode": true })),
        )
        .await;
    assert_eq!(toggled.status, StatusCode::OK);

    let blocked = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(guest_order(json!([{ "product_id": 1, "quantity": 1 }]))),
        )
        .await;
    assert_eq!(blocked.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(blocked.body["success"], false);
}

/// A token subject with no local account can still check out and see the order.
async fn assert_account_less_checkout(ctx: &TestContext) {
    let newcomer = ctx.token(&TestContext::claims(
        4242,
        "anaya@example.com",
        "Anaya Kapoor",
        UserRole::Customer,
    ));

    let added = ctx
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&newcomer),
            Some(json!({ "product_id": 4, "quantity": 1 })),
        )
        .await;
    assert_eq!(added.status, StatusCode::OK);

    let placed = ctx
        .send(
            Method::POST,
            "/api/orders",
            Some(&newcomer),
            Some(json!({
                "shipping_address": address(),
                "items": [{ "product_id": 4, "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.data()["user_id"], 4242);
    assert_eq!(placed.data()["customer_email"], "anaya@example.com");

    let own = ctx.get_as("/api/orders", &newcomer).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.data()[0]["id"], placed.data()["id"]);
}

#[tokio::test]
async fn test_order_for_token_without_local_account() {
    assert_account_less_checkout(&TestContext::new()).await;
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database at DATABASE_URL"]
async fn test_order_for_token_without_local_account_on_postgres() {
    assert_account_less_checkout(&TestContext::with_database().await).await;
}
