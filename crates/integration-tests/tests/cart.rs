//! Cart and wishlist.

use axum::http::{Method, StatusCode};
use serde_json::json;

use kaaya_integration_tests::{TestContext, money};

#[tokio::test]
async fn test_cart_requires_sign_in() {
    let ctx = TestContext::new();

    let cart = ctx.get("/api/cart").await;
    assert_eq!(cart.status, StatusCode::UNAUTHORIZED);
    assert_eq!(cart.body["success"], false);

    let wishlist = ctx.get("/api/wishlist").await;
    assert_eq!(wishlist.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cart_add_update_remove() {
    let ctx = TestContext::new();
    let token = ctx.customer_token();

    let empty = ctx.get_as("/api/cart", &token).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.data()["item_count"], 0);

    ctx.send(
        Method::POST,
        "/api/cart/items",
        Some(&token),
        Some(json!({ "product_id": 1, "quantity": 1 })),
    )
    .await;
    let merged = ctx
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&token),
            Some(json!({ "product_id": 1 })),
        )
        .await;
    assert_eq!(merged.status, StatusCode::OK);
    assert_eq!(merged.message(), Some("Added to cart"));
    let cart = merged.data();
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["item_count"], 2);
    assert!((money(&cart["subtotal"]) - 598.0).abs() < f64::EPSILON);
    assert!((money(&cart["shipping_fee"]) - 79.0).abs() < f64::EPSILON);
    assert!((money(&cart["total"]) - 677.0).abs() < f64::EPSILON);
    assert_eq!(cart["items"][0]["product"]["name"], "Neem & Tulsi Face Wash");

    let updated = ctx
        .send(
            Method::PUT,
            "/api/cart/items/1",
            Some(&token),
            Some(json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(updated.data()["item_count"], 4);
    // 4 x 299 clears the free-shipping threshold.
    assert!(money(&updated.data()["shipping_fee"]).abs() < f64::EPSILON);

    let zeroed = ctx
        .send(
            Method::PUT,
            "/api/cart/items/1",
            Some(&token),
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(zeroed.status, StatusCode::OK);
    assert_eq!(zeroed.data()["item_count"], 0);

    let missing = ctx
        .send(Method::DELETE, "/api/cart/items/1", Some(&token), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_rejections() {
    let ctx = TestContext::new();
    let token = ctx.customer_token();

    let inactive = ctx
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&token),
            Some(json!({ "product_id": 14 })),
        )
        .await;
    assert_eq!(inactive.status, StatusCode::NOT_FOUND);

    let sold_out = ctx
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&token),
            Some(json!({ "product_id": 7 })),
        )
        .await;
    assert_eq!(sold_out.status, StatusCode::CONFLICT);

    let too_many = ctx
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&token),
            Some(json!({ "product_id": 13, "quantity": 16 })),
        )
        .await;
    assert_eq!(too_many.status, StatusCode::CONFLICT);

    let negative = ctx
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&token),
            Some(json!({ "product_id": 1, "quantity": -1 })),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_carts_are_per_user() {
    let ctx = TestContext::new();
    let customer = ctx.customer_token();
    let admin = ctx.admin_token();

    ctx.send(
        Method::POST,
        "/api/cart/items",
        Some(&customer),
        Some(json!({ "product_id": 4, "quantity": 2 })),
    )
    .await;

    let admin_cart = ctx.get_as("/api/cart", &admin).await;
    assert_eq!(admin_cart.data()["item_count"], 0);

    let cleared = ctx
        .send(Method::DELETE, "/api/cart", Some(&customer), None)
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.message(), Some("Cart cleared"));
    assert_eq!(cleared.data()["item_count"], 0);
}

#[tokio::test]
async fn test_wishlist() {
    let ctx = TestContext::new();
    let token = ctx.customer_token();

    for _ in 0..2 {
        let added = ctx
            .send(
                Method::POST,
                "/api/wishlist",
                Some(&token),
                Some(json!({ "product_id": 3 })),
            )
            .await;
        assert_eq!(added.status, StatusCode::OK);
    }

    let wishlist = ctx.get_as("/api/wishlist", &token).await;
    assert_eq!(wishlist.data().as_array().map(Vec::len), Some(1));
    assert_eq!(wishlist.data()[0]["product"]["name"], "Kumkumadi Face Oil");

    let unknown = ctx
        .send(
            Method::POST,
            "/api/wishlist",
            Some(&token),
            Some(json!({ "product_id": 999 })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let removed = ctx
        .send(Method::DELETE, "/api/wishlist/3", Some(&token), None)
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let again = ctx
        .send(Method::DELETE, "/api/wishlist/3", Some(&token), None)
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}
