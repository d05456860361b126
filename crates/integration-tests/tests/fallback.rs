//! Serving the bundled catalog when the database is down.

use axum::http::{Method, StatusCode};
use serde_json::json;

use kaaya_integration_tests::TestContext;

#[tokio::test]
async fn test_catalog_reads_fall_back_to_bundled_data() {
    let ctx = TestContext::with_unreachable_database(true);

    let categories = ctx.get("/api/categories").await;
    assert_eq!(categories.status, StatusCode::OK);
    assert_eq!(categories.data().as_array().map(Vec::len), Some(12));

    let category = ctx.get("/api/categories/serums-face-oils").await;
    assert_eq!(category.status, StatusCode::OK);
    assert_eq!(category.data()["id"], 6);

    let menu = ctx.get("/api/menu").await;
    assert_eq!(menu.status, StatusCode::OK);

    let products = ctx.get("/api/products").await;
    assert_eq!(products.status, StatusCode::OK);
    assert_eq!(products.body["pagination"]["total"], 13);

    let product = ctx.get("/api/products/1").await;
    assert_eq!(product.status, StatusCode::OK);
    assert_eq!(product.data()["id"], 1);

    let inactive = ctx.get("/api/products/14").await;
    assert_eq!(inactive.status, StatusCode::NOT_FOUND);

    let settings = ctx.get("/api/settings").await;
    assert_eq!(settings.status, StatusCode::OK);
    assert_eq!(settings.data()["store_name"], "KaayaLife");
}

#[tokio::test]
async fn test_writes_never_fall_back() {
    let ctx = TestContext::with_unreachable_database(true);
    let admin = ctx.admin_token();

    let category = ctx
        .send(
            Method::POST,
            "/api/categories",
            Some(&admin),
            Some(json!({ "name": "Travel Kits" })),
        )
        .await;
    assert_eq!(category.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(category.body["success"], false);
    assert_eq!(category.message(), Some("Internal server error"));

    let order = ctx
        .send(
            Method::POST,
            "/api/orders",
            None,
            Some(json!({
                "customer_name": "Meera Iyer",
                "customer_email": "meera@example.com",
                "shipping_address": kaaya_integration_tests::address(),
                "items": [{ "product_id": 1, "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(order.status, StatusCode::INTERNAL_SERVER_ERROR);

    let settings = ctx
        .send(
            Method::PUT,
            "/api/settings",
            Some(&admin),
            Some(json!({ "maintenance_mode": true })),
        )
        .await;
    assert_eq!(settings.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_reads_fail_without_fallback() {
    let ctx = TestContext::with_unreachable_database(false);

    for uri in ["/api/categories", "/api/products", "/api/products/1", "/api/settings"] {
        let response = ctx.get(uri).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR, "uri: {uri}");
        assert_eq!(response.message(), Some("Internal server error"));
    }

    let ready = ctx.get("/health/ready").await;
    assert_eq!(ready.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready.data()["store"], "unavailable");
}
