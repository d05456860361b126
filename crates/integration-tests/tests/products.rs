//! Product listing, detail, admin CRUD, and bulk actions.

use axum::http::{Method, StatusCode};
use serde_json::json;

use kaaya_integration_tests::{TestContext, TestResponse, money};

#[tokio::test]
async fn test_listing_is_paginated() {
    let ctx = TestContext::new();

    let first = ctx.get("/api/products").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.data().as_array().map(Vec::len), Some(12));
    let pagination = &first.body["pagination"];
    assert_eq!(pagination["page"], 1);
    assert_eq!(pagination["limit"], 12);
    assert_eq!(pagination["total"], 13);
    assert_eq!(pagination["totalPages"], 2);
    assert_eq!(pagination["hasNext"], true);
    assert_eq!(pagination["hasPrev"], false);

    let second = ctx.get("/api/products?page=2").await;
    assert_eq!(second.data().as_array().map(Vec::len), Some(1));
    assert_eq!(second.body["pagination"]["hasNext"], false);
    assert_eq!(second.body["pagination"]["hasPrev"], true);

    // Oversized limits are clamped, not rejected.
    let clamped = ctx.get("/api/products?limit=500").await;
    assert_eq!(clamped.body["pagination"]["limit"], 100);
}

#[tokio::test]
async fn test_category_filter_includes_subcategories() {
    let ctx = TestContext::new();

    let skin = ctx.get("/api/products?category=skin-care").await;
    assert_eq!(skin.body["pagination"]["total"], 5);

    let oils = ctx.get("/api/products?category=8").await;
    assert_eq!(oils.body["pagination"]["total"], 2);

    let unknown = ctx.get("/api/products?category=no-such-category").await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(unknown.body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_search_price_and_sort() {
    let ctx = TestContext::new();

    let found = ctx.get("/api/products?search=KUMKUMADI").await;
    assert_eq!(found.body["pagination"]["total"], 1);
    assert_eq!(found.data()[0]["id"], 3);

    let featured = ctx.get("/api/products?featured=true").await;
    assert_eq!(featured.body["pagination"]["total"], 4);

    let cheap_first = ctx
        .get("/api/products?sort=price_asc&min_price=300&max_price=700")
        .await;
    assert_eq!(cheap_first.status, StatusCode::OK);
    let prices: Vec<f64> = cheap_first
        .data()
        .as_array()
        .map(|items| items.iter().map(|p| money(&p["price"])).collect())
        .unwrap_or_default();
    assert!(!prices.is_empty());
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));
    assert!(prices.iter().all(|p| (300.0..=700.0).contains(p)));
}

#[tokio::test]
async fn test_invalid_listing_parameters() {
    let ctx = TestContext::new();

    let bad_sort = ctx.get("/api/products?sort=cheapest").await;
    assert_eq!(bad_sort.status, StatusCode::BAD_REQUEST);

    let inverted = ctx.get("/api/products?min_price=500&max_price=100").await;
    assert_eq!(inverted.status, StatusCode::BAD_REQUEST);

    let not_a_number = ctx.get("/api/products?page=first").await;
    assert_eq!(not_a_number.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_a_number.body["success"], false);
}

#[tokio::test]
async fn test_product_detail_by_id_and_slug() {
    let ctx = TestContext::new();

    let by_id = ctx.get("/api/products/1").await;
    assert_eq!(by_id.status, StatusCode::OK);
    assert_eq!(by_id.data()["name"], "Neem & Tulsi Face Wash");
    assert_eq!(by_id.data()["stock_quantity"], 120);

    let slug = by_id.data()["slug"].as_str().unwrap_or_default().to_owned();
    let by_slug = ctx.get(&format!("/api/products/{slug}")).await;
    assert_eq!(by_slug.data()["id"], 1);

    // Inactive products are hidden from shoppers but not from admins.
    let hidden = ctx.get("/api/products/14").await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
    let admin = ctx.admin_token();
    let visible = ctx.get_as("/api/products/14", &admin).await;
    assert_eq!(visible.status, StatusCode::OK);
    assert_eq!(visible.data()["is_active"], false);
}

#[tokio::test]
async fn test_admin_product_lifecycle() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token();

    let created = ctx
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({
                "name": "Brahmi Hair Tonic",
                "price": "549.999",
                "stock_quantity": 30,
                "category_id": 8
            })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert!((money(&created.data()["price"]) - 550.0).abs() < f64::EPSILON);
    assert_eq!(created.data()["is_active"], true);
    let id = created.data()["id"].as_i64().unwrap_or_default();

    let oils = ctx.get("/api/products?category=hair-oils").await;
    assert_eq!(oils.body["pagination"]["total"], 3);

    let updated = ctx
        .send(
            Method::PUT,
            &format!("/api/products/{id}"),
            Some(&admin),
            Some(json!({ "is_featured": true, "stock_quantity": 25 })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.data()["is_featured"], true);
    assert_eq!(updated.data()["stock_quantity"], 25);

    let deleted = ctx
        .send(Method::DELETE, &format!("/api/products/{id}"), Some(&admin), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.message(), Some("Product deactivated"));

    let hidden = ctx.get(&format!("/api/products/{id}")).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_validation() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token();

    let negative = ctx
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Freebie", "price": "-1" })),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let too_expensive = ctx
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Gold Leaf Cream", "price": "10000000000" })),
        )
        .await;
    assert_eq!(too_expensive.status, StatusCode::BAD_REQUEST);

    let too_expensive_update = ctx
        .send(
            Method::PUT,
            "/api/products/1",
            Some(&admin),
            Some(json!({ "compare_at_price": "99999999999.50" })),
        )
        .await;
    assert_eq!(too_expensive_update.status, StatusCode::BAD_REQUEST);

    let unknown_category = ctx
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Lost Soap", "price": "99", "category_id": 999 })),
        )
        .await;
    assert_eq!(unknown_category.status, StatusCode::BAD_REQUEST);

    let customer = ctx.customer_token();
    let forbidden = ctx
        .send(
            Method::POST,
            "/api/products",
            Some(&customer),
            Some(json!({ "name": "Sneaky", "price": "1" })),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bulk_actions() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token();

    let featured = ctx
        .send(
            Method::POST,
            "/api/admin/products/bulk",
            Some(&admin),
            Some(json!({ "action": "feature", "ids": [2, 999] })),
        )
        .await;
    assert_eq!(featured.status, StatusCode::OK);
    assert_eq!(featured.data()["processed"], 1);
    assert_eq!(featured.data()["skipped"], json!([999]));

    let listing = ctx.get("/api/products?featured=true").await;
    assert_eq!(listing.body["pagination"]["total"], 5);

    let moved = ctx
        .send(
            Method::POST,
            "/api/admin/products/bulk",
            Some(&admin),
            Some(json!({ "action": "set_category", "ids": [9, 10], "category_id": 12 })),
        )
        .await;
    assert_eq!(moved.data()["processed"], 2);
    let gifts = ctx.get("/api/products?category=12").await;
    assert_eq!(gifts.body["pagination"]["total"], 3);

    let empty = ctx
        .send(
            Method::POST,
            "/api/admin/products/bulk",
            Some(&admin),
            Some(json!({ "action": "delete", "ids": [] })),
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let customer = ctx.customer_token();
    let forbidden = ctx
        .send(
            Method::POST,
            "/api/admin/products/bulk",
            Some(&customer),
            Some(json!({ "action": "activate", "ids": [14] })),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

fn listed_product_count(categories: &TestResponse, id: i64) -> Option<i64> {
    categories
        .data()
        .as_array()?
        .iter()
        .find(|c| c["id"] == id)
        .and_then(|c| c["product_count"].as_i64())
}

#[tokio::test]
async fn test_product_writes_refresh_category_counts() {
    let ctx = TestContext::new();
    let admin = ctx.admin_token();

    let before = ctx.get("/api/categories").await;
    assert_eq!(listed_product_count(&before, 8), Some(2));

    let created = ctx
        .send(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Bhringraj Oil", "price": "399", "category_id": 8 })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let after_create = ctx.get("/api/categories").await;
    assert_eq!(listed_product_count(&after_create, 8), Some(3));

    let moved = ctx
        .send(
            Method::POST,
            "/api/admin/products/bulk",
            Some(&admin),
            Some(json!({ "action": "set_category", "ids": [6, 7], "category_id": 9 })),
        )
        .await;
    assert_eq!(moved.status, StatusCode::OK);
    let after_bulk = ctx.get("/api/categories").await;
    assert_eq!(listed_product_count(&after_bulk, 8), Some(1));
}
