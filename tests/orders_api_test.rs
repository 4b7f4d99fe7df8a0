mod common;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::TestApp;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::Value;
use storefront_api::{
    errors::ServiceError,
    identity::Identity,
    payments::ProviderSessionStatus,
    services::AddToCartInput,
};
use tower::ServiceExt;
use uuid::Uuid;

fn guest(session: &str) -> Identity {
    Identity::Guest(session.to_string())
}

async fn place_order(app: &TestApp, identity: &Identity, product_id: Uuid, quantity: i32) -> Uuid {
    app.state
        .services
        .cart
        .add_item(
            identity,
            AddToCartInput {
                product_id,
                quantity,
            },
        )
        .await
        .expect("add to cart");

    let session_id = app
        .state
        .services
        .checkout
        .create_session(identity)
        .await
        .expect("create session")
        .provider_session_id;

    app.state
        .services
        .reconciliation
        .reconcile(&session_id, ProviderSessionStatus::Paid)
        .await
        .expect("paid");

    app.state
        .services
        .orders
        .list_orders(identity)
        .await
        .expect("orders")[0]
        .id
}

#[tokio::test]
async fn orders_list_newest_first_per_identity() {
    let app = TestApp::new().await;
    let first = app.seed_product("Wireless Headphones", dec!(199.99), 50).await;
    let second = app.seed_product("Smart Arduino Kit", dec!(89.99), 30).await;
    let identity = guest("sess_history");

    place_order(&app, &identity, first, 1).await;
    // Keep created_at strictly increasing for the ordering assertion.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    place_order(&app, &identity, second, 2).await;

    let orders = app
        .state
        .services
        .orders
        .list_orders(&identity)
        .await
        .expect("orders");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].total_amount, dec!(179.98), "newest order first");
    assert_eq!(orders[1].total_amount, dec!(199.99));

    // A different identity sees nothing.
    let other = app
        .state
        .services
        .orders
        .list_orders(&guest("sess_other"))
        .await
        .expect("orders");
    assert!(other.is_empty());
}

#[tokio::test]
async fn fetching_anothers_order_is_unauthorized() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("Casual Shirt", dec!(34.99), 80).await;
    let owner = guest("sess_owner");
    let order_id = place_order(&app, &owner, product_id, 1).await;

    let result = app
        .state
        .services
        .orders
        .get_order(&guest("sess_intruder"), order_id)
        .await;
    assert_matches!(result, Err(ServiceError::Unauthorized(_)));

    let result = app
        .state
        .services
        .orders
        .get_order(&owner, Uuid::new_v4())
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn order_items_are_frozen_against_price_changes() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("Designer Dress", dec!(159.99), 40).await;
    let identity = guest("sess_frozen");
    let order_id = place_order(&app, &identity, product_id, 1).await;

    // Reprice the catalog after the purchase.
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    use storefront_api::entities::{product, Product};
    let existing = Product::find_by_id(product_id)
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("product");
    let mut active: product::ActiveModel = existing.into();
    active.price = Set(dec!(999.99));
    active.update(&*app.state.db).await.expect("reprice");

    let order = app
        .state
        .services
        .orders
        .get_order(&identity, order_id)
        .await
        .expect("order");
    assert_eq!(order.total_amount, dec!(159.99));
    assert_eq!(order.items[0].unit_price, dec!(159.99));
}

#[tokio::test]
async fn requests_without_identity_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cart_endpoints_round_trip_over_http() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("Home Cleaning Kit", dec!(29.99), 70).await;

    let body = serde_json::json!({
        "product_id": product_id,
        "quantity": 2,
    });

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/cart/items")
                .header("content-type", "application/json")
                .header("x-session-id", "sess_http")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let summary: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(summary["items_count"], 2);

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/cart")
                .header("x-customer-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let summary: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(summary["items_count"], 0, "customers see their own cart");
}

#[tokio::test]
async fn webhook_rejects_bad_signature_when_secret_configured() {
    let app = TestApp::with_config(|cfg| {
        cfg.payment_webhook_secret = Some("whsec_test".to_string());
    })
    .await;

    let payload = serde_json::json!({
        "type": "checkout.session.completed",
        "provider_session_id": "cs_test_0000",
    });

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/checkout/webhook")
                .header("content-type", "application/json")
                .header("x-timestamp", chrono::Utc::now().timestamp().to_string())
                .header("x-signature", "deadbeef")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
