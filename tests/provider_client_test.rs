use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use storefront_api::{
    errors::ServiceError,
    payments::{CreateSessionRequest, HostedCheckoutClient, PaymentProvider, ProviderSessionStatus},
};
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn request() -> CreateSessionRequest {
    CreateSessionRequest {
        amount: dec!(20.00),
        currency: "usd".to_string(),
        success_url: "http://localhost:3000/success?session_id={CHECKOUT_SESSION_ID}".to_string(),
        cancel_url: "http://localhost:3000/cart".to_string(),
        metadata: serde_json::json!({"owner_id": "guest:sess_1"}),
    }
}

#[tokio::test]
async fn create_session_posts_amount_and_parses_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", "Bearer sk_test_key"))
        .and(body_partial_json(serde_json::json!({"currency": "usd"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_live_123",
            "url": "https://pay.example.test/c/cs_live_123",
            "status": "open",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HostedCheckoutClient::new(&server.uri(), "sk_test_key", 5).expect("client");
    let session = client
        .create_checkout_session(request())
        .await
        .expect("session created");

    assert_eq!(session.id, "cs_live_123");
    assert_eq!(session.redirect_url, "https://pay.example.test/c/cs_live_123");
}

#[tokio::test]
async fn status_lookup_maps_provider_fields() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_live_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "complete",
            "payment_status": "paid",
        })))
        .mount(&server)
        .await;

    let client = HostedCheckoutClient::new(&server.uri(), "sk_test_key", 5).expect("client");
    let status = client
        .get_session_status("cs_live_123")
        .await
        .expect("status");

    assert_eq!(status, ProviderSessionStatus::Paid);
}

#[tokio::test]
async fn provider_500_is_a_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_live_500"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = HostedCheckoutClient::new(&server.uri(), "sk_test_key", 5).expect("client");
    let result = client.get_session_status("cs_live_500").await;

    assert_matches!(result, Err(ServiceError::ProviderError(_)));
}

#[tokio::test]
async fn provider_404_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = HostedCheckoutClient::new(&server.uri(), "sk_test_key", 5).expect("client");
    let result = client.get_session_status("cs_missing").await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(5))
                .set_body_json(serde_json::json!({
                    "id": "cs_slow",
                    "url": "https://pay.example.test/c/cs_slow",
                })),
        )
        .mount(&server)
        .await;

    let client = HostedCheckoutClient::new(&server.uri(), "sk_test_key", 1).expect("client");
    let result = client.create_checkout_session(request()).await;

    assert_matches!(result, Err(ServiceError::ProviderTimeout(1)));
}

#[tokio::test]
async fn malformed_body_is_a_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HostedCheckoutClient::new(&server.uri(), "sk_test_key", 5).expect("client");
    let result = client.create_checkout_session(request()).await;

    assert_matches!(result, Err(ServiceError::ProviderError(_)));
}
