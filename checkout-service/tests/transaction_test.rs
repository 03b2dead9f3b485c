mod common;

use common::{TestApp, TEST_PRODUCT_ID};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn initialize_creates_not_paid_transaction() {
    let app = TestApp::spawn().await;
    app.mock_initialize("ref_1").await;

    let response = app.initialize(TEST_PRODUCT_ID).await;

    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["reference"], "ref_1");
    assert_eq!(body["paymentLink"], "https://pay/ref_1");
    assert_eq!(body["productId"], TEST_PRODUCT_ID);
    assert_eq!(body["status"], "not paid");

    let stored = app.stored("ref_1").await.expect("transaction not stored");
    assert_eq!(stored.payment_link, "https://pay/ref_1");
}

#[tokio::test]
async fn initialize_sends_price_customer_and_metadata() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(body_partial_json(serde_json::json!({
            "email": "someone@example.com",
            "amount": 5000,
            "metadata": {
                "user_id": 1,
                "product_id": TEST_PRODUCT_ID,
                "custom_fields": [
                    { "display_name": "Name", "variable_name": "name", "value": "John Doe" },
                    { "display_name": "Email", "variable_name": "email", "value": "someone@example.com" },
                    { "display_name": "Favourite Color", "variable_name": "favourite_color", "value": "Blue" },
                    { "display_name": "Discount", "variable_name": "discount", "value": "60%" }
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Authorization URL created",
            "data": { "authorization_url": "https://pay/ref_2", "reference": "ref_2" }
        })))
        .expect(1)
        .mount(&app.gateway)
        .await;

    let response = app.initialize(TEST_PRODUCT_ID).await;

    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn initialize_unknown_product_returns_404_without_gateway_call() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.gateway)
        .await;

    let response = app.initialize("missing").await;

    assert_eq!(response.status(), 404);
    assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn initialize_rejects_empty_product_id() {
    let app = TestApp::spawn().await;

    let response = app.initialize("").await;

    assert_eq!(response.status(), 422);
    assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn initialize_gateway_failure_returns_502_and_stores_nothing() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "status": false,
            "message": "Invalid key"
        })))
        .mount(&app.gateway)
        .await;

    let response = app.initialize(TEST_PRODUCT_ID).await;

    assert_eq!(response.status(), 502);
    assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn callback_marks_transaction_paid_on_success() {
    let app = TestApp::spawn().await;
    app.mock_initialize("ref_1").await;
    app.mock_verify("ref_1", "success").await;

    assert_eq!(app.initialize(TEST_PRODUCT_ID).await.status(), 201);

    let response = app.callback("ref_1").await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "paid");
    assert_eq!(body["gatewayStatus"], "success");
}

#[tokio::test]
async fn callback_keeps_not_paid_for_failed_payment() {
    let app = TestApp::spawn().await;
    app.mock_initialize("ref_1").await;
    app.mock_verify("ref_1", "failed").await;

    app.initialize(TEST_PRODUCT_ID).await;

    let response = app.callback("ref_1").await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "not paid");
    assert_eq!(body["gatewayStatus"], "failed");
}

#[tokio::test]
async fn callback_unknown_reference_returns_404() {
    let app = TestApp::spawn().await;
    app.mock_verify("nope", "success").await;

    let response = app.callback("nope").await;

    assert_eq!(response.status(), 404);
    assert!(app.stored("nope").await.is_none());
}

#[tokio::test]
async fn callback_gateway_failure_leaves_record_untouched() {
    let app = TestApp::spawn().await;
    app.mock_initialize("ref_1").await;
    app.initialize(TEST_PRODUCT_ID).await;
    let before = app.stored("ref_1").await.expect("transaction not stored");

    Mock::given(method("GET"))
        .and(path("/transaction/verify/ref_1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.gateway)
        .await;

    let response = app.callback("ref_1").await;

    assert_eq!(response.status(), 502);
    assert_eq!(app.stored("ref_1").await, Some(before));
}

#[tokio::test]
async fn list_returns_created_transactions() {
    let app = TestApp::spawn().await;
    app.mock_initialize("ref_1").await;
    app.initialize(TEST_PRODUCT_ID).await;

    let response = app
        .client
        .get(format!("{}/transactions", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: Vec<serde_json::Value> = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["reference"], "ref_1");
}
