#![allow(dead_code)]

use checkout_service::config::{
    Config, CustomerConfig, ObservabilityConfig, PaystackConfig, ServerConfig, StorageConfig,
};
use checkout_service::models::{Product, Transaction};
use checkout_service::services::{
    InMemoryProductStore, InMemoryTransactionStore, ReconcilePolicy, TransactionStore,
};
use checkout_service::Application;
use secrecy::Secret;
use service_core::utils::generate_webhook_signature;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_SECRET_KEY: &str = "sk_test_integration";
pub const TEST_PRODUCT_ID: &str = "prod_1";
pub const TEST_PRODUCT_PRICE: i64 = 5000;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub gateway: MockServer,
    pub store: Arc<InMemoryTransactionStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let gateway = MockServer::start().await;

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Random port
            },
            storage: StorageConfig::Memory {
                seed_products: vec![],
            },
            paystack: PaystackConfig {
                secret_key: Secret::new(TEST_SECRET_KEY.to_string()),
                callback_url: None,
                api_base_url: gateway.uri(),
                timeout_seconds: 5,
            },
            customer: CustomerConfig {
                id: 1,
                name: "John Doe".to_string(),
                email: "someone@example.com".to_string(),
                favourite_color: Some("Blue".to_string()),
                discount: Some("60%".to_string()),
            },
            reconcile_policy: ReconcilePolicy::MirrorLatest,
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                otlp_endpoint: None,
            },
            service_name: "checkout-service-test".to_string(),
        };

        let store = Arc::new(InMemoryTransactionStore::new());
        let products = Arc::new(InMemoryProductStore::with_products([Product {
            product_id: TEST_PRODUCT_ID.to_string(),
            price: TEST_PRODUCT_PRICE,
        }]));

        let app = Application::build_with_stores(config, store.clone(), products)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            gateway,
            store,
            client,
        }
    }

    /// Gateway answers `initialize` with `reference`.
    pub async fn mock_initialize(&self, reference: &str) {
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .and(header(
                "authorization",
                format!("Bearer {}", TEST_SECRET_KEY).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "message": "Authorization URL created",
                "data": {
                    "authorization_url": format!("https://pay/{}", reference),
                    "access_code": "access_code_1",
                    "reference": reference
                }
            })))
            .mount(&self.gateway)
            .await;
    }

    /// Gateway answers `verify` for `reference` with `status`.
    pub async fn mock_verify(&self, reference: &str, status: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/transaction/verify/{}", reference)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "message": "Verification successful",
                "data": { "status": status, "reference": reference }
            })))
            .mount(&self.gateway)
            .await;
    }

    pub async fn initialize(&self, product_id: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/transactions/initialize", self.address))
            .json(&serde_json::json!({ "productId": product_id }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn callback(&self, reference: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/transactions/callback", self.address))
            .query(&[("reference", reference)])
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_webhook(&self, body: &str, signature: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/transactions/webhook", self.address))
            .header("content-type", "application/json")
            .body(body.to_string());

        if let Some(signature) = signature {
            request = request.header("x-paystack-signature", signature);
        }

        request.send().await.expect("Failed to execute request")
    }

    pub async fn stored(&self, reference: &str) -> Option<Transaction> {
        self.store
            .find_by_reference(reference)
            .await
            .expect("Failed to read store")
    }
}

pub fn sign(body: &str) -> String {
    generate_webhook_signature(TEST_SECRET_KEY, body.as_bytes()).expect("Failed to sign body")
}
