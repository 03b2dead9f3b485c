//! Application startup and lifecycle management.

use crate::config::{Config, StorageConfig};
use crate::handlers::{self, transactions};
use crate::services::{
    CheckoutSettings, InMemoryProductStore, InMemoryTransactionStore, MongoProductStore,
    MongoTransactionStore, PaystackClient, ProductStore, Reconciler, TransactionService,
    TransactionStore,
};
use axum::{
    body::Body,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, tracing::make_request_span,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub transactions: TransactionService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/transactions", get(transactions::list_transactions))
        .route(
            "/transactions/initialize",
            post(transactions::initialize_transaction),
        )
        .route(
            "/transactions/callback",
            get(transactions::verify_transaction),
        )
        .route("/transactions/webhook", post(transactions::webhook))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the storage backend named in `config`.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let (transactions, products): (Arc<dyn TransactionStore>, Arc<dyn ProductStore>) =
            match &config.storage {
                StorageConfig::Mongo { url, db_name } => {
                    let mut client_options = ClientOptions::parse(url.expose_secret())
                        .await
                        .map_err(|e| {
                            tracing::error!("Failed to parse MongoDB connection string: {}", e);
                            e
                        })?;
                    client_options.app_name = Some(config.service_name.clone());

                    let client = Client::with_options(client_options)?;
                    let db = client.database(db_name);

                    let transactions = MongoTransactionStore::new(&db);
                    transactions.init_indexes().await?;
                    let products = MongoProductStore::new(&db);
                    products.init_indexes().await?;

                    tracing::info!(database = %db_name, "Using MongoDB storage");
                    let transactions: Arc<dyn TransactionStore> = Arc::new(transactions);
                    let products: Arc<dyn ProductStore> = Arc::new(products);
                    (transactions, products)
                }
                StorageConfig::Memory { seed_products } => {
                    tracing::warn!(
                        products = seed_products.len(),
                        "Using in-memory storage; transactions are lost on restart"
                    );
                    let transactions: Arc<dyn TransactionStore> =
                        Arc::new(InMemoryTransactionStore::new());
                    let products: Arc<dyn ProductStore> = Arc::new(
                        InMemoryProductStore::with_products(seed_products.iter().cloned()),
                    );
                    (transactions, products)
                }
            };

        Self::build_with_stores(config, transactions, products).await
    }

    /// Build the application around explicitly supplied stores.
    pub async fn build_with_stores(
        config: Config,
        transactions: Arc<dyn TransactionStore>,
        products: Arc<dyn ProductStore>,
    ) -> anyhow::Result<Self> {
        let paystack = PaystackClient::new(config.paystack.clone())?;
        if paystack.is_configured() {
            tracing::info!(base_url = %config.paystack.api_base_url, "Paystack client initialized");
        } else {
            tracing::warn!("Paystack secret key not configured - checkout will fail");
        }

        let reconciler = Reconciler::new(transactions.clone(), config.reconcile_policy);
        tracing::info!(policy = ?reconciler.policy(), "Reconciler configured");

        let service = TransactionService::new(
            transactions,
            products,
            Arc::new(paystack),
            reconciler,
            CheckoutSettings {
                customer: config.customer.clone(),
                callback_url: config.paystack.callback_url.clone(),
                webhook_secret: config.paystack.secret_key.clone(),
            },
        );

        let state = AppState {
            transactions: service,
        };

        // Port 0 = random port for testing
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            e
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Checkout service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            router: router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
