use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

use crate::models::Product;
use crate::services::reconciler::ReconcilePolicy;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub paystack: PaystackConfig,
    pub customer: CustomerConfig,
    pub reconcile_policy: ReconcilePolicy,
    pub observability: ObservabilityConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Mongo {
        url: Secret<String>,
        db_name: String,
    },
    Memory {
        seed_products: Vec<Product>,
    },
}

#[derive(Deserialize, Clone, Debug)]
pub struct PaystackConfig {
    /// API secret key. Paystack also signs webhooks with it.
    pub secret_key: Secret<String>,
    pub callback_url: Option<String>,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

/// Customer profile attached to every checkout.
#[derive(Deserialize, Clone, Debug)]
pub struct CustomerConfig {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub favourite_color: Option<String>,
    /// Discount label shown on the gateway dashboard, e.g. `60%`.
    pub discount: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("CHECKOUT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CHECKOUT_SERVICE_PORT")
            .unwrap_or_else(|_| "3003".to_string())
            .parse()
            .context("CHECKOUT_SERVICE_PORT must be a port number")?;

        let storage = match env::var("CHECKOUT_STORAGE")
            .unwrap_or_else(|_| "mongo".to_string())
            .as_str()
        {
            "mongo" => StorageConfig::Mongo {
                url: Secret::new(
                    env::var("CHECKOUT_DATABASE_URL")
                        .context("CHECKOUT_DATABASE_URL must be set")?,
                ),
                db_name: env::var("CHECKOUT_DATABASE_NAME")
                    .unwrap_or_else(|_| "checkout_db".to_string()),
            },
            "memory" => StorageConfig::Memory {
                seed_products: parse_seed_products(
                    &env::var("CHECKOUT_SEED_PRODUCTS").unwrap_or_default(),
                )?,
            },
            other => bail!("CHECKOUT_STORAGE must be 'mongo' or 'memory', got '{}'", other),
        };

        let secret_key =
            env::var("PAYSTACK_SECRET_KEY").context("PAYSTACK_SECRET_KEY must be set")?;
        if secret_key.trim().is_empty() {
            bail!("PAYSTACK_SECRET_KEY must not be empty");
        }

        let paystack = PaystackConfig {
            secret_key: Secret::new(secret_key),
            callback_url: env::var("PAYSTACK_CALLBACK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            api_base_url: env::var("PAYSTACK_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            timeout_seconds: env::var("PAYSTACK_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("PAYSTACK_TIMEOUT_SECONDS must be an integer")?,
        };

        let customer = CustomerConfig {
            id: env::var("CHECKOUT_CUSTOMER_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("CHECKOUT_CUSTOMER_ID must be an integer")?,
            name: env::var("CHECKOUT_CUSTOMER_NAME").unwrap_or_else(|_| "John Doe".to_string()),
            email: env::var("CHECKOUT_CUSTOMER_EMAIL")
                .unwrap_or_else(|_| "someone@example.zestmade.com".to_string()),
            favourite_color: optional_env("CHECKOUT_CUSTOMER_FAVOURITE_COLOR", "Blue"),
            discount: optional_env("CHECKOUT_CUSTOMER_DISCOUNT", "60%"),
        };

        let reconcile_policy = parse_reconcile_policy(
            &env::var("CHECKOUT_PAID_IS_TERMINAL").unwrap_or_else(|_| "false".to_string()),
        )?;

        let observability = ObservabilityConfig {
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "info,checkout_service=debug".to_string()),
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
        };

        Ok(Self {
            server: ServerConfig { host, port },
            storage,
            paystack,
            customer,
            reconcile_policy,
            observability,
            service_name: "checkout-service".to_string(),
        })
    }
}

/// Unset falls back to `default`; set-but-empty disables the field.
fn optional_env(key: &str, default: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => None,
        Ok(value) => Some(value),
        Err(_) => Some(default.to_string()),
    }
}

pub fn parse_reconcile_policy(paid_is_terminal: &str) -> Result<ReconcilePolicy> {
    let paid_is_terminal: bool = paid_is_terminal
        .parse()
        .context("CHECKOUT_PAID_IS_TERMINAL must be true or false")?;

    Ok(if paid_is_terminal {
        ReconcilePolicy::PaidIsTerminal
    } else {
        ReconcilePolicy::MirrorLatest
    })
}

/// Parse `id:price,id:price` into products for the in-memory backend.
pub fn parse_seed_products(raw: &str) -> Result<Vec<Product>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (product_id, price) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("Invalid product seed '{}', expected id:price", entry))?;
            let price: i64 = price
                .trim()
                .parse()
                .with_context(|| format!("Invalid price in product seed '{}'", entry))?;
            if price < 0 {
                bail!("Negative price in product seed '{}'", entry);
            }
            Ok(Product {
                product_id: product_id.trim().to_string(),
                price,
            })
        })
        .collect()
}
