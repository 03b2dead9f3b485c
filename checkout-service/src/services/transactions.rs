//! Transaction orchestration: initialize, poll-verify and webhook-verify.
//!
//! All collaborators are passed in explicitly; nothing here reads the
//! environment.

use crate::config::CustomerConfig;
use crate::models::{NewTransaction, Transaction};
use crate::services::metrics;
use crate::services::paystack::{
    CheckoutMetadata, CreateTransactionRequest, CustomField, GatewayError, PaymentGateway,
};
use crate::services::reconciler::{ReconcileError, Reconciler};
use crate::services::repository::{ProductStore, StoreError, TransactionStore};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::utils::verify_webhook_signature;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Product {product_id} has an invalid price: {price}")]
    InvalidProduct { product_id: String, price: i64 },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),

    #[error("Transaction already exists: {0}")]
    StorageConflict(String),

    #[error("Transaction {0} is being updated concurrently, try again")]
    Contended(String),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for TransactionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reference) => TransactionError::StorageConflict(reference),
            other => TransactionError::Storage(other),
        }
    }
}

impl From<ReconcileError> for TransactionError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::NotFound(reference) => TransactionError::TransactionNotFound(reference),
            ReconcileError::Contended { reference, .. } => TransactionError::Contended(reference),
            ReconcileError::Store(e) => e.into(),
        }
    }
}

/// Gateway webhook event. Only `data.reference` and `data.status` matter.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: String,
    pub data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub reference: Option<String>,
    pub status: Option<String>,
}

/// Per-deployment checkout settings.
#[derive(Clone)]
pub struct CheckoutSettings {
    pub customer: CustomerConfig,
    pub callback_url: Option<String>,
    /// Secret the gateway signs webhooks with.
    pub webhook_secret: Secret<String>,
}

#[derive(Clone)]
pub struct TransactionService {
    transactions: Arc<dyn TransactionStore>,
    products: Arc<dyn ProductStore>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Reconciler,
    settings: CheckoutSettings,
}

impl TransactionService {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        products: Arc<dyn ProductStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: Reconciler,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            transactions,
            products,
            gateway,
            reconciler,
            settings,
        }
    }

    fn checkout_request(&self, product_id: &str, amount: u64) -> CreateTransactionRequest {
        let customer = &self.settings.customer;

        let mut custom_fields = vec![
            CustomField::new("Name", "name", customer.name.as_str()),
            CustomField::new("Email", "email", customer.email.as_str()),
        ];
        if let Some(color) = &customer.favourite_color {
            custom_fields.push(CustomField::new(
                "Favourite Color",
                "favourite_color",
                color.as_str(),
            ));
        }
        if let Some(discount) = &customer.discount {
            custom_fields.push(CustomField::new("Discount", "discount", discount.as_str()));
        }

        CreateTransactionRequest {
            email: customer.email.clone(),
            amount,
            callback_url: self.settings.callback_url.clone(),
            metadata: CheckoutMetadata {
                user_id: customer.id,
                product_id: product_id.to_string(),
                custom_fields,
            },
        }
    }

    /// Open a hosted checkout for `product_id` and record it.
    ///
    /// Nothing is stored unless the gateway reports success.
    pub async fn initialize(&self, product_id: &str) -> Result<Transaction, TransactionError> {
        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| TransactionError::ProductNotFound(product_id.to_string()))?;

        let amount =
            u64::try_from(product.price).map_err(|_| TransactionError::InvalidProduct {
                product_id: product.product_id.clone(),
                price: product.price,
            })?;

        let request = self.checkout_request(&product.product_id, amount);

        let session = self
            .gateway
            .create_transaction(&request)
            .await
            .map_err(|e| {
                tracing::error!(product_id = %product_id, error = %e, "Failed to open checkout");
                e
            })?;

        let transaction = self
            .transactions
            .create(NewTransaction {
                reference: session.reference,
                payment_link: session.payment_link,
                product_id: product.product_id,
            })
            .await?;

        metrics::record_initialized();
        tracing::info!(
            reference = %transaction.reference,
            product_id = %transaction.product_id,
            amount,
            "Transaction initialized"
        );

        Ok(transaction)
    }

    /// Ask the gateway for the outcome of `reference` and reconcile it.
    pub async fn poll_verify(&self, reference: &str) -> Result<Transaction, TransactionError> {
        if self.transactions.find_by_reference(reference).await?.is_none() {
            return Err(TransactionError::TransactionNotFound(reference.to_string()));
        }

        let verified = self
            .gateway
            .verify_transaction(reference)
            .await
            .map_err(|e| {
                tracing::error!(reference = %reference, error = %e, "Failed to verify transaction");
                e
            })?;

        let transaction = self
            .reconciler
            .reconcile(reference, &verified.gateway_status)
            .await?;

        metrics::record_reconciliation("poll", transaction.status.as_str());
        Ok(transaction)
    }

    /// Authenticate a webhook delivery and reconcile the reported outcome.
    ///
    /// `raw_body` must be the request payload as received. The event is only
    /// decoded after the signature has been checked against those bytes.
    pub async fn webhook_verify(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<Transaction, TransactionError> {
        let verified = signature.is_some_and(|sig| {
            verify_webhook_signature(self.settings.webhook_secret.expose_secret(), raw_body, sig)
        });

        if !verified {
            metrics::record_webhook_rejected("signature");
            tracing::warn!(
                signature_present = signature.is_some(),
                "Rejected webhook with invalid signature"
            );
            return Err(TransactionError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body).map_err(|e| {
            metrics::record_webhook_rejected("malformed");
            TransactionError::MalformedEvent(e.to_string())
        })?;

        let (reference, status) = match event.data {
            Some(WebhookData {
                reference: Some(reference),
                status: Some(status),
            }) => (reference, status),
            _ => {
                metrics::record_webhook_rejected("malformed");
                return Err(TransactionError::MalformedEvent(
                    "data.reference and data.status are required".to_string(),
                ));
            }
        };

        tracing::info!(
            event = %event.event,
            reference = %reference,
            gateway_status = %status,
            "Processing gateway webhook"
        );

        let transaction = self.reconciler.reconcile(&reference, &status).await?;

        metrics::record_reconciliation("webhook", transaction.status.as_str());
        Ok(transaction)
    }

    pub async fn list(&self) -> Result<Vec<Transaction>, TransactionError> {
        Ok(self.transactions.list().await?)
    }
}
