//! Paystack payment gateway client.
//!
//! Implements Paystack's Transaction API for hosted-checkout initialization
//! and server-side verification.

use crate::config::PaystackConfig;
use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request timed out")]
    Timeout,

    #[error("Gateway request failed: {0}")]
    Transport(String),

    #[error("Gateway returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Outbound gateway operations used by the transaction service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout. No retry is attempted on failure.
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Ask the gateway for the current outcome of a checkout.
    async fn verify_transaction(&self, reference: &str)
        -> Result<VerifiedTransaction, GatewayError>;
}

/// Request body for `POST /transaction/initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransactionRequest {
    pub email: String,
    /// Amount in smallest currency unit (kobo for NGN).
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutMetadata {
    pub user_id: u64,
    pub product_id: String,
    pub custom_fields: Vec<CustomField>,
}

/// A metadata field shown on the Paystack dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CustomField {
    pub display_name: String,
    pub variable_name: String,
    pub value: serde_json::Value,
}

impl CustomField {
    pub fn new(
        display_name: &str,
        variable_name: &str,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            display_name: display_name.to_string(),
            variable_name: variable_name.to_string(),
            value: value.into(),
        }
    }
}

/// Common Paystack response envelope.
#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
}

/// Hosted checkout opened by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub reference: String,
    pub payment_link: String,
}

/// Outcome reported by the verify endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedTransaction {
    pub gateway_status: String,
}

/// Paystack client for interacting with the Paystack API.
#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    config: PaystackConfig,
}

impl PaystackClient {
    /// Create a new Paystack client. Every request is bounded by
    /// `config.timeout_seconds`.
    pub fn new(config: PaystackConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Check if Paystack is configured (secret key is set).
    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| {
            GatewayError::Transport(format!(
                "Invalid Paystack base URL '{}': {}",
                self.config.api_base_url, e
            ))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Transport(format!(
                    "Paystack base URL '{}' cannot carry a path",
                    self.config.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Read the envelope, mapping non-2xx and `status: false` to errors.
    async fn read_envelope<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, operation, "Paystack response received");

        if !status.is_success() {
            let message = serde_json::from_str::<PaystackEnvelope<serde_json::Value>>(&body)
                .map(|envelope| envelope.message)
                .unwrap_or(body);
            tracing::error!(
                status = status.as_u16(),
                message = %message,
                operation,
                "Paystack request failed"
            );
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: PaystackEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        if !envelope.status {
            tracing::warn!(message = %envelope.message, operation, "Paystack rejected request");
            return Err(GatewayError::Rejected(envelope.message));
        }

        envelope
            .data
            .ok_or_else(|| GatewayError::MalformedResponse("missing data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let url = self.endpoint(&["transaction", "initialize"])?;

        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let data: InitializeData = self.read_envelope(response, "initialize").await?;

        tracing::info!(
            reference = %data.reference,
            amount = request.amount,
            "Paystack transaction initialized"
        );

        Ok(CheckoutSession {
            reference: data.reference,
            payment_link: data.authorization_url,
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError> {
        let url = self.endpoint(&["transaction", "verify", reference])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await?;

        let data: VerifyData = self.read_envelope(response, "verify").await?;

        tracing::info!(
            reference = %reference,
            gateway_status = %data.status,
            "Paystack transaction verified"
        );

        Ok(VerifiedTransaction {
            gateway_status: data.status,
        })
    }
}
