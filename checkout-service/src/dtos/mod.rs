use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{PaymentStatus, Transaction};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitializeTransactionRequest {
    #[validate(length(min = 1, message = "productId must not be empty"))]
    pub product_id: String,
}

/// Query string the gateway appends when redirecting back after checkout.
#[derive(Debug, Deserialize, Validate)]
pub struct CallbackQuery {
    #[validate(length(min = 1, message = "reference must not be empty"))]
    pub reference: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub reference: String,
    pub payment_link: String,
    pub product_id: String,
    pub status: PaymentStatus,
    pub gateway_status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            reference: t.reference,
            payment_link: t.payment_link,
            product_id: t.product_id,
            status: t.status,
            gateway_status: t.gateway_status,
            created_at: t.created_at.to_string(),
            updated_at: t.updated_at.to_string(),
        }
    }
}
