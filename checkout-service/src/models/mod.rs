use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// A hosted-checkout transaction, keyed by the gateway reference.
///
/// `reference`, `payment_link` and `product_id` never change after creation.
/// `status` is only written through the reconciler.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transaction {
    pub reference: String,
    pub payment_link: String,
    pub product_id: String,
    pub status: PaymentStatus,
    /// Last raw status string reported by the gateway.
    pub gateway_status: Option<String>,
    /// Optimistic concurrency counter, bumped on every successful save.
    pub version: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "not paid")]
    NotPaid,
    #[serde(rename = "paid")]
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NotPaid => "not paid",
            PaymentStatus::Paid => "paid",
        }
    }
}

/// Fields supplied when a transaction is first recorded.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub payment_link: String,
    pub product_id: String,
}

impl NewTransaction {
    pub fn into_transaction(self) -> Transaction {
        let now = DateTime::now();
        Transaction {
            reference: self.reference,
            payment_link: self.payment_link,
            product_id: self.product_id,
            status: PaymentStatus::NotPaid,
            gateway_status: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Read-only product reference data. `price` is in the smallest currency unit.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub product_id: String,
    pub price: i64,
}
