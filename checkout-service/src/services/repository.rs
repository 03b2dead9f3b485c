//! Transaction and product persistence.
//!
//! The stores are plain keyed persistence with no business logic. Uniqueness of
//! `reference` is enforced by the storage layer itself, and `save` is a
//! compare-and-set on the record's `version`.

use crate::models::{NewTransaction, Product, Transaction};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{
    bson::{doc, DateTime},
    Collection, Database, IndexModel,
};
use thiserror::Error;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this key already exists.
    #[error("Record already exists: {0}")]
    Conflict(String),

    /// The record changed (or vanished) since it was read.
    #[error("Stale write for {0}")]
    StaleVersion(String),

    #[error("Storage error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(anyhow::Error::new(err))
    }
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::Conflict`] if the
    /// reference is already taken.
    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError>;

    /// Persist `transaction` if its `version` still matches the stored one.
    /// Returns the record as written, with `version` incremented.
    async fn save(&self, transaction: &Transaction) -> Result<Transaction, StoreError>;

    /// All transactions, newest first.
    async fn list(&self) -> Result<Vec<Transaction>, StoreError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>, StoreError>;
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[derive(Clone)]
pub struct MongoTransactionStore {
    collection: Collection<Transaction>,
}

impl MongoTransactionStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("transactions"),
        }
    }

    /// Initialize database indexes. The unique index on `reference` is what
    /// turns a reused reference into [`StoreError::Conflict`].
    pub async fn init_indexes(&self) -> Result<(), StoreError> {
        let reference_index = IndexModel::builder()
            .keys(doc! { "reference": 1 })
            .options(
                IndexOptions::builder()
                    .name("reference_unique_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let created_index = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_idx".to_string())
                    .build(),
            )
            .build();

        self.collection
            .create_indexes([reference_index, created_index], None)
            .await?;

        tracing::info!("Transaction indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MongoTransactionStore {
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError> {
        let transaction = self
            .collection
            .find_one(doc! { "reference": reference }, None)
            .await?;
        Ok(transaction)
    }

    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        let transaction = new.into_transaction();

        match self.collection.insert_one(&transaction, None).await {
            Ok(_) => Ok(transaction),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::Conflict(transaction.reference.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        let mut saved = transaction.clone();
        saved.version = transaction.version + 1;
        saved.updated_at = DateTime::now();

        let filter = doc! {
            "reference": &transaction.reference,
            "version": transaction.version,
        };
        let update = doc! {
            "$set": {
                "status": mongodb::bson::to_bson(&saved.status)
                    .map_err(|e| StoreError::Backend(e.into()))?,
                "gateway_status": &saved.gateway_status,
                "version": saved.version,
                "updated_at": saved.updated_at,
            }
        };

        let result = self.collection.update_one(filter, update, None).await?;

        if result.matched_count == 0 {
            return Err(StoreError::StaleVersion(transaction.reference.clone()));
        }

        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self.collection.find(doc! {}, Some(options)).await?;
        let transactions: Vec<Transaction> = cursor.try_collect().await?;

        Ok(transactions)
    }
}

#[derive(Clone)]
pub struct MongoProductStore {
    collection: Collection<Product>,
}

impl MongoProductStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("products"),
        }
    }

    pub async fn init_indexes(&self) -> Result<(), StoreError> {
        let product_index = IndexModel::builder()
            .keys(doc! { "product_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("product_id_unique_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.collection.create_index(product_index, None).await?;

        tracing::info!("Product indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MongoProductStore {
    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let product = self
            .collection
            .find_one(doc! { "product_id": product_id }, None)
            .await?;
        Ok(product)
    }
}
