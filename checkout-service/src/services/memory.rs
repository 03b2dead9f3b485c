//! In-process stores backed by `DashMap`.
//!
//! Used by the `memory` storage backend and throughout the tests. Semantics
//! match the MongoDB stores: unique references and versioned saves.

use crate::models::{NewTransaction, Product, Transaction};
use crate::services::repository::{ProductStore, StoreError, TransactionStore};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mongodb::bson::DateTime;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct InMemoryTransactionStore {
    transactions: DashMap<String, Transaction>,
    write_count: AtomicU64,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `create` and `save` calls.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, StoreError> {
        Ok(self.transactions.get(reference).map(|entry| entry.clone()))
    }

    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        match self.transactions.entry(new.reference.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(new.reference)),
            Entry::Vacant(slot) => {
                let transaction = new.into_transaction();
                slot.insert(transaction.clone());
                self.write_count.fetch_add(1, Ordering::SeqCst);
                Ok(transaction)
            }
        }
    }

    async fn save(&self, transaction: &Transaction) -> Result<Transaction, StoreError> {
        // get_mut holds the shard lock, so check-and-write is atomic.
        let mut stored = self
            .transactions
            .get_mut(&transaction.reference)
            .ok_or_else(|| StoreError::StaleVersion(transaction.reference.clone()))?;

        if stored.version != transaction.version {
            return Err(StoreError::StaleVersion(transaction.reference.clone()));
        }

        let mut saved = transaction.clone();
        saved.version = transaction.version + 1;
        saved.updated_at = DateTime::now();
        *stored = saved.clone();

        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }
}

#[derive(Default)]
pub struct InMemoryProductStore {
    products: DashMap<String, Product>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        for product in products {
            store.products.insert(product.product_id.clone(), product);
        }
        store
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn find_by_id(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.products.get(product_id).map(|entry| entry.clone()))
    }
}
