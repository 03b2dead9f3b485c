//! Applies gateway-reported outcomes to stored transactions.
//!
//! This is the only writer of `Transaction::status`. Callers are responsible
//! for authenticating the report (signature check for webhooks, the gateway's
//! own API for polling) before calling [`Reconciler::reconcile`].

use crate::models::{PaymentStatus, Transaction};
use crate::services::repository::{StoreError, TransactionStore};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// The gateway's documented success token. Compared exactly.
pub const SUCCESS_STATUS: &str = "success";

/// Upper bound on read-modify-write attempts when saves keep losing the race.
const MAX_ATTEMPTS: usize = 10;

/// What to do with a non-success report for a transaction already `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// `status` always mirrors the latest verified report.
    #[default]
    MirrorLatest,
    /// Once `Paid`, `status` never moves back. `gateway_status` still updates.
    PaidIsTerminal,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Gave up reconciling {reference} after {attempts} conflicting writes")]
    Contended { reference: String, attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn status_for(reported_status: &str) -> PaymentStatus {
    if reported_status == SUCCESS_STATUS {
        PaymentStatus::Paid
    } else {
        PaymentStatus::NotPaid
    }
}

/// Compute the record after applying `reported_status`.
///
/// Returns `None` when the report would leave the record unchanged, which is
/// what makes repeated deliveries free of side effects.
pub fn apply_report(
    current: &Transaction,
    reported_status: &str,
    policy: ReconcilePolicy,
) -> Option<Transaction> {
    let status = match (policy, current.status) {
        (ReconcilePolicy::PaidIsTerminal, PaymentStatus::Paid) => PaymentStatus::Paid,
        _ => status_for(reported_status),
    };

    if current.status == status && current.gateway_status.as_deref() == Some(reported_status) {
        return None;
    }

    let mut next = current.clone();
    next.status = status;
    next.gateway_status = Some(reported_status.to_string());
    Some(next)
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn TransactionStore>,
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TransactionStore>, policy: ReconcilePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Apply `reported_status` to the transaction identified by `reference`.
    ///
    /// Writes are optimistic: if another update lands between read and save,
    /// the report is re-applied on top of the fresh record, so the last
    /// committed report wins and no update is lost.
    pub async fn reconcile(
        &self,
        reference: &str,
        reported_status: &str,
    ) -> Result<Transaction, ReconcileError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = self
                .store
                .find_by_reference(reference)
                .await?
                .ok_or_else(|| ReconcileError::NotFound(reference.to_string()))?;

            let Some(next) = apply_report(&current, reported_status, self.policy) else {
                tracing::debug!(
                    reference = %reference,
                    gateway_status = %reported_status,
                    "Report already applied, nothing to write"
                );
                return Ok(current);
            };

            match self.store.save(&next).await {
                Ok(saved) => {
                    tracing::info!(
                        reference = %reference,
                        from = current.status.as_str(),
                        to = saved.status.as_str(),
                        gateway_status = %reported_status,
                        "Transaction reconciled"
                    );
                    return Ok(saved);
                }
                Err(StoreError::StaleVersion(_)) => {
                    tracing::debug!(reference = %reference, attempt, "Concurrent update, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(reference = %reference, "Reconcile abandoned after repeated conflicts");
        Err(ReconcileError::Contended {
            reference: reference.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }
}
