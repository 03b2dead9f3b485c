//! Transaction handlers: checkout initialization, gateway callback and webhook.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{CallbackQuery, InitializeTransactionRequest, TransactionResponse},
    services::{GatewayError, TransactionError},
    AppState,
};

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

impl From<TransactionError> for AppError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::ProductNotFound(_) | TransactionError::TransactionNotFound(_) => {
                AppError::NotFound(err.into())
            }
            TransactionError::InvalidSignature | TransactionError::MalformedEvent(_) => {
                AppError::BadRequest(err.into())
            }
            TransactionError::StorageConflict(_) | TransactionError::Contended(_) => {
                AppError::Conflict(err.into())
            }
            TransactionError::Gateway(GatewayError::Timeout) => {
                AppError::GatewayTimeout("payment gateway did not respond".to_string())
            }
            TransactionError::Gateway(e) => AppError::BadGateway(e.to_string()),
            TransactionError::InvalidProduct { .. } => AppError::InternalError(err.into()),
            TransactionError::Storage(e) => AppError::DatabaseError(e.into()),
        }
    }
}

/// Open a hosted checkout for a product.
pub async fn initialize_transaction(
    State(state): State<AppState>,
    Json(payload): Json<InitializeTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    payload.validate()?;

    tracing::info!(product_id = %payload.product_id, "Initializing transaction");

    let transaction = state.transactions.initialize(&payload.product_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse::from(transaction)),
    ))
}

/// Gateway redirect target. Verifies the outcome with the gateway.
pub async fn verify_transaction(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<TransactionResponse>, AppError> {
    query.validate()?;

    tracing::info!(reference = %query.reference, "Verifying transaction from callback");

    let transaction = state.transactions.poll_verify(&query.reference).await?;

    Ok(Json(TransactionResponse::from(transaction)))
}

/// Paystack webhook handler.
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what the gateway signed.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(PAYSTACK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let transaction = state.transactions.webhook_verify(&body, signature).await?;

    tracing::debug!(
        reference = %transaction.reference,
        status = transaction.status.as_str(),
        "Webhook processed"
    );

    Ok(StatusCode::OK)
}

/// List all transactions, newest first.
pub async fn list_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let transactions = state.transactions.list().await?;

    Ok(Json(
        transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StoreError;
    use axum::response::IntoResponse;

    fn status_of(err: TransactionError) -> StatusCode {
        AppError::from(err).status_code()
    }

    #[test]
    fn test_transaction_error_status_mapping() {
        assert_eq!(
            status_of(TransactionError::ProductNotFound("p".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(TransactionError::TransactionNotFound("r".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(TransactionError::InvalidSignature),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TransactionError::StorageConflict("r".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(TransactionError::Contended("r".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(TransactionError::Gateway(GatewayError::Timeout)),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(TransactionError::Gateway(GatewayError::Rejected("no".into()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_storage_failure_is_500_without_details() {
        let err = TransactionError::from(StoreError::Backend(anyhow::anyhow!(
            "connection refused to mongodb://admin:pw@db"
        )));

        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("mongodb://"));
    }
}
