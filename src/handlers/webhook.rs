//! Inbound rail callback and status polling.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::db::queries;
use crate::domain::normalize_outcome;
use crate::error::AppError;
use crate::middleware::{Principal, Role, VerifiedWebhook};
use crate::services::Reconciliation;

#[derive(Debug, Default, Deserialize)]
pub struct CallbackEnvelope {
    pub event: Option<String>,
    #[serde(default)]
    pub data: CallbackData,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackData {
    pub status: Option<String>,
    #[serde(alias = "transactionId")]
    pub transaction_id: Option<String>,
}

/// Receives a rail's outcome delivery. Signature verification (when it
/// applies) has already happened in the extractor, before this body is even
/// parsed. Unknown references are acknowledged so the rail stops retrying
/// traffic this ledger never created.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    responses(
        (status = 200, description = "Acknowledged"),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Signature verification failed")
    ),
    tag = "Payments"
)]
pub async fn rail_callback(
    State(state): State<AppState>,
    verified: VerifiedWebhook,
) -> Result<impl IntoResponse, AppError> {
    let payload: CallbackEnvelope = serde_json::from_slice(&verified.body)
        .map_err(|_| AppError::Validation("Invalid payload".to_string()))?;

    let Some(reference) = payload
        .data
        .transaction_id
        .as_deref()
        .filter(|id| !id.is_empty())
    else {
        tracing::warn!("callback without a transaction reference");
        return Err(AppError::Validation("Invalid payload".to_string()));
    };

    let reported = normalize_outcome(payload.event.as_deref(), payload.data.status.as_deref());
    let raw_status = payload
        .data
        .status
        .as_deref()
        .or(payload.event.as_deref());

    let outcome = state
        .reconciler
        .apply(reference, reported, raw_status, None)
        .await?;

    match outcome {
        Reconciliation::UnknownReference => {
            tracing::warn!(%reference, "callback for unknown reference, acknowledging");
        }
        Reconciliation::Recorded(txn) => {
            tracing::info!(txn_id = %txn.id, status = %reported, "callback status recorded");
        }
        Reconciliation::Credited(txn) => {
            tracing::info!(txn_id = %txn.id, "callback completed transaction");
        }
    }

    Ok(Json(json!({ "ok": true })))
}

/// Status poll for a rail reference, used by clients while the push prompt
/// is outstanding.
pub async fn payment_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_approved()?;

    let txn = queries::find_by_reference(&state.db, &reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {reference} not found")))?;

    if txn.user_id != principal.account_id && principal.role != Role::Admin {
        return Err(AppError::Forbidden("Not your transaction".to_string()));
    }

    Ok(Json(json!({
        "reference": reference,
        "status": txn.status,
        "kind": txn.kind,
        "amount": txn.amount,
        "currency": txn.currency,
    })))
}
