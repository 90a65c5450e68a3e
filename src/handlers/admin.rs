//! Admin operations: payment listing, payout approval, account wallet
//! provisioning.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::db::queries;
use crate::domain::{Currency, TransactionStatus};
use crate::error::AppError;
use crate::middleware::{Principal, Role};

pub async fn list_payments(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Admin)?;

    let payments = queries::list_recent_transactions(&state.db, 50).await?;
    Ok(Json(json!({ "payments": payments })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveWithdrawalRequest {
    pub transaction_id: Uuid,
}

/// Approves a payout: the wallet debit and the ledger transition commit
/// together, overdraft is refused, and re-approving an already completed
/// payout is a no-op.
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<ApproveWithdrawalRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Admin)?;

    let mut db = state.db.begin().await?;

    let Some(txn) = queries::get_payout_for_update(&mut db, payload.transaction_id).await? else {
        db.rollback().await?;
        return Err(AppError::NotFound("Withdrawal not found".to_string()));
    };

    if txn.status() == TransactionStatus::Completed {
        db.rollback().await?;
        return Ok(Json(json!({ "ok": true })));
    }

    let debited = queries::debit_wallet(&mut db, txn.user_id, &txn.amount).await?;
    if debited.is_none() {
        db.rollback().await?;
        return Err(AppError::Validation("Insufficient balance".to_string()));
    }

    queries::update_status(
        &mut db,
        txn.id,
        TransactionStatus::Completed.as_str(),
        None,
        None,
    )
    .await?;
    db.commit().await?;

    tracing::info!(
        txn_id = %txn.id,
        user_id = %txn.user_id,
        amount = %txn.amount,
        "payout approved and wallet debited"
    );

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveAccountRequest {
    pub user_id: Uuid,
}

/// Provisions a wallet when an account is approved. Re-approval never
/// resets an existing balance.
pub async fn approve_account(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<ApproveAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Admin)?;

    queries::ensure_wallet(&state.db, payload.user_id, Currency::Usd.as_str()).await?;

    Ok(Json(json!({ "ok": true })))
}
