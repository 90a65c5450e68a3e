//! Writer withdrawal requests.
//! Recording only: the ledger gets a pending payout row and the wallet is
//! untouched until an admin approves the payout.

use axum::{Json, extract::State, response::IntoResponse};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::AppState;
use crate::db::{models::Transaction, queries};
use crate::domain::{Currency, TransactionKind, TransactionMeta};
use crate::error::AppError;
use crate::middleware::{Principal, Role};

#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawalRequest {
    #[schema(value_type = f64)]
    pub amount: BigDecimal,
    pub phone: String,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<WithdrawalRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Writer)?;

    if payload.phone.is_empty() {
        return Err(AppError::Validation("amount and phone required".to_string()));
    }
    if payload.amount <= BigDecimal::from(0) {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }

    let wallet = queries::get_wallet(&state.db, principal.account_id).await?;
    let (balance, currency) = wallet
        .map(|w| (w.balance, w.currency))
        .unwrap_or_else(|| (BigDecimal::from(0), Currency::Kes.as_str().to_string()));

    if payload.amount > balance {
        return Err(AppError::Validation("Insufficient balance".to_string()));
    }

    let meta = TransactionMeta::PayoutRequest {
        phone: payload.phone,
    };
    let txn = Transaction::new(
        principal.account_id,
        TransactionKind::Payout,
        payload.amount,
        Currency::parse(&currency).unwrap_or(Currency::Kes),
        Some(meta.to_value()),
    );
    let txn = queries::insert_transaction(&state.db, &txn).await?;

    tracing::info!(txn_id = %txn.id, user_id = %principal.account_id, "withdrawal requested");

    Ok(Json(
        json!({ "ok": true, "message": "Withdrawal request submitted." }),
    ))
}
