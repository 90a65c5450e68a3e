//! Mobile push top-up initiator.

use axum::{Json, extract::State, response::IntoResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::AppState;
use crate::db::{models::Transaction, queries};
use crate::domain::{Currency, TransactionKind, TransactionMeta, MIN_PUSH_AMOUNT_KES};
use crate::error::AppError;
use crate::middleware::{Principal, Role};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TopupRequest {
    #[schema(value_type = f64)]
    pub amount: BigDecimal,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopupResponse {
    pub ok: bool,
    /// Rail-assigned reference for client-side status polling.
    pub reference: Option<String>,
    #[schema(value_type = Object)]
    pub acknowledgement: serde_json::Value,
}

#[utoipa::path(
    post,
    path = "/payments/mpesa/topup",
    request_body = TopupRequest,
    responses(
        (status = 200, description = "Push initiated", body = TopupResponse),
        (status = 400, description = "Validation or rail failure"),
        (status = 403, description = "Account not approved or wrong role")
    ),
    tag = "Payments"
)]
pub async fn mpesa_topup(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<TopupRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Student)?;

    let phone = payload
        .phone
        .as_deref()
        .filter(|phone| !phone.is_empty())
        .ok_or_else(|| AppError::Validation("Phone number required".to_string()))?;

    if payload.amount < BigDecimal::from(MIN_PUSH_AMOUNT_KES) {
        return Err(AppError::Validation(format!(
            "Minimum amount is KES {MIN_PUSH_AMOUNT_KES}"
        )));
    }

    let txn = Transaction::new(
        principal.account_id,
        TransactionKind::Topup,
        payload.amount.clone(),
        Currency::Kes,
        None,
    );
    let txn = queries::insert_transaction(&state.db, &txn).await?;

    // A rail failure leaves the row pending with no reference; the ledger is
    // append-mostly and never rolls back.
    let ack = state.mpesa.push(phone, &payload.amount).await.map_err(|e| {
        tracing::warn!(txn_id = %txn.id, "STK push failed: {e}");
        AppError::Rail(e.to_string())
    })?;

    let meta = TransactionMeta::MpesaPush {
        acknowledgement: ack.raw.clone(),
    };
    queries::set_reference(&state.db, txn.id, ack.reference.as_deref(), Some(meta.to_value()))
        .await?;

    tracing::info!(
        txn_id = %txn.id,
        reference = ack.reference.as_deref().unwrap_or("-"),
        "top-up push initiated"
    );

    Ok(Json(TopupResponse {
        ok: true,
        reference: ack.reference,
        acknowledgement: ack.raw,
    }))
}
