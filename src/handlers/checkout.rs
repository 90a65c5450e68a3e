//! Card checkout initiator and the synchronous capture path.

use axum::{Json, extract::State, response::IntoResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::AppState;
use crate::db::{models::Transaction, queries};
use crate::domain::{Currency, TransactionKind, TransactionMeta, TransactionStatus};
use crate::error::AppError;
use crate::middleware::{Principal, Role};
use crate::rails::paypal::PayPalError;
use crate::services::Reconciliation;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[schema(value_type = f64)]
    pub amount: BigDecimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub ok: bool,
    /// Processor order id, stored as the ledger reference.
    pub reference: String,
    /// Where to redirect the buyer to approve the order.
    pub approve_url: String,
}

#[utoipa::path(
    post,
    path = "/payments/card/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order created", body = CheckoutResponse),
        (status = 400, description = "Validation or rail failure"),
        (status = 403, description = "Account not approved or wrong role")
    ),
    tag = "Payments"
)]
pub async fn card_checkout(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Student)?;

    if payload.amount <= BigDecimal::from(0) {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }

    let txn = Transaction::new(
        principal.account_id,
        TransactionKind::Topup,
        payload.amount.clone(),
        Currency::Usd,
        None,
    );
    let txn = queries::insert_transaction(&state.db, &txn).await?;

    let return_url = format!("{}/payments/paypal/return", state.config.public_base_url);
    let cancel_url = format!("{}/payments/paypal/cancel", state.config.public_base_url);

    let order = state
        .paypal
        .create_order(
            &payload.amount,
            Currency::Usd.as_str(),
            txn.id,
            &return_url,
            &cancel_url,
        )
        .await
        .map_err(|e| {
            tracing::warn!(txn_id = %txn.id, "order creation failed: {e}");
            AppError::Rail(e.to_string())
        })?;

    let meta = TransactionMeta::CardOrder {
        order: Some(order.raw.clone()),
        capture: None,
    };
    queries::set_reference(&state.db, txn.id, Some(&order.id), Some(meta.to_value())).await?;

    tracing::info!(txn_id = %txn.id, reference = %order.id, "card checkout created");

    Ok(Json(CheckoutResponse {
        ok: true,
        reference: order.id,
        approve_url: order.approve_url,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CaptureRequest {
    pub order_id: String,
}

/// Finalizes an approved order on redirect return. A successful capture is
/// the synchronous twin of the webhook: it runs the same reconciliation and
/// the same idempotence guard against double-crediting.
#[utoipa::path(
    post,
    path = "/payments/card/capture",
    request_body = CaptureRequest,
    responses(
        (status = 200, description = "Captured and reconciled"),
        (status = 400, description = "Capture declined"),
        (status = 404, description = "No transaction for this order")
    ),
    tag = "Payments"
)]
pub async fn card_capture(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CaptureRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Any authenticated account may finalize its own redirect return; the
    // ledger row was created under the initiating account.
    if payload.order_id.is_empty() {
        return Err(AppError::Validation("order_id required".to_string()));
    }

    match state.paypal.capture_order(&payload.order_id).await {
        Ok(capture) => {
            // Crediting is scoped to the account that initiated the order;
            // someone else's order id resolves to nothing here.
            let owned = queries::find_by_reference(&state.db, &payload.order_id)
                .await?
                .filter(|txn| txn.user_id == principal.account_id);
            if owned.is_none() {
                return Err(AppError::NotFound("Transaction not found".to_string()));
            }

            let raw_status = capture
                .get("status")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            let meta = TransactionMeta::CardOrder {
                order: None,
                capture: Some(capture),
            };

            let outcome = state
                .reconciler
                .apply(
                    &payload.order_id,
                    TransactionStatus::Completed,
                    raw_status.as_deref(),
                    Some(meta.to_value()),
                )
                .await?;

            match outcome {
                Reconciliation::UnknownReference => {
                    Err(AppError::NotFound("Transaction not found".to_string()))
                }
                _ => Ok(Json(json!({ "ok": true }))),
            }
        }
        Err(PayPalError::CaptureDeclined(raw)) => {
            tracing::warn!(order_id = %payload.order_id, principal = %principal.account_id, "capture declined");
            let meta = TransactionMeta::CardOrder {
                order: None,
                capture: Some(raw),
            };
            queries::mark_failed_by_reference(&state.db, &payload.order_id, Some(meta.to_value()))
                .await?;
            Err(AppError::Rail("PayPal capture failed".to_string()))
        }
        Err(e) => Err(AppError::Rail(e.to_string())),
    }
}
