//! Writer subscription checkout and payment.

use axum::{Json, extract::State, response::IntoResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::db::{
    models::{Subscription, Transaction},
    queries,
};
use crate::domain::{
    Currency, FxQuote, SubscriptionPlan, TransactionKind, TransactionMeta, MIN_PUSH_AMOUNT_KES,
};
use crate::error::AppError;
use crate::middleware::{Principal, Role};
use crate::rails::fx::convert_usd_to_kes;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionCheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionCheckoutResponse {
    pub ok: bool,
    pub subscription_id: Uuid,
    /// Plan price in whole KES at today's rate.
    pub amount: i64,
    pub currency: String,
    pub rate: f64,
}

/// Creates the plan record up front, inactive until payment completes.
pub async fn checkout(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<SubscriptionCheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Writer)?;

    let plan = SubscriptionPlan::parse(&payload.plan)
        .ok_or_else(|| AppError::Validation("Invalid plan".to_string()))?;

    let sub = Subscription::new(principal.account_id, plan);
    let sub = queries::insert_subscription(&state.db, &sub).await?;

    let rate = state
        .rates
        .usd_to_kes()
        .await
        .map_err(|e| AppError::Rail(e.to_string()))?;
    let amount = convert_usd_to_kes(plan.price_usd(), rate);

    Ok(Json(SubscriptionCheckoutResponse {
        ok: true,
        subscription_id: sub.id,
        amount,
        currency: Currency::Kes.as_str().to_string(),
        rate,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionPayRequest {
    pub subscription_id: Uuid,
    pub phone: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionPayResponse {
    pub ok: bool,
    pub reference: Option<String>,
}

/// Prices the owned subscription in KES and hands off to the push rail.
/// The ledger row carries the subscription link the reconciler needs to
/// activate the plan when the payment completes.
pub async fn pay(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<SubscriptionPayRequest>,
) -> Result<impl IntoResponse, AppError> {
    principal.require_role(Role::Writer)?;

    if payload.phone.is_empty() {
        return Err(AppError::Validation(
            "subscriptionId and phone required".to_string(),
        ));
    }

    let sub = queries::get_subscription_owned(&state.db, payload.subscription_id, principal.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;

    let plan = SubscriptionPlan::parse(&sub.plan)
        .ok_or_else(|| AppError::Validation("Invalid plan".to_string()))?;

    let rate = state
        .rates
        .usd_to_kes()
        .await
        .map_err(|e| AppError::Rail(e.to_string()))?;
    let amount_kes = convert_usd_to_kes(plan.price_usd(), rate);

    if amount_kes < MIN_PUSH_AMOUNT_KES {
        return Err(AppError::Validation(format!(
            "Minimum amount is KES {MIN_PUSH_AMOUNT_KES}"
        )));
    }

    let amount = BigDecimal::from(amount_kes);
    let fx = FxQuote {
        usd_amount: plan.price_usd(),
        usd_to_kes: rate,
    };
    let meta = TransactionMeta::SubscriptionPush {
        subscription_id: sub.id,
        fx: Some(fx),
        acknowledgement: None,
    };

    let txn = Transaction::new(
        principal.account_id,
        TransactionKind::Subscription,
        amount.clone(),
        Currency::Kes,
        Some(meta.to_value()),
    );
    let txn = queries::insert_transaction(&state.db, &txn).await?;

    let ack = state
        .mpesa
        .push(&payload.phone, &amount)
        .await
        .map_err(|e| {
            tracing::warn!(txn_id = %txn.id, subscription_id = %sub.id, "STK push failed: {e}");
            AppError::Rail(e.to_string())
        })?;

    let meta = TransactionMeta::SubscriptionPush {
        subscription_id: sub.id,
        fx: Some(fx),
        acknowledgement: Some(ack.raw),
    };
    queries::set_reference(&state.db, txn.id, ack.reference.as_deref(), Some(meta.to_value()))
        .await?;

    tracing::info!(
        txn_id = %txn.id,
        subscription_id = %sub.id,
        amount = amount_kes,
        "subscription payment initiated"
    );

    Ok(Json(SubscriptionPayResponse {
        ok: true,
        reference: ack.reference,
    }))
}
