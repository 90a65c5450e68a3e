//! Wallet read endpoint.

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::AppState;
use crate::db::{models::Wallet, queries};
use crate::error::AppError;
use crate::middleware::Principal;

/// Returns the caller's wallet; accounts that have never been credited see
/// a zero-balance default rather than an error.
pub async fn get_wallet(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, AppError> {
    principal.require_approved()?;

    let wallet = queries::get_wallet(&state.db, principal.account_id)
        .await?
        .unwrap_or_else(|| Wallet::empty(principal.account_id));

    Ok(Json(json!({ "wallet": wallet })))
}
