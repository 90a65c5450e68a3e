//! Card checkout rail (PayPal orders v2).

use bigdecimal::BigDecimal;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PayPalError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("PayPal token error: {0}")]
    Token(String),
    #[error("PayPal order error: {0}")]
    Order(String),
    #[error("order response missing approve link")]
    MissingApproveLink,
    #[error("PayPal capture failed")]
    CaptureDeclined(Value),
}

/// Created order: the processor's order id (our ledger reference) plus the
/// URL the buyer is redirected to for approval.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub id: String,
    pub approve_url: String,
    pub raw: Value,
}

/// HTTP client for the card processor. Tokens are short-lived, so each
/// operation performs its own client-credentials exchange.
#[derive(Clone)]
pub struct PayPalClient {
    client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl PayPalClient {
    pub fn new(base_url: String, client_id: String, client_secret: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        PayPalClient {
            client,
            base_url,
            client_id,
            client_secret,
        }
    }

    async fn access_token(&self) -> Result<String, PayPalError> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or_else(|_| json!({}));

        if !status.is_success() {
            let message = body
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or("PayPal token error")
                .to_string();
            return Err(PayPalError::Token(message));
        }

        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PayPalError::Token("missing access_token".to_string()))
    }

    /// Creates a CAPTURE-intent order carrying our internal transaction id
    /// as `custom_id`, and returns the buyer approval URL.
    pub async fn create_order(
        &self,
        amount: &BigDecimal,
        currency: &str,
        custom_id: Uuid,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<CreatedOrder, PayPalError> {
        let token = self.access_token().await?;

        let order = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": custom_id.to_string(),
                "amount": {
                    "currency_code": currency,
                    "value": amount.to_string(),
                },
            }],
            "application_context": {
                "return_url": return_url,
                "cancel_url": cancel_url,
            },
        });

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(token)
            .json(&order)
            .send()
            .await?;

        let status = response.status();
        let raw: Value = response.json().await.unwrap_or_else(|_| json!({}));

        if !status.is_success() {
            let message = raw
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("PayPal order error")
                .to_string();
            return Err(PayPalError::Order(message));
        }

        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PayPalError::Order("missing order id".to_string()))?;

        let approve_url = raw
            .get("links")
            .and_then(Value::as_array)
            .and_then(|links| {
                links
                    .iter()
                    .find(|link| link.get("rel").and_then(Value::as_str) == Some("approve"))
            })
            .and_then(|link| link.get("href"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(PayPalError::MissingApproveLink)?;

        Ok(CreatedOrder {
            id,
            approve_url,
            raw,
        })
    }

    /// Finalizes an approved order. Declines surface the raw capture payload
    /// so the caller can record it on the ledger row.
    pub async fn capture_order(&self, order_id: &str) -> Result<Value, PayPalError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.base_url, order_id
            ))
            .bearer_auth(token)
            .header("content-type", "application/json")
            .send()
            .await?;

        let status = response.status();
        let raw: Value = response.json().await.unwrap_or_else(|_| json!({}));

        if !status.is_success() {
            return Err(PayPalError::CaptureDeclined(raw));
        }

        Ok(raw)
    }
}
