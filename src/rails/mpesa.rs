//! Mobile push-payment rail (STK push).

use bigdecimal::{BigDecimal, ToPrimitive};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MpesaError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("STK push failed: {0}")]
    Rejected(String),
    #[error("amount is not representable: {0}")]
    BadAmount(BigDecimal),
}

/// Acceptance payload returned by the push endpoint. The provider's own
/// transaction id becomes the ledger reference; some tenants return it in
/// camelCase, some in snake_case.
#[derive(Debug, Clone)]
pub struct PushAck {
    pub reference: Option<String>,
    pub raw: Value,
}

/// HTTP client for the STK push API.
#[derive(Clone)]
pub struct MpesaClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MpesaClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        MpesaClient {
            client,
            base_url,
            api_key,
        }
    }

    /// Initiates a push payment prompt on the customer's phone. The actual
    /// outcome arrives later over the webhook; this only hands off.
    pub async fn push(&self, phone: &str, amount: &BigDecimal) -> Result<PushAck, MpesaError> {
        let numeric_amount = amount
            .to_f64()
            .ok_or_else(|| MpesaError::BadAmount(amount.clone()))?;

        let response = self
            .client
            .post(format!("{}/v1/transactions/push-stk", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&json!({ "phone": phone, "amount": numeric_amount }))
            .send()
            .await?;

        let status = response.status();
        let raw: Value = response.json().await.unwrap_or_else(|_| json!({}));

        if !status.is_success() {
            let message = raw
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("STK push failed")
                .to_string();
            return Err(MpesaError::Rejected(message));
        }

        let reference = raw
            .pointer("/data/transactionId")
            .or_else(|| raw.pointer("/data/transaction_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(PushAck { reference, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_returns_camel_case_reference() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/transactions/push-stk")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"transactionId":"LP-123"}}"#)
            .create_async()
            .await;

        let client = MpesaClient::new(server.url(), "test-key".to_string());
        let ack = client
            .push("254700000000", &BigDecimal::from(500))
            .await
            .expect("push accepted");

        assert_eq!(ack.reference.as_deref(), Some("LP-123"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn push_returns_snake_case_reference() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transactions/push-stk")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"transaction_id":"LP-456"}}"#)
            .create_async()
            .await;

        let client = MpesaClient::new(server.url(), "test-key".to_string());
        let ack = client
            .push("254700000000", &BigDecimal::from(500))
            .await
            .expect("push accepted");

        assert_eq!(ack.reference.as_deref(), Some("LP-456"));
    }

    #[tokio::test]
    async fn push_rejection_carries_provider_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transactions/push-stk")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Invalid phone number"}"#)
            .create_async()
            .await;

        let client = MpesaClient::new(server.url(), "test-key".to_string());
        let err = client
            .push("bogus", &BigDecimal::from(500))
            .await
            .expect_err("push rejected");

        match err {
            MpesaError::Rejected(message) => assert_eq!(message, "Invalid phone number"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn acceptance_without_reference_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/transactions/push-stk")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{}}"#)
            .create_async()
            .await;

        let client = MpesaClient::new(server.url(), "test-key".to_string());
        let ack = client
            .push("254700000000", &BigDecimal::from(500))
            .await
            .expect("push accepted");

        assert!(ack.reference.is_none());
    }
}
