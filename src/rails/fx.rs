//! USD→KES exchange rates.
//! Live lookup behind a circuit breaker, with a configured constant as the
//! fallback when the source is unreachable or reports garbage.

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config, Error as FailsafeError, StateMachine, backoff, failure_policy};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid exchange rate response")]
    InvalidResponse,
    #[error("rate source unavailable and no fallback rate configured")]
    Unavailable,
}

/// Exchange-rate client. A flapping rate source trips the breaker and the
/// configured fallback takes over until the source recovers.
#[derive(Clone)]
pub struct RateClient {
    client: Client,
    url: String,
    fallback_rate: Option<f64>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl RateClient {
    pub fn new(url: String, fallback_rate: Option<f64>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        RateClient {
            client,
            url,
            fallback_rate,
            circuit_breaker,
        }
    }

    /// Current USD→KES rate. Lookup failures and open-circuit rejections
    /// both fall back to the configured constant; with no fallback
    /// configured the failure propagates.
    pub async fn usd_to_kes(&self) -> Result<f64, RateError> {
        match self.circuit_breaker.call(self.fetch_rate()).await {
            Ok(rate) => Ok(rate),
            Err(err) => {
                match &err {
                    FailsafeError::Inner(inner) => {
                        tracing::warn!("exchange rate lookup failed: {inner}");
                    }
                    FailsafeError::Rejected => {
                        tracing::warn!("exchange rate circuit open, using fallback");
                    }
                }
                self.fallback_rate.ok_or(RateError::Unavailable)
            }
        }
    }

    async fn fetch_rate(&self) -> Result<f64, RateError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(RateError::InvalidResponse);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| RateError::InvalidResponse)?;
        let rate = body
            .pointer("/rates/KES")
            .and_then(Value::as_f64)
            .unwrap_or(f64::NAN);

        if !rate.is_finite() || rate <= 0.0 {
            return Err(RateError::InvalidResponse);
        }

        Ok(rate)
    }
}

/// Plan prices are quoted in USD; wallets run on whole KES. Conversion
/// rounds to the nearest shilling and clamps at zero, and any non-finite
/// input yields zero rather than poisoning the ledger.
pub fn convert_usd_to_kes(amount_usd: f64, rate: f64) -> i64 {
    if !amount_usd.is_finite() || !rate.is_finite() {
        return 0;
    }
    (amount_usd * rate).round().max(0.0) as i64
}
