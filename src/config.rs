use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub public_base_url: String,
    pub mpesa_api_url: String,
    pub mpesa_api_key: String,
    pub mpesa_webhook_secret: Option<String>,
    pub paypal_api_url: String,
    pub paypal_client_id: String,
    pub paypal_client_secret: String,
    pub exchange_rate_url: String,
    pub usd_kes_fallback_rate: Option<f64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        // PAYPAL_API_URL wins; otherwise PAYPAL_ENV picks the live or
        // sandbox endpoint.
        let paypal_api_url = match env::var("PAYPAL_API_URL") {
            Ok(url) => url,
            Err(_) => match env::var("PAYPAL_ENV").as_deref() {
                Ok("production") => "https://api-m.paypal.com".to_string(),
                _ => "https://api-m.sandbox.paypal.com".to_string(),
            },
        };

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mpesa_api_url: env::var("MPESA_API_URL")
                .unwrap_or_else(|_| "https://api.lipana.dev".to_string()),
            mpesa_api_key: env::var("MPESA_API_KEY")?,
            mpesa_webhook_secret: env::var("MPESA_WEBHOOK_SECRET").ok(),
            paypal_api_url,
            paypal_client_id: env::var("PAYPAL_CLIENT_ID")?,
            paypal_client_secret: env::var("PAYPAL_CLIENT_SECRET")?,
            exchange_rate_url: env::var("EXCHANGE_RATE_URL")
                .unwrap_or_else(|_| "https://open.er-api.com/v6/latest/USD".to_string()),
            usd_kes_fallback_rate: env::var("USD_KES_FALLBACK_RATE")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|rate| rate.is_finite() && *rate > 0.0),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }

        for (name, value) in [
            ("PUBLIC_BASE_URL", &self.public_base_url),
            ("MPESA_API_URL", &self.mpesa_api_url),
            ("PAYPAL_API_URL", &self.paypal_api_url),
            ("EXCHANGE_RATE_URL", &self.exchange_rate_url),
        ] {
            url::Url::parse(value).with_context(|| format!("{name} is not a valid URL"))?;
        }

        Ok(())
    }
}
