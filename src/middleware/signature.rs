//! Webhook signature verification.
//! Extractor that yields the raw callback body after HMAC-SHA256
//! verification against the shared rail secret.

use axum::{
    async_trait,
    body::to_bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-mpesa-signature";

/// Raw webhook body, verified when verification applies.
///
/// The rail signs the exact bytes it sends, so verification must happen on
/// the raw body before any JSON decoding. It runs only when both a shared
/// secret is configured and the signature header is present; a mismatch
/// rejects the request before any ledger lookup.
pub struct VerifiedWebhook {
    pub body: Vec<u8>,
}

impl VerifiedWebhook {
    /// Constant-time signature check; the hex header is the rail's
    /// HMAC-SHA256 digest of the body.
    pub fn verify_signature(
        secret: &str,
        body: &[u8],
        signature_header: &str,
    ) -> Result<(), WebhookAuthError> {
        let expected = hex::decode(signature_header)
            .map_err(|_| WebhookAuthError::InvalidSignatureFormat)?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| WebhookAuthError::InvalidSecret)?;
        mac.update(body);

        // verify_slice compares in constant time
        mac.verify_slice(&expected)
            .map_err(|_| WebhookAuthError::SignatureMismatch)?;

        Ok(())
    }
}

#[async_trait]
impl FromRequest<AppState> for VerifiedWebhook {
    type Rejection = WebhookAuthError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = to_bytes(req.into_body(), usize::MAX)
            .await
            .map_err(|_| WebhookAuthError::BodyReadError)?
            .to_vec();

        if let (Some(secret), Some(signature)) = (
            state.config.mpesa_webhook_secret.as_deref(),
            signature.as_deref(),
        ) {
            Self::verify_signature(secret, &body, signature)?;
        }

        Ok(VerifiedWebhook { body })
    }
}

#[derive(Debug)]
pub enum WebhookAuthError {
    InvalidSignatureFormat,
    InvalidSecret,
    SignatureMismatch,
    BodyReadError,
}

impl IntoResponse for WebhookAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebhookAuthError::InvalidSignatureFormat => {
                (StatusCode::UNAUTHORIZED, "Invalid signature format")
            }
            WebhookAuthError::InvalidSecret => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid webhook secret configuration",
            ),
            WebhookAuthError::SignatureMismatch => {
                (StatusCode::UNAUTHORIZED, "Invalid signature")
            }
            WebhookAuthError::BodyReadError => {
                (StatusCode::BAD_REQUEST, "Failed to read request body")
            }
        };

        tracing::warn!("Webhook authentication failed: {:?}", self);
        (status, message).into_response()
    }
}
