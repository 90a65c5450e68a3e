//! Typed transaction metadata.
//! Each ledger row carries a tagged payload instead of a free-form JSON bag,
//! so the reconciler can read the subscription link without probing keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Exchange-rate snapshot taken when a subscription payment was priced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FxQuote {
    pub usd_amount: f64,
    pub usd_to_kes: f64,
}

/// Rail-specific payload stored on a transaction, tagged by where the money
/// movement originated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TransactionMeta {
    /// STK push top-up; holds the provider's acceptance payload.
    MpesaPush {
        #[serde(default)]
        acknowledgement: Value,
    },
    /// Card checkout; the order payload at creation, the capture payload
    /// once the order was finalized or declined.
    CardOrder {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capture: Option<Value>,
    },
    /// Subscription payment over the push rail, linked to the plan record it
    /// activates on completion.
    SubscriptionPush {
        subscription_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fx: Option<FxQuote>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        acknowledgement: Option<Value>,
    },
    /// Withdrawal request; the destination the writer asked to be paid to.
    PayoutRequest { phone: String },
}

impl TransactionMeta {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// The subscription a completing payment should activate, if any.
    pub fn subscription_id(&self) -> Option<Uuid> {
        match self {
            TransactionMeta::SubscriptionPush {
                subscription_id, ..
            } => Some(*subscription_id),
            _ => None,
        }
    }
}
