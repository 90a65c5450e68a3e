use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::domain::{Currency, SubscriptionPlan, TransactionKind, TransactionStatus};

/// One attempted money movement. Append-mostly: rows are created `pending`
/// and only ever change status, reference and metadata.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    /// The rail's own transaction id; assigned once the rail accepts the
    /// hand-off. Callbacks echo this, never our internal id.
    pub reference: Option<String>,
    /// Last status string the rail literally reported, before
    /// normalization.
    pub reported_status: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        kind: TransactionKind,
        amount: BigDecimal,
        currency: Currency,
        meta: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.as_str().to_string(),
            amount,
            currency: currency.as_str().to_string(),
            status: TransactionStatus::Pending.as_str().to_string(),
            reference: None,
            reported_status: None,
            meta,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::parse(&self.status)
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        TransactionKind::parse(&self.kind)
    }
}

/// Running balance per account. Mutated only by reconciliation credits and
/// payout-approval debits.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: Uuid,
    pub balance: BigDecimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Zero-balance default returned when no row exists yet.
    pub fn empty(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: BigDecimal::from(0),
            currency: Currency::Kes.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A writer's plan purchase. Inactive until a linked subscription payment
/// completes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub writer_id: Uuid,
    pub plan: String,
    pub tasks_per_day: i32,
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(writer_id: Uuid, plan: SubscriptionPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            writer_id,
            plan: plan.as_str().to_string(),
            tasks_per_day: plan.tasks_per_day(),
            active: false,
            starts_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transactions_start_pending() {
        let txn = Transaction::new(
            Uuid::new_v4(),
            TransactionKind::Topup,
            BigDecimal::from(500),
            Currency::Kes,
            None,
        );
        assert_eq!(txn.status(), TransactionStatus::Pending);
        assert_eq!(txn.kind(), Some(TransactionKind::Topup));
        assert!(txn.reference.is_none());
    }

    #[test]
    fn new_subscriptions_start_inactive() {
        let sub = Subscription::new(Uuid::new_v4(), SubscriptionPlan::Standard);
        assert!(!sub.active);
        assert!(sub.starts_at.is_none());
        assert_eq!(sub.tasks_per_day, 15);
    }

    #[test]
    fn empty_wallet_has_zero_balance() {
        let wallet = Wallet::empty(Uuid::new_v4());
        assert_eq!(wallet.balance, BigDecimal::from(0));
        assert_eq!(wallet.currency, "KES");
    }
}
