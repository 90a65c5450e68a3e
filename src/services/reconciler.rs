//! Reconciliation.
//! Applies a rail-reported outcome to the ledger: one status transition and,
//! at most once per transaction, the wallet credit and any subscription
//! activation. Both the asynchronous webhook and the synchronous card
//! capture land here so the same guard covers every delivery path.

use sqlx::PgPool;

use crate::db::models::Transaction;
use crate::db::queries;
use crate::domain::{TransactionKind, TransactionMeta, TransactionStatus};
use crate::error::AppError;

/// What applying an outcome did.
#[derive(Debug)]
pub enum Reconciliation {
    /// No ledger entry matches the rail reference. Acknowledged without any
    /// mutation so the rail stops retrying.
    UnknownReference,
    /// Status recorded (or already current); nothing became creditable.
    Recorded(Transaction),
    /// The transaction just completed: wallet credited, side effects done.
    Credited(Transaction),
}

/// What an inbound outcome means for a ledger row. Pure, so the idempotence
/// law is testable without a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub persist_status: bool,
    pub should_credit: bool,
    pub activate_subscription: bool,
}

/// `completed` is sticky: once a row has been credited no later delivery may
/// move it, which is what makes at-least-once webhook delivery safe to apply
/// at-most-once to the wallet. Payouts represent outbound money and are
/// never credited by inbound reconciliation.
pub fn decide(
    kind: Option<TransactionKind>,
    stored: TransactionStatus,
    reported: TransactionStatus,
) -> Decision {
    let was_completed = stored == TransactionStatus::Completed;
    let creditable_kind = matches!(
        kind,
        Some(TransactionKind::Topup) | Some(TransactionKind::Subscription)
    );
    let should_credit =
        reported == TransactionStatus::Completed && !was_completed && creditable_kind;

    Decision {
        persist_status: reported != stored && !was_completed,
        should_credit,
        activate_subscription: should_credit && kind == Some(TransactionKind::Subscription),
    }
}

#[derive(Clone)]
pub struct Reconciler {
    pool: PgPool,
}

impl Reconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies `reported` to the transaction behind `reference`.
    ///
    /// The ledger row is locked for the duration, so concurrent deliveries
    /// for the same reference serialize, and the status write, wallet
    /// credit and subscription activation commit together or not at all.
    /// `raw_status` is the rail's literal wording; `meta`, when given,
    /// replaces the stored payload alongside the status write.
    pub async fn apply(
        &self,
        reference: &str,
        reported: TransactionStatus,
        raw_status: Option<&str>,
        meta: Option<serde_json::Value>,
    ) -> Result<Reconciliation, AppError> {
        let mut db = self.pool.begin().await?;

        let Some(txn) = queries::find_by_reference_for_update(&mut db, reference).await? else {
            db.rollback().await?;
            return Ok(Reconciliation::UnknownReference);
        };

        let decision = decide(txn.kind(), txn.status(), reported);

        if decision.persist_status {
            queries::update_status(&mut db, txn.id, reported.as_str(), raw_status, meta).await?;
        }

        if !decision.should_credit {
            db.commit().await?;
            return Ok(Reconciliation::Recorded(txn));
        }

        let wallet =
            queries::credit_wallet(&mut db, txn.user_id, &txn.amount, &txn.currency).await?;

        if decision.activate_subscription {
            let subscription_id = txn
                .meta
                .as_ref()
                .and_then(TransactionMeta::from_value)
                .and_then(|meta| meta.subscription_id());

            match subscription_id {
                Some(subscription_id) => {
                    queries::activate_subscription(&mut db, subscription_id).await?;
                    tracing::info!(%subscription_id, txn_id = %txn.id, "subscription activated");
                }
                None => {
                    tracing::warn!(
                        txn_id = %txn.id,
                        "subscription transaction completed without a linked subscription"
                    );
                }
            }
        }

        db.commit().await?;
        tracing::info!(
            txn_id = %txn.id,
            user_id = %txn.user_id,
            amount = %txn.amount,
            balance = %wallet.balance,
            "wallet credited"
        );

        Ok(Reconciliation::Credited(txn))
    }
}
