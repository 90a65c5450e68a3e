//! End-to-end reconciliation scenarios against Postgres.
//!
//! These tests need a running database. Provide DATABASE_URL and run with:
//!     cargo test -- --ignored

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use std::path::Path;
use uuid::Uuid;

use marketpay_core::db::models::{Subscription, Transaction};
use marketpay_core::db::queries;
use marketpay_core::domain::{
    Currency, SubscriptionPlan, TransactionKind, TransactionMeta, TransactionStatus,
    normalize_outcome,
};
use marketpay_core::services::{Reconciler, Reconciliation};

async fn setup_test_db() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    let migrator = Migrator::new(Path::new("./migrations"))
        .await
        .expect("Failed to load migrations");
    migrator
        .run(&pool)
        .await
        .expect("Failed to run migrations on test DB");
    pool
}

async fn insert_pending_topup(
    pool: &PgPool,
    user_id: Uuid,
    amount: i64,
    reference: &str,
) -> Transaction {
    let mut txn = Transaction::new(
        user_id,
        TransactionKind::Topup,
        BigDecimal::from(amount),
        Currency::Kes,
        None,
    );
    txn.reference = Some(reference.to_string());
    queries::insert_transaction(pool, &txn)
        .await
        .expect("Failed to insert transaction")
}

fn unique_reference(tag: &str) -> String {
    format!("{tag}-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore] // requires Postgres
async fn completed_callback_credits_wallet_once() {
    // Scenario: push top-up for 500 KES, then the rail reports success.
    let pool = setup_test_db().await;
    let reconciler = Reconciler::new(pool.clone());
    let user_id = Uuid::new_v4();
    let reference = unique_reference("stk");

    let txn = insert_pending_topup(&pool, user_id, 500, &reference).await;

    let reported = normalize_outcome(Some("stk_callback"), Some("Success"));
    let outcome = reconciler
        .apply(&reference, reported, Some("Success"), None)
        .await
        .expect("reconciliation applies");
    assert!(matches!(outcome, Reconciliation::Credited(_)));

    let stored = queries::find_by_reference(&pool, &reference)
        .await
        .expect("lookup works")
        .expect("transaction exists");
    assert_eq!(stored.status(), TransactionStatus::Completed);
    assert_eq!(stored.id, txn.id);

    let wallet = queries::get_wallet(&pool, user_id)
        .await
        .expect("wallet lookup works")
        .expect("wallet created on first credit");
    assert_eq!(wallet.balance, BigDecimal::from(500));
}

#[tokio::test]
#[ignore] // requires Postgres
async fn duplicate_completions_credit_only_once() {
    let pool = setup_test_db().await;
    let reconciler = Reconciler::new(pool.clone());
    let user_id = Uuid::new_v4();
    let reference = unique_reference("stk");

    insert_pending_topup(&pool, user_id, 500, &reference).await;

    for _ in 0..3 {
        reconciler
            .apply(&reference, TransactionStatus::Completed, Some("Success"), None)
            .await
            .expect("reconciliation applies");
    }

    let wallet = queries::get_wallet(&pool, user_id)
        .await
        .expect("wallet lookup works")
        .expect("wallet exists");
    assert_eq!(wallet.balance, BigDecimal::from(500), "credited exactly once");
}

#[tokio::test]
#[ignore] // requires Postgres
async fn concurrent_deliveries_credit_only_once() {
    let pool = setup_test_db().await;
    let user_id = Uuid::new_v4();
    let reference = unique_reference("stk");

    insert_pending_topup(&pool, user_id, 250, &reference).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let reconciler = Reconciler::new(pool.clone());
        let reference = reference.clone();
        handles.push(tokio::spawn(async move {
            reconciler
                .apply(&reference, TransactionStatus::Completed, Some("Success"), None)
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("task ran").expect("reconciliation applies");
    }

    let wallet = queries::get_wallet(&pool, user_id)
        .await
        .expect("wallet lookup works")
        .expect("wallet exists");
    assert_eq!(wallet.balance, BigDecimal::from(250));
}

#[tokio::test]
#[ignore] // requires Postgres
async fn completed_subscription_payment_activates_plan() {
    let pool = setup_test_db().await;
    let reconciler = Reconciler::new(pool.clone());
    let writer_id = Uuid::new_v4();
    let reference = unique_reference("sub");

    let sub = Subscription::new(writer_id, SubscriptionPlan::Basic);
    let sub = queries::insert_subscription(&pool, &sub)
        .await
        .expect("Failed to insert subscription");
    assert!(!sub.active);

    let meta = TransactionMeta::SubscriptionPush {
        subscription_id: sub.id,
        fx: None,
        acknowledgement: None,
    };
    let mut txn = Transaction::new(
        writer_id,
        TransactionKind::Subscription,
        BigDecimal::from(650),
        Currency::Kes,
        Some(meta.to_value()),
    );
    txn.reference = Some(reference.clone());
    queries::insert_transaction(&pool, &txn)
        .await
        .expect("Failed to insert transaction");

    reconciler
        .apply(&reference, TransactionStatus::Completed, Some("Success"), None)
        .await
        .expect("reconciliation applies");

    let activated = queries::get_subscription_owned(&pool, sub.id, writer_id)
        .await
        .expect("lookup works")
        .expect("subscription exists");
    assert!(activated.active);
    assert!(activated.starts_at.is_some());

    // An unrelated top-up completing must not touch the subscription.
    let other_reference = unique_reference("stk");
    insert_pending_topup(&pool, writer_id, 100, &other_reference).await;
    reconciler
        .apply(&other_reference, TransactionStatus::Completed, None, None)
        .await
        .expect("reconciliation applies");

    let after = queries::get_subscription_owned(&pool, sub.id, writer_id)
        .await
        .expect("lookup works")
        .expect("subscription exists");
    assert_eq!(after.starts_at, activated.starts_at);
}

#[tokio::test]
#[ignore] // requires Postgres
async fn failed_capture_marks_transaction_without_credit() {
    let pool = setup_test_db().await;
    let user_id = Uuid::new_v4();
    let reference = unique_reference("order");

    insert_pending_topup(&pool, user_id, 25, &reference).await;

    let meta = TransactionMeta::CardOrder {
        order: None,
        capture: Some(serde_json::json!({"name": "UNPROCESSABLE_ENTITY"})),
    };
    let failed = queries::mark_failed_by_reference(&pool, &reference, Some(meta.to_value()))
        .await
        .expect("update works")
        .expect("transaction exists");
    assert_eq!(failed.status(), TransactionStatus::Failed);

    let wallet = queries::get_wallet(&pool, user_id)
        .await
        .expect("wallet lookup works");
    assert!(wallet.is_none(), "wallet untouched by a failed capture");
}

#[tokio::test]
#[ignore] // requires Postgres
async fn unknown_reference_acknowledges_without_side_effects() {
    let pool = setup_test_db().await;
    let reconciler = Reconciler::new(pool.clone());
    let reference = unique_reference("ghost");

    let outcome = reconciler
        .apply(&reference, TransactionStatus::Completed, Some("Success"), None)
        .await
        .expect("reconciliation applies");
    assert!(matches!(outcome, Reconciliation::UnknownReference));

    let txn = queries::find_by_reference(&pool, &reference)
        .await
        .expect("lookup works");
    assert!(txn.is_none());
}

#[tokio::test]
#[ignore] // requires Postgres
async fn payout_approval_debits_wallet_and_refuses_overdraft() {
    let pool = setup_test_db().await;
    let reconciler = Reconciler::new(pool.clone());
    let writer_id = Uuid::new_v4();

    // Fund the wallet through the normal credit path.
    let topup_reference = unique_reference("stk");
    insert_pending_topup(&pool, writer_id, 1000, &topup_reference).await;
    reconciler
        .apply(&topup_reference, TransactionStatus::Completed, None, None)
        .await
        .expect("reconciliation applies");

    let meta = TransactionMeta::PayoutRequest {
        phone: "254700000000".to_string(),
    };
    let payout = Transaction::new(
        writer_id,
        TransactionKind::Payout,
        BigDecimal::from(400),
        Currency::Kes,
        Some(meta.to_value()),
    );
    let payout = queries::insert_transaction(&pool, &payout)
        .await
        .expect("Failed to insert payout");

    let mut db = pool.begin().await.expect("begin works");
    let locked = queries::get_payout_for_update(&mut db, payout.id)
        .await
        .expect("lookup works")
        .expect("payout exists");
    let debited = queries::debit_wallet(&mut db, locked.user_id, &locked.amount)
        .await
        .expect("debit works")
        .expect("balance sufficient");
    queries::update_status(
        &mut db,
        locked.id,
        TransactionStatus::Completed.as_str(),
        None,
        None,
    )
    .await
    .expect("status update works");
    db.commit().await.expect("commit works");

    assert_eq!(debited.balance, BigDecimal::from(600));

    // Overdraft refused: a second debit of 700 exceeds the remaining 600.
    let mut db = pool.begin().await.expect("begin works");
    let refused = queries::debit_wallet(&mut db, writer_id, &BigDecimal::from(700))
        .await
        .expect("debit works");
    assert!(refused.is_none());
    db.rollback().await.expect("rollback works");
}
