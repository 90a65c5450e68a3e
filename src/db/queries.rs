use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{Subscription, Transaction, Wallet};

// --- Transaction queries ---

pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, user_id, kind, amount, currency, status,
            reference, reported_status, meta, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(&tx.kind)
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(&tx.status)
    .bind(&tx.reference)
    .bind(&tx.reported_status)
    .bind(&tx.meta)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn find_by_reference(pool: &PgPool, reference: &str) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(pool)
        .await
}

/// Reference lookup with a row lock, so concurrent deliveries for the same
/// rail reference serialize on the ledger row.
pub async fn find_by_reference_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    reference: &str,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE reference = $1 FOR UPDATE")
        .bind(reference)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn get_payout_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 AND kind = 'payout' FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

/// Stores the rail-assigned reference (and the acceptance payload) after a
/// successful hand-off.
pub async fn set_reference(
    pool: &PgPool,
    id: Uuid,
    reference: Option<&str>,
    meta: Option<serde_json::Value>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET reference = $2, meta = COALESCE($3, meta), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(reference)
    .bind(meta)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    status: &str,
    reported_status: Option<&str>,
    meta: Option<serde_json::Value>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET status = $2,
            reported_status = COALESCE($3, reported_status),
            meta = COALESCE($4, meta),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(reported_status)
    .bind(meta)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

/// Marks the transaction behind a rail reference as failed, keeping the raw
/// decline payload for audit. Unknown references update nothing.
pub async fn mark_failed_by_reference(
    pool: &PgPool,
    reference: &str,
    meta: Option<serde_json::Value>,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = 'failed', meta = COALESCE($2, meta), updated_at = NOW()
        WHERE reference = $1
        RETURNING *
        "#,
    )
    .bind(reference)
    .bind(meta)
    .fetch_optional(pool)
    .await
}

pub async fn list_recent_transactions(pool: &PgPool, limit: i64) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

// --- Wallet queries ---

pub async fn get_wallet(pool: &PgPool, user_id: Uuid) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Adds `amount` to the account's balance, creating the wallet if needed.
/// The increment happens inside the database so concurrent credits cannot
/// lose updates; an existing wallet keeps its currency of record.
pub async fn credit_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    amount: &BigDecimal,
    currency: &str,
) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"
        INSERT INTO wallets (user_id, balance, currency)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE
        SET balance = wallets.balance + EXCLUDED.balance, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(currency)
    .fetch_one(&mut **executor)
    .await
}

/// Removes `amount` from the balance, refusing overdraft. Returns the
/// updated wallet, or None when the balance was insufficient (or the wallet
/// does not exist).
pub async fn debit_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    amount: &BigDecimal,
) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance = balance - $2, updated_at = NOW()
        WHERE user_id = $1 AND balance >= $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut **executor)
    .await
}

/// Provisions a zero-balance wallet on account approval. Existing wallets
/// are left untouched.
pub async fn ensure_wallet(pool: &PgPool, user_id: Uuid, currency: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wallets (user_id, balance, currency)
        VALUES ($1, 0, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(currency)
    .execute(pool)
    .await?;
    Ok(())
}

// --- Subscription queries ---

pub async fn insert_subscription(pool: &PgPool, sub: &Subscription) -> Result<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (id, writer_id, plan, tasks_per_day, active, starts_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(sub.id)
    .bind(sub.writer_id)
    .bind(&sub.plan)
    .bind(sub.tasks_per_day)
    .bind(sub.active)
    .bind(sub.starts_at)
    .bind(sub.created_at)
    .fetch_one(pool)
    .await
}

pub async fn get_subscription_owned(
    pool: &PgPool,
    id: Uuid,
    writer_id: Uuid,
) -> Result<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE id = $1 AND writer_id = $2",
    )
    .bind(id)
    .bind(writer_id)
    .fetch_optional(pool)
    .await
}

pub async fn activate_subscription(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<()> {
    sqlx::query("UPDATE subscriptions SET active = TRUE, starts_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut **executor)
        .await?;
    Ok(())
}
