//! SQLite-backed implementation of the core data-store contract.
//!
//! The transfer path runs as one transaction with a conditional sender
//! decrement, so the quota stays consistent even when the caller's earlier
//! read-then-validate check has gone stale under concurrent triggers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use bravocado_core::domain::account::{AccountId, AccountProfile};
use bravocado_core::store::{LeaderboardEntry, QuotaStore, StoreError, TransactionRecord};

use crate::DbPool;

pub struct SqliteQuotaStore {
    pool: DbPool,
    daily_default: u32,
}

impl SqliteQuotaStore {
    pub fn new(pool: DbPool, daily_default: u32) -> Self {
        Self { pool, daily_default }
    }

    /// Full profile row, mainly for report collaborators and tests.
    pub async fn profile(&self, account: &AccountId) -> Result<Option<AccountProfile>, StoreError> {
        let row = sqlx::query(
            "SELECT id, given_count, received_count, remaining_daily FROM profiles WHERE id = ?",
        )
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| {
            Ok(AccountProfile {
                id: AccountId(row.try_get::<String, _>("id").map_err(backend)?),
                given_count: row.try_get("given_count").map_err(backend)?,
                received_count: row.try_get("received_count").map_err(backend)?,
                remaining_daily: read_balance(&row)?,
            })
        })
        .transpose()
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn read_balance(row: &sqlx::sqlite::SqliteRow) -> Result<u32, StoreError> {
    let raw: i64 = row.try_get("remaining_daily").map_err(backend)?;
    Ok(raw.max(0) as u32)
}

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| StoreError::Backend(format!("invalid created_at `{raw}`: {error}")))
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn remaining_daily(&self, account: &AccountId) -> Result<Option<u32>, StoreError> {
        let row = sqlx::query("SELECT remaining_daily FROM profiles WHERE id = ?")
            .bind(account.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|row| read_balance(&row)).transpose()
    }

    async fn execute_transfer(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        count: u32,
        message_text: &str,
        channel_id: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // First-time givers and receivers get a fresh profile row.
        for account in [sender, receiver] {
            sqlx::query(
                "INSERT INTO profiles (id, remaining_daily, created_at, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(account.as_str())
            .bind(self.daily_default)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        // The decrement is conditional on the balance still covering the
        // count; zero affected rows means the earlier validation read is
        // stale and the transfer must not happen.
        let debited = sqlx::query(
            "UPDATE profiles
             SET remaining_daily = remaining_daily - ?,
                 given_count = given_count + ?,
                 updated_at = ?
             WHERE id = ? AND remaining_daily >= ?",
        )
        .bind(count)
        .bind(count)
        .bind(&now)
        .bind(sender.as_str())
        .bind(count)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if debited.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Err(StoreError::BalanceConflict(sender.clone()));
        }

        sqlx::query(
            "UPDATE profiles SET received_count = received_count + ?, updated_at = ? WHERE id = ?",
        )
        .bind(count)
        .bind(&now)
        .bind(receiver.as_str())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        sqlx::query(
            "INSERT INTO transactions (sender_id, receiver_id, count, message_text, channel_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(sender.as_str())
        .bind(receiver.as_str())
        .bind(count)
        .bind(message_text)
        .bind(channel_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }

    async fn top_by_received(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, received_count AS count FROM profiles
             ORDER BY received_count DESC, id ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                Ok(LeaderboardEntry {
                    account: AccountId(row.try_get::<String, _>("id").map_err(backend)?),
                    count: row.try_get("count").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn top_by_given(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, given_count AS count FROM profiles
             ORDER BY given_count DESC, id ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                Ok(LeaderboardEntry {
                    account: AccountId(row.try_get::<String, _>("id").map_err(backend)?),
                    count: row.try_get("count").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn transactions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT sender_id, receiver_id, count, message_text, channel_id, created_at
             FROM transactions
             WHERE created_at >= ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let count: i64 = row.try_get("count").map_err(backend)?;
                let created_at: String = row.try_get("created_at").map_err(backend)?;
                Ok(TransactionRecord {
                    sender: AccountId(row.try_get::<String, _>("sender_id").map_err(backend)?),
                    receiver: AccountId(row.try_get::<String, _>("receiver_id").map_err(backend)?),
                    count: count.max(0) as u32,
                    message_text: row.try_get("message_text").map_err(backend)?,
                    channel_id: row.try_get("channel_id").map_err(backend)?,
                    created_at: parse_created_at(&created_at)?,
                })
            })
            .collect()
    }
}
