//! Data store contract. The store owns account counters and the append-only
//! transaction log; the core only reads balances and requests atomic
//! transfers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::account::AccountId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The conditional balance decrement found less than the requested count
    /// at write time. Expected under concurrent triggers from one sender.
    #[error("balance check failed at write time for {0}")]
    BalanceConflict(AccountId),
    #[error("data store failure: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub account: AccountId,
    pub count: i64,
}

/// One completed transfer as recorded by the store. Append-only; consumed by
/// report collaborators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub count: u32,
    pub message_text: String,
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Remaining daily balance, `None` when no profile row exists yet. The
    /// quota validator applies the configured default in that case.
    async fn remaining_daily(&self, account: &AccountId) -> Result<Option<u32>, StoreError>;

    /// In one atomic step: re-checks and decrements the sender's remaining
    /// balance by `count`, increments the sender's given and the receiver's
    /// received counters, and appends a transaction record.
    async fn execute_transfer(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        count: u32,
        message_text: &str,
        channel_id: &str,
    ) -> Result<(), StoreError>;

    async fn top_by_received(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError>;

    async fn top_by_given(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError>;

    async fn transactions_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// Store used for default wiring before a database is attached: reads see no
/// profiles and transfers are refused.
#[derive(Default)]
pub struct NoopQuotaStore;

#[async_trait]
impl QuotaStore for NoopQuotaStore {
    async fn remaining_daily(&self, _account: &AccountId) -> Result<Option<u32>, StoreError> {
        Ok(None)
    }

    async fn execute_transfer(
        &self,
        _sender: &AccountId,
        _receiver: &AccountId,
        _count: u32,
        _message_text: &str,
        _channel_id: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("no data store configured".to_owned()))
    }

    async fn top_by_received(&self, _limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
        Ok(Vec::new())
    }

    async fn top_by_given(&self, _limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
        Ok(Vec::new())
    }

    async fn transactions_since(
        &self,
        _since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(Vec::new())
    }
}
