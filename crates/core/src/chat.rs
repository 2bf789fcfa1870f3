//! Messaging collaborator contract. The platform is an opaque channel: the
//! core posts text, fetches reacted-to messages, and asks whether an account
//! is automated. Implementations live outside this crate.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::account::AccountId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message delivery failed: {0}")]
    Delivery(String),
}

/// Failure of a best-effort read (message fetch, account classification).
/// Never surfaced to end users; call sites either abort silently or fail
/// open, per their documented policy.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup target not found")]
    NotFound,
    #[error("lookup failed: {0}")]
    Unavailable(String),
}

/// A message resolved by [`ChatGateway::fetch_message`]. `author` is absent
/// for messages posted by integrations rather than members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedMessage {
    pub author: Option<AccountId>,
    pub text: String,
    pub ts: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountClass {
    pub automated: bool,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn post_direct_message(&self, account: &AccountId, text: &str) -> Result<(), ChatError>;

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        account: &AccountId,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), ChatError>;

    /// Resolves a message by channel and timestamp, whether it is a top-level
    /// message or a threaded reply. `Ok(None)` means the message could not be
    /// resolved (deleted, permission-restricted).
    async fn fetch_message(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<FetchedMessage>, LookupError>;

    async fn classify_account(&self, account: &AccountId) -> Result<AccountClass, LookupError>;
}

/// Inert gateway used for default wiring and tests: posts succeed without
/// delivering, fetches resolve nothing, every account is human.
#[derive(Default)]
pub struct NoopChatGateway;

#[async_trait]
impl ChatGateway for NoopChatGateway {
    async fn post_direct_message(&self, _account: &AccountId, _text: &str) -> Result<(), ChatError> {
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        _channel_id: &str,
        _account: &AccountId,
        _text: &str,
        _thread_ts: Option<&str>,
    ) -> Result<(), ChatError> {
        Ok(())
    }

    async fn fetch_message(
        &self,
        _channel_id: &str,
        _ts: &str,
    ) -> Result<Option<FetchedMessage>, LookupError> {
        Ok(None)
    }

    async fn classify_account(&self, _account: &AccountId) -> Result<AccountClass, LookupError> {
        Ok(AccountClass { automated: false })
    }
}
