//! `ChatGateway` implementation over the Slack Web API.
//!
//! The wire client is abstracted behind [`SlackApi`]; the real HTTP
//! transport lives outside this repository. What belongs here is the Slack
//! semantics: DMs open on the user id, ephemeral replies may be threaded,
//! and resolving a reacted-to message may require a second lookup inside its
//! thread.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use bravocado_core::chat::{AccountClass, ChatError, ChatGateway, FetchedMessage, LookupError};
use bravocado_core::domain::account::AccountId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("slack api call failed: {0}")]
    Call(String),
}

/// One message as the history/replies endpoints return it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    pub ts: String,
    pub user: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawUser {
    pub id: String,
    pub is_bot: bool,
}

/// The handful of Web API methods the bot needs. `history_at` and
/// `replies_at` fetch at most one message at the given timestamp,
/// inclusive, mirroring `conversations.history` / `conversations.replies`
/// with `limit: 1`.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ApiError>;

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), ApiError>;

    async fn history_at(&self, channel: &str, latest_ts: &str) -> Result<Vec<RawMessage>, ApiError>;

    async fn replies_at(
        &self,
        channel: &str,
        thread_ts: &str,
        latest_ts: &str,
    ) -> Result<Vec<RawMessage>, ApiError>;

    async fn user_info(&self, user: &str) -> Result<Option<RawUser>, ApiError>;
}

/// Inert API used before real credentials are wired up: sends succeed
/// without delivering, lookups resolve nothing.
#[derive(Default)]
pub struct NoopSlackApi;

#[async_trait]
impl SlackApi for NoopSlackApi {
    async fn post_message(&self, _channel: &str, _text: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        _channel: &str,
        _user: &str,
        _text: &str,
        _thread_ts: Option<&str>,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn history_at(
        &self,
        _channel: &str,
        _latest_ts: &str,
    ) -> Result<Vec<RawMessage>, ApiError> {
        Ok(Vec::new())
    }

    async fn replies_at(
        &self,
        _channel: &str,
        _thread_ts: &str,
        _latest_ts: &str,
    ) -> Result<Vec<RawMessage>, ApiError> {
        Ok(Vec::new())
    }

    async fn user_info(&self, _user: &str) -> Result<Option<RawUser>, ApiError> {
        Ok(None)
    }
}

pub struct SlackChatGateway {
    api: Arc<dyn SlackApi>,
}

impl SlackChatGateway {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api }
    }
}

fn to_fetched(message: RawMessage) -> FetchedMessage {
    FetchedMessage {
        author: message.user.map(AccountId),
        text: message.text,
        ts: message.ts,
    }
}

fn delivery(error: ApiError) -> ChatError {
    ChatError::Delivery(error.to_string())
}

fn unavailable(error: ApiError) -> LookupError {
    LookupError::Unavailable(error.to_string())
}

#[async_trait]
impl ChatGateway for SlackChatGateway {
    async fn post_direct_message(&self, account: &AccountId, text: &str) -> Result<(), ChatError> {
        // chat.postMessage opens the DM conversation when given a user id.
        self.api.post_message(account.as_str(), text).await.map_err(delivery)
    }

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        account: &AccountId,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), ChatError> {
        self.api
            .post_ephemeral(channel_id, account.as_str(), text, thread_ts)
            .await
            .map_err(delivery)
    }

    async fn fetch_message(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<FetchedMessage>, LookupError> {
        let history = self.api.history_at(channel_id, ts).await.map_err(unavailable)?;
        let Some(head) = history.into_iter().next() else {
            return Ok(None);
        };

        if head.ts == ts {
            return Ok(Some(to_fetched(head)));
        }

        // ts mismatch: history returned the thread parent, so the target is
        // a threaded reply.
        let replies = self.api.replies_at(channel_id, &head.ts, ts).await.map_err(unavailable)?;
        Ok(replies.into_iter().find(|reply| reply.ts == ts).map(to_fetched))
    }

    async fn classify_account(&self, account: &AccountId) -> Result<AccountClass, LookupError> {
        match self.api.user_info(account.as_str()).await.map_err(unavailable)? {
            Some(user) => Ok(AccountClass { automated: user.is_bot }),
            None => Err(LookupError::NotFound),
        }
    }
}
