//! Bravocado core - avocado distribution engine
//!
//! This crate holds the business logic of the bot, free of any platform or
//! storage I/O:
//! - **Trigger parsing** (`parser`) - mentions, emoji counts, reaction names
//! - **Recipient filtering** (`filter`) - self-exclusion, bot exclusion
//! - **Quota validation** (`validation`) - the all-or-nothing daily rule
//! - **Distribution engine** (`distribution`) - ordered transfer execution
//!   with per-recipient bookkeeping and notifications
//! - **Message composition** (`messages`) - pure text templates
//!
//! The data store and the chat platform are collaborators behind the
//! [`store::QuotaStore`] and [`chat::ChatGateway`] traits; implementations
//! are injected by the process entry point.

pub mod chat;
pub mod config;
pub mod distribution;
pub mod domain;
pub mod filter;
pub mod messages;
pub mod parser;
pub mod store;
pub mod validation;

pub use chat::{AccountClass, ChatError, ChatGateway, FetchedMessage, LookupError, NoopChatGateway};
pub use distribution::{
    DistributionEngine, DistributionPolicy, DistributionReport, SkipReason, REACTION_AVOCADO_COUNT,
};
pub use domain::account::{AccountId, AccountProfile};
pub use domain::transfer::{
    OriginContext, TransferOutcome, TransferRequest, TransferSuccess, TriggerKind,
};
pub use domain::trigger::{MessageTrigger, ReactionTrigger};
pub use messages::RejectionKind;
pub use store::{
    LeaderboardEntry, NoopQuotaStore, QuotaStore, StoreError, TransactionRecord,
};
pub use validation::DEFAULT_DAILY_AVOCADOS;
