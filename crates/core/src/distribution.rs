//! The distribution engine: trigger → filter → validate → execute → notify.
//!
//! Rejections and skips are reported as data, never as errors; every failure
//! the sender should not see is logged and swallowed here. Store and chat
//! collaborators are injected, with lifecycle owned by the process entry
//! point.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::chat::ChatGateway;
use crate::domain::account::AccountId;
use crate::domain::transfer::{
    OriginContext, TransferOutcome, TransferRequest, TransferSuccess, TriggerKind,
};
use crate::domain::trigger::{MessageTrigger, ReactionTrigger};
use crate::filter;
use crate::messages::{self, RejectionKind};
use crate::parser;
use crate::store::QuotaStore;
use crate::validation;

/// Reaction gifts always carry one avocado per recipient.
pub const REACTION_AVOCADO_COUNT: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The event does not encode a distribution request.
    NotATrigger,
    /// The reacted-to message could not be resolved. Expected, e.g. when the
    /// bot lacks access to the conversation.
    MessageUnavailable,
    /// Every candidate recipient was an automated account. Deliberately
    /// silent toward the sender; flagged for product review.
    AutomatedRecipientsOnly,
}

/// What happened to one inbound trigger. `Rejected` means the sender was
/// told why; `Skipped` produces no user-visible output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DistributionReport {
    Skipped(SkipReason),
    Rejected(RejectionKind),
    Completed { outcome: TransferOutcome, remaining_after: u32, self_included: bool },
}

#[derive(Clone, Copy, Debug)]
pub struct DistributionPolicy {
    pub daily_default: u32,
}

impl Default for DistributionPolicy {
    fn default() -> Self {
        Self { daily_default: validation::DEFAULT_DAILY_AVOCADOS }
    }
}

pub struct DistributionEngine {
    store: Arc<dyn QuotaStore>,
    chat: Arc<dyn ChatGateway>,
    policy: DistributionPolicy,
}

impl DistributionEngine {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        chat: Arc<dyn ChatGateway>,
        policy: DistributionPolicy,
    ) -> Self {
        Self { store, chat, policy }
    }

    pub async fn handle_message(&self, trigger: &MessageTrigger) -> DistributionReport {
        let Some(parsed) = parser::parse_message_trigger(trigger) else {
            return DistributionReport::Skipped(SkipReason::NotATrigger);
        };

        let thread_ts = trigger.thread_ts.clone().unwrap_or_else(|| trigger.ts.clone());
        let request = TransferRequest {
            sender: parsed.sender,
            recipients: parsed.mentions,
            per_recipient: parsed.avocado_count,
            origin: OriginContext {
                kind: TriggerKind::Message,
                channel_id: trigger.channel_id.clone(),
                message_text: trigger.text.clone(),
                thread_ts: Some(thread_ts),
            },
        };

        self.distribute(request).await
    }

    pub async fn handle_reaction(&self, trigger: &ReactionTrigger) -> DistributionReport {
        if !parser::is_avocado_reaction(&trigger.reaction) {
            return DistributionReport::Skipped(SkipReason::NotATrigger);
        }

        let original = match self.chat.fetch_message(&trigger.channel_id, &trigger.message_ts).await
        {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!(
                    channel_id = %trigger.channel_id,
                    message_ts = %trigger.message_ts,
                    "reacted-to message not resolvable; skipping"
                );
                return DistributionReport::Skipped(SkipReason::MessageUnavailable);
            }
            Err(error) => {
                debug!(
                    channel_id = %trigger.channel_id,
                    message_ts = %trigger.message_ts,
                    error = %error,
                    "reacted-to message lookup failed; skipping"
                );
                return DistributionReport::Skipped(SkipReason::MessageUnavailable);
            }
        };

        // Mentioned members take precedence; otherwise the gift goes to the
        // message author.
        let mentioned = parser::extract_mentions(&original.text);
        let recipients = if mentioned.is_empty() {
            match &original.author {
                Some(author) => vec![author.clone()],
                None => {
                    debug!(
                        channel_id = %trigger.channel_id,
                        message_ts = %trigger.message_ts,
                        "reacted-to message has no member author; skipping"
                    );
                    return DistributionReport::Skipped(SkipReason::MessageUnavailable);
                }
            }
        } else {
            mentioned
        };

        let request = TransferRequest {
            sender: trigger.reactor_id.clone(),
            recipients,
            per_recipient: REACTION_AVOCADO_COUNT,
            origin: OriginContext {
                kind: TriggerKind::Reaction,
                channel_id: trigger.channel_id.clone(),
                message_text: original.text,
                thread_ts: None,
            },
        };

        self.distribute(request).await
    }

    async fn distribute(&self, request: TransferRequest) -> DistributionReport {
        let TransferRequest { sender, recipients, per_recipient, origin } = request;

        let exclusion = filter::exclude_sender(&recipients, &sender);
        if exclusion.filtered.is_empty() {
            return self.reject(&sender, &origin, RejectionKind::SelfOnly).await;
        }

        let recipients = filter::exclude_automated(&self.chat, exclusion.filtered).await;
        if recipients.is_empty() {
            debug!(
                sender = %sender,
                "all mentioned recipients are automated accounts; skipping without notice"
            );
            return DistributionReport::Skipped(SkipReason::AutomatedRecipientsOnly);
        }

        let remaining = match self.store.remaining_daily(&sender).await {
            Ok(stored) => validation::remaining_or_default(stored, self.policy.daily_default),
            Err(error) => {
                warn!(sender = %sender, error = %error, "balance read failed; aborting distribution");
                return self.reject(&sender, &origin, RejectionKind::Fallback).await;
            }
        };

        if remaining == 0 {
            return self.reject(&sender, &origin, RejectionKind::NoRemaining).await;
        }

        if !validation::can_distribute(&recipients, per_recipient, remaining) {
            let rejection = RejectionKind::Insufficient {
                remaining,
                total_needed: validation::total_needed(recipients.len(), per_recipient),
                receiver_count: recipients.len(),
            };
            return self.reject(&sender, &origin, rejection).await;
        }

        let outcome = self.execute_transfers(&sender, &recipients, per_recipient, &origin).await;
        debug_assert!(outcome.partitions(&recipients));

        let self_included = exclusion.self_included;
        if outcome.successes.is_empty() {
            return DistributionReport::Completed {
                outcome,
                remaining_after: remaining,
                self_included,
            };
        }

        let remaining_after = match self.store.remaining_daily(&sender).await {
            Ok(stored) => validation::remaining_or_default(stored, self.policy.daily_default),
            Err(error) => {
                warn!(
                    sender = %sender,
                    error = %error,
                    "post-transfer balance read failed; reporting computed remainder"
                );
                let spent: u64 =
                    outcome.successes.iter().map(|s| u64::from(s.count)).sum();
                remaining.saturating_sub(spent.min(u64::from(u32::MAX)) as u32)
            }
        };

        if let Some(summary) =
            messages::build_sender_success_message(&outcome.successes, remaining_after, self_included)
        {
            if let Err(error) = self.chat.post_direct_message(&sender, &summary).await {
                warn!(sender = %sender, error = %error, "sender summary delivery failed");
            }
        }

        DistributionReport::Completed { outcome, remaining_after, self_included }
    }

    /// Transfers run strictly in recipient order. A failed store call lands
    /// the recipient in `failures` and the loop continues; a failed
    /// notification after a recorded transfer is logged and nothing more.
    async fn execute_transfers(
        &self,
        sender: &AccountId,
        recipients: &[AccountId],
        per_recipient: u32,
        origin: &OriginContext,
    ) -> TransferOutcome {
        let mut outcome = TransferOutcome::default();

        for recipient in recipients {
            let recorded = self
                .store
                .execute_transfer(
                    sender,
                    recipient,
                    per_recipient,
                    &origin.message_text,
                    &origin.channel_id,
                )
                .await;

            match recorded {
                Ok(()) => {
                    outcome
                        .successes
                        .push(TransferSuccess { recipient: recipient.clone(), count: per_recipient });

                    let dm = messages::build_receiver_dm(
                        per_recipient,
                        sender,
                        &origin.channel_id,
                        &origin.message_text,
                        origin.kind,
                    );
                    if let Err(error) = self.chat.post_direct_message(recipient, &dm).await {
                        warn!(
                            recipient = %recipient,
                            error = %error,
                            "receiver notification failed after recorded transfer"
                        );
                    }
                }
                Err(error) => {
                    warn!(
                        sender = %sender,
                        recipient = %recipient,
                        count = per_recipient,
                        error = %error,
                        "transfer failed"
                    );
                    outcome.failures.push(recipient.clone());
                }
            }
        }

        outcome
    }

    async fn reject(
        &self,
        sender: &AccountId,
        origin: &OriginContext,
        rejection: RejectionKind,
    ) -> DistributionReport {
        let text = messages::build_error_message(&rejection);
        if let Err(error) = self
            .chat
            .post_ephemeral(&origin.channel_id, sender, &text, origin.thread_ts.as_deref())
            .await
        {
            warn!(sender = %sender, error = %error, "rejection notice delivery failed");
        }

        DistributionReport::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{DistributionEngine, DistributionPolicy, DistributionReport, SkipReason};
    use crate::chat::{AccountClass, ChatError, ChatGateway, FetchedMessage, LookupError};
    use crate::domain::account::AccountId;
    use crate::domain::trigger::{MessageTrigger, ReactionTrigger};
    use crate::messages::RejectionKind;
    use crate::store::{LeaderboardEntry, QuotaStore, StoreError, TransactionRecord};

    fn id(raw: &str) -> AccountId {
        AccountId::from(raw)
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct RecordedTransfer {
        sender: AccountId,
        receiver: AccountId,
        count: u32,
    }

    #[derive(Default)]
    struct FakeStore {
        balances: Mutex<HashMap<AccountId, u32>>,
        transfers: Mutex<Vec<RecordedTransfer>>,
        failing_receivers: Vec<AccountId>,
    }

    impl FakeStore {
        fn with_balance(sender: &AccountId, remaining: u32) -> Self {
            let store = Self::default();
            store.balances.try_lock().expect("fresh lock").insert(sender.clone(), remaining);
            store
        }

        fn failing_for(mut self, receiver: AccountId) -> Self {
            self.failing_receivers.push(receiver);
            self
        }

        async fn recorded(&self) -> Vec<RecordedTransfer> {
            self.transfers.lock().await.clone()
        }
    }

    #[async_trait]
    impl QuotaStore for FakeStore {
        async fn remaining_daily(&self, account: &AccountId) -> Result<Option<u32>, StoreError> {
            Ok(self.balances.lock().await.get(account).copied())
        }

        async fn execute_transfer(
            &self,
            sender: &AccountId,
            receiver: &AccountId,
            count: u32,
            _message_text: &str,
            _channel_id: &str,
        ) -> Result<(), StoreError> {
            if self.failing_receivers.contains(receiver) {
                return Err(StoreError::Backend("simulated failure".to_owned()));
            }

            let mut balances = self.balances.lock().await;
            let remaining = balances.get(sender).copied().unwrap_or(0);
            if remaining < count {
                return Err(StoreError::BalanceConflict(sender.clone()));
            }
            balances.insert(sender.clone(), remaining - count);
            drop(balances);

            self.transfers.lock().await.push(RecordedTransfer {
                sender: sender.clone(),
                receiver: receiver.clone(),
                count,
            });
            Ok(())
        }

        async fn top_by_received(&self, _limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
            Ok(Vec::new())
        }

        async fn top_by_given(&self, _limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
            Ok(Vec::new())
        }

        async fn transactions_since(
            &self,
            _since: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<TransactionRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum SentMessage {
        Dm { to: AccountId, text: String },
        Ephemeral { channel: String, to: AccountId, text: String, thread_ts: Option<String> },
    }

    #[derive(Default)]
    struct FakeChat {
        sent: Mutex<Vec<SentMessage>>,
        fetchable: Option<FetchedMessage>,
        automated: Vec<AccountId>,
        fetch_fails: bool,
    }

    impl FakeChat {
        fn with_message(message: FetchedMessage) -> Self {
            Self { fetchable: Some(message), ..Self::default() }
        }

        async fn sent(&self) -> Vec<SentMessage> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatGateway for FakeChat {
        async fn post_direct_message(
            &self,
            account: &AccountId,
            text: &str,
        ) -> Result<(), ChatError> {
            self.sent
                .lock()
                .await
                .push(SentMessage::Dm { to: account.clone(), text: text.to_owned() });
            Ok(())
        }

        async fn post_ephemeral(
            &self,
            channel_id: &str,
            account: &AccountId,
            text: &str,
            thread_ts: Option<&str>,
        ) -> Result<(), ChatError> {
            self.sent.lock().await.push(SentMessage::Ephemeral {
                channel: channel_id.to_owned(),
                to: account.clone(),
                text: text.to_owned(),
                thread_ts: thread_ts.map(str::to_owned),
            });
            Ok(())
        }

        async fn fetch_message(
            &self,
            _channel_id: &str,
            _ts: &str,
        ) -> Result<Option<FetchedMessage>, LookupError> {
            if self.fetch_fails {
                return Err(LookupError::Unavailable("permission denied".to_owned()));
            }
            Ok(self.fetchable.clone())
        }

        async fn classify_account(&self, account: &AccountId) -> Result<AccountClass, LookupError> {
            Ok(AccountClass { automated: self.automated.contains(account) })
        }
    }

    fn engine(store: Arc<FakeStore>, chat: Arc<FakeChat>) -> DistributionEngine {
        DistributionEngine::new(store, chat, DistributionPolicy::default())
    }

    fn message(text: &str) -> MessageTrigger {
        MessageTrigger {
            channel_id: "C1".to_owned(),
            user_id: id("SENDER"),
            text: text.to_owned(),
            ts: "1730000000.1000".to_owned(),
            thread_ts: None,
            subtype: None,
            bot_id: None,
        }
    }

    fn reaction(reactor: &str) -> ReactionTrigger {
        ReactionTrigger {
            channel_id: "C1".to_owned(),
            message_ts: "1730000000.2000".to_owned(),
            reactor_id: id(reactor),
            reaction: "avocado".to_owned(),
        }
    }

    #[tokio::test]
    async fn distributes_to_two_recipients_and_reports_remaining() {
        let store = Arc::new(FakeStore::with_balance(&id("SENDER"), 5));
        let chat = Arc::new(FakeChat::default());
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_message(&message("<@U1> <@U2> thank you 🥑")).await;

        let DistributionReport::Completed { outcome, remaining_after, self_included } = report
        else {
            panic!("expected completed distribution");
        };
        assert_eq!(remaining_after, 3);
        assert!(!self_included);
        assert_eq!(outcome.successes.len(), 2);
        assert!(outcome.failures.is_empty());

        assert_eq!(
            store.recorded().await,
            vec![
                RecordedTransfer { sender: id("SENDER"), receiver: id("U1"), count: 1 },
                RecordedTransfer { sender: id("SENDER"), receiver: id("U2"), count: 1 },
            ]
        );

        let sent = chat.sent().await;
        assert_eq!(sent.len(), 3, "two receiver DMs plus one sender summary");
        let summary = sent.last().expect("summary present");
        let SentMessage::Dm { to, text } = summary else {
            panic!("summary should be a DM");
        };
        assert_eq!(to, &id("SENDER"));
        assert!(text.contains("<@U1> and <@U2>"));
        assert!(text.contains("*3 avos*"));
    }

    #[tokio::test]
    async fn insufficient_balance_aborts_before_any_store_call() {
        let store = Arc::new(FakeStore::with_balance(&id("SENDER"), 1));
        let chat = Arc::new(FakeChat::default());
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_message(&message("<@U1> <@U2> 🥑")).await;

        assert_eq!(
            report,
            DistributionReport::Rejected(RejectionKind::Insufficient {
                remaining: 1,
                total_needed: 2,
                receiver_count: 2,
            })
        );
        assert!(store.recorded().await.is_empty());

        let sent = chat.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            SentMessage::Ephemeral { to, thread_ts: Some(ts), .. }
                if to == &id("SENDER") && ts == "1730000000.1000"
        ));
    }

    #[tokio::test]
    async fn self_only_mentions_are_rejected_without_store_calls() {
        let store = Arc::new(FakeStore::with_balance(&id("SENDER"), 5));
        let chat = Arc::new(FakeChat::default());
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_message(&message("<@SENDER> treat yourself 🥑")).await;

        assert_eq!(report, DistributionReport::Rejected(RejectionKind::SelfOnly));
        assert!(store.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn zero_remaining_short_circuits_regardless_of_recipient_count() {
        let store = Arc::new(FakeStore::with_balance(&id("SENDER"), 0));
        let chat = Arc::new(FakeChat::default());
        let engine = engine(store, chat.clone());

        let report = engine.handle_message(&message("<@U1> <@U2> <@U3> 🥑")).await;

        assert_eq!(report, DistributionReport::Rejected(RejectionKind::NoRemaining));
    }

    #[tokio::test]
    async fn reaction_on_unmentioned_message_rewards_the_author() {
        let store = Arc::new(FakeStore::with_balance(&id("REACTOR"), 5));
        let chat = Arc::new(FakeChat::with_message(FetchedMessage {
            author: Some(id("AUTHOR")),
            text: "shipped the release".to_owned(),
            ts: "1730000000.2000".to_owned(),
        }));
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_reaction(&reaction("REACTOR")).await;

        let DistributionReport::Completed { outcome, .. } = report else {
            panic!("expected completed distribution");
        };
        assert_eq!(outcome.successes.len(), 1);
        assert_eq!(outcome.successes[0].recipient, id("AUTHOR"));
        assert_eq!(outcome.successes[0].count, 1);
        assert_eq!(store.recorded().await.len(), 1);
    }

    #[tokio::test]
    async fn reacting_to_own_message_is_self_only() {
        let store = Arc::new(FakeStore::with_balance(&id("AUTHOR"), 5));
        let chat = Arc::new(FakeChat::with_message(FetchedMessage {
            author: Some(id("AUTHOR")),
            text: "my own post".to_owned(),
            ts: "1730000000.2000".to_owned(),
        }));
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_reaction(&reaction("AUTHOR")).await;

        assert_eq!(report, DistributionReport::Rejected(RejectionKind::SelfOnly));
        assert!(store.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_reacted_message_skips_silently() {
        let store = Arc::new(FakeStore::with_balance(&id("REACTOR"), 5));
        let chat = Arc::new(FakeChat { fetch_fails: true, ..FakeChat::default() });
        let engine = engine(store, chat.clone());

        let report = engine.handle_reaction(&reaction("REACTOR")).await;

        assert_eq!(report, DistributionReport::Skipped(SkipReason::MessageUnavailable));
        assert!(chat.sent().await.is_empty());
    }

    #[tokio::test]
    async fn mid_loop_store_failure_excludes_recipient_and_continues() {
        let store =
            Arc::new(FakeStore::with_balance(&id("SENDER"), 5).failing_for(id("U1")));
        let chat = Arc::new(FakeChat::default());
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_message(&message("<@U1> <@U2> 🥑")).await;

        let DistributionReport::Completed { outcome, remaining_after, .. } = report else {
            panic!("expected completed distribution");
        };
        assert_eq!(outcome.failures, vec![id("U1")]);
        assert_eq!(outcome.successes.len(), 1);
        assert_eq!(outcome.successes[0].recipient, id("U2"));
        assert_eq!(remaining_after, 4);

        let sent = chat.sent().await;
        let SentMessage::Dm { text, .. } = sent.last().expect("sender summary") else {
            panic!("summary should be a DM");
        };
        assert!(text.contains("<@U2>"));
        assert!(!text.contains("<@U1>"), "failed recipient must not appear in the summary");
    }

    #[tokio::test]
    async fn bot_only_mentions_skip_without_any_notice() {
        let store = Arc::new(FakeStore::with_balance(&id("SENDER"), 5));
        let chat = Arc::new(FakeChat { automated: vec![id("BOT")], ..FakeChat::default() });
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_message(&message("<@BOT> 🥑")).await;

        assert_eq!(report, DistributionReport::Skipped(SkipReason::AutomatedRecipientsOnly));
        assert!(chat.sent().await.is_empty());
        assert!(store.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn self_inclusion_alongside_others_adds_note_and_still_delivers() {
        let store = Arc::new(FakeStore::with_balance(&id("SENDER"), 5));
        let chat = Arc::new(FakeChat::default());
        let engine = engine(store.clone(), chat.clone());

        let report = engine.handle_message(&message("<@SENDER> <@U1> 🥑")).await;

        let DistributionReport::Completed { outcome, self_included, .. } = report else {
            panic!("expected completed distribution");
        };
        assert!(self_included);
        assert_eq!(outcome.successes.len(), 1);

        let sent = chat.sent().await;
        let SentMessage::Dm { text, .. } = sent.last().expect("sender summary") else {
            panic!("summary should be a DM");
        };
        assert!(text.contains("I skipped you"));
    }

    #[tokio::test]
    async fn unknown_profile_uses_daily_default() {
        let store = Arc::new(FakeStore::default());
        let chat = Arc::new(FakeChat::default());
        let engine = DistributionEngine::new(
            store.clone(),
            chat,
            DistributionPolicy { daily_default: 2 },
        );

        // Three needed, default grants two.
        let report = engine.handle_message(&message("<@U1> <@U2> <@U3> 🥑")).await;

        assert_eq!(
            report,
            DistributionReport::Rejected(RejectionKind::Insufficient {
                remaining: 2,
                total_needed: 3,
                receiver_count: 3,
            })
        );
    }

    #[tokio::test]
    async fn multi_emoji_message_gives_the_full_count_to_each_recipient() {
        let store = Arc::new(FakeStore::with_balance(&id("SENDER"), 5));
        let chat = Arc::new(FakeChat::default());
        let engine = engine(store.clone(), chat);

        let report = engine.handle_message(&message("🥑🥑 <@U1> <@U2>")).await;

        let DistributionReport::Completed { outcome, remaining_after, .. } = report else {
            panic!("expected completed distribution");
        };
        assert!(outcome.successes.iter().all(|s| s.count == 2));
        assert_eq!(remaining_after, 1);
    }
}
