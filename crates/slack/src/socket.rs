//! Socket Mode event loop.
//!
//! The transport is a trait so the loop can run against the real WebSocket
//! client or a scripted double. The loop acknowledges every envelope,
//! suppresses platform redeliveries (the core is deliberately not idempotent
//! against double invocation), and never crashes the process on transport
//! trouble - it backs off, retries, and eventually degrades to idle.

use std::collections::{HashSet, VecDeque};
use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};
use crate::handlers::default_dispatcher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Bounded memory of recently seen envelope ids.
struct RecentEnvelopes {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentEnvelopes {
    fn with_capacity(capacity: usize) -> Self {
        Self { order: VecDeque::new(), seen: HashSet::new(), capacity }
    }

    /// Records the id; false when it was already in the window.
    fn remember(&mut self, envelope_id: &str) -> bool {
        if self.seen.contains(envelope_id) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        self.order.push_back(envelope_id.to_owned());
        self.seen.insert(envelope_id.to_owned());
        true
    }
}

const DEDUPE_WINDOW: usize = 256;

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    recent: Mutex<RecentEnvelopes>,
}

impl Default for SocketModeRunner {
    fn default() -> Self {
        Self::new(Arc::new(NoopSocketTransport), default_dispatcher(), ReconnectPolicy::default())
    }
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            reconnect_policy,
            recent: Mutex::new(RecentEnvelopes::with_capacity(DEDUPE_WINDOW)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (channel_id, account_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                channel_id = channel_id.as_deref().unwrap_or("unknown"),
                account_id = account_id.as_deref().unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            }

            let fresh = self.recent.lock().await.remember(&envelope.envelope_id);
            if !fresh {
                warn!(
                    event_name = "ingress.slack.duplicate_suppressed",
                    envelope_id = %envelope.envelope_id,
                    "duplicate envelope delivery suppressed"
                );
                continue;
            }

            let context = EventContext::for_envelope(&envelope);
            let result = self.dispatcher.dispatch(&envelope, &context).await;
            debug!(
                event_name = "ingress.slack.dispatched",
                envelope_id = %envelope.envelope_id,
                correlation_id = %context.correlation_id,
                result = ?result,
                "slack envelope dispatched"
            );
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<String>, Option<String>) {
    match &envelope.event {
        SlackEvent::MessagePosted(trigger) => {
            (Some(trigger.channel_id.clone()), Some(trigger.user_id.to_string()))
        }
        SlackEvent::ReactionAdded(trigger) => {
            (Some(trigger.channel_id.clone()), Some(trigger.reactor_id.to_string()))
        }
        SlackEvent::Unsupported { .. } => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use bravocado_core::domain::account::AccountId;
    use bravocado_core::domain::trigger::MessageTrigger;

    use super::{ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::events::{
        EventContext, EventDispatcher, EventHandler, HandlerResult, SlackEnvelope, SlackEvent,
        SlackEventType,
    };

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct CountingHandler {
        handled: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn event_type(&self) -> SlackEventType {
            SlackEventType::MessagePosted
        }

        async fn handle(&self, _envelope: &SlackEnvelope, _ctx: &EventContext) -> HandlerResult {
            self.handled.fetch_add(1, Ordering::SeqCst);
            HandlerResult::Processed
        }
    }

    fn message_envelope(envelope_id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::MessagePosted(MessageTrigger {
                channel_id: "C1".to_owned(),
                user_id: AccountId::from("U1"),
                text: "hello".to_owned(),
                ts: "1730000000.1000".to_owned(),
                thread_ts: None,
                subtype: None,
                bot_id: None,
            }),
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(message_envelope("env-1"))), Ok(None)],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn duplicate_envelopes_are_acknowledged_but_dispatched_once() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(message_envelope("env-dup"))),
                Ok(Some(message_envelope("env-dup"))),
                Ok(Some(message_envelope("env-other"))),
                Ok(None),
            ],
        ));

        let handled = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(CountingHandler { handled: handled.clone() });

        let runner = SocketModeRunner::new(
            transport.clone(),
            dispatcher,
            ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(
            transport.acknowledgements().await,
            vec!["env-dup", "env-dup", "env-other"],
            "redeliveries are still acknowledged"
        );
        assert_eq!(handled.load(Ordering::SeqCst), 2, "only distinct envelopes reach handlers");
    }

    #[test]
    fn backoff_is_capped_by_max_delay() {
        let policy = ReconnectPolicy { max_retries: 10, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0).as_millis(), 100);
        assert_eq!(policy.backoff(1).as_millis(), 200);
        assert_eq!(policy.backoff(8).as_millis(), 1_000);
    }
}
