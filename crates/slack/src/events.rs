//! Typed event model and the dispatch seam.
//!
//! Platform payloads are duck-typed JSON; everything past this module works
//! with the closed set of variants below. Malformed payloads decode to
//! `None` and unknown event types to `Unsupported` - neither ever faults.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use bravocado_core::domain::account::AccountId;
use bravocado_core::domain::trigger::{MessageTrigger, ReactionTrigger};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    MessagePosted(MessageTrigger),
    ReactionAdded(ReactionTrigger),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::MessagePosted(_) => SlackEventType::MessagePosted,
            Self::ReactionAdded(_) => SlackEventType::ReactionAdded,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    MessagePosted,
    ReactionAdded,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn for_envelope(envelope: &SlackEnvelope) -> Self {
        if envelope.envelope_id.is_empty() {
            Self::generated()
        } else {
            Self { correlation_id: envelope.envelope_id.clone() }
        }
    }

    pub fn generated() -> Self {
        Self { correlation_id: format!("corr-{}", Uuid::new_v4()) }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(&self, envelope: &SlackEnvelope, ctx: &EventContext) -> HandlerResult;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(&self, envelope: &SlackEnvelope, ctx: &EventContext) -> HandlerResult {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return HandlerResult::Ignored;
        };

        handler.handle(envelope, ctx).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Decodes a Socket Mode envelope. Accepts both the wrapped form
/// (`payload.event`) and a bare `event` field. Returns `None` when the
/// envelope id or a required event field is missing.
pub fn decode_envelope(raw: &Value) -> Option<SlackEnvelope> {
    let envelope_id = raw.get("envelope_id")?.as_str()?.to_owned();
    let event = raw
        .get("payload")
        .and_then(|payload| payload.get("event"))
        .or_else(|| raw.get("event"))?;

    Some(SlackEnvelope { envelope_id, event: decode_event(event)? })
}

fn decode_event(event: &Value) -> Option<SlackEvent> {
    let event_type = event.get("type")?.as_str()?;

    match event_type {
        "message" => {
            let trigger = MessageTrigger {
                channel_id: string_field(event, "channel")?,
                user_id: AccountId(string_field(event, "user")?),
                text: string_field(event, "text")?,
                ts: string_field(event, "ts")?,
                thread_ts: optional_string_field(event, "thread_ts"),
                subtype: optional_string_field(event, "subtype"),
                bot_id: optional_string_field(event, "bot_id"),
            };
            Some(SlackEvent::MessagePosted(trigger))
        }
        "reaction_added" => {
            let item = event.get("item")?;
            let trigger = ReactionTrigger {
                channel_id: string_field(item, "channel")?,
                message_ts: string_field(item, "ts")?,
                reactor_id: AccountId(string_field(event, "user")?),
                reaction: string_field(event, "reaction")?,
            };
            Some(SlackEvent::ReactionAdded(trigger))
        }
        other => Some(SlackEvent::Unsupported { event_type: other.to_owned() }),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_owned)
}

fn optional_string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}
