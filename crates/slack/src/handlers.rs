//! Handlers bridging decoded events into the core distribution engine.
//!
//! The engine reports every path as data (skip, reject, completed); handlers
//! only translate that into dispatch results and structured logs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use bravocado_core::distribution::{DistributionEngine, DistributionReport, SkipReason};
use bravocado_core::{DistributionPolicy, NoopChatGateway, NoopQuotaStore};

use crate::events::{
    EventContext, EventDispatcher, EventHandler, HandlerResult, SlackEnvelope, SlackEvent,
    SlackEventType,
};

pub struct MessageDistributionHandler {
    engine: Arc<DistributionEngine>,
}

impl MessageDistributionHandler {
    pub fn new(engine: Arc<DistributionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for MessageDistributionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::MessagePosted
    }

    async fn handle(&self, envelope: &SlackEnvelope, ctx: &EventContext) -> HandlerResult {
        let SlackEvent::MessagePosted(trigger) = &envelope.event else {
            return HandlerResult::Ignored;
        };

        let report = self.engine.handle_message(trigger).await;
        log_report(&report, "message", &ctx.correlation_id, &trigger.channel_id);
        result_for(&report)
    }
}

pub struct ReactionDistributionHandler {
    engine: Arc<DistributionEngine>,
}

impl ReactionDistributionHandler {
    pub fn new(engine: Arc<DistributionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for ReactionDistributionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionAdded
    }

    async fn handle(&self, envelope: &SlackEnvelope, ctx: &EventContext) -> HandlerResult {
        let SlackEvent::ReactionAdded(trigger) = &envelope.event else {
            return HandlerResult::Ignored;
        };

        let report = self.engine.handle_reaction(trigger).await;
        log_report(&report, "reaction", &ctx.correlation_id, &trigger.channel_id);
        result_for(&report)
    }
}

fn result_for(report: &DistributionReport) -> HandlerResult {
    match report {
        DistributionReport::Skipped(SkipReason::NotATrigger) => HandlerResult::Ignored,
        _ => HandlerResult::Processed,
    }
}

fn log_report(report: &DistributionReport, trigger_kind: &str, correlation_id: &str, channel_id: &str) {
    match report {
        DistributionReport::Skipped(reason) => {
            debug!(
                event_name = "distribution.skipped",
                trigger_kind,
                correlation_id,
                channel_id,
                reason = ?reason,
                "distribution skipped"
            );
        }
        DistributionReport::Rejected(rejection) => {
            info!(
                event_name = "distribution.rejected",
                trigger_kind,
                correlation_id,
                channel_id,
                rejection = ?rejection,
                "distribution rejected before any transfer"
            );
        }
        DistributionReport::Completed { outcome, remaining_after, .. } => {
            info!(
                event_name = "distribution.completed",
                trigger_kind,
                correlation_id,
                channel_id,
                succeeded = outcome.successes.len(),
                failed = outcome.failures.len(),
                remaining_after,
                "distribution completed"
            );
        }
    }
}

/// Dispatcher wired to a live engine.
pub fn distribution_dispatcher(engine: Arc<DistributionEngine>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageDistributionHandler::new(engine.clone()));
    dispatcher.register(ReactionDistributionHandler::new(engine));
    dispatcher
}

/// Dispatcher over inert collaborators, for default wiring and tests.
pub fn default_dispatcher() -> EventDispatcher {
    let engine = Arc::new(DistributionEngine::new(
        Arc::new(NoopQuotaStore),
        Arc::new(NoopChatGateway),
        DistributionPolicy::default(),
    ));
    distribution_dispatcher(engine)
}
