use crate::domain::account::AccountId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    Message,
    Reaction,
}

/// Where a distribution came from. `thread_ts` carries the thread anchor for
/// ephemeral replies on message triggers; reaction triggers reply unthreaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginContext {
    pub kind: TriggerKind,
    pub channel_id: String,
    pub message_text: String,
    pub thread_ts: Option<String>,
}

/// One parsed trigger, ready for filtering and validation. Ephemeral: created
/// per event and discarded after processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub sender: AccountId,
    pub recipients: Vec<AccountId>,
    pub per_recipient: u32,
    pub origin: OriginContext,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferSuccess {
    pub recipient: AccountId,
    pub count: u32,
}

/// Per-recipient bookkeeping of one executed distribution. `successes` and
/// `failures` partition the approved recipient set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub successes: Vec<TransferSuccess>,
    pub failures: Vec<AccountId>,
}

impl TransferOutcome {
    /// True when every approved recipient landed in exactly one of the two
    /// lists.
    pub fn partitions(&self, approved: &[AccountId]) -> bool {
        if self.successes.len() + self.failures.len() != approved.len() {
            return false;
        }

        approved.iter().all(|recipient| {
            let succeeded = self.successes.iter().any(|s| &s.recipient == recipient);
            let failed = self.failures.contains(recipient);
            succeeded != failed
        })
    }
}
