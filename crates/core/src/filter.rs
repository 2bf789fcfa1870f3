//! Recipient filtering: self-exclusion first, then best-effort removal of
//! automated accounts.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use crate::chat::ChatGateway;
use crate::domain::account::AccountId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderExclusion {
    pub filtered: Vec<AccountId>,
    /// True when the sender appeared in their own recipient list. Reported as
    /// an informational note in the success message, never an error on its
    /// own.
    pub self_included: bool,
}

pub fn exclude_sender(recipients: &[AccountId], sender: &AccountId) -> SenderExclusion {
    let self_included = recipients.contains(sender);
    let filtered = recipients.iter().filter(|id| *id != sender).cloned().collect();
    SenderExclusion { filtered, self_included }
}

/// Drops recipients the gateway classifies as automated. Lookups run
/// concurrently; a failed lookup keeps the recipient (fail open). Order of
/// the surviving recipients is preserved.
pub async fn exclude_automated(
    chat: &Arc<dyn ChatGateway>,
    recipients: Vec<AccountId>,
) -> Vec<AccountId> {
    let mut lookups = JoinSet::new();
    for (index, recipient) in recipients.iter().cloned().enumerate() {
        let chat = Arc::clone(chat);
        lookups.spawn(async move {
            let automated = match chat.classify_account(&recipient).await {
                Ok(class) => class.automated,
                Err(error) => {
                    debug!(
                        account = %recipient,
                        error = %error,
                        "account classification unavailable; treating as human"
                    );
                    false
                }
            };
            (index, automated)
        });
    }

    let mut automated = vec![false; recipients.len()];
    while let Some(joined) = lookups.join_next().await {
        if let Ok((index, flag)) = joined {
            automated[index] = flag;
        }
    }

    recipients
        .into_iter()
        .zip(automated)
        .filter_map(|(recipient, is_automated)| (!is_automated).then_some(recipient))
        .collect()
}
