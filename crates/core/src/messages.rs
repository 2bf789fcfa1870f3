//! Message composition. Everything in this module is pure: given the same
//! inputs it renders the same text and performs no I/O.

use crate::domain::account::AccountId;
use crate::domain::transfer::{TransferSuccess, TriggerKind};

/// User-facing rejection of a distribution, produced before any store
/// mutation. `Fallback` covers failures without a dedicated template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectionKind {
    SelfOnly,
    NoRemaining,
    Insufficient { remaining: u32, total_needed: u64, receiver_count: usize },
    Fallback,
}

fn plural_unless_one(value: u64) -> &'static str {
    if value != 1 {
        "s"
    } else {
        ""
    }
}

fn plural_if_many(value: u64) -> &'static str {
    if value > 1 {
        "s"
    } else {
        ""
    }
}

pub fn mention(account: &AccountId) -> String {
    format!("<@{account}>")
}

pub fn channel_link(channel_id: &str) -> String {
    format!("<#{channel_id}>")
}

/// Natural-language join with an Oxford comma: "A", "A and B",
/// "A, B, and C".
pub fn format_recipient_list(recipients: &[AccountId]) -> String {
    let mentions: Vec<String> = recipients.iter().map(mention).collect();
    match mentions.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [head @ .., last] => format!("{}, and {last}", head.join(", ")),
    }
}

pub fn build_error_message(rejection: &RejectionKind) -> String {
    match rejection {
        RejectionKind::SelfOnly => {
            "We love self-care, but avos are for sharing! 🥑 You can't give them to yourself."
                .to_owned()
        }
        RejectionKind::NoRemaining => {
            "You're too generous! You've used up your daily supply. You have *0 avos* left. \
             Come back tomorrow to spread more love. 💚"
                .to_owned()
        }
        RejectionKind::Insufficient { remaining, total_needed, receiver_count } => {
            let remaining_plural = plural_unless_one(u64::from(*remaining));
            let needed_plural = plural_if_many(*total_needed);
            format!(
                "You tried to give *{total_needed} avo{needed_plural}* to {receiver_count} people, \
                 but you only have *{remaining} avo{remaining_plural}* left. No avos were sent. \
                 You have *{remaining} avo{remaining_plural}* left to give out today."
            )
        }
        RejectionKind::Fallback => "Something went wrong. Please try again.".to_owned(),
    }
}

/// Direct message sent to one recipient of a completed transfer. The origin
/// text is quoted when present; reaction gifts on text-less messages (file
/// uploads and the like) skip the quote.
pub fn build_receiver_dm(
    count: u32,
    sender: &AccountId,
    channel_id: &str,
    message_text: &str,
    kind: TriggerKind,
) -> String {
    let plural = plural_if_many(u64::from(count));
    let sender = mention(sender);
    let channel = channel_link(channel_id);

    match kind {
        TriggerKind::Reaction => {
            let quote = if message_text.is_empty() {
                String::new()
            } else {
                format!("\n> {message_text}")
            };
            format!("You received *{count} avo{plural}* from {sender} via reaction in {channel}.{quote}")
        }
        TriggerKind::Message => {
            format!("You received *{count} avo{plural}* from {sender} in {channel}.\n> {message_text}")
        }
    }
}

/// Summary sent to the sender after a distribution. `None` when nothing
/// succeeded. The per-recipient count is uniform across one distribution, so
/// the first success carries it.
pub fn build_sender_success_message(
    successes: &[TransferSuccess],
    remaining_after: u32,
    self_included: bool,
) -> Option<String> {
    let first = successes.first()?;
    let count = first.count;
    let count_plural = plural_if_many(u64::from(count));
    let remaining_plural = plural_unless_one(u64::from(remaining_after));

    let recipients: Vec<AccountId> = successes.iter().map(|s| s.recipient.clone()).collect();
    let recipient_list = format_recipient_list(&recipients);

    let mut message = format!(
        "{recipient_list} received *{count} avo{count_plural}* from you. \
         You have *{remaining_after} avo{remaining_plural}* left to give out today."
    );

    if self_included {
        message.push_str("\n(I skipped you, because you can't give avos to yourself!)");
    }

    Some(message)
}
