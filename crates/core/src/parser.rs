//! Trigger parsing for the message path: avocado counting, mention
//! extraction, and the automated-sender rejections.

use crate::domain::account::AccountId;
use crate::domain::trigger::MessageTrigger;

/// Both the glyph and the workspace shortcode count as one avocado each.
pub const AVOCADO_EMOJI: &str = "\u{1F951}";
pub const AVOCADO_SHORTCODE: &str = ":avocado:";

/// Reaction identifiers recognized as an avocado gift. `아보카도` is the
/// custom alias some workspaces register for the same emoji.
pub const AVOCADO_REACTIONS: &[&str] = &["avocado", "아보카도"];

/// Result of parsing a candidate message trigger. `avocado_count` is the
/// total number of emoji occurrences in the text; each recipient receives
/// that many.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedMessage {
    pub sender: AccountId,
    pub mentions: Vec<AccountId>,
    pub avocado_count: u32,
}

pub fn count_avocados(text: &str) -> u32 {
    let occurrences = text.matches(AVOCADO_EMOJI).count() + text.matches(AVOCADO_SHORTCODE).count();
    occurrences as u32
}

/// Extracts `<@U...>` mention tokens in order of first appearance, dropping
/// duplicates. Tokens with a display-name suffix or lowercase ids are not
/// mention tokens and are skipped.
pub fn extract_mentions(text: &str) -> Vec<AccountId> {
    let mut mentions: Vec<AccountId> = Vec::new();

    for (start, _) in text.match_indices("<@") {
        let rest = &text[start + 2..];
        let Some(end) = rest.find('>') else { continue };
        let candidate = &rest[..end];
        if candidate.is_empty()
            || !candidate.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            continue;
        }

        let id = AccountId::from(candidate);
        if !mentions.contains(&id) {
            mentions.push(id);
        }
    }

    mentions
}

/// Returns `None` for anything that is not a distribution request: subtyped
/// messages (edits, joins, ...), bot-authored messages, messages without
/// mentions, and messages without avocados.
pub fn parse_message_trigger(trigger: &MessageTrigger) -> Option<ParsedMessage> {
    if trigger.subtype.is_some() || trigger.bot_id.is_some() {
        return None;
    }

    let mentions = extract_mentions(&trigger.text);
    if mentions.is_empty() {
        return None;
    }

    let avocado_count = count_avocados(&trigger.text);
    if avocado_count == 0 {
        return None;
    }

    Some(ParsedMessage { sender: trigger.user_id.clone(), mentions, avocado_count })
}

pub fn is_avocado_reaction(reaction: &str) -> bool {
    let normalized = reaction.trim().trim_matches(':').to_ascii_lowercase();
    AVOCADO_REACTIONS.contains(&normalized.as_str())
}
