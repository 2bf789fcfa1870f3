//! Daily-quota validation. The all-or-nothing rule lives here; the data
//! store re-checks the balance at write time, so this is the fast path, not
//! the correctness guarantee.

use crate::domain::account::AccountId;

/// Daily allotment used when no profile row exists yet and when config does
/// not override it.
pub const DEFAULT_DAILY_AVOCADOS: u32 = 5;

pub fn remaining_or_default(stored: Option<u32>, daily_default: u32) -> u32 {
    stored.unwrap_or(daily_default)
}

pub fn total_needed(receiver_count: usize, per_recipient: u32) -> u64 {
    receiver_count as u64 * u64::from(per_recipient)
}

/// True iff every recipient's requested count fits within the remaining
/// balance. There is no partial distribution.
pub fn can_distribute(recipients: &[AccountId], per_recipient: u32, remaining: u32) -> bool {
    total_needed(recipients.len(), per_recipient) <= u64::from(remaining)
}
