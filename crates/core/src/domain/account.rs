use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of a workspace member (Slack user id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Per-member counters owned by the data store. `given_count` and
/// `received_count` are lifetime totals and only ever grow; `remaining_daily`
/// is replenished by a daily cycle external to this system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: AccountId,
    pub given_count: i64,
    pub received_count: i64,
    pub remaining_daily: u32,
}
