//! Shared domain types: user identity and privilege ranks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized user identity: lowercased, alphanumerics only.
///
/// Two raw names that fold to the same id are the same account. Ids starting
/// with `guest` are the anonymous class: they always read a balance of 0 and
/// are silently ignored as mutation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Fold a raw display name into its canonical id.
    /// Returns `None` when nothing survives the fold (empty target).
    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if folded.is_empty() {
            None
        } else {
            Some(UserId(folded))
        }
    }

    /// Anonymous/unauthenticated ids share the `guest` prefix.
    pub fn is_guest(&self) -> bool {
        self.0.starts_with("guest")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Privilege tier of a caller, as granted by the host chat server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Regular,
    RoomOwner,
    Moderator,
    Administrator,
}

impl Rank {
    pub fn as_str(&self) -> &str {
        match self {
            Rank::Regular => "regular",
            Rank::RoomOwner => "room_owner",
            Rank::Moderator => "moderator",
            Rank::Administrator => "administrator",
        }
    }

    /// Can credit/debit/reset arbitrary accounts.
    pub fn can_manage_funds(&self) -> bool {
        matches!(self, Rank::Administrator)
    }

    /// Can read the transaction log and the staff help section.
    pub fn is_staff(&self) -> bool {
        matches!(self, Rank::Moderator | Rank::Administrator)
    }

    /// Can start a giveaway inside a room.
    pub fn can_run_giveaway(&self) -> bool {
        matches!(self, Rank::RoomOwner | Rank::Moderator | Rank::Administrator)
    }
}
