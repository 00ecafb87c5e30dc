//! Message types shared by the store, window, and session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Typed or spoken by the user.
    User,
    /// Generated by the companion.
    Agent,
}

impl MessageOrigin {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted turn of conversation.
///
/// Immutable once created: the store assigns `id` and `created_at`, and rows
/// are only ever removed in bulk per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier, monotonically increasing per channel.
    pub id: i64,
    /// Persona/conversation this message belongs to.
    pub channel_id: String,
    /// Who produced it.
    pub origin: MessageOrigin,
    /// Message body.
    pub text: String,
    /// Language-model token cost attributed to this message. Zero for user
    /// input unless the completion provider reports a prompt cost for it.
    pub token_cost: u32,
    /// When the store persisted it.
    pub created_at: DateTime<Utc>,
}
