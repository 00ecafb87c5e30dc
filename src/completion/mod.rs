//! Chat completion contract and request/reply types.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{Message, MessageOrigin};

/// Role attached to one outgoing chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
}

impl ChatRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How persisted history origins map onto outgoing chat roles.
///
/// `Uniform` reproduces the upstream client behavior of tagging every prior
/// turn as the assistant's; whether that was context compaction or a
/// labeling defect is unknowable from the outside, so both mappings are
/// offered and the budget/windowing behavior is identical under each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRolePolicy {
    /// User turns go out as `user`, agent turns as `assistant`.
    #[default]
    Faithful,
    /// Every history entry goes out as `assistant`.
    Uniform,
}

impl HistoryRolePolicy {
    /// The outgoing role for a persisted origin under this policy.
    pub fn role_for(self, origin: MessageOrigin) -> ChatRole {
        match (self, origin) {
            (Self::Faithful, MessageOrigin::User) => ChatRole::User,
            (Self::Faithful, MessageOrigin::Agent) => ChatRole::Assistant,
            (Self::Uniform, _) => ChatRole::Assistant,
        }
    }
}

/// One history entry sent alongside a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Outgoing role under the session's role policy.
    pub role: ChatRole,
    /// Message body.
    pub text: String,
}

impl HistoryEntry {
    /// Build an entry from a persisted message under `policy`.
    pub fn from_message(message: &Message, policy: HistoryRolePolicy) -> Self {
        Self {
            role: policy.role_for(message.origin),
            text: message.text.clone(),
        }
    }
}

/// A bounded completion request.
///
/// `history` is newest-first, exactly as the window accumulated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// The persona's system instruction, if any.
    pub system_prompt: Option<String>,
    /// Budget-bounded prior turns, newest-first.
    pub history: Vec<HistoryEntry>,
    /// The message being replied to.
    pub user_message: String,
}

/// Reply from the completion provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionReply {
    /// Generated text, possibly empty.
    pub text: String,
    /// Token cost of the generated text, when the provider reports usage.
    pub completion_tokens: Option<u32>,
    /// Token cost of the prompt, when reported.
    pub prompt_tokens: Option<u32>,
}

/// Chat completion capability consumed by the session loop.
///
/// One call per cycle; a failed completion is reported, never retried.
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    /// Request one completion for the given bounded context.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faithful_policy_preserves_origins() {
        let policy = HistoryRolePolicy::Faithful;
        assert_eq!(policy.role_for(MessageOrigin::User), ChatRole::User);
        assert_eq!(policy.role_for(MessageOrigin::Agent), ChatRole::Assistant);
    }

    #[test]
    fn uniform_policy_tags_everything_assistant() {
        let policy = HistoryRolePolicy::Uniform;
        assert_eq!(policy.role_for(MessageOrigin::User), ChatRole::Assistant);
        assert_eq!(policy.role_for(MessageOrigin::Agent), ChatRole::Assistant);
    }

    #[test]
    fn default_policy_is_faithful() {
        assert_eq!(HistoryRolePolicy::default(), HistoryRolePolicy::Faithful);
    }
}
