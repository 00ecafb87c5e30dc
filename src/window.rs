//! Per-channel context window and token-budgeted history assembly.
//!
//! The window is a newest-first cache of the most recent messages for the
//! active channel, rebuilt wholesale on channel switch and front-inserted on
//! every recorded turn. History sent with a completion request is packed
//! greedily against a token budget: walk newest-first, stop at the first
//! message whose inclusion would exceed the budget. A single oversized
//! message therefore shuts out everything older — that is the contract, not
//! an accident to be smoothed over.

use std::sync::Arc;

use tracing::debug;

use crate::config::ChatConfig;
use crate::error::{CompanionError, Result};
use crate::store::{ConversationStore, Message, MessageOrigin};

/// Token accounting for one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBudget {
    /// Provider's maximum context size.
    pub total_context_tokens: u32,
    /// Tokens set aside for the generated completion.
    pub reserved_for_reply: u32,
    /// Fixed allowance for the persona's system instruction.
    pub reserved_for_system_prompt: u32,
    /// Fraction of the send budget kept free for the current user message.
    pub user_margin_fraction: f32,
}

impl TokenBudget {
    /// The ceiling against which history is packed:
    /// `(total - reply) * (1 - margin) - system`.
    pub fn history_budget(&self) -> u32 {
        let send_budget = self
            .total_context_tokens
            .saturating_sub(self.reserved_for_reply) as f32;
        let after_margin = send_budget * (1.0 - self.user_margin_fraction);
        (after_margin as u32).saturating_sub(self.reserved_for_system_prompt)
    }
}

impl From<&ChatConfig> for TokenBudget {
    fn from(config: &ChatConfig) -> Self {
        Self {
            total_context_tokens: config.max_context_tokens,
            reserved_for_reply: config.reply_reserve_tokens,
            reserved_for_system_prompt: config.system_prompt_reserve_tokens,
            user_margin_fraction: config.user_margin_fraction,
        }
    }
}

/// Owns the in-memory window for the active channel and writes turns
/// through to the [`ConversationStore`] before caching them.
///
/// Mutated only by the session loop that owns it; observers read cloned
/// snapshots instead of holding references into the window.
pub struct ContextWindowManager {
    store: Arc<ConversationStore>,
    load_limit: usize,
    channel_id: String,
    /// Newest-first cache for `channel_id`. The store is authoritative.
    window: Vec<Message>,
}

impl ContextWindowManager {
    /// Create a manager with no active channel.
    pub fn new(store: Arc<ConversationStore>, load_limit: usize) -> Self {
        Self {
            store,
            load_limit,
            channel_id: String::new(),
            window: Vec::new(),
        }
    }

    /// The active channel id, empty until the first [`load_channel`].
    ///
    /// [`load_channel`]: Self::load_channel
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Replace the window with the most recent messages for `channel_id`.
    ///
    /// Idempotent: loading an unchanged channel twice yields an identical
    /// window both times.
    pub fn load_channel(&mut self, channel_id: &str) -> Result<()> {
        let window = self.store.recent(channel_id, self.load_limit)?;
        debug!(
            channel = channel_id,
            messages = window.len(),
            "loaded channel window"
        );
        self.channel_id = channel_id.to_owned();
        self.window = window;
        Ok(())
    }

    /// Record a user turn: persist it, then front-insert into the window.
    pub fn record_user(&mut self, text: &str) -> Result<Message> {
        self.record(MessageOrigin::User, text, 0)
    }

    /// Record an agent reply with its reported completion token cost.
    pub fn record_agent(&mut self, text: &str, token_cost: u32) -> Result<Message> {
        self.record(MessageOrigin::Agent, text, token_cost)
    }

    fn record(&mut self, origin: MessageOrigin, text: &str, token_cost: u32) -> Result<Message> {
        if self.channel_id.is_empty() {
            return Err(CompanionError::Validation(
                "no active channel loaded".to_owned(),
            ));
        }
        let message = self
            .store
            .insert(&self.channel_id, origin, text, token_cost)?;
        self.window.insert(0, message.clone());
        Ok(message)
    }

    /// Assemble the bounded history for an outgoing request.
    ///
    /// Walks the window newest-first, accumulating `token_cost`. A message
    /// is included only if the running total stays within `history_budget`;
    /// iteration stops at the first message that would exceed it. The
    /// returned slice is newest-first, exactly as accumulated.
    pub fn bounded_history(&self, history_budget: u32) -> Vec<Message> {
        let mut result = Vec::new();
        let mut total: u64 = 0;
        for message in &self.window {
            if total + u64::from(message.token_cost) > u64::from(history_budget) {
                break;
            }
            total += u64::from(message.token_cost);
            result.push(message.clone());
        }
        result
    }

    /// Cloned view of the window for display, newest-first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.window.clone()
    }

    /// Number of cached messages.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn manager() -> ContextWindowManager {
        let store = Arc::new(ConversationStore::open_in_memory().expect("open store"));
        ContextWindowManager::new(store, 200)
    }

    fn budget() -> TokenBudget {
        TokenBudget::from(&ChatConfig::default())
    }

    #[test]
    fn default_history_budget_matches_contract() {
        // (4096 - 1000) * 0.9 - 100
        assert_eq!(budget().history_budget(), 2686);
    }

    #[test]
    fn history_budget_saturates_at_zero() {
        let tight = TokenBudget {
            total_context_tokens: 100,
            reserved_for_reply: 90,
            reserved_for_system_prompt: 100,
            user_margin_fraction: 0.1,
        };
        assert_eq!(tight.history_budget(), 0);
    }

    #[test]
    fn record_requires_loaded_channel() {
        let mut manager = manager();
        let result = manager.record_user("hello");
        assert!(matches!(result, Err(CompanionError::Validation(_))));
    }

    #[test]
    fn record_front_inserts_newest_first() {
        let mut manager = manager();
        manager.load_channel("hiyori").expect("load");
        manager.record_user("first").expect("record");
        manager.record_agent("second", 10).expect("record");

        let snapshot = manager.snapshot();
        assert_eq!(snapshot[0].text, "second");
        assert_eq!(snapshot[1].text, "first");
    }

    #[test]
    fn load_channel_is_idempotent() {
        let mut manager = manager();
        manager.load_channel("hiyori").expect("load");
        manager.record_user("hello").expect("record");
        manager.record_agent("hi", 7).expect("record");

        manager.load_channel("hiyori").expect("reload");
        let first = manager.snapshot();
        manager.load_channel("hiyori").expect("reload again");
        let second = manager.snapshot();
        assert_eq!(first, second);
    }

    #[test]
    fn load_channel_replaces_window_wholesale() {
        let mut manager = manager();
        manager.load_channel("hiyori").expect("load");
        manager.record_user("for hiyori").expect("record");

        manager.load_channel("kurisu").expect("switch");
        assert!(manager.is_empty());

        manager.load_channel("hiyori").expect("switch back");
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.snapshot()[0].text, "for hiyori");
    }

    #[test]
    fn load_respects_retrieval_cap() {
        let store = Arc::new(ConversationStore::open_in_memory().expect("open store"));
        let mut manager = ContextWindowManager::new(Arc::clone(&store), 3);
        for i in 0..5 {
            store
                .insert("hiyori", MessageOrigin::Agent, &format!("m{i}"), 1)
                .expect("insert");
        }
        manager.load_channel("hiyori").expect("load");
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.snapshot()[0].text, "m4");
    }

    #[test]
    fn bounded_history_two_messages_over_budget() {
        // Agent "A" (2000) then user "B" (2000, provider-reported prompt
        // cost); budget 2500 keeps only the newest.
        let store = Arc::new(ConversationStore::open_in_memory().expect("open store"));
        store
            .insert("hiyori", MessageOrigin::Agent, "A", 2000)
            .expect("insert");
        store
            .insert("hiyori", MessageOrigin::User, "B", 2000)
            .expect("insert");
        let mut manager = ContextWindowManager::new(store, 200);
        manager.load_channel("hiyori").expect("load");

        let history = manager.bounded_history(2500);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "B");
    }

    #[test]
    fn bounded_history_stops_at_first_overflow() {
        // A huge message in the middle shuts out everything older, even
        // though the oldest message alone would still fit.
        let mut manager = manager();
        manager.load_channel("hiyori").expect("load");
        manager.record_agent("old", 100).expect("record");
        manager.record_agent("huge", 5000).expect("record");
        manager.record_agent("new", 100).expect("record");

        let history = manager.bounded_history(300);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "new");
    }

    #[test]
    fn bounded_history_is_a_newest_first_prefix() {
        let mut manager = manager();
        manager.load_channel("hiyori").expect("load");
        for i in 0..10 {
            manager.record_agent(&format!("m{i}"), 100).expect("record");
        }

        let history = manager.bounded_history(350);
        let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["m9", "m8", "m7"]);
        let total: u32 = history.iter().map(|m| m.token_cost).sum();
        assert!(total <= 350);
    }

    #[test]
    fn zero_cost_user_turns_always_fit() {
        let mut manager = manager();
        manager.load_channel("hiyori").expect("load");
        manager.record_user("question").expect("record");
        manager.record_agent("answer", 50).expect("record");
        manager.record_user("follow-up").expect("record");

        let history = manager.bounded_history(50);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn zero_budget_yields_zero_cost_prefix() {
        let mut manager = manager();
        manager.load_channel("hiyori").expect("load");
        manager.record_agent("costly", 1).expect("record");
        manager.record_user("free").expect("record");

        let history = manager.bounded_history(0);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "free");
    }
}
