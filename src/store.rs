//! Per-conversation message state.
//!
//! DESIGN
//! ======
//! The store exclusively owns every conversation's state. Message lists are
//! held as `Arc<[Message]>` and only ever replaced whole, so a reader holding
//! a snapshot sees either the old list or the new one, never an interleaving.
//!
//! State is created lazily on first access and removed by `clear`. Request
//! tokens come from one store-wide counter that survives `clear`, so a token
//! issued before a conversation was cleared can never match one issued after
//! the conversation was recreated.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashMap;
use std::sync::Arc;

use crate::arbiter::RequestToken;
use crate::error::ErrorInfo;
use crate::message::{ConversationId, Message, MessageId};

// =============================================================================
// CONVERSATION STATE
// =============================================================================

/// Everything known about one conversation's message log.
#[derive(Clone, Debug)]
pub struct ConversationState {
    messages: Arc<[Message]>,
    is_loading_log: bool,
    last_issued_token: Option<RequestToken>,
    pending_error: Option<ErrorInfo>,
}

impl ConversationState {
    fn new() -> Self {
        Self { messages: Arc::from(Vec::new()), is_loading_log: false, last_issued_token: None, pending_error: None }
    }

    /// Canonical, ordered, deduplicated message list.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn is_loading_log(&self) -> bool {
        self.is_loading_log
    }

    #[must_use]
    pub fn last_issued_token(&self) -> Option<RequestToken> {
        self.last_issued_token
    }

    #[must_use]
    pub fn pending_error(&self) -> Option<&ErrorInfo> {
        self.pending_error.as_ref()
    }
}

/// First and last permanent ids of a conversation, sent along with a new message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainInfo {
    pub root_id: Option<i64>,
    pub parent_id: Option<i64>,
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ConversationId, ConversationState>,
    active: Option<ConversationId>,
    token_seq: u64,
    last_temp_stamp: Option<i64>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the conversation's state, creating an empty one if absent.
    pub fn ensure(&mut self, id: &ConversationId) -> &ConversationState {
        self.state_mut(id)
    }

    fn state_mut(&mut self, id: &ConversationId) -> &mut ConversationState {
        self.conversations
            .entry(id.clone())
            .or_insert_with(ConversationState::new)
    }

    /// Read a conversation's state without creating it.
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<&ConversationState> {
        self.conversations.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.contains_key(id)
    }

    /// Number of conversations with live state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Remove one conversation's state, or every conversation when `id` is `None`.
    ///
    /// Tokens issued for removed conversations can never become current again.
    pub fn clear(&mut self, id: Option<&ConversationId>) {
        match id {
            Some(id) => {
                self.conversations.remove(id);
                if self.active.as_ref() == Some(id) {
                    self.active = None;
                }
            }
            None => {
                self.conversations.clear();
                self.active = None;
            }
        }
    }

    /// Replace the whole message list. Callers pass a list already in canonical order.
    pub fn set_messages(&mut self, id: &ConversationId, messages: Vec<Message>) {
        self.state_mut(id).messages = Arc::from(messages);
    }

    pub fn set_loading(&mut self, id: &ConversationId, loading: bool) {
        self.state_mut(id).is_loading_log = loading;
    }

    pub fn set_error(&mut self, id: &ConversationId, info: Option<ErrorInfo>) {
        self.state_mut(id).pending_error = info;
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Shared handle to the current list; unaffected by later replacements.
    #[must_use]
    pub fn snapshot(&self, id: &ConversationId) -> Arc<[Message]> {
        self.get(id)
            .map_or_else(|| Arc::from(Vec::new()), |state| Arc::clone(&state.messages))
    }

    /// Current list, or an empty slice for unknown conversations.
    #[must_use]
    pub fn messages(&self, id: &ConversationId) -> &[Message] {
        self.get(id)
            .map_or(&[] as &[Message], ConversationState::messages)
    }

    #[must_use]
    pub fn is_loading(&self, id: &ConversationId) -> bool {
        self.get(id).is_some_and(ConversationState::is_loading_log)
    }

    #[must_use]
    pub fn error(&self, id: &ConversationId) -> Option<&ErrorInfo> {
        self.get(id).and_then(ConversationState::pending_error)
    }

    #[must_use]
    pub fn last_message(&self, id: &ConversationId) -> Option<&Message> {
        self.messages(id).last()
    }

    /// Whether an "assistant is thinking" entry is currently shown.
    #[must_use]
    pub fn has_thinking(&self, id: &ConversationId) -> bool {
        self.messages(id)
            .iter()
            .any(|m| m.is_thinking_placeholder)
    }

    /// Root (first) and parent (last) permanent ids of the canonical list.
    #[must_use]
    pub fn chain_info(&self, id: &ConversationId) -> ChainInfo {
        let mut permanent = self
            .messages(id)
            .iter()
            .filter_map(|m| m.id.permanent());
        let root_id = permanent.next();
        let parent_id = permanent.last().or(root_id);
        ChainInfo { root_id, parent_id }
    }

    // -------------------------------------------------------------------------
    // Active conversation
    // -------------------------------------------------------------------------

    /// Mark the conversation the user is looking at. Creates its state.
    pub fn set_active(&mut self, id: &ConversationId) {
        self.state_mut(id);
        self.active = Some(id.clone());
    }

    #[must_use]
    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn active_messages(&self) -> &[Message] {
        self.active
            .as_ref()
            .map_or(&[] as &[Message], |id| self.messages(id))
    }

    // -------------------------------------------------------------------------
    // Presentation hints
    // -------------------------------------------------------------------------

    /// Acknowledge that a message finished animating.
    ///
    /// Returns `true` when a flag was cleared.
    pub fn clear_animation_flag(&mut self, id: &ConversationId, message_id: MessageId) -> bool {
        let Some(state) = self.conversations.get_mut(id) else {
            return false;
        };
        if !state
            .messages
            .iter()
            .any(|m| m.id == message_id && m.should_animate)
        {
            return false;
        }
        let updated: Vec<Message> = state
            .messages
            .iter()
            .cloned()
            .map(|mut m| {
                if m.id == message_id {
                    m.should_animate = false;
                }
                m
            })
            .collect();
        state.messages = Arc::from(updated);
        true
    }

    // -------------------------------------------------------------------------
    // Counters used by the arbiter and optimistic sessions
    // -------------------------------------------------------------------------

    pub(crate) fn next_token(&mut self) -> RequestToken {
        self.token_seq += 1;
        RequestToken::new(self.token_seq)
    }

    pub(crate) fn record_token(&mut self, id: &ConversationId, token: RequestToken) {
        self.state_mut(id).last_issued_token = Some(token);
    }

    /// Reserve `span` consecutive issue times starting at or after `now`.
    ///
    /// Stamps never repeat within a store, even when the clock stalls or
    /// goes backwards.
    pub(crate) fn allocate_temp_stamps(&mut self, now: i64, span: i64) -> i64 {
        let start = match self.last_temp_stamp {
            Some(last) if last >= now => last + 1,
            _ => now,
        };
        self.last_temp_stamp = Some(start + span.max(1) - 1);
        start
    }
}
