//! Optimistic bookkeeping for one "user sends a message" interaction.
//!
//! DESIGN
//! ======
//! `begin` inserts the user's text and a thinking entry under fresh temporary
//! ids in the same call, so the send is visible before any network latency.
//! `complete` hands the server batch to the reconciler together with the
//! exact temporary ids `begin` produced; those ids are the only link between
//! a placeholder and its real counterpart.
//!
//! A failed send is not rolled back here. Removing placeholders is the
//! caller's decision and goes through `discard`.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::HashSet;

use tracing::debug;

use crate::error::SyncError;
use crate::message::{ConversationId, Message, MessageId, Role};
use crate::reconcile;
use crate::store::ConversationStore;

/// Temporary ids created by [`begin`], passed back to [`complete`] or [`discard`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingSend {
    pub user_id: MessageId,
    pub thinking_id: MessageId,
    /// Author the placeholder was created for.
    pub author_id: i64,
}

impl PendingSend {
    #[must_use]
    pub fn temp_ids(&self) -> [MessageId; 2] {
        [self.user_id, self.thinking_id]
    }
}

/// Pick the author for an outgoing message: the logged-in user when valid,
/// otherwise the configured guest.
#[must_use]
pub fn resolve_author(logged_in: Option<i64>, guest: Option<i64>) -> Option<i64> {
    logged_in.filter(|id| *id > 0).or(guest)
}

/// Insert the user placeholder and a thinking placeholder for a new send.
///
/// Any thinking placeholder left by an earlier send is replaced so the
/// conversation never shows more than one.
///
/// # Errors
///
/// Returns [`SyncError::EmptyText`] when `text` is blank and
/// [`SyncError::MissingAuthor`] when no author id is available.
pub fn begin(
    store: &mut ConversationStore,
    conversation: &ConversationId,
    author_id: Option<i64>,
    text: &str,
    now: i64,
) -> Result<PendingSend, SyncError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SyncError::EmptyText);
    }
    let Some(author_id) = author_id else {
        return Err(SyncError::MissingAuthor);
    };

    let stamp = store.allocate_temp_stamps(now, 2);
    let user = Message::user_placeholder(conversation.clone(), author_id, text, stamp);
    let thinking = Message::thinking_placeholder(conversation.clone(), stamp + 1);
    let pending = PendingSend { user_id: user.id, thinking_id: thinking.id, author_id };

    let earlier_thinking: Vec<MessageId> = store
        .messages(conversation)
        .iter()
        .filter(|m| m.is_thinking_placeholder)
        .map(|m| m.id)
        .collect();
    let current = reconcile::without(store.messages(conversation), &earlier_thinking);
    let merged = reconcile::merge(&current, &[user, thinking], &[]);
    store.set_messages(conversation, merged);

    debug!(%conversation, user = %pending.user_id, thinking = %pending.thinking_id, "optimistic send started");
    Ok(pending)
}

/// Replace the placeholders named by `temp_ids` with the server's batch.
///
/// Assistant messages not already in the list are flagged `should_animate`.
/// Returns `false` without touching the store when the conversation was
/// cleared in the meantime or the batch is empty.
pub fn complete(
    store: &mut ConversationStore,
    conversation: &ConversationId,
    temp_ids: &[MessageId],
    server_batch: Vec<Message>,
) -> bool {
    if !store.contains(conversation) {
        debug!(%conversation, "send completed after conversation was cleared; ignoring");
        return false;
    }
    if server_batch.is_empty() {
        return false;
    }

    let known: HashSet<MessageId> = store
        .messages(conversation)
        .iter()
        .map(|m| m.id)
        .collect();
    let batch: Vec<Message> = server_batch
        .into_iter()
        .map(|mut m| {
            if m.author_role == Role::Assistant && !known.contains(&m.id) {
                m.should_animate = true;
            }
            m
        })
        .collect();

    let shown = |store: &ConversationStore| {
        store
            .messages(conversation)
            .iter()
            .filter(|m| temp_ids.contains(&m.id))
            .count()
    };
    let before = shown(&*store);
    reconcile::apply(store, conversation, &batch, temp_ids);
    debug!(%conversation, evicted = before.saturating_sub(shown(&*store)), "optimistic send completed");
    true
}

/// Remove placeholders explicitly, e.g. after the caller gives up on a failed send.
///
/// Returns the number of messages removed.
pub fn discard(store: &mut ConversationStore, conversation: &ConversationId, temp_ids: &[MessageId]) -> usize {
    let temporary: Vec<MessageId> = temp_ids
        .iter()
        .copied()
        .filter(MessageId::is_temporary)
        .collect();
    let Some(state) = store.get(conversation) else {
        return 0;
    };
    let before = state.messages().len();
    let remaining = reconcile::without(state.messages(), &temporary);
    let removed = before - remaining.len();
    if removed > 0 {
        store.set_messages(conversation, remaining);
        debug!(%conversation, removed, "placeholders discarded");
    }
    removed
}
