//! Merge incoming server batches into a conversation's canonical list.
//!
//! DESIGN
//! ======
//! Merging is pure and total. The working set is keyed by identifier with
//! the incoming batch overlaid on the current list, so an incoming entry wins
//! on collision. Temporary entries are evicted only when the caller names
//! them explicitly and the batch carries at least one permanent id; ids are
//! never matched by similarity.
//!
//! Canonical order: permanent ids ascending, then temporaries by local issue
//! time. The sort is stable, so ties keep insertion order.

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;

use std::collections::HashMap;

use tracing::debug;

use crate::message::{ConversationId, Message, MessageId};
use crate::store::ConversationStore;

/// Produce the canonical list for `current` after receiving `incoming`.
///
/// `superseded` names the temporary ids the batch replaces (empty for plain
/// log fetches). An empty batch returns `current` unchanged.
#[must_use]
pub fn merge(current: &[Message], incoming: &[Message], superseded: &[MessageId]) -> Vec<Message> {
    if incoming.is_empty() {
        return current.to_vec();
    }

    let mut merged: Vec<Message> = Vec::with_capacity(current.len() + incoming.len());
    let mut index: HashMap<MessageId, usize> = HashMap::with_capacity(merged.capacity());

    for message in current.iter().chain(incoming) {
        match index.get(&message.id) {
            Some(&at) => {
                // Animation hints survive until presentation clears them.
                let animate = merged[at].should_animate || message.should_animate;
                merged[at] = message.clone();
                merged[at].should_animate = animate;
            }
            None => {
                index.insert(message.id, merged.len());
                merged.push(message.clone());
            }
        }
    }

    if incoming.iter().any(|m| m.id.is_permanent()) {
        let evicted = evict(&mut merged, superseded);
        if evicted > 0 {
            debug!(evicted, superseded = superseded.len(), "placeholders evicted");
        }
    }

    sort_canonical(&mut merged);
    merged
}

/// Drop the temporary entries named in `superseded`. Returns how many were removed.
fn evict(messages: &mut Vec<Message>, superseded: &[MessageId]) -> usize {
    let before = messages.len();
    messages.retain(|m| !(m.id.is_temporary() && superseded.contains(&m.id)));
    before - messages.len()
}

/// Stable sort into canonical order.
pub fn sort_canonical(messages: &mut [Message]) {
    messages.sort_by_key(|m| order_key(m.id));
}

fn order_key(id: MessageId) -> (u8, i64) {
    match id {
        MessageId::Permanent(n) => (0, n),
        MessageId::Temporary(tmp) => (1, tmp.issued_at),
    }
}

/// Copy of `current` without the named ids. Order is preserved.
#[must_use]
pub fn without(current: &[Message], ids: &[MessageId]) -> Vec<Message> {
    current
        .iter()
        .filter(|m| !ids.contains(&m.id))
        .cloned()
        .collect()
}

/// Merge `incoming` into the stored list for `conversation` and replace it.
///
/// Empty batches leave the stored list untouched.
pub fn apply(
    store: &mut ConversationStore,
    conversation: &ConversationId,
    incoming: &[Message],
    superseded: &[MessageId],
) {
    if incoming.is_empty() {
        return;
    }
    let before = store.messages(conversation).len();
    let merged = merge(store.messages(conversation), incoming, superseded);
    debug!(
        %conversation,
        incoming = incoming.len(),
        before,
        after = merged.len(),
        "merged message batch"
    );
    store.set_messages(conversation, merged);
}
