//! Request arbitration for conversation log fetches.
//!
//! Every fetch gets a fresh token; only the most recently issued token for a
//! conversation may write results. Issuing a new token supersedes all older
//! ones, so there is no explicit cancel.

#[cfg(test)]
#[path = "arbiter_test.rs"]
mod arbiter_test;

use crate::message::ConversationId;
use crate::store::{ConversationState, ConversationStore};

/// Opaque, monotonically increasing fetch token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Issue a new token for `conversation`, superseding any earlier one.
///
/// Creates the conversation's state if it does not exist yet.
pub fn issue(store: &mut ConversationStore, conversation: &ConversationId) -> RequestToken {
    let token = store.next_token();
    store.record_token(conversation, token);
    token
}

/// Whether `token` is still the latest issued for `conversation`.
///
/// Returns `false` for cleared conversations and never creates state.
#[must_use]
pub fn is_current(store: &ConversationStore, conversation: &ConversationId, token: RequestToken) -> bool {
    store
        .get(conversation)
        .and_then(ConversationState::last_issued_token)
        == Some(token)
}
