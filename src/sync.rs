//! Async driver wiring the network collaborator to the conversation core.
//!
//! DESIGN
//! ======
//! `MessageSync` owns the store behind `Arc<Mutex<_>>`. The lock is taken
//! only for run-to-completion steps and is always released before awaiting
//! the network, so each store mutation is atomic and no suspension happens
//! inside the core.
//!
//! ORDERING
//! ========
//! Log fetches are gated by the request arbiter: only the most recently
//! issued fetch for a conversation may write, whichever completes first.
//! Optimistic placeholders are inserted synchronously before the send is
//! awaited, so they always precede any fetch result applied afterwards.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::api::{MessageApi, SendRequest};
use crate::arbiter;
use crate::error::{ErrorInfo, SyncError};
use crate::message::{ConversationId, Message, MessageId};
use crate::reconcile;
use crate::session::{self, PendingSend};
use crate::store::ConversationStore;

/// What happened to a completed log fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result was current and has been merged.
    Applied,
    /// A newer fetch was issued (or the conversation was cleared); the result was dropped.
    Stale,
}

pub struct MessageSync<A> {
    api: A,
    store: Arc<Mutex<ConversationStore>>,
}

impl<A: MessageApi> MessageSync<A> {
    #[must_use]
    pub fn new(api: A) -> Self {
        Self::with_store(api, Arc::new(Mutex::new(ConversationStore::new())))
    }

    #[must_use]
    pub fn with_store(api: A, store: Arc<Mutex<ConversationStore>>) -> Self {
        Self { api, store }
    }

    /// Shared handle to the underlying store.
    #[must_use]
    pub fn store(&self) -> Arc<Mutex<ConversationStore>> {
        Arc::clone(&self.store)
    }

    fn lock(&self) -> MutexGuard<'_, ConversationStore> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current canonical list for `conversation`.
    #[must_use]
    pub fn snapshot(&self, conversation: &ConversationId) -> Arc<[Message]> {
        self.lock().snapshot(conversation)
    }

    /// Drop one conversation's state, or all of it on logout.
    pub fn clear(&self, conversation: Option<&ConversationId>) {
        self.lock().clear(conversation);
    }

    /// Switch the visible conversation and fetch its log.
    ///
    /// With `reset`, existing state is discarded first.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the current fetch fails.
    pub async fn open(&self, conversation: &ConversationId, reset: bool) -> Result<LoadOutcome, SyncError> {
        {
            let mut store = self.lock();
            if reset {
                store.clear(Some(conversation));
            }
            store.set_active(conversation);
        }
        self.load(conversation).await
    }

    /// Fetch the conversation log and merge it if this is still the latest fetch.
    ///
    /// On failure the existing list is kept and the error is recorded as the
    /// conversation's pending error.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the current fetch fails. Failures of
    /// superseded fetches are dropped and reported as [`LoadOutcome::Stale`].
    pub async fn load(&self, conversation: &ConversationId) -> Result<LoadOutcome, SyncError> {
        let token = {
            let mut store = self.lock();
            let token = arbiter::issue(&mut store, conversation);
            store.set_loading(conversation, true);
            store.set_error(conversation, None);
            token
        };

        let result = self.api.fetch_log(conversation).await;

        let mut store = self.lock();
        if !arbiter::is_current(&store, conversation, token) {
            debug!(%conversation, token = token.get(), "dropping stale fetch result");
            return Ok(LoadOutcome::Stale);
        }
        store.set_loading(conversation, false);
        match result {
            Ok(batch) => {
                reconcile::apply(&mut store, conversation, &batch, &[]);
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                warn!(%conversation, error = %e, "message log fetch failed");
                store.set_error(conversation, Some(ErrorInfo::from(&e)));
                Err(e)
            }
        }
    }

    /// Send a message, showing it optimistically until the server answers.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`session::begin`] before anything is
    /// inserted, or the send error after the placeholders were inserted. On a
    /// send error the placeholders stay; callers that need their ids should
    /// use [`MessageSync::begin_send`] and [`MessageSync::finish_send`].
    pub async fn send(
        &self,
        conversation: &ConversationId,
        author_id: Option<i64>,
        text: &str,
    ) -> Result<PendingSend, SyncError> {
        self.send_at(conversation, author_id, text, now_ms())
            .await
    }

    async fn send_at(
        &self,
        conversation: &ConversationId,
        author_id: Option<i64>,
        text: &str,
        now: i64,
    ) -> Result<PendingSend, SyncError> {
        let (pending, request) = self.begin_send_at(conversation, author_id, text, now)?;
        self.finish_send(&pending, &request).await?;
        Ok(pending)
    }

    /// Insert the optimistic placeholders and build the request to persist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EmptyText`] or [`SyncError::MissingAuthor`]; the
    /// store is untouched in both cases.
    pub fn begin_send(
        &self,
        conversation: &ConversationId,
        author_id: Option<i64>,
        text: &str,
    ) -> Result<(PendingSend, SendRequest), SyncError> {
        self.begin_send_at(conversation, author_id, text, now_ms())
    }

    fn begin_send_at(
        &self,
        conversation: &ConversationId,
        author_id: Option<i64>,
        text: &str,
        now: i64,
    ) -> Result<(PendingSend, SendRequest), SyncError> {
        let mut store = self.lock();
        let chain = store.chain_info(conversation);
        let pending = session::begin(&mut store, conversation, author_id, text, now)?;
        let request = SendRequest {
            conversation: conversation.clone(),
            author_id: pending.author_id,
            text: text.trim().to_owned(),
            parent_id: chain.parent_id,
            root_id: chain.root_id,
        };
        Ok((pending, request))
    }

    /// Persist a prepared message and swap its placeholders for the reply.
    ///
    /// # Errors
    ///
    /// Returns the collaborator error. The placeholders named by `pending`
    /// are left in place.
    pub async fn finish_send(&self, pending: &PendingSend, request: &SendRequest) -> Result<(), SyncError> {
        let conversation = &request.conversation;
        match self.api.send_message(request).await {
            Ok(batch) => {
                let mut store = self.lock();
                session::complete(&mut store, conversation, &pending.temp_ids(), batch);
                Ok(())
            }
            Err(e) => {
                warn!(%conversation, error = %e, "message send failed; placeholders kept");
                Err(e)
            }
        }
    }

    /// Remove placeholders left by a failed send.
    pub fn discard(&self, conversation: &ConversationId, temp_ids: &[MessageId]) -> usize {
        session::discard(&mut self.lock(), conversation, temp_ids)
    }
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
