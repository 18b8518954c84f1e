//! Client-side message synchronization for chat conversations.
//!
//! DESIGN
//! ======
//! The crate keeps one canonical, ordered message list per conversation and
//! converges it with the server under concurrency:
//!
//! - `store` holds per-conversation state and replaces lists wholesale.
//! - `arbiter` issues fetch tokens; only the latest may write.
//! - `reconcile` merges server batches with local state.
//! - `session` inserts optimistic placeholders and resolves them.
//! - `sync` is the async driver over a `MessageApi` collaborator.
//!
//! Everything below `sync` is synchronous and performs no I/O.

pub mod api;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod message;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod sync;

pub use api::{HttpMessageApi, MessageApi, SendRequest};
pub use arbiter::RequestToken;
pub use config::SyncConfig;
pub use error::{ErrorCode, ErrorInfo, SyncError};
pub use message::{ConversationId, Message, MessageId, Role, TempId, TempKind};
pub use session::PendingSend;
pub use store::{ChainInfo, ConversationState, ConversationStore};
pub use sync::{LoadOutcome, MessageSync};
