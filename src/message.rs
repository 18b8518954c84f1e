//! Message model shared by the store, reconciler, and optimistic sessions.
//!
//! DESIGN
//! ======
//! Identifiers are a tagged variant. Server-assigned permanent ids are
//! totally ordered integers; temporary ids are process-local tokens that are
//! never compared numerically against permanent ones. Eviction and ordering
//! match on the variant instead of probing id strings.

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;

use std::fmt;

/// Text shown by the synthetic assistant entry while a reply is pending.
pub const THINKING_TEXT: &str = "Thinking...";

// =============================================================================
// CONVERSATION ID
// =============================================================================

/// Stable identifier of one chat thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(String);

impl ConversationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for ConversationId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

// =============================================================================
// ROLE
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// What a temporary identifier stands in for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TempKind {
    /// The user's own just-sent text.
    User,
    /// The "assistant is thinking" entry.
    Thinking,
    /// A server record that arrived without a usable id.
    Detached,
}

impl TempKind {
    fn label(self) -> &'static str {
        match self {
            Self::User => "u",
            Self::Thinking => "thinking",
            Self::Detached => "detached",
        }
    }
}

/// Process-local identifier for a message the server has not numbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TempId {
    pub kind: TempKind,
    /// Local issue time in milliseconds; orders temporaries among themselves.
    pub issued_at: i64,
    /// Disambiguates detached records sharing an issue time. Zero otherwise.
    pub nonce: u64,
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TempKind::Detached => write!(f, "tmp-{}-{}-{}", self.kind.label(), self.issued_at, self.nonce),
            _ => write!(f, "tmp-{}-{}", self.kind.label(), self.issued_at),
        }
    }
}

/// Message identity: either server-assigned or a local placeholder token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageId {
    Permanent(i64),
    Temporary(TempId),
}

impl MessageId {
    #[must_use]
    pub fn temporary(kind: TempKind, issued_at: i64) -> Self {
        Self::Temporary(TempId { kind, issued_at, nonce: 0 })
    }

    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// The numeric server id, if this is a permanent identifier.
    #[must_use]
    pub fn permanent(&self) -> Option<i64> {
        match self {
            Self::Permanent(id) => Some(*id),
            Self::Temporary(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent(id) => write!(f, "{id}"),
            Self::Temporary(tmp) => tmp.fmt(f),
        }
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// A single chat message as held in a conversation's canonical list.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub author_role: Role,
    /// Server-side author id, when known.
    pub author_id: Option<i64>,
    pub text: String,
    /// Server-formatted creation time; opaque to ordering.
    pub created_at: Option<String>,
    pub is_placeholder: bool,
    pub is_thinking_placeholder: bool,
    /// Presentation hint: the message arrived fresh and may be typed out.
    pub should_animate: bool,
}

impl Message {
    /// A server-confirmed message carrying a permanent id.
    #[must_use]
    pub fn persisted(id: i64, conversation_id: ConversationId, author_role: Role, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::Permanent(id),
            conversation_id,
            author_role,
            author_id: None,
            text: text.into(),
            created_at: None,
            is_placeholder: false,
            is_thinking_placeholder: false,
            should_animate: false,
        }
    }

    /// Optimistic copy of the user's own text, shown before the server confirms it.
    #[must_use]
    pub fn user_placeholder(
        conversation_id: ConversationId,
        author_id: i64,
        text: impl Into<String>,
        issued_at: i64,
    ) -> Self {
        Self {
            id: MessageId::temporary(TempKind::User, issued_at),
            conversation_id,
            author_role: Role::User,
            author_id: Some(author_id),
            text: text.into(),
            created_at: None,
            is_placeholder: true,
            is_thinking_placeholder: false,
            should_animate: false,
        }
    }

    /// Synthetic assistant entry standing in for a reply that is still being generated.
    #[must_use]
    pub fn thinking_placeholder(conversation_id: ConversationId, issued_at: i64) -> Self {
        Self {
            id: MessageId::temporary(TempKind::Thinking, issued_at),
            conversation_id,
            author_role: Role::Assistant,
            author_id: None,
            text: THINKING_TEXT.to_owned(),
            created_at: None,
            is_placeholder: true,
            is_thinking_placeholder: true,
            should_animate: false,
        }
    }

    #[must_use]
    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }
}
