//! Message API collaborator: the trait the sync layer calls, plus an HTTP
//! implementation against the project chat endpoints.
//!
//! DESIGN
//! ======
//! The core never performs I/O itself. `MessageApi` is the seam; tests plug in
//! a mock, the binary plugs in `HttpMessageApi`. Response parsing is a pure
//! function so payload-shape handling is testable without a server.
//!
//! PAYLOAD SHAPES
//! ==============
//! The server answers with a bare array, `{values: [...]}`,
//! `{messages: [...]}`, `{message: {...}}`, or a single object. Records
//! without a usable integer id get a detached temporary id so they are never
//! dropped. The detached id is derived from the raw id or, failing that, the
//! record's content, so refetching the same log yields the same ids.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::message::{ConversationId, Message, MessageId, Role, TempId, TempKind};

/// Server author ids reserved for the assistant.
const ASSISTANT_USER_IDS: [i64; 2] = [0, 2];

// =============================================================================
// COLLABORATOR TRAIT
// =============================================================================

/// Everything needed to persist one user message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendRequest {
    pub conversation: ConversationId,
    pub author_id: i64,
    pub text: String,
    /// Most recent permanent id in the conversation at call time.
    pub parent_id: Option<i64>,
    /// First permanent id in the conversation at call time.
    pub root_id: Option<i64>,
}

/// Network collaborator for conversation logs.
#[async_trait::async_trait]
pub trait MessageApi: Send + Sync {
    /// Fetch a conversation's full log, unordered.
    async fn fetch_log(&self, conversation: &ConversationId) -> Result<Vec<Message>, SyncError>;

    /// Persist a user message; the result holds at least the stored user
    /// message and the generated assistant reply.
    async fn send_message(&self, request: &SendRequest) -> Result<Vec<Message>, SyncError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpMessageApi {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    api_token: Option<String>,
}

impl HttpMessageApi {
    /// Build an HTTP client from parsed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| SyncError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            project_id: config.project_id.clone(),
            api_token: config.api_token.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl MessageApi for HttpMessageApi {
    async fn fetch_log(&self, conversation: &ConversationId) -> Result<Vec<Message>, SyncError> {
        let url = messages_endpoint(&self.base_url, &self.project_id, conversation);
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::ApiRequest(e.to_string()))?;
        read_batch(response, conversation).await
    }

    async fn send_message(&self, request: &SendRequest) -> Result<Vec<Message>, SyncError> {
        let url = messages_endpoint(&self.base_url, &self.project_id, &request.conversation);
        let body = CreateMessageBody {
            text: &request.text,
            user_id: request.author_id,
            parent_id: request.parent_id,
            root_id: request.root_id,
        };
        let response = self
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::ApiRequest(e.to_string()))?;
        read_batch(response, &request.conversation).await
    }
}

async fn read_batch(response: reqwest::Response, conversation: &ConversationId) -> Result<Vec<Message>, SyncError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| SyncError::ApiRequest(e.to_string()))?;

    if !(200..300).contains(&status) {
        return Err(SyncError::ApiResponse { status, body: text });
    }

    parse_batch(&text, conversation)
}

fn messages_endpoint(base_url: &str, project_id: &str, conversation: &ConversationId) -> String {
    format!("{base_url}/projects/{project_id}/chats/{conversation}/messages/")
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    text: &'a str,
    user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    is_user: Option<bool>,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl WireMessage {
    fn author_role(&self) -> Role {
        match self.role.as_deref() {
            Some("assistant") => Role::Assistant,
            Some("user") => Role::User,
            _ => match self.is_user {
                Some(true) => Role::User,
                Some(false) => Role::Assistant,
                None if self
                    .user_id
                    .is_some_and(|id| ASSISTANT_USER_IDS.contains(&id)) =>
                {
                    Role::Assistant
                }
                None => Role::User,
            },
        }
    }

    /// Fallback identity for records the server sent without an id.
    fn content_key(&self, author_role: Role) -> MessageId {
        let mut hasher = DefaultHasher::new();
        author_role.hash(&mut hasher);
        self.user_id.hash(&mut hasher);
        self.text.hash(&mut hasher);
        self.created_at.hash(&mut hasher);
        detached(hasher.finish())
    }

    fn into_message(self, conversation: &ConversationId) -> Message {
        let author_role = self.author_role();
        let id = wire_id(self.id.as_ref()).unwrap_or_else(|| self.content_key(author_role));
        Message {
            id,
            conversation_id: conversation.clone(),
            author_role,
            author_id: self.user_id,
            text: self.text.unwrap_or_default(),
            created_at: self.created_at,
            is_placeholder: false,
            is_thinking_placeholder: false,
            should_animate: false,
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a response body into messages for `conversation`.
fn parse_batch(body: &str, conversation: &ConversationId) -> Result<Vec<Message>, SyncError> {
    let payload: Value = serde_json::from_str(body).map_err(|e| SyncError::ApiParse(e.to_string()))?;
    normalize_payload(payload)
        .into_iter()
        .map(|item| {
            serde_json::from_value::<WireMessage>(item)
                .map(|wire| wire.into_message(conversation))
                .map_err(|e| SyncError::ApiParse(e.to_string()))
        })
        .collect()
}

/// Flatten the accepted payload shapes into a list of records.
fn normalize_payload(payload: Value) -> Vec<Value> {
    match payload {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["values", "messages"] {
                if matches!(map.get(key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove(key) {
                        return items;
                    }
                }
            }
            match map.remove("message") {
                Some(message) if !message.is_null() => vec![message],
                _ => vec![Value::Object(map)],
            }
        }
        other => vec![other],
    }
}

/// Identity carried by the record itself, if it has one.
fn wire_id(raw: Option<&Value>) -> Option<MessageId> {
    match raw {
        Some(Value::Number(n)) => Some(
            n.as_i64()
                .map_or_else(|| detached_from(&n.to_string()), MessageId::Permanent),
        ),
        Some(Value::String(s)) => Some(
            s.trim()
                .parse::<i64>()
                .map_or_else(|_| detached_from(s), MessageId::Permanent),
        ),
        _ => None,
    }
}

/// Detached id keyed on the raw server id, so refetching the same record
/// maps to the same key.
fn detached_from(raw: &str) -> MessageId {
    let mut hasher = DefaultHasher::new();
    raw.hash(&mut hasher);
    detached(hasher.finish())
}

fn detached(nonce: u64) -> MessageId {
    MessageId::Temporary(TempId { kind: TempKind::Detached, issued_at: 0, nonce })
}
