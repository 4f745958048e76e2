use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_TTL_HOURS: i64 = 1;
pub const MAX_MESSAGE_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// A chat message as accepted by the gateway's chat API.
///
/// Shape and role are validated by the request layer; the session engine
/// treats messages as opaque, well-formed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a tool result message answering the call `tool_call_id`
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    pub fn is_tool(&self) -> bool {
        self.role == Role::Tool
    }

    /// Approximate heap plus inline footprint in bytes
    pub fn estimated_size(&self) -> usize {
        let optional = |s: &Option<String>| s.as_ref().map_or(0, String::len);
        let tool_calls: usize = self
            .tool_calls
            .iter()
            .flatten()
            .map(ToolCall::estimated_size)
            .sum();

        std::mem::size_of::<Self>()
            + self.content.len()
            + optional(&self.name)
            + optional(&self.tool_call_id)
            + tool_calls
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, passed through verbatim
    pub arguments: String,
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: default_tool_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.len()
            + self.kind.len()
            + self.function.name.len()
            + self.function.arguments.len()
    }
}

/// Per-session lifetime and retention settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub ttl: Duration,
    pub max_messages: usize,
    pub track_access_count: bool,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            max_messages: MAX_MESSAGE_HISTORY,
            track_access_count: false,
        }
    }
}

/// One conversation's state.
///
/// Timestamps are private: `expires_at` only ever moves together with
/// `last_accessed` through [`Session::touch_at`].
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    messages: VecDeque<Message>,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    access_count: u64,
    limits: SessionLimits,
}

impl Session {
    pub fn new(session_id: impl Into<String>, limits: SessionLimits) -> Self {
        Self::new_at(session_id, limits, Utc::now())
    }

    pub fn new_at(session_id: impl Into<String>, limits: SessionLimits, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: VecDeque::new(),
            created_at: now,
            last_accessed: now,
            expires_at: now + limits.ttl,
            access_count: 0,
            limits,
        }
    }

    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    /// Marks the session as accessed at `now` and renews its TTL from there
    pub fn touch_at(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.expires_at = now + self.limits.ttl;
        if self.limits.track_access_count {
            self.access_count += 1;
        }
    }

    /// Appends `batch`, drops the oldest entries beyond the history limit,
    /// then renews the TTL.
    pub fn add_messages(&mut self, batch: impl IntoIterator<Item = Message>) {
        self.messages.extend(batch);

        let excess = self.messages.len().saturating_sub(self.limits.max_messages);
        if excess > 0 {
            self.messages.drain(..excess);
        }

        self.touch();
    }

    pub fn add_message(&mut self, message: Message) {
        self.add_messages(std::iter::once(message));
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A session is still live at the exact instant it expires
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns an owned copy of the history, oldest first
    pub fn get_all_messages(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        self.last_accessed
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Approximate memory held by this session in bytes
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.session_id.len()
            + self.messages.iter().map(Message::estimated_size).sum::<usize>()
    }

    pub fn to_info(&self) -> SessionInfo {
        SessionInfo::from(self)
    }
}

/// Serializable snapshot of a [`Session`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_count: Option<u64>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            messages: session.get_all_messages(),
            message_count: session.message_count(),
            created_at: session.created_at,
            last_accessed: session.last_accessed,
            expires_at: session.expires_at,
            access_count: session
                .limits
                .track_access_count
                .then_some(session.access_count),
        }
    }
}
