//! Canonical message model.
//!
//! Conversation history reaches the orchestrator in many shapes (client
//! payloads, legacy checkpoints, engine output). Everything downstream of
//! the normalizer works on exactly four variants: User, Assistant, Tool and
//! System. `RawMessage` is the boundary type that may still hold an
//! unparsed record.

use serde::{Deserialize, Serialize};

/// Content of a user message: a plain string or a list of content parts
/// (`"text"` strings or `{"type": "text", "text": ...}` objects).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

impl MessageContent {
    /// Flatten to a single string.
    ///
    /// Parts are joined with a space; if no text part exists the list is
    /// stringified so nothing is silently dropped.
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => {
                let joined = parts
                    .iter()
                    .filter_map(|part| match part {
                        serde_json::Value::String(s) => Some(s.as_str()),
                        serde_json::Value::Object(map)
                            if map.get("type").and_then(|t| t.as_str()) == Some("text") =>
                        {
                            map.get("text").and_then(|t| t.as_str())
                        }
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                let trimmed = joined.trim();
                if trimmed.is_empty() {
                    serde_json::Value::Array(parts.clone()).to_string()
                } else {
                    trimmed.to_string()
                }
            }
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    #[serde(default)]
    pub arguments: String,
}

/// One of the four normalized message variants.
///
/// A `Tool` message always carries both its call id and tool name; records
/// missing either are never turned into this variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum CanonicalMessage {
    User {
        content: MessageContent,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<MessageToolCall>,
    },
    Tool {
        content: String,
        tool_call_id: String,
        name: String,
    },
    System {
        content: String,
    },
}

impl CanonicalMessage {
    /// Create a new user message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a new assistant message without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<MessageToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Create a tool result message.
    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    /// Upper-case role label used when rendering history as plain text.
    pub fn role_label(&self) -> &'static str {
        match self {
            Self::User { .. } => "USER",
            Self::Assistant { .. } => "ASSISTANT",
            Self::Tool { .. } => "TOOL",
            Self::System { .. } => "SYSTEM",
        }
    }

    /// The text of any variant (user content is flattened).
    pub fn text(&self) -> String {
        match self {
            Self::User { content } => content.flatten(),
            Self::Assistant { content, .. }
            | Self::Tool { content, .. }
            | Self::System { content } => content.clone(),
        }
    }

    /// The flattened text of a user message.
    ///
    /// Returns an empty string for every other variant: only user turns
    /// count as queries.
    pub fn user_text(&self) -> String {
        match self {
            Self::User { content } => content.flatten(),
            _ => String::new(),
        }
    }

    /// Tool calls requested by an assistant message (empty otherwise).
    pub fn tool_calls(&self) -> &[MessageToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// A history entry as stored or received: either already canonical, or an
/// arbitrary record waiting to be normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMessage {
    Canonical(CanonicalMessage),
    Record(serde_json::Value),
}

impl From<CanonicalMessage> for RawMessage {
    fn from(message: CanonicalMessage) -> Self {
        Self::Canonical(message)
    }
}

impl From<serde_json::Value> for RawMessage {
    fn from(value: serde_json::Value) -> Self {
        Self::Record(value)
    }
}
