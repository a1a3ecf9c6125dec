//! Conversation state and the durable checkpoint store contract.
//!
//! One `ConversationState` exists per thread. The surrounding service loads
//! it at the start of a turn, lends it to the orchestrator, and saves it
//! back once the turn completes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::CheckpointError;
use crate::message::{CanonicalMessage, RawMessage};

/// A structured record of one tool output gathered from the latest execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutputRecord {
    pub name: String,
    pub input: String,
    pub output: String,
}

/// Trace of a completed turn, returned alongside the refined answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnTrace {
    /// Session turn number (1-based)
    pub turn: u64,

    /// Human-readable reasoning narrative
    pub reasoning: String,

    /// Tool outputs the answer was grounded on
    #[serde(default)]
    pub tool_outputs: Vec<ToolOutputRecord>,

    /// Whether a fresh knowledge document was fetched this turn
    #[serde(default)]
    pub knowledge_refreshed: bool,

    /// The context gate's (informational) domain-lookup decision
    #[serde(default)]
    pub needs_knowledge: bool,

    /// The context gate fell back after a failure
    #[serde(default)]
    pub gate_degraded: bool,

    /// The refiner fell back after a failure
    #[serde(default)]
    pub refinement_degraded: bool,
}

/// Per-thread conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Ordered history; append-only within a turn
    #[serde(default)]
    pub messages: Vec<RawMessage>,

    /// Latest unrefined answer from the execution engine
    #[serde(default)]
    pub raw_output: String,

    /// Tool outputs gathered from the latest execution
    #[serde(default)]
    pub tool_outputs: Vec<ToolOutputRecord>,

    /// Cached knowledge document; once set it is only ever replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_document: Option<String>,

    /// Context-gate insights for the current turn (cleared at turn end)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_insights: Option<String>,

    /// Context-gate decision for the current turn (cleared after use)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_knowledge: Option<bool>,

    /// Reasoning narrative of the latest turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Trace of the latest completed turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trace: Option<TurnTrace>,

    /// When the state was last saved
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            raw_output: String::new(),
            tool_outputs: Vec::new(),
            knowledge_document: None,
            context_insights: None,
            needs_knowledge: None,
            reasoning: None,
            last_trace: None,
            updated_at: Utc::now(),
        }
    }

    /// Append a history entry.
    pub fn push(&mut self, message: impl Into<RawMessage>) {
        self.updated_at = Utc::now();
        self.messages.push(message.into());
    }

    /// Append several canonical messages at once, preserving order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = CanonicalMessage>) {
        self.updated_at = Utc::now();
        self.messages
            .extend(messages.into_iter().map(RawMessage::Canonical));
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

/// The durable checkpoint store.
///
/// Implementations: in-memory (testing), JSON files, SQLite.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "sqlite").
    fn name(&self) -> &str;

    /// Load the state for a thread; unknown threads yield an empty state.
    async fn load(&self, thread_id: &str) -> std::result::Result<ConversationState, CheckpointError>;

    /// Persist the state for a thread, replacing any previous checkpoint.
    async fn save(&self, thread_id: &str, state: &ConversationState) -> std::result::Result<(), CheckpointError>;

    /// Delete a thread's checkpoint. Returns whether one existed.
    async fn delete(&self, thread_id: &str) -> std::result::Result<bool, CheckpointError>;

    /// All thread ids with a checkpoint, sorted.
    async fn list_threads(&self) -> std::result::Result<Vec<String>, CheckpointError>;
}
