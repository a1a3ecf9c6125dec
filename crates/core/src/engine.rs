//! Execution engine contract.
//!
//! The engine is the multi-step, tool-calling collaborator that produces
//! the raw answer for a turn. The orchestrator hands it the assembled
//! message list and awaits the complete result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::Error;
use crate::message::CanonicalMessage;

/// Session id used when a call carries no thread id.
pub const DEFAULT_SESSION_ID: &str = "default_session";

/// Per-invocation call configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallConfig {
    /// Session identifier, used for checkpoint lookup and injection tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Any additional caller-provided settings, passed through to the engine
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CallConfig {
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            extra: serde_json::Map::new(),
        }
    }

    /// The session id, or `fallback` when the call carries none.
    pub fn session_id_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.thread_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(fallback)
    }

    /// The session id, or [`DEFAULT_SESSION_ID`].
    pub fn session_id(&self) -> &str {
        self.session_id_or(DEFAULT_SESSION_ID)
    }
}

/// Messages produced by one engine invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub messages: Vec<CanonicalMessage>,
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Run the engine to completion over `messages`.
    async fn execute(
        &self,
        messages: Vec<CanonicalMessage>,
        config: &CallConfig,
    ) -> std::result::Result<ExecutionResult, Error>;
}
