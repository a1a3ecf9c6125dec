//! Conversation service: checkpoint load → turn → checkpoint save, with
//! turns serialized per thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use turnstile_core::checkpoint::{CheckpointStore, ConversationState, TurnTrace};
use turnstile_core::engine::{CallConfig, DEFAULT_SESSION_ID};
use turnstile_core::message::{CanonicalMessage, RawMessage};
use turnstile_core::{Error, Result};

use crate::normalizer::{normalize, normalize_history};
use crate::orchestrator::ConversationOrchestrator;

/// The answer to one submitted message.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub thread_id: String,
    pub turn: u64,
    pub content: String,
    pub trace: TurnTrace,
}

pub struct ConversationService {
    orchestrator: Arc<ConversationOrchestrator>,
    store: Arc<dyn CheckpointStore>,
    default_thread_id: String,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationService {
    pub fn new(orchestrator: Arc<ConversationOrchestrator>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            orchestrator,
            store,
            default_thread_id: DEFAULT_SESSION_ID.to_string(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Thread id used when a message is submitted without one.
    pub fn with_default_session_id(mut self, thread_id: impl Into<String>) -> Self {
        self.default_thread_id = thread_id.into();
        self
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    fn thread_lock(&self, thread_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::Internal("thread lock table poisoned".into()))?;
        Ok(locks.entry(thread_id.to_string()).or_default().clone())
    }

    /// Drop the table entry once nobody else holds or awaits it.
    fn release_lock(&self, thread_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            // The table and `lock` itself
            if Arc::strong_count(&lock) == 2 {
                locks.remove(thread_id);
            }
        }
    }

    /// Submit one message to a thread and run a turn.
    ///
    /// The checkpoint is saved only when the turn succeeds.
    pub async fn submit(&self, thread_id: Option<&str>, input: impl Into<RawMessage>) -> Result<TurnReply> {
        let thread_id = thread_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(self.default_thread_id.as_str())
            .to_string();

        let message = normalize(&input.into())
            .ok_or_else(|| Error::InvalidInput("message has no content".into()))?;

        let lock = self.thread_lock(&thread_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(&thread_id, message).await
        };
        self.release_lock(&thread_id, lock);
        result
    }

    async fn run_locked(&self, thread_id: &str, message: CanonicalMessage) -> Result<TurnReply> {
        let mut state = self.store.load(thread_id).await?;
        debug!(thread_id = %thread_id, messages = state.messages.len(), "Checkpoint loaded");
        state.push(message);

        let config = CallConfig::for_thread(thread_id.to_string());
        let outcome = match self.orchestrator.run_turn(&mut state, &config).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Turn failed, checkpoint not saved");
                return Err(e);
            }
        };

        self.store.save(thread_id, &state).await?;
        info!(thread_id = %thread_id, turn = outcome.turn, store = self.store.name(), "Checkpoint saved");

        Ok(TurnReply {
            thread_id: thread_id.to_string(),
            turn: outcome.turn,
            content: outcome.content,
            trace: outcome.trace,
        })
    }

    /// Submit plain user text.
    pub async fn submit_text(&self, thread_id: Option<&str>, text: &str) -> Result<TurnReply> {
        self.submit(thread_id, CanonicalMessage::user(text)).await
    }

    /// The normalized history of a thread.
    pub async fn history(&self, thread_id: &str) -> Result<Vec<CanonicalMessage>> {
        let state = self.store.load(thread_id).await?;
        Ok(normalize_history(&state.messages))
    }

    /// The full stored state of a thread.
    pub async fn state(&self, thread_id: &str) -> Result<ConversationState> {
        Ok(self.store.load(thread_id).await?)
    }

    pub async fn delete(&self, thread_id: &str) -> Result<bool> {
        let lock = self.thread_lock(thread_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.store.delete(thread_id).await
        };
        self.release_lock(thread_id, lock);
        Ok(result?)
    }

    pub async fn list_threads(&self) -> Result<Vec<String>> {
        Ok(self.store.list_threads().await?)
    }
}
