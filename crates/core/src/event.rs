//! Domain event system: decoupled observation of turn progress.
//!
//! Events are published as a turn moves through its stages. Subscribers
//! (the CLI trace view, tests) react without coupling to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A turn started for a session
    TurnStarted {
        thread_id: String,
        messages: usize,
        timestamp: DateTime<Utc>,
    },

    /// The context gate produced its decision
    ContextGated {
        thread_id: String,
        needs_knowledge: bool,
        degraded: bool,
        timestamp: DateTime<Utc>,
    },

    /// The knowledge document was surfaced to the execution engine
    KnowledgeInjected {
        thread_id: String,
        turn: u64,
        refreshed: bool,
        first_turn_append: bool,
        chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// A knowledge fetch failed; the previous document was kept
    KnowledgeFetchFailed {
        thread_id: String,
        turn: u64,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed by the execution engine
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A provider call produced a response
    ResponseGenerated {
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// The refiner fell back to the raw output
    RefinementDegraded {
        thread_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn finished and its answer was appended to the conversation
    TurnCompleted {
        thread_id: String,
        turn: u64,
        tool_outputs: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::TurnCompleted {
            thread_id: "t-1".into(),
            turn: 3,
            tool_outputs: 2,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::TurnCompleted { thread_id, turn, .. } => {
                assert_eq!(thread_id, "t-1");
                assert_eq!(*turn, 3);
            }
            _ => panic!("Expected TurnCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::KnowledgeFetchFailed {
            thread_id: "t-1".into(),
            turn: 1,
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
