//! # Turnstile Agent
//!
//! The turn orchestration core. Each turn runs three stages:
//!
//! 1. **Contextualize**: the [`ContextGate`] clarifies the latest query
//!    and records whether it needs a domain-data lookup.
//! 2. **Execute**: the [`SessionInjectionPolicy`] decides whether the
//!    knowledge document is (re)fetched and surfaced, the outbound message
//!    list is assembled, and the [`ExecutionEngine`] produces a raw answer.
//! 3. **Refine**: the [`OutputRefiner`] rewrites the raw answer against the
//!    tool outputs it was grounded on.
//!
//! [`ConversationService`] wraps the orchestrator with checkpoint
//! load/save and per-thread serialization.
//!
//! [`ExecutionEngine`]: turnstile_core::ExecutionEngine

pub mod engine;
pub mod gate;
pub mod injection;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod refiner;
pub mod runtime;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use engine::ToolLoopEngine;
pub use gate::{ContextGate, GateOutcome};
pub use injection::{
    InMemorySessionStore, InjectionDecision, InjectionSettings, SessionInjectionPolicy, SessionStore,
    SessionTracker,
};
pub use normalizer::{extract_user_text, normalize, normalize_history, normalize_value};
pub use orchestrator::{ConversationOrchestrator, TurnOutcome};
pub use refiner::{OutputRefiner, Refinement};
pub use runtime::{build_orchestrator, build_service};
pub use service::{ConversationService, TurnReply};
