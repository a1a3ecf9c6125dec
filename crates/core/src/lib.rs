//! # Turnstile Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! turnstile turn orchestrator. This crate has **no framework
//! dependencies**: it defines the message model and the narrow contracts
//! (provider, reasoner, execution engine, knowledge source, checkpoint
//! store) that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates, which keeps the orchestration core testable
//! with scripted stand-ins and lets backends be swapped via configuration.

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use checkpoint::{CheckpointStore, ConversationState, ToolOutputRecord, TurnTrace};
pub use engine::{CallConfig, ExecutionEngine, ExecutionResult, DEFAULT_SESSION_ID};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{KnowledgeFetch, KnowledgeSource};
pub use message::{CanonicalMessage, MessageContent, MessageToolCall, RawMessage};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use reasoning::{OutputSchema, Reasoner, ReasoningRequest};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
