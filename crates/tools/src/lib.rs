//! Knowledge sources and built-in tools for turnstile.
//!
//! A knowledge source produces the reference document the orchestrator
//! injects into a turn. The `knowledge_lookup` tool lets the execution
//! engine re-read that document (optionally filtered) while it works.

pub mod knowledge;
pub mod knowledge_lookup;

use std::sync::Arc;
use turnstile_core::knowledge::KnowledgeSource;
use turnstile_core::tool::ToolRegistry;

pub use knowledge::{build_from_config, FileKnowledge, HttpKnowledge, NoKnowledge, StaticKnowledge};
pub use knowledge_lookup::KnowledgeLookupTool;

/// Create the default tool registry for the execution engine.
pub fn default_registry(knowledge: Arc<dyn KnowledgeSource>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(KnowledgeLookupTool::new(knowledge)));
    registry
}
