//! Reasoner trait: one structured-output reasoning call.
//!
//! The context gate and the output refiner each issue a single call that
//! must come back as a JSON object of a declared shape. Callers decode the
//! returned value into their own types; a value of the wrong shape is the
//! caller's "malformed result" case.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;

/// The declared shape of a structured result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Short identifier, e.g. "query_context_analysis"
    pub name: String,

    /// JSON Schema of the expected object
    pub schema: serde_json::Value,
}

/// A structured reasoning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// System-level instructions (the rewriting or analysis policy)
    pub instructions: String,

    /// The rendered user-facing prompt
    pub prompt: String,

    /// The structured prompt inputs the prompt was rendered from
    #[serde(default)]
    pub inputs: serde_json::Value,

    /// Expected output shape
    pub output: OutputSchema,
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// A human-readable name (usually provider/model).
    fn name(&self) -> &str;

    /// Issue the call and return the structured result.
    async fn invoke(&self, request: ReasoningRequest) -> std::result::Result<serde_json::Value, ProviderError>;
}
