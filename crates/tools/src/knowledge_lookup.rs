//! Knowledge lookup tool: lets the execution engine consult the
//! reference document on demand.

use async_trait::async_trait;
use std::sync::Arc;
use turnstile_core::error::ToolError;
use turnstile_core::knowledge::KnowledgeSource;
use turnstile_core::tool::{Tool, ToolResult};

pub struct KnowledgeLookupTool {
    source: Arc<dyn KnowledgeSource>,
}

impl KnowledgeLookupTool {
    pub fn new(source: Arc<dyn KnowledgeSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for KnowledgeLookupTool {
    fn name(&self) -> &str {
        "knowledge_lookup"
    }

    fn description(&self) -> &str {
        "Read the domain knowledge document (schema). Pass a term to return only the lines that mention it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "term": {
                    "type": "string",
                    "description": "Optional case-insensitive filter, e.g. a type or field name"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let fetch = self
            .source
            .fetch()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let Some(document) = fetch.non_empty() else {
            return Ok(ToolResult::unavailable("No knowledge document is available."));
        };

        let term = arguments["term"].as_str().map(str::trim).filter(|t| !t.is_empty());
        let output = match term {
            None => document,
            Some(term) => {
                let needle = term.to_lowercase();
                let matches: Vec<&str> = document
                    .lines()
                    .filter(|line| line.to_lowercase().contains(&needle))
                    .collect();
                if matches.is_empty() {
                    format!("No lines mention '{term}'.")
                } else {
                    matches.join("\n")
                }
            }
        };

        Ok(ToolResult::ok(output))
    }
}
