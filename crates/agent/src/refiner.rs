//! Output refiner: rewrites the engine's raw answer into the client voice,
//! checked against the tool outputs it was built from.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use turnstile_core::reasoning::{OutputSchema, Reasoner, ReasoningRequest};

use crate::prompts;

/// Result of one refinement.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// The client-facing text (error-annotated raw output on failure)
    pub text: String,

    /// The fallback path was taken
    pub degraded: bool,

    /// What went wrong, when degraded
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefinedOutput {
    refined_text: String,
}

pub struct OutputRefiner {
    reasoner: Arc<dyn Reasoner>,
}

impl OutputRefiner {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Refine `raw_output`. Never fails; the raw output is embedded in the
    /// returned text when the reasoning call does not produce a result.
    pub async fn refine(&self, raw_output: &str, tool_outputs: &[String], query: &str) -> Refinement {
        let formatted = format_tool_outputs(tool_outputs);
        let current_date = chrono::Utc::now().format("%Y-%m-%d").to_string();

        let request = ReasoningRequest {
            instructions: prompts::refiner_instructions(&current_date),
            prompt: prompts::refiner_prompt(query, raw_output, &formatted),
            inputs: serde_json::json!({
                "query": query,
                "raw_output": raw_output,
                "tool_outputs": formatted,
            }),
            output: refined_schema(),
        };

        let value = match self.reasoner.invoke(request).await {
            Ok(value) => value,
            Err(e) => {
                warn!(reasoner = self.reasoner.name(), error = %e, "Refinement call failed");
                return Refinement {
                    text: format!(
                        "Error: Refinement process encountered an exception. Original output: {raw_output}"
                    ),
                    degraded: true,
                    error: Some(e.to_string()),
                };
            }
        };

        match serde_json::from_value::<RefinedOutput>(value.clone()) {
            Ok(output) if !output.refined_text.trim().is_empty() => {
                debug!(chars = output.refined_text.len(), "Refinement succeeded");
                Refinement {
                    text: output.refined_text,
                    degraded: false,
                    error: None,
                }
            }
            _ => {
                let detail = value.to_string();
                warn!(reasoner = self.reasoner.name(), detail = %detail, "Refinement returned an unexpected shape");
                Refinement {
                    text: format!(
                        "Error: Refinement failed. Unexpected response shape: {detail}. Output: {raw_output}"
                    ),
                    degraded: true,
                    error: Some(format!("unexpected response shape: {detail}")),
                }
            }
        }
    }
}

/// Numbered listing of tool outputs for the refiner prompt.
pub fn format_tool_outputs(tool_outputs: &[String]) -> String {
    if tool_outputs.is_empty() {
        return "The previous agent step recorded that no tools were used or no outputs were generated from tools."
            .to_string();
    }
    let lines: Vec<String> = tool_outputs
        .iter()
        .enumerate()
        .map(|(i, output)| format!("{}. {}", i + 1, output))
        .collect();
    format!("Tool Outputs from Previous Agent Step:\n{}", lines.join("\n"))
}

fn refined_schema() -> OutputSchema {
    OutputSchema {
        name: "refined_output".into(),
        schema: serde_json::json!({
            "type": "object",
            "properties": {
                "refined_text": {
                    "type": "string",
                    "description": "The final client-facing answer"
                }
            },
            "required": ["refined_text"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedReasoner;
    use serde_json::json;
    use turnstile_core::error::ProviderError;

    const RAW: &str = "Let me check... Plan A costs $49.99/mo in Dallas.";

    #[tokio::test]
    async fn success_returns_refined_text() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(json!({
            "refined_text": "Plan A costs $49.99/mo in Dallas."
        }))]));
        let refiner = OutputRefiner::new(reasoner.clone());

        let result = refiner
            .refine(RAW, &["[{\"plan\":\"A\",\"price\":49.99}]".into()], "Plan A price in Dallas?")
            .await;
        assert!(!result.degraded);
        assert_eq!(result.text, "Plan A costs $49.99/mo in Dallas.");

        let request = reasoner.last_request().unwrap();
        assert!(request.prompt.starts_with("Original Query: Plan A price in Dallas?"));
        assert!(request.prompt.contains("1. [{\"plan\":\"A\""));
        assert_eq!(request.output.name, "refined_output");
    }

    #[tokio::test]
    async fn reasoner_error_embeds_raw_output() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Err(ProviderError::Network(
            "connection reset".into(),
        ))]));
        let result = OutputRefiner::new(reasoner).refine(RAW, &[], "q").await;
        assert!(result.degraded);
        assert!(!result.text.is_empty());
        assert!(result.text.contains(RAW));
        assert!(result.text.starts_with("Error: Refinement process encountered an exception."));
        assert!(result.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn unexpected_shape_embeds_raw_output() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(json!({"answer": "x"}))]));
        let result = OutputRefiner::new(reasoner).refine(RAW, &[], "q").await;
        assert!(result.degraded);
        assert!(result.text.starts_with("Error: Refinement failed. Unexpected response shape:"));
        assert!(result.text.ends_with(RAW));
    }

    #[tokio::test]
    async fn blank_refined_text_is_a_bad_shape() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(json!({"refined_text": "  "}))]));
        let result = OutputRefiner::new(reasoner).refine(RAW, &[], "q").await;
        assert!(result.degraded);
        assert!(result.text.contains(RAW));
    }

    #[test]
    fn tool_outputs_formatting() {
        assert!(format_tool_outputs(&[]).contains("no tools were used"));
        let formatted = format_tool_outputs(&["a".into(), "b".into()]);
        assert_eq!(formatted, "Tool Outputs from Previous Agent Step:\n1. a\n2. b");
    }
}
