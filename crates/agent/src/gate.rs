//! Context gate: a lightweight reasoning call that clarifies the latest
//! query and records whether it needs a domain-data lookup.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use turnstile_core::message::CanonicalMessage;
use turnstile_core::reasoning::{OutputSchema, Reasoner, ReasoningRequest};

use crate::prompts;

/// Result of gating one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateOutcome {
    /// Insight text for the execution engine (diagnostic text on failure)
    pub insights: Option<String>,

    /// Whether the query needs a domain-data lookup
    pub needs_knowledge: bool,

    /// The reasoning call failed and the conservative fallback was used
    pub degraded: bool,
}

/// Structured result requested from the reasoner.
#[derive(Debug, Deserialize)]
struct QueryContextAnalysis {
    contextual_insights: String,
    requires_database_access: bool,
}

pub struct ContextGate {
    reasoner: Arc<dyn Reasoner>,
    history_window: usize,
}

impl ContextGate {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            history_window: 4,
        }
    }

    /// How many prior messages are rendered as context.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Evaluate the latest user message against the prior history.
    ///
    /// Never fails: reasoning errors and malformed results become a
    /// diagnostic insight with `needs_knowledge = false`.
    pub async fn evaluate(&self, history: &[CanonicalMessage]) -> GateOutcome {
        let Some((latest, prior)) = history.split_last() else {
            return GateOutcome::default();
        };
        if !latest.is_user() {
            return GateOutcome::default();
        }
        let query = latest.user_text();
        if query.trim().is_empty() {
            return GateOutcome::default();
        }

        let chat_history = render_history(prior, self.history_window);
        let request = ReasoningRequest {
            instructions: prompts::CONTEXT_GATE_INSTRUCTIONS.to_string(),
            prompt: prompts::context_gate_prompt(&chat_history, &query),
            inputs: serde_json::json!({
                "chat_history": chat_history,
                "latest_user_query": query,
            }),
            output: analysis_schema(),
        };

        let analysis = match self.reasoner.invoke(request).await {
            Ok(value) => serde_json::from_value::<QueryContextAnalysis>(value)
                .map_err(|e| format!("unexpected result shape: {e}")),
            Err(e) => Err(e.to_string()),
        };

        match analysis {
            Ok(analysis) => {
                debug!(
                    reasoner = self.reasoner.name(),
                    needs_knowledge = analysis.requires_database_access,
                    "Context gate succeeded"
                );
                let bullets = if analysis.contextual_insights.trim().is_empty() {
                    prompts::NO_GATE_BULLETS.to_string()
                } else {
                    analysis.contextual_insights
                };
                GateOutcome {
                    insights: Some(format!(
                        "Contextual Insights for the query: \"{query}\"\n\
                         (Derived considering chat history, if any):\n{bullets}"
                    )),
                    needs_knowledge: analysis.requires_database_access,
                    degraded: false,
                }
            }
            Err(error) => {
                warn!(reasoner = self.reasoner.name(), error = %error, "Context gate failed, using fallback");
                GateOutcome {
                    insights: Some(format!(
                        "Contextualization failed for query: \"{query}\". Error: {error}"
                    )),
                    needs_knowledge: false,
                    degraded: true,
                }
            }
        }
    }
}

/// The last `window` messages as `ROLE: text` lines.
fn render_history(prior: &[CanonicalMessage], window: usize) -> String {
    let start = prior.len().saturating_sub(window);
    let lines: Vec<String> = prior[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role_label(), m.text().trim()))
        .collect();
    if lines.is_empty() {
        prompts::NO_PRIOR_HISTORY.to_string()
    } else {
        lines.join("\n")
    }
}

fn analysis_schema() -> OutputSchema {
    OutputSchema {
        name: "query_context_analysis".into(),
        schema: serde_json::json!({
            "type": "object",
            "properties": {
                "contextual_insights": {
                    "type": "string",
                    "description": "4-7 bullet points, each starting with '* ', clarifying the latest query"
                },
                "requires_database_access": {
                    "type": "boolean",
                    "description": "Whether answering needs a domain-data lookup"
                }
            },
            "required": ["contextual_insights", "requires_database_access"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedReasoner;
    use serde_json::json;

    #[tokio::test]
    async fn empty_history_skips_the_call() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![]));
        let gate = ContextGate::new(reasoner.clone());
        assert_eq!(gate.evaluate(&[]).await, GateOutcome::default());
        assert_eq!(reasoner.call_count(), 0);
    }

    #[tokio::test]
    async fn non_user_or_blank_latest_message_skips_the_call() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![]));
        let gate = ContextGate::new(reasoner.clone());

        let history = vec![CanonicalMessage::user("hi"), CanonicalMessage::assistant("hello")];
        assert_eq!(gate.evaluate(&history).await, GateOutcome::default());

        let blank = vec![CanonicalMessage::user("   ")];
        assert_eq!(gate.evaluate(&blank).await, GateOutcome::default());
        assert_eq!(reasoner.call_count(), 0);
    }

    #[tokio::test]
    async fn single_message_still_invokes_reasoner() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(json!({
            "contextual_insights": "* Follow-up about a city\n* Present ALL matching records",
            "requires_database_access": true
        }))]));
        let gate = ContextGate::new(reasoner.clone());

        let outcome = gate
            .evaluate(&[CanonicalMessage::user("What about Dallas?")])
            .await;
        assert_eq!(reasoner.call_count(), 1);
        assert!(outcome.needs_knowledge);
        assert!(!outcome.degraded);
        let insights = outcome.insights.unwrap();
        assert!(insights.starts_with("Contextual Insights for the query: \"What about Dallas?\""));
        assert!(insights.contains("* Follow-up about a city"));

        let request = reasoner.last_request().unwrap();
        assert_eq!(request.inputs["chat_history"], prompts::NO_PRIOR_HISTORY);
        assert_eq!(request.inputs["latest_user_query"], "What about Dallas?");
    }

    #[tokio::test]
    async fn prior_context_is_truncated_to_window() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(json!({
            "contextual_insights": "* ok",
            "requires_database_access": false
        }))]));
        let gate = ContextGate::new(reasoner.clone());

        let mut history: Vec<CanonicalMessage> = (1..=6)
            .map(|i| CanonicalMessage::user(format!("question {i}")))
            .collect();
        history.push(CanonicalMessage::user("latest"));
        gate.evaluate(&history).await;

        let rendered = reasoner.last_request().unwrap().inputs["chat_history"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(rendered.lines().count(), 4);
        assert!(rendered.starts_with("USER: question 3"));
        assert!(!rendered.contains("latest"));
    }

    #[tokio::test]
    async fn empty_bullets_use_placeholder() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(json!({
            "contextual_insights": "",
            "requires_database_access": true
        }))]));
        let outcome = ContextGate::new(reasoner)
            .evaluate(&[CanonicalMessage::user("prices?")])
            .await;
        assert!(outcome.insights.unwrap().ends_with(prompts::NO_GATE_BULLETS));
    }

    #[tokio::test]
    async fn reasoner_error_forces_no_lookup() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Err(
            turnstile_core::error::ProviderError::Timeout("gate".into()),
        )]));
        let outcome = ContextGate::new(reasoner)
            .evaluate(&[CanonicalMessage::user("List all prices")])
            .await;
        assert!(!outcome.needs_knowledge);
        assert!(outcome.degraded);
        let insights = outcome.insights.unwrap();
        assert!(insights.starts_with("Contextualization failed for query: \"List all prices\""));
        assert!(insights.contains("timed out"));
    }

    #[tokio::test]
    async fn malformed_result_forces_no_lookup() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(json!({
            "requires_database_access": true
        }))]));
        let outcome = ContextGate::new(reasoner)
            .evaluate(&[CanonicalMessage::user("price of plan 7")])
            .await;
        assert!(!outcome.needs_knowledge);
        assert!(outcome.degraded);
        assert!(outcome.insights.unwrap().contains("unexpected result shape"));
    }
}
