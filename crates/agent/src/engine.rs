//! The default execution engine: a Plan→Act→Observe loop over a provider
//! and a tool registry.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use turnstile_core::engine::{CallConfig, ExecutionEngine, ExecutionResult};
use turnstile_core::event::{DomainEvent, EventBus};
use turnstile_core::message::CanonicalMessage;
use turnstile_core::provider::{Provider, ProviderRequest};
use turnstile_core::tool::ToolRegistry;

use crate::prompts;

pub struct ToolLoopEngine {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
    event_bus: Arc<EventBus>,
}

impl ToolLoopEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.5,
            max_tokens: None,
            tools,
            max_iterations: 25,
            event_bus,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of tool call iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    async fn run_tool_calls(&self, assistant: &CanonicalMessage, produced: &mut Vec<CanonicalMessage>) {
        for tc in assistant.tool_calls() {
            let start = std::time::Instant::now();
            let result = self.tools.execute_message_call(tc).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, output) = match result {
                Ok(tool_result) => (tool_result.success, tool_result.output),
                Err(e) => {
                    warn!(tool = %tc.name, error = %e, "Tool execution failed");
                    // Fed back so the model can recover
                    (false, format!("Error: {e}"))
                }
            };

            self.event_bus.publish(DomainEvent::ToolExecuted {
                tool_name: tc.name.clone(),
                success,
                duration_ms,
                timestamp: chrono::Utc::now(),
            });

            produced.push(CanonicalMessage::tool(output, &tc.id, &tc.name));
        }
    }
}

#[async_trait]
impl ExecutionEngine for ToolLoopEngine {
    fn name(&self) -> &str {
        "tool_loop"
    }

    async fn execute(
        &self,
        messages: Vec<CanonicalMessage>,
        config: &CallConfig,
    ) -> Result<ExecutionResult, turnstile_core::Error> {
        let session_id = config.session_id();
        info!(session_id, messages = messages.len(), model = %self.model, "Execution engine started");

        let mut context = Vec::with_capacity(messages.len() + 1);
        context.push(CanonicalMessage::system(prompts::EXECUTION_SYSTEM_PROMPT));
        context.extend(messages);

        let tool_definitions = self.tools.definitions();
        let mut produced: Vec<CanonicalMessage> = Vec::new();

        for iteration in 1..=self.max_iterations {
            debug!(session_id, iteration, "Engine iteration");

            let mut request = ProviderRequest::new(self.model.clone(), context.clone());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.tools = tool_definitions.clone();

            let response = self.provider.complete(request).await?;

            if let Some(usage) = &response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: chrono::Utc::now(),
                });
            }

            let assistant = response.message;
            if assistant.tool_calls().is_empty() {
                produced.push(assistant);
                return Ok(ExecutionResult { messages: produced });
            }

            debug!(tool_count = assistant.tool_calls().len(), "Executing tool calls");
            let before = produced.len();
            produced.push(assistant.clone());
            self.run_tool_calls(&assistant, &mut produced).await;
            context.extend(produced[before..].iter().cloned());
        }

        warn!(
            session_id,
            iterations = self.max_iterations,
            "Max tool iterations reached, forcing text response"
        );
        produced.push(CanonicalMessage::assistant(prompts::MAX_ITERATIONS_REPLY));
        Ok(ExecutionResult { messages: produced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_tool_call, make_tool_call_response, SequentialMockProvider};
    use turnstile_core::error::{ProviderError, ToolError};
    use turnstile_core::tool::{Tool, ToolResult};

    struct CountTool;

    #[async_trait]
    impl Tool for CountTool {
        fn name(&self) -> &str {
            "count_records"
        }
        fn description(&self) -> &str {
            "Count records of an entity"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"entity": {"type": "string"}}})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            match arguments["entity"].as_str() {
                Some("plans") => Ok(ToolResult::ok("42")),
                _ => Err(ToolError::InvalidArguments("unknown entity".into())),
            }
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CountTool));
        Arc::new(registry)
    }

    fn engine(provider: SequentialMockProvider) -> ToolLoopEngine {
        ToolLoopEngine::new(
            Arc::new(provider),
            "mock-model",
            registry(),
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn text_answer_returns_single_message() {
        let engine = engine(SequentialMockProvider::single_text("There are no plans."));
        let result = engine
            .execute(vec![CanonicalMessage::user("How many plans?")], &CallConfig::default())
            .await
            .unwrap();
        assert_eq!(result.messages, vec![CanonicalMessage::assistant("There are no plans.")]);
    }

    #[tokio::test]
    async fn tool_results_are_returned_in_order() {
        let provider = SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("count_records", serde_json::json!({"entity": "plans"}))],
            "Counting",
            "There are 42 plans.",
        );
        let result = engine(provider)
            .execute(vec![CanonicalMessage::user("How many plans?")], &CallConfig::for_thread("t"))
            .await
            .unwrap();

        assert_eq!(result.messages.len(), 3);
        assert!(result.messages[0].is_assistant());
        assert_eq!(
            result.messages[1],
            CanonicalMessage::tool("42", "call_count_records", "count_records")
        );
        assert_eq!(result.messages[2].text(), "There are 42 plans.");
    }

    #[tokio::test]
    async fn tool_errors_are_fed_back() {
        let provider = SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("count_records", serde_json::json!({"entity": "stars"}))],
            "",
            "I could not count that.",
        );
        let result = engine(provider)
            .execute(vec![CanonicalMessage::user("How many stars?")], &CallConfig::default())
            .await
            .unwrap();
        assert!(result.messages[1].text().starts_with("Error: "));
    }

    #[tokio::test]
    async fn malformed_arguments_are_fed_back() {
        let mut call = make_tool_call("count_records", serde_json::json!({}));
        call.arguments = "{\"entity\": ".into();
        let provider = SequentialMockProvider::tool_then_answer(vec![call], "", "Let me retry.");
        let result = engine(provider)
            .execute(vec![CanonicalMessage::user("How many plans?")], &CallConfig::default())
            .await
            .unwrap();
        assert!(result.messages[1].text().starts_with("Error: Invalid tool arguments"));
        assert_eq!(result.messages.len(), 3);
    }

    #[tokio::test]
    async fn stops_at_max_iterations() {
        let calls = vec![make_tool_call("count_records", serde_json::json!({"entity": "plans"}))];
        let provider = SequentialMockProvider::new(vec![
            make_tool_call_response(calls.clone(), ""),
            make_tool_call_response(calls, ""),
        ]);
        let engine = engine(provider).with_max_iterations(2);
        let result = engine
            .execute(vec![CanonicalMessage::user("loop")], &CallConfig::default())
            .await
            .unwrap();
        assert_eq!(
            result.messages.last().unwrap().text(),
            prompts::MAX_ITERATIONS_REPLY
        );
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let provider = SequentialMockProvider::failing(ProviderError::AuthenticationFailed("bad key".into()));
        let err = engine(provider)
            .execute(vec![CanonicalMessage::user("hi")], &CallConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, turnstile_core::Error::Provider(_)));
    }
}
