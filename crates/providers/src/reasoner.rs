//! Structured reasoning on top of a chat provider.
//!
//! Sends the instructions as a system message and the rendered prompt as a
//! user message, requests a JSON-schema response format, and decodes the
//! reply into a JSON object.

use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;
use turnstile_core::error::ProviderError;
use turnstile_core::message::CanonicalMessage;
use turnstile_core::provider::{Provider, ProviderRequest};
use turnstile_core::reasoning::{Reasoner, ReasoningRequest};

/// A [`Reasoner`] backed by any [`Provider`].
pub struct ProviderReasoner {
    name: String,
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: Option<u32>,
}

impl ProviderReasoner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            name: format!("{}/{}", provider.name(), model),
            provider,
            model,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
impl Reasoner for ProviderReasoner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: ReasoningRequest,
    ) -> std::result::Result<serde_json::Value, ProviderError> {
        let messages = vec![
            CanonicalMessage::system(request.instructions),
            CanonicalMessage::user(request.prompt),
        ];

        let mut provider_request = ProviderRequest::new(&self.model, messages);
        // Structured decisions stay deterministic
        provider_request.temperature = 0.0;
        provider_request.max_tokens = self.max_tokens;
        provider_request.response_format = Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": request.output.name,
                "schema": request.output.schema,
            }
        }));

        debug!(reasoner = %self.name, schema = %request.output.name, "Invoking structured reasoning");

        let response = self.provider.complete(provider_request).await?;
        parse_structured(&response.message.text())
    }
}

/// Decode a model reply into a JSON object, tolerating a Markdown code fence.
fn parse_structured(text: &str) -> std::result::Result<serde_json::Value, ProviderError> {
    let trimmed = strip_code_fence(text.trim());
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| ProviderError::InvalidResponse(format!("reply is not JSON: {e}")))?;

    if !value.is_object() {
        return Err(ProviderError::InvalidResponse(format!(
            "expected a JSON object, got: {value}"
        )));
    }
    Ok(value)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip an optional language tag on the opening fence line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use turnstile_core::provider::ProviderResponse;
    use turnstile_core::reasoning::OutputSchema;

    struct CannedProvider {
        reply: String,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: CanonicalMessage::assistant(self.reply.clone()),
                usage: None,
                model: "canned-model".into(),
            })
        }
    }

    fn request() -> ReasoningRequest {
        ReasoningRequest {
            instructions: "Analyze the query".into(),
            prompt: "Query: list plans".into(),
            inputs: serde_json::json!({"query": "list plans"}),
            output: OutputSchema {
                name: "query_context_analysis".into(),
                schema: serde_json::json!({"type": "object"}),
            },
        }
    }

    #[tokio::test]
    async fn decodes_object_reply() {
        let provider = Arc::new(CannedProvider {
            reply: r#"{"contextual_insights": "- plans", "requires_database_access": true}"#.into(),
            seen: Mutex::new(Vec::new()),
        });
        let reasoner = ProviderReasoner::new(provider.clone(), "gpt-4.1-nano");
        assert_eq!(reasoner.name(), "canned/gpt-4.1-nano");

        let value = reasoner.invoke(request()).await.unwrap();
        assert_eq!(value["requires_database_access"], true);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].temperature, 0.0);
        assert_eq!(
            seen[0].response_format.as_ref().unwrap()["json_schema"]["name"],
            "query_context_analysis"
        );
    }

    #[tokio::test]
    async fn non_json_reply_is_invalid() {
        let provider = Arc::new(CannedProvider {
            reply: "I think the user wants plans.".into(),
            seen: Mutex::new(Vec::new()),
        });
        let reasoner = ProviderReasoner::new(provider, "gpt-4.1-nano");
        let err = reasoner.invoke(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn code_fences_are_stripped() {
        let value = parse_structured("```json\n{\"refined_text\": \"ok\"}\n```").unwrap();
        assert_eq!(value["refined_text"], "ok");
    }

    #[test]
    fn array_reply_is_rejected() {
        assert!(parse_structured("[1, 2]").is_err());
    }
}
