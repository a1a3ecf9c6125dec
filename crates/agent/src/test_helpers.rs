//! Shared scripted collaborators for unit tests.

use async_trait::async_trait;
use std::sync::Mutex;
use turnstile_core::engine::{CallConfig, ExecutionEngine, ExecutionResult};
use turnstile_core::error::{KnowledgeError, ProviderError};
use turnstile_core::knowledge::{KnowledgeFetch, KnowledgeSource};
use turnstile_core::message::{CanonicalMessage, MessageToolCall};
use turnstile_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use turnstile_core::reasoning::{Reasoner, ReasoningRequest};

/// A mock provider that returns a sequence of scripted responses.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    call_count: Mutex<usize>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            call_count: Mutex::new(0),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// First returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thought),
            make_text_response(answer),
        ])
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            responses: Mutex::new(vec![Err(error)]),
            call_count: Mutex::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let response = responses[*count].clone();
        *count += 1;
        response
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    make_tool_call_response(Vec::new(), text)
}

pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: CanonicalMessage::assistant_with_tools(thought, tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// A reasoner that replays scripted results and records every request.
///
/// Once the script runs out every call fails with `InvalidResponse`.
pub struct ScriptedReasoner {
    results: Mutex<Vec<Result<serde_json::Value, ProviderError>>>,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoner {
    pub fn new(results: Vec<Result<serde_json::Value, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ReasoningRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: ReasoningRequest) -> Result<serde_json::Value, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            return Err(ProviderError::InvalidResponse("script exhausted".into()));
        }
        results.remove(0)
    }
}

/// An engine that replays scripted message lists and records its inputs.
pub struct ScriptedEngine {
    results: Mutex<Vec<Result<Vec<CanonicalMessage>, String>>>,
    inputs: Mutex<Vec<Vec<CanonicalMessage>>>,
}

impl ScriptedEngine {
    pub fn new(results: Vec<Result<Vec<CanonicalMessage>, String>>) -> Self {
        Self {
            results: Mutex::new(results),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with one assistant message.
    pub fn answering(answers: &[&str]) -> Self {
        Self::new(
            answers
                .iter()
                .map(|a| Ok(vec![CanonicalMessage::assistant(*a)]))
                .collect(),
        )
    }

    pub fn inputs(&self) -> Vec<Vec<CanonicalMessage>> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        messages: Vec<CanonicalMessage>,
        _config: &CallConfig,
    ) -> Result<ExecutionResult, turnstile_core::Error> {
        self.inputs.lock().unwrap().push(messages);
        let mut results = self.results.lock().unwrap();
        let next = if results.is_empty() {
            Err("script exhausted".to_string())
        } else {
            results.remove(0)
        };
        next.map(|messages| ExecutionResult { messages })
            .map_err(|reason| turnstile_core::Error::Execution {
                engine: "scripted".into(),
                reason,
            })
    }
}

/// A knowledge source with a fixed answer that counts its fetches.
pub struct CountingKnowledgeSource {
    answer: Result<Option<String>, String>,
    calls: Mutex<usize>,
}

impl CountingKnowledgeSource {
    pub fn document(text: &str) -> Self {
        Self::with_answer(Ok(Some(text.to_string())))
    }

    pub fn empty() -> Self {
        Self::with_answer(Ok(None))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_answer(Err(message.to_string()))
    }

    fn with_answer(answer: Result<Option<String>, String>) -> Self {
        Self {
            answer,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl KnowledgeSource for CountingKnowledgeSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self) -> Result<KnowledgeFetch, KnowledgeError> {
        *self.calls.lock().unwrap() += 1;
        tokio::task::yield_now().await;
        match &self.answer {
            Ok(documentation) => Ok(KnowledgeFetch {
                documentation: documentation.clone(),
            }),
            Err(message) => Err(KnowledgeError::Unavailable(message.clone())),
        }
    }
}
