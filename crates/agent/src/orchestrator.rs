//! Turn orchestration: Contextualize → Execute → Refine.
//!
//! One call to [`ConversationOrchestrator::run_turn`] is one turn. The
//! state is borrowed for the duration of the turn; everything the turn
//! adds to the history is appended together at the end, so a failed turn
//! leaves `messages` untouched.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use turnstile_core::checkpoint::{ConversationState, ToolOutputRecord, TurnTrace};
use turnstile_core::engine::{CallConfig, ExecutionEngine, DEFAULT_SESSION_ID};
use turnstile_core::event::{DomainEvent, EventBus};
use turnstile_core::message::CanonicalMessage;
use turnstile_core::Result;

use crate::gate::{ContextGate, GateOutcome};
use crate::injection::{InjectionDecision, SessionInjectionPolicy};
use crate::normalizer::normalize_history;
use crate::prompts;
use crate::refiner::OutputRefiner;

/// Prefix the client may put on the newest user message.
pub const DEFAULT_LATEST_MESSAGE_TAG: &str = "[LATEST_MESSAGE] ";

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Session turn number (1-based)
    pub turn: u64,

    /// The refined answer appended to the history
    pub content: String,

    pub trace: TurnTrace,
}

/// Values carried from Execute into Refine.
struct Execution {
    decision: InjectionDecision,
    annotation: Option<CanonicalMessage>,
    tool_outputs: Vec<String>,
    narrative: String,
}

pub struct ConversationOrchestrator {
    gate: ContextGate,
    injection: SessionInjectionPolicy,
    engine: Arc<dyn ExecutionEngine>,
    refiner: OutputRefiner,
    event_bus: Arc<EventBus>,
    default_session_id: String,
    latest_message_tag: String,
}

impl ConversationOrchestrator {
    pub fn new(
        gate: ContextGate,
        injection: SessionInjectionPolicy,
        engine: Arc<dyn ExecutionEngine>,
        refiner: OutputRefiner,
    ) -> Self {
        Self {
            gate,
            injection,
            engine,
            refiner,
            event_bus: Arc::new(EventBus::default()),
            default_session_id: DEFAULT_SESSION_ID.to_string(),
            latest_message_tag: DEFAULT_LATEST_MESSAGE_TAG.to_string(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Session id used for calls without a thread id.
    pub fn with_default_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.default_session_id = session_id.into();
        self
    }

    pub fn with_latest_message_tag(mut self, tag: impl Into<String>) -> Self {
        self.latest_message_tag = tag.into();
        self
    }

    /// Run one turn over `state`.
    ///
    /// Only an execution-engine failure is returned as an error; the gate,
    /// the knowledge fetch and the refiner degrade in place.
    pub async fn run_turn(&self, state: &mut ConversationState, config: &CallConfig) -> Result<TurnOutcome> {
        let session_id = config.session_id_or(&self.default_session_id).to_string();
        let history = normalize_history(&state.messages);

        info!(thread_id = %session_id, messages = history.len(), "Turn started");
        self.event_bus.publish(DomainEvent::TurnStarted {
            thread_id: session_id.clone(),
            messages: history.len(),
            timestamp: Utc::now(),
        });

        let gate = self.contextualize(state, &history, &session_id).await;
        let execution = self.execute(state, &history, &session_id, config).await?;
        let refinement = self.refine(state, &history, &execution, &session_id).await;

        let trace = TurnTrace {
            turn: execution.decision.current_turn,
            reasoning: execution.narrative.clone(),
            tool_outputs: state.tool_outputs.clone(),
            knowledge_refreshed: execution.decision.refreshed,
            needs_knowledge: gate.needs_knowledge,
            gate_degraded: gate.degraded,
            refinement_degraded: refinement.degraded,
        };

        let mut appended = Vec::with_capacity(2);
        appended.extend(execution.annotation);
        appended.push(CanonicalMessage::assistant(refinement.text.clone()));
        state.extend(appended);
        state.context_insights = None;
        state.reasoning = Some(execution.narrative);
        state.last_trace = Some(trace.clone());

        info!(
            thread_id = %session_id,
            turn = trace.turn,
            tool_outputs = trace.tool_outputs.len(),
            refinement_degraded = trace.refinement_degraded,
            "Turn completed"
        );
        self.event_bus.publish(DomainEvent::TurnCompleted {
            thread_id: session_id,
            turn: trace.turn,
            tool_outputs: trace.tool_outputs.len(),
            timestamp: Utc::now(),
        });

        Ok(TurnOutcome {
            turn: trace.turn,
            content: refinement.text,
            trace,
        })
    }

    async fn contextualize(
        &self,
        state: &mut ConversationState,
        history: &[CanonicalMessage],
        session_id: &str,
    ) -> GateOutcome {
        let gate = self.gate.evaluate(history).await;
        state.context_insights = gate.insights.clone();
        state.needs_knowledge = Some(gate.needs_knowledge);

        debug!(
            thread_id = %session_id,
            needs_knowledge = gate.needs_knowledge,
            degraded = gate.degraded,
            "Contextualized"
        );
        self.event_bus.publish(DomainEvent::ContextGated {
            thread_id: session_id.to_string(),
            needs_knowledge: gate.needs_knowledge,
            degraded: gate.degraded,
            timestamp: Utc::now(),
        });
        gate
    }

    async fn execute(
        &self,
        state: &mut ConversationState,
        history: &[CanonicalMessage],
        session_id: &str,
        config: &CallConfig,
    ) -> Result<Execution> {
        let query = last_user_text(history).unwrap_or_default();
        let decision = self
            .injection
            .decide(session_id, state.knowledge_document.as_deref(), &query)
            .await;

        if let Some(error) = &decision.fetch_error {
            self.event_bus.publish(DomainEvent::KnowledgeFetchFailed {
                thread_id: session_id.to_string(),
                turn: decision.current_turn,
                error_message: error.clone(),
                timestamp: Utc::now(),
            });
        }

        let mut outbound = Vec::with_capacity(history.len() + 2);
        if let Some(insights) = &state.context_insights {
            outbound.push(CanonicalMessage::system(insights));
        }

        let mut annotation = None;
        let mut first_turn_append = false;
        let mut conversation = history.to_vec();
        if let Some(document) = decision.document.as_deref() {
            if decision.surfaces_document() {
                let note = CanonicalMessage::system(prompts::knowledge_annotation(document));
                outbound.push(note.clone());
                annotation = Some(note);
            }
            if decision.appends_to_user() {
                first_turn_append = append_to_last_user(&mut conversation, document);
            }
            if annotation.is_some() || first_turn_append {
                info!(
                    thread_id = %session_id,
                    turn = decision.current_turn,
                    refreshed = decision.refreshed,
                    first_turn_append,
                    "Knowledge document injected"
                );
                self.event_bus.publish(DomainEvent::KnowledgeInjected {
                    thread_id: session_id.to_string(),
                    turn: decision.current_turn,
                    refreshed: decision.refreshed,
                    first_turn_append,
                    chars: document.len(),
                    timestamp: Utc::now(),
                });
            }
        }
        outbound.extend(conversation);

        debug!(
            thread_id = %session_id,
            engine = self.engine.name(),
            outbound = outbound.len(),
            "Invoking execution engine"
        );
        let result = self.engine.execute(outbound, config).await?;

        let tool_outputs: Vec<String> = result
            .messages
            .iter()
            .filter(|m| matches!(m, CanonicalMessage::Tool { .. }))
            .map(CanonicalMessage::text)
            .collect();
        let raw_output = result
            .messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .or_else(|| result.messages.last())
            .map(CanonicalMessage::text)
            .unwrap_or_default();

        let mut narrative = Vec::new();
        if let Some(insights) = &state.context_insights {
            narrative.push(format!("Contextual analysis: {insights}"));
        }
        if decision.document.is_some() {
            narrative.push(prompts::KNOWLEDGE_USED_NOTE.to_string());
        }
        let narrative = if narrative.is_empty() {
            prompts::DEFAULT_NARRATIVE.to_string()
        } else {
            narrative.join("\n")
        };

        state.raw_output = raw_output;
        state.tool_outputs = tool_outputs
            .iter()
            .enumerate()
            .map(|(i, output)| ToolOutputRecord {
                name: format!("Tool-{}", i + 1),
                input: "query execution".into(),
                output: output.clone(),
            })
            .collect();
        if decision.document.is_some() {
            state.knowledge_document = decision.document.clone();
        }
        state.needs_knowledge = None;

        Ok(Execution {
            decision,
            annotation,
            tool_outputs,
            narrative,
        })
    }

    async fn refine(
        &self,
        state: &ConversationState,
        history: &[CanonicalMessage],
        execution: &Execution,
        session_id: &str,
    ) -> crate::refiner::Refinement {
        let query = last_user_text(history)
            .map(|text| {
                text.strip_prefix(self.latest_message_tag.as_str())
                    .map(String::from)
                    .unwrap_or(text)
            })
            .unwrap_or_else(|| prompts::NO_USER_QUERY.to_string());

        let refinement = self
            .refiner
            .refine(&state.raw_output, &execution.tool_outputs, &query)
            .await;

        if let Some(error) = &refinement.error {
            warn!(thread_id = %session_id, error = %error, "Refinement degraded");
            self.event_bus.publish(DomainEvent::RefinementDegraded {
                thread_id: session_id.to_string(),
                error_message: error.clone(),
                timestamp: Utc::now(),
            });
        }
        refinement
    }
}

/// Text of the most recent User message.
fn last_user_text(history: &[CanonicalMessage]) -> Option<String> {
    history
        .iter()
        .rev()
        .find(|m| m.is_user())
        .map(CanonicalMessage::user_text)
}

/// Append the document to the last User message unless it already carries
/// one. Returns whether the message was changed.
fn append_to_last_user(conversation: &mut [CanonicalMessage], document: &str) -> bool {
    let Some(message) = conversation.iter_mut().rev().find(|m| m.is_user()) else {
        return false;
    };
    let text = message.user_text();
    if text.contains(prompts::KNOWLEDGE_BEGIN) {
        return false;
    }
    *message = CanonicalMessage::user(prompts::append_knowledge(&text, document));
    true
}
