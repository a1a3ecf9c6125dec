//! Process-start wiring: builds every collaborator from [`AppConfig`] and
//! returns a ready [`ConversationService`].

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use turnstile_config::AppConfig;
use turnstile_core::event::EventBus;
use turnstile_core::Result;
use turnstile_providers::ProviderReasoner;

use crate::engine::ToolLoopEngine;
use crate::gate::ContextGate;
use crate::injection::{InMemorySessionStore, InjectionSettings, SessionInjectionPolicy};
use crate::orchestrator::ConversationOrchestrator;
use crate::refiner::OutputRefiner;
use crate::service::ConversationService;

/// Build the orchestrator from configuration.
///
/// The context gate runs on the secondary model; the execution engine and
/// the refiner run on the primary model.
pub fn build_orchestrator(config: &AppConfig, event_bus: Arc<EventBus>) -> Result<ConversationOrchestrator> {
    let provider = turnstile_providers::build_from_config(config).resolve(None)?;

    let knowledge = turnstile_tools::build_from_config(&config.knowledge)?;
    let tools = Arc::new(
        turnstile_tools::default_registry(knowledge.clone())
            .with_timeout(Duration::from_secs(config.orchestrator.tool_timeout_secs)),
    );

    let gate_reasoner = ProviderReasoner::new(provider.clone(), &config.secondary_model);
    let refine_reasoner = ProviderReasoner::new(provider.clone(), &config.primary_model)
        .with_max_tokens(config.default_max_tokens);

    let engine = ToolLoopEngine::new(provider, &config.primary_model, tools, event_bus.clone())
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_iterations(config.orchestrator.max_tool_iterations);

    let injection = SessionInjectionPolicy::new(
        Arc::new(InMemorySessionStore::new()),
        knowledge,
        InjectionSettings::from(&config.injection),
    );

    info!(
        provider = %config.default_provider,
        primary_model = %config.primary_model,
        secondary_model = %config.secondary_model,
        knowledge = %config.knowledge.source,
        "Orchestrator configured"
    );

    Ok(ConversationOrchestrator::new(
        ContextGate::new(Arc::new(gate_reasoner))
            .with_history_window(config.orchestrator.gate_history_window),
        injection,
        Arc::new(engine),
        OutputRefiner::new(Arc::new(refine_reasoner)),
    )
    .with_event_bus(event_bus)
    .with_default_session_id(&config.orchestrator.default_session_id)
    .with_latest_message_tag(&config.orchestrator.latest_message_tag))
}

/// Build the conversation service, including its checkpoint store.
pub async fn build_service(config: &AppConfig, event_bus: Arc<EventBus>) -> Result<ConversationService> {
    let orchestrator = build_orchestrator(config, event_bus)?;
    let store = turnstile_checkpoint::build_from_config(config).await?;
    info!(store = store.name(), "Checkpoint store ready");

    Ok(ConversationService::new(Arc::new(orchestrator), store)
        .with_default_session_id(&config.orchestrator.default_session_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::Error;

    #[test]
    fn builds_with_defaults() {
        let config = AppConfig::default();
        let orchestrator = build_orchestrator(&config, Arc::new(EventBus::default()));
        assert!(orchestrator.is_ok());
    }

    #[test]
    fn bad_knowledge_source_is_a_config_failure() {
        let mut config = AppConfig::default();
        config.knowledge.source = "file".into();
        let err = build_orchestrator(&config, Arc::new(EventBus::default())).err().unwrap();
        assert!(matches!(err, Error::Knowledge(_)));
    }

    #[tokio::test]
    async fn builds_service_with_memory_store() {
        let mut config = AppConfig::default();
        config.checkpoint.backend = "memory".into();
        let service = build_service(&config, Arc::new(EventBus::default())).await.unwrap();
        assert_eq!(service.store().name(), "memory");
        assert!(service.list_threads().await.unwrap().is_empty());
    }
}
