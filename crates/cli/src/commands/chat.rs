//! `turnstile chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use turnstile_agent::{ConversationService, TurnReply};
use turnstile_config::AppConfig;
use turnstile_core::event::{DomainEvent, EventBus};

pub async fn run(
    message: Option<String>,
    thread: Option<String>,
    trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup instructions
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'");
        eprintln!("    TURNSTILE_API_KEY = 'sk-...'   (takes precedence)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let event_bus = Arc::new(EventBus::default());
    if trace {
        let mut rx = event_bus.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                eprintln!("  · {}", describe(&event));
            }
        });
    }

    let service = turnstile_agent::build_service(&config, event_bus).await?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let result = service.submit_text(thread.as_deref(), &msg).await;
        eprint!("\r              \r");
        let reply = result?;
        println!("{}", reply.content);
        eprintln!("  (thread {}, turn {})", reply.thread_id, reply.turn);
        if trace {
            print_trace(&reply);
        }
        return Ok(());
    }

    interactive(&service, &config, thread.as_deref(), trace).await
}

async fn interactive(
    service: &ConversationService,
    config: &AppConfig,
    thread: Option<&str>,
    trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  turnstile — Interactive Mode");
    println!();
    println!("  Provider:   {}", config.default_provider);
    println!("  Models:     {} (answers) / {} (gate)", config.primary_model, config.secondary_model);
    println!("  Knowledge:  {}", config.knowledge.source);
    println!("  Thread:     {}", thread.unwrap_or(config.orchestrator.default_session_id.as_str()));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let result = service.submit_text(thread, input).await;
        eprint!("\r     \r");

        match result {
            Ok(reply) => {
                println!();
                for line in reply.content.lines() {
                    println!("  Assistant > {line}");
                }
                if trace {
                    print_trace(&reply);
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn print_trace(reply: &TurnReply) {
    let trace = &reply.trace;
    eprintln!();
    eprintln!("  ── trace: thread {} turn {} ──", reply.thread_id, trace.turn);
    eprintln!("  needs_knowledge={} knowledge_refreshed={}", trace.needs_knowledge, trace.knowledge_refreshed);
    eprintln!("  gate_degraded={} refinement_degraded={}", trace.gate_degraded, trace.refinement_degraded);
    for record in &trace.tool_outputs {
        eprintln!("  {}: {} chars", record.name, record.output.len());
    }
    for line in trace.reasoning.lines() {
        eprintln!("  | {line}");
    }
}

fn describe(event: &DomainEvent) -> String {
    match event {
        DomainEvent::TurnStarted { thread_id, messages, timestamp } => {
            format!("[{}] turn started on {thread_id} ({messages} messages)", timestamp.format("%H:%M:%S"))
        }
        DomainEvent::ContextGated { needs_knowledge, degraded, .. } => {
            format!("context gated: needs_knowledge={needs_knowledge} degraded={degraded}")
        }
        DomainEvent::KnowledgeInjected { turn, refreshed, first_turn_append, chars, .. } => format!(
            "knowledge injected on turn {turn}: {chars} chars, refreshed={refreshed}, appended_to_user={first_turn_append}"
        ),
        DomainEvent::KnowledgeFetchFailed { turn, error_message, .. } => {
            format!("knowledge fetch failed on turn {turn}: {error_message}")
        }
        DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
            format!("tool {tool_name} success={success} ({duration_ms} ms)")
        }
        DomainEvent::ResponseGenerated { model, tokens_used, .. } => {
            format!("{model} responded ({tokens_used} tokens)")
        }
        DomainEvent::RefinementDegraded { error_message, .. } => {
            format!("refinement degraded: {error_message}")
        }
        DomainEvent::TurnCompleted { thread_id, turn, tool_outputs, .. } => {
            format!("turn {turn} completed on {thread_id} ({tool_outputs} tool outputs)")
        }
    }
}
