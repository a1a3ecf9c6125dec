//! `turnstile session`: Inspect stored conversations.

use std::sync::Arc;
use turnstile_agent::normalize_history;
use turnstile_config::AppConfig;
use turnstile_core::CheckpointStore;

const PREVIEW_CHARS: usize = 240;

async fn open_store() -> Result<Arc<dyn CheckpointStore>, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(turnstile_checkpoint::build_from_config(&config).await?)
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store().await?;
    let threads = store.list_threads().await?;
    if threads.is_empty() {
        println!("No stored conversations ({} store).", store.name());
        return Ok(());
    }
    for thread in threads {
        println!("{thread}");
    }
    Ok(())
}

pub async fn show(thread: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store().await?;
    let state = store.load(thread).await?;
    let history = normalize_history(&state.messages);

    if history.is_empty() {
        println!("Thread {thread} has no messages.");
        return Ok(());
    }

    println!("Thread {thread} ({} messages, updated {})", history.len(), state.updated_at.to_rfc3339());
    println!();
    for message in &history {
        println!("{}: {}", message.role_label(), preview(&message.text()));
    }

    if let Some(document) = &state.knowledge_document {
        println!();
        println!("Cached knowledge document: {} chars", document.len());
    }
    if let Some(trace) = &state.last_trace {
        println!();
        println!("Last turn: {}", trace.turn);
        println!("{}", serde_json::to_string_pretty(trace)?);
    }
    Ok(())
}

pub async fn delete(thread: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store().await?;
    if store.delete(thread).await? {
        println!("Deleted thread {thread}.");
    } else {
        println!("No checkpoint for thread {thread}.");
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}
