//! Checkpoint stores for turnstile conversation state.
//!
//! One checkpoint per thread id. `load` on an unknown thread returns an
//! empty state, so callers never special-case the first turn.

pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileCheckpointStore;
pub use in_memory::InMemoryCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;

use std::sync::Arc;
use turnstile_config::AppConfig;
use turnstile_core::error::CheckpointError;
use turnstile_core::CheckpointStore;

/// Build the checkpoint store selected by `checkpoint.backend`.
pub async fn build_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    let path = config
        .checkpoint
        .path
        .clone()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.default_checkpoint_path());

    match config.checkpoint.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryCheckpointStore::new())),
        "file" => Ok(Arc::new(FileCheckpointStore::new(path))),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CheckpointError::Storage(format!("Failed to create checkpoint directory: {e}"))
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Arc::new(SqliteCheckpointStore::new(&url).await?))
        }
        other => Err(CheckpointError::Storage(format!(
            "Unsupported checkpoint backend: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_memory_store() {
        let mut config = AppConfig::default();
        config.checkpoint.backend = "memory".into();
        let store = build_from_config(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn builds_file_store_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.checkpoint.backend = "file".into();
        config.checkpoint.path = Some(dir.path().join("threads").display().to_string());
        let store = build_from_config(&config).await.unwrap();
        assert_eq!(store.name(), "file");
        assert!(store.list_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default();
        config.checkpoint.backend = "redis".into();
        assert!(build_from_config(&config).await.is_err());
    }
}
