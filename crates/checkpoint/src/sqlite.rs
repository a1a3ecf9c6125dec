//! SQLite checkpoint store.
//!
//! A single `checkpoints` table keyed by thread id; the state is stored as
//! a JSON document so older checkpoints with fewer fields still load.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use turnstile_core::checkpoint::{CheckpointStore, ConversationState};
use turnstile_core::error::CheckpointError;

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) the database at `url`, e.g. `sqlite:///var/lib/turnstile.db`.
    pub async fn new(url: &str) -> Result<Self, CheckpointError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| CheckpointError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite checkpoint store initialized at {url}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id   TEXT PRIMARY KEY NOT NULL,
                state       TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::MigrationFailed(format!("checkpoints table: {e}")))?;

        debug!("SQLite checkpoint migrations complete");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, thread_id: &str) -> Result<ConversationState, CheckpointError> {
        let row = sqlx::query("SELECT state FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CheckpointError::QueryFailed(e.to_string()))?;

        let Some(row) = row else {
            return Ok(ConversationState::new());
        };

        let json: String = row
            .try_get("state")
            .map_err(|e| CheckpointError::QueryFailed(format!("state column: {e}")))?;

        serde_json::from_str(&json).map_err(|e| CheckpointError::Corrupted {
            thread_id: thread_id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn save(&self, thread_id: &str, state: &ConversationState) -> Result<(), CheckpointError> {
        let json = serde_json::to_string(state)
            .map_err(|e| CheckpointError::Storage(format!("Failed to serialize state: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, state, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(thread_id)
        .bind(json)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CheckpointError::QueryFailed(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_threads(&self) -> Result<Vec<String>, CheckpointError> {
        let rows = sqlx::query("SELECT thread_id FROM checkpoints ORDER BY thread_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CheckpointError::QueryFailed(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("thread_id")
                    .map_err(|e| CheckpointError::QueryFailed(format!("thread_id column: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::CanonicalMessage;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteCheckpointStore {
        let url = format!("sqlite://{}", dir.path().join("checkpoints.db").display());
        SqliteCheckpointStore::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn unknown_thread_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        assert!(store.load("nobody").await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let mut state = ConversationState::new();
        state.push(CanonicalMessage::user("first"));
        store.save("t-1", &state).await.unwrap();

        state.push(CanonicalMessage::assistant("second"));
        state.knowledge_document = Some("schema".into());
        store.save("t-1", &state).await.unwrap();

        let loaded = store.load("t-1").await.unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.knowledge_document.as_deref(), Some("schema"));
        assert_eq!(store.list_threads().await.unwrap(), vec!["t-1"]);
    }

    #[tokio::test]
    async fn delete_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let state = ConversationState::new();
        store.save("b", &state).await.unwrap();
        store.save("a", &state).await.unwrap();
        assert_eq!(store.list_threads().await.unwrap(), vec!["a", "b"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.list_threads().await.unwrap(), vec!["b"]);
    }
}
