//! SQLite-backed checkpoint storage
//!
//! Persists checkpoints in a single `checkpoints` table (see `migrations/`),
//! with `state`, `next_nodes` and `metadata` stored as JSON text. Each append
//! runs inside a transaction that reads the thread's current max `seq`, checks
//! the parent, and inserts the new row; `UNIQUE (thread_id, seq)` backs this up
//! if two processes race on one thread.

use crate::checkpoint::{Checkpoint, NewCheckpoint};
use crate::error::{CheckpointError, Result};
use crate::traits::{validate_append, CheckpointStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Checkpoint store on top of a `sqlx` SQLite pool.
#[derive(Clone, Debug)]
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

fn storage_err(context: &str, e: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Storage(format!("{}: {}", context, e))
}

impl SqliteCheckpointStore {
    /// Open (creating if needed) a database file and run migrations.
    pub async fn open<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        Self::open_with_max_connections(database_path, 5).await
    }

    /// Open a database file with a custom pool size.
    pub async fn open_with_max_connections<P: AsRef<Path>>(
        database_path: P,
        max_connections: u32,
    ) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| storage_err("Failed to connect to database", e))?;

        info!(path = %path.display(), "Checkpoint database opened");

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// A private in-memory database (single connection, never recycled).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| storage_err("Failed to open in-memory database", e))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Wrap an existing pool. Migrations are not run.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        debug!("Running checkpoint migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| storage_err("Migration failed", e))?;
        Ok(())
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections. The store must not be used afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Checkpoint database closed");
    }
}

fn row_to_checkpoint(row: &SqliteRow) -> Result<Checkpoint> {
    let seq: i64 = row.try_get("seq").map_err(|e| storage_err("Bad seq column", e))?;
    let state: String = row
        .try_get("state")
        .map_err(|e| storage_err("Bad state column", e))?;
    let next: String = row
        .try_get("next_nodes")
        .map_err(|e| storage_err("Bad next_nodes column", e))?;
    let metadata: String = row
        .try_get("metadata")
        .map_err(|e| storage_err("Bad metadata column", e))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| storage_err("Bad created_at column", e))?;

    Ok(Checkpoint {
        id: row
            .try_get("checkpoint_id")
            .map_err(|e| storage_err("Bad checkpoint_id column", e))?,
        thread_id: row
            .try_get("thread_id")
            .map_err(|e| storage_err("Bad thread_id column", e))?,
        seq: u64::try_from(seq).map_err(|e| storage_err("Negative seq", e))?,
        parent_id: row
            .try_get("parent_id")
            .map_err(|e| storage_err("Bad parent_id column", e))?,
        state: serde_json::from_str(&state)?,
        next: serde_json::from_str(&next)?,
        metadata: serde_json::from_str(&metadata)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| storage_err("Bad created_at timestamp", e))?,
    })
}

const SELECT_COLUMNS: &str = "SELECT thread_id, checkpoint_id, seq, parent_id, state, next_nodes, metadata, created_at FROM checkpoints";

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn append(&self, thread_id: &str, checkpoint: NewCheckpoint) -> Result<Checkpoint> {
        validate_append(thread_id, &checkpoint)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("Failed to begin transaction", e))?;

        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(MAX(seq), -1) AS max_seq FROM checkpoints WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage_err("Failed to read thread head", e))?;
        let total: i64 = row.try_get("total").map_err(|e| storage_err("Bad count", e))?;
        let max_seq: i64 = row.try_get("max_seq").map_err(|e| storage_err("Bad seq", e))?;

        match &checkpoint.parent_id {
            Some(parent_id) => {
                let parent = sqlx::query(
                    "SELECT 1 AS present FROM checkpoints WHERE thread_id = ? AND checkpoint_id = ?",
                )
                .bind(thread_id)
                .bind(parent_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| storage_err("Failed to look up parent", e))?;

                if parent.is_none() {
                    return Err(CheckpointError::Invalid(format!(
                        "parent {} does not belong to thread {}",
                        parent_id, thread_id
                    )));
                }
            }
            None if total > 0 => {
                return Err(CheckpointError::Invalid(format!(
                    "thread {} already has a root checkpoint",
                    thread_id
                )));
            }
            None => {}
        }

        let seq = u64::try_from(max_seq + 1).map_err(|e| storage_err("Invalid seq", e))?;
        let stored = checkpoint.into_checkpoint(thread_id, seq);

        sqlx::query(
            "INSERT INTO checkpoints (thread_id, checkpoint_id, seq, parent_id, state, next_nodes, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&stored.thread_id)
        .bind(&stored.id)
        .bind(max_seq + 1)
        .bind(&stored.parent_id)
        .bind(serde_json::to_string(&stored.state)?)
        .bind(serde_json::to_string(&stored.next)?)
        .bind(serde_json::to_string(&stored.metadata)?)
        .bind(stored.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("Failed to insert checkpoint", e))?;

        tx.commit()
            .await
            .map_err(|e| storage_err("Failed to commit checkpoint", e))?;

        debug!(thread_id, checkpoint_id = %stored.id, seq, "Appended checkpoint");
        Ok(stored)
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(&format!(
            "{} WHERE thread_id = ? ORDER BY seq DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("Failed to load latest checkpoint", e))?;

        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint> {
        let row = sqlx::query(&format!(
            "{} WHERE thread_id = ? AND checkpoint_id = ?",
            SELECT_COLUMNS
        ))
        .bind(thread_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("Failed to load checkpoint", e))?
        .ok_or_else(|| CheckpointError::not_found(thread_id, checkpoint_id))?;

        row_to_checkpoint(&row)
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query(&format!(
            "{} WHERE thread_id = ? ORDER BY seq DESC",
            SELECT_COLUMNS
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("Failed to list checkpoints", e))?;

        rows.iter().map(row_to_checkpoint).collect()
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT thread_id FROM checkpoints ORDER BY thread_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to list threads", e))?;

        rows.iter()
            .map(|row| {
                row.try_get("thread_id")
                    .map_err(|e| storage_err("Bad thread_id column", e))
            })
            .collect()
    }
}
