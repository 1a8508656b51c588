//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointStore`] keeps every thread's checkpoints in a
//! `Arc<RwLock<HashMap<thread_id, Vec<Checkpoint>>>>`. Entries are pushed in
//! `seq` order, so the vector index equals the `seq` and "latest" is the last element.
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │  Arc<RwLock<HashMap>>                     │
//! │    "thread-1" ─▶ [seq 0, seq 1, seq 2]    │
//! │    "thread-2" ─▶ [seq 0]                  │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Data is lost when the process exits; use [`crate::SqliteCheckpointStore`]
//! when threads must survive restarts.

use crate::checkpoint::{Checkpoint, NewCheckpoint};
use crate::error::{CheckpointError, Result};
use crate::traits::{validate_append, CheckpointStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type CheckpointStorage = Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>;

/// Thread-safe in-memory checkpoint store.
///
/// Cloning is cheap and clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: CheckpointStorage,
}

impl InMemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads being tracked
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of checkpoints across all threads
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn append(&self, thread_id: &str, checkpoint: NewCheckpoint) -> Result<Checkpoint> {
        validate_append(thread_id, &checkpoint)?;

        let mut storage = self.storage.write().await;
        let entries = storage.entry(thread_id.to_string()).or_default();

        if let Some(parent_id) = &checkpoint.parent_id {
            if !entries.iter().any(|c| &c.id == parent_id) {
                return Err(CheckpointError::Invalid(format!(
                    "parent {} does not belong to thread {}",
                    parent_id, thread_id
                )));
            }
        } else if !entries.is_empty() {
            return Err(CheckpointError::Invalid(format!(
                "thread {} already has a root checkpoint",
                thread_id
            )));
        }

        let seq = entries.last().map(|c| c.seq + 1).unwrap_or(0);
        let stored = checkpoint.into_checkpoint(thread_id, seq);
        debug!(thread_id, checkpoint_id = %stored.id, seq, "Appended checkpoint");
        entries.push(stored.clone());

        Ok(stored)
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .get(thread_id)
            .and_then(|entries| entries.last())
            .cloned())
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint> {
        let storage = self.storage.read().await;
        storage
            .get(thread_id)
            .and_then(|entries| entries.iter().find(|c| c.id == checkpoint_id))
            .cloned()
            .ok_or_else(|| CheckpointError::not_found(thread_id, checkpoint_id))
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .get(thread_id)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let mut threads: Vec<String> = self.storage.read().await.keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointMetadata, CheckpointSource, StateValues};
    use serde_json::json;

    fn writes(key: &str, value: serde_json::Value) -> StateValues {
        let mut map = StateValues::new();
        map.insert(key.to_string(), value);
        map
    }

    fn root() -> NewCheckpoint {
        NewCheckpoint::new(None, StateValues::new(), vec![], CheckpointMetadata::root())
    }

    fn child(parent: &Checkpoint, step: i64) -> NewCheckpoint {
        let update = writes("step", json!(step));
        let mut state = parent.state.clone();
        state.extend(update.clone());
        NewCheckpoint::new(
            Some(parent.id.clone()),
            state,
            vec!["next".to_string()],
            CheckpointMetadata::new(CheckpointSource::Loop, step).with_writes(update),
        )
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = InMemoryCheckpointStore::new();
        let c0 = store.append("thread-1", root()).await.unwrap();
        let c1 = store.append("thread-1", child(&c0, 0)).await.unwrap();

        assert_eq!(c0.seq, 0);
        assert_eq!(c1.seq, 1);
        assert_eq!(c1.parent_id.as_deref(), Some(c0.id.as_str()));

        let latest = store.latest("thread-1").await.unwrap().unwrap();
        assert_eq!(latest.id, c1.id);
        assert_eq!(latest.state["step"], json!(0));
    }

    #[tokio::test]
    async fn test_history_is_most_recent_first() {
        let store = InMemoryCheckpointStore::new();
        let mut last = store.append("thread-1", root()).await.unwrap();
        for step in 0..3 {
            last = store.append("thread-1", child(&last, step)).await.unwrap();
        }

        let history = store.history("thread-1").await.unwrap();
        let seqs: Vec<u64> = history.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_branch_from_older_checkpoint_becomes_latest() {
        let store = InMemoryCheckpointStore::new();
        let c0 = store.append("t", root()).await.unwrap();
        let c1 = store.append("t", child(&c0, 0)).await.unwrap();
        let _c2 = store.append("t", child(&c1, 1)).await.unwrap();

        let fork = store.append("t", child(&c1, 2)).await.unwrap();
        assert_eq!(fork.parent_id.as_deref(), Some(c1.id.as_str()));
        assert_eq!(store.latest("t").await.unwrap().unwrap().id, fork.id);
        assert_eq!(store.history("t").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_parent_rejected() {
        let store = InMemoryCheckpointStore::new();
        let c0 = store.append("t", root()).await.unwrap();
        let mut orphan = child(&c0, 0);
        orphan.parent_id = Some("missing".to_string());

        let err = store.append("t", orphan).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
        assert_eq!(store.checkpoint_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_root_rejected() {
        let store = InMemoryCheckpointStore::new();
        store.append("t", root()).await.unwrap();
        assert!(store.append("t", root()).await.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryCheckpointStore::new();
        store.append("t", root()).await.unwrap();

        let err = store.get("t", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let store = InMemoryCheckpointStore::new();
        store.append("a", root()).await.unwrap();
        store.append("b", root()).await.unwrap();

        assert_eq!(store.thread_count().await, 2);
        assert_eq!(store.list_threads().await.unwrap(), vec!["a", "b"]);

        assert!(store.latest("c").await.unwrap().is_none());
        assert!(store.latest("b").await.unwrap().is_some());
        assert_eq!(store.checkpoint_count().await, 2);
    }
}
