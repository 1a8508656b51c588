//! Storage trait for checkpoint backends
//!
//! [`CheckpointStore`] is the only persistence contract the executor relies on.
//! Backends must provide:
//!
//! - **Atomic append per thread** - `seq` is assigned under the same lock or
//!   transaction that inserts the row, so two appends on one thread never share a `seq`
//! - **Append-only history** - checkpoints are never mutated after `append`
//! - **Lineage integrity** - a `parent_id` that does not belong to the thread is rejected
//!
//! ```text
//! ┌──────────────────────┐   append / latest / get / history   ┌──────────────────────┐
//! │  waypoint-core       │ ──────────────────────────────────▶ │  CheckpointStore     │
//! │  Executor            │                                     │  ├─ InMemory         │
//! │  (one writer/thread) │ ◀────────────────────────────────── │  └─ Sqlite (sqlx)    │
//! └──────────────────────┘            Checkpoint               └──────────────────────┘
//! ```

use crate::checkpoint::{Checkpoint, NewCheckpoint};
use crate::error::{CheckpointError, Result};
use async_trait::async_trait;

/// Persistence backend for thread checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a checkpoint to `thread_id` and return it as stored.
    ///
    /// The returned checkpoint's `id` is the new checkpoint id; its `seq` is one
    /// greater than the previous latest checkpoint of the thread (0 for the first).
    async fn append(&self, thread_id: &str, checkpoint: NewCheckpoint) -> Result<Checkpoint>;

    /// Most recently appended checkpoint of the thread, if the thread exists.
    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// A specific checkpoint.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::NotFound`] if the id does not exist in the thread.
    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> Result<Checkpoint>;

    /// All checkpoints of the thread, most recent first.
    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>>;

    /// Ids of all known threads.
    async fn list_threads(&self) -> Result<Vec<String>>;
}

/// Reject appends that can never be valid, regardless of backend.
pub(crate) fn validate_append(thread_id: &str, checkpoint: &NewCheckpoint) -> Result<()> {
    if thread_id.trim().is_empty() {
        return Err(CheckpointError::Invalid("thread_id is required".to_string()));
    }
    if checkpoint.parent_id.is_some() && checkpoint.metadata.writes.is_none() {
        return Err(CheckpointError::Invalid(
            "non-root checkpoint must record its writes".to_string(),
        ));
    }
    Ok(())
}
