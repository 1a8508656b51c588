//! # waypoint-checkpoint - Durable thread history
//!
//! Every step a waypoint thread takes is recorded as an immutable [`Checkpoint`]:
//! the full merged state, the node about to run, and the partial update that
//! produced it. Checkpoints of one thread form a tree rooted at the thread's
//! first checkpoint; ordinary execution grows a single chain, and time travel
//! starts a new branch from an older checkpoint instead of rewriting history.
//!
//! ## Backends
//!
//! - [`InMemoryCheckpointStore`] - `RwLock<HashMap>`; tests and short-lived runs
//! - [`SqliteCheckpointStore`] - `sqlx` SQLite pool with embedded migrations
//!
//! Both implement [`CheckpointStore`], which is all the executor depends on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waypoint_checkpoint::{
//!     CheckpointMetadata, CheckpointStore, InMemoryCheckpointStore, NewCheckpoint, StateValues,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryCheckpointStore::new();
//!
//!     let root = store
//!         .append(
//!             "thread-1",
//!             NewCheckpoint::new(None, StateValues::new(), vec![], CheckpointMetadata::root()),
//!         )
//!         .await?;
//!
//!     let latest = store.latest("thread-1").await?.expect("thread exists");
//!     assert_eq!(latest.id, root.id);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointId, CheckpointMetadata, CheckpointSource, NewCheckpoint, StateValues,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;
pub use traits::CheckpointStore;
