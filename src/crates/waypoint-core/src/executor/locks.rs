//! Per-thread serialization
//!
//! Every mutating executor operation holds its thread's async mutex for its
//! whole duration, so at most one step runs per thread while distinct threads
//! proceed independently.
//!
//! An entry lives in the map only while someone holds or waits for it: the
//! last [`ThreadGuard`] to drop removes it. Waiters clone the entry under the
//! map lock before awaiting, so an entry is never removed while it has one.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

type ThreadMutex = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
pub(crate) struct ThreadLocks {
    locks: Mutex<HashMap<String, ThreadMutex>>,
}

impl ThreadLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread_id`
    pub(crate) async fn acquire(&self, thread_id: &str) -> ThreadGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(thread_id.to_string()).or_default())
        };
        ThreadGuard {
            locks: self,
            thread_id: thread_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Drop the entry once nobody holds or waits for it
    fn release(&self, thread_id: &str) {
        let mut locks = self.locks.lock();
        if locks
            .get(thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(thread_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Exclusive access to one thread; released on drop
pub(crate) struct ThreadGuard<'a> {
    locks: &'a ThreadLocks,
    thread_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        // The owned guard keeps its own clone of the mutex.
        drop(self.guard.take());
        self.locks.release(&self.thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_thread_is_exclusive() {
        let locks = Arc::new(ThreadLocks::new());
        let guard = locks.acquire("t").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("t").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_threads_do_not_block() {
        let locks = ThreadLocks::new();
        let _a = locks.acquire("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("b"))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_dropped_after_release() {
        let locks = ThreadLocks::new();
        for i in 0..100 {
            let _guard = locks.acquire(&format!("thread-{}", i)).await;
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = Arc::new(ThreadLocks::new());
        let first = locks.acquire("t").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("t").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        // The waiter now holds the same mutex, so a third caller must queue.
        let third = tokio::time::timeout(Duration::from_millis(5), locks.acquire("t")).await;
        assert!(third.is_err());

        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }
}
