//! Per-book serialization of mutating operations.
//!
//! Every mutating operation that touches a book's availability, allocations,
//! or queue must hold that book's lock for its full duration; operations on
//! different books proceed in parallel. The expiry scheduler acquires the
//! same locks before transitioning entries, so a claim racing a sweep is
//! always serialized.
//!
//! # Usage Pattern
//!
//! ```no_run
//! use std::sync::Arc;
//! use library_lending::BookLocks;
//!
//! # async fn example() {
//! let locks = Arc::new(BookLocks::new());
//!
//! let _guard = locks.lock(42).await;
//! // ... mutate book 42's state inside one transaction ...
//! # }
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

/// Registry of per-book async mutexes.
///
/// Uses `DashMap` for lock-free access to the registry itself and a
/// `tokio::sync::Mutex` per book so guards can be held across awaits.
/// Entries are never removed: books are never deleted while allocations or
/// queue entries reference them, and an idle mutex is a few dozen bytes.
#[derive(Debug, Default)]
pub struct BookLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl BookLocks {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquires the lock for one book, waiting if another operation on the
    /// same book is in flight.
    ///
    /// The `Arc` is cloned and the `DashMap` shard released before awaiting
    /// on the inner mutex, so no shard lock is held across an await point.
    #[instrument(skip(self))]
    pub async fn lock(&self, book_id: i64) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
