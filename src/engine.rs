//! Lending engine: transactional orchestration of catalog, allocations, and
//! the wait-list.
//!
//! Every mutating operation follows the same shape: acquire the book's lock,
//! open one transaction, validate, mutate, commit. The lock serializes
//! operations per book (requests, returns, claims, and expiry sweeps for the
//! same book never interleave partially) while different books proceed in
//! parallel; the transaction makes each operation all-or-nothing against the
//! database.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};

use crate::allocation::{self, AdminAllocationView, Allocation, AllocationView};
use crate::catalog::{self, Book, BookOverview, NewBook};
use crate::config::LendingConfig;
use crate::error::{LibraryError, Result};
use crate::locks::BookLocks;
use crate::queue::{self, QueueEntry, QueueEntryView, QueueStatus};
use crate::student::{self, Student};
use crate::Database;

/// Result of a book request: either an immediate loan or a place in line.
///
/// Exactly one of the two is produced per successful request, never both.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A copy was available and has been allocated.
    Allocated {
        /// The created loan.
        allocation: Allocation,
    },
    /// No copy was available; the student joined the wait-list.
    Queued {
        /// The created queue entry, position included.
        entry: QueueEntry,
    },
}

/// A student's current lending state: active loans plus live queue entries.
#[derive(Debug, Clone, Serialize)]
pub struct MyBooks {
    /// Active allocations with derived due-date state.
    pub allocated_books: Vec<AllocationView>,
    /// Waiting and notified queue entries.
    pub queued_books: Vec<QueueEntryView>,
}

/// Per-book copy accounting snapshot.
///
/// Healthy state always satisfies
/// `available + active_allocations + notified_reservations == total`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CopyLedger {
    /// Copies owned by the library.
    pub total: i64,
    /// Copies grantable to a fresh requester right now.
    pub available: i64,
    /// Copies out on loan.
    pub active_allocations: i64,
    /// Copies reserved for notified waiters.
    pub notified_reservations: i64,
}

/// Counters from one expiry sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    /// Entries whose deadline had passed when the sweep started.
    pub examined: usize,
    /// Entries this sweep actually transitioned to expired.
    pub expired: usize,
    /// Entries skipped because a racing claim or earlier sweep won.
    pub already_settled: usize,
    /// Entries that could not be processed; logged and skipped.
    pub failed: usize,
}

/// The lending engine.
///
/// Cheap to clone; all clones share the connection pool and lock registry.
#[derive(Debug, Clone)]
pub struct LendingEngine {
    db: Database,
    locks: Arc<BookLocks>,
    config: LendingConfig,
}

impl LendingEngine {
    /// Creates an engine over the given database with the given policy.
    #[must_use]
    pub fn new(db: Database, config: LendingConfig) -> Self {
        Self {
            db,
            locks: Arc::new(BookLocks::new()),
            config,
        }
    }

    /// Returns the policy configuration in effect.
    #[must_use]
    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    // ---- catalog & registry management ------------------------------------

    /// Adds a book to the catalog; availability starts at `total_copies`.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error with a `constraint_violation` kind for a
    /// duplicate ISBN.
    #[instrument(skip(self, book), fields(isbn = %book.isbn))]
    pub async fn create_book(&self, book: NewBook) -> Result<Book> {
        let mut conn = self.db.pool().acquire().await?;
        let id = catalog::insert_book(&mut conn, &book, Utc::now()).await?;
        let created = catalog::fetch_book(&mut conn, id).await?;
        info!(book_id = id, "book added to catalog");
        Ok(created)
    }

    /// Fetches one book.
    ///
    /// # Errors
    ///
    /// Returns `BookNotFound` if the book does not exist.
    pub async fn get_book(&self, book_id: i64) -> Result<Book> {
        let mut conn = self.db.pool().acquire().await?;
        catalog::fetch_book(&mut conn, book_id).await
    }

    /// Lists the catalog with queue counts and allocation counts per book.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the query fails.
    pub async fn list_books(&self) -> Result<Vec<BookOverview>> {
        let mut conn = self.db.pool().acquire().await?;
        catalog::list_books(&mut conn).await
    }

    /// Registers a student.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error with a `constraint_violation` kind for a
    /// duplicate email.
    #[instrument(skip(self, full_name, email))]
    pub async fn create_student(&self, full_name: &str, email: &str) -> Result<Student> {
        let mut conn = self.db.pool().acquire().await?;
        let id = student::insert_student(&mut conn, full_name, email, Utc::now()).await?;
        student::fetch_student(&mut conn, id).await
    }

    // ---- allocation manager ------------------------------------------------

    /// Requests a book for a student: allocates a copy when one is available,
    /// otherwise enrolls the student in the book's wait-list.
    ///
    /// # Errors
    ///
    /// - `BookNotFound` / `StudentNotFound` for dangling references
    /// - `DuplicateRequest` if the student already holds an active allocation
    ///   or a live queue entry for this book
    #[instrument(skip(self))]
    pub async fn request_allocation(
        &self,
        book_id: i64,
        student_id: i64,
    ) -> Result<RequestOutcome> {
        let _guard = self.locks.lock(book_id).await;
        let mut tx = self.db.pool().begin().await?;
        let now = Utc::now();

        student::ensure_student_exists(&mut tx, student_id).await?;
        let book = catalog::fetch_book(&mut tx, book_id).await?;

        if allocation::has_active_allocation(&mut tx, book_id, student_id).await?
            || queue::has_active_entry(&mut tx, book_id, student_id).await?
        {
            return Err(LibraryError::DuplicateRequest {
                book_id,
                student_id,
            });
        }

        let outcome = if book.available_copies > 0 {
            catalog::adjust_availability(&mut tx, book_id, -1).await?;
            let due_date = now + self.config.loan_period();
            let id =
                allocation::insert_allocation(&mut tx, book_id, student_id, now, due_date).await?;
            let created = allocation::fetch_allocation(&mut tx, id).await?;
            info!(allocation_id = id, book_id, student_id, %due_date, "copy allocated");
            RequestOutcome::Allocated {
                allocation: created,
            }
        } else {
            let entry = queue::enqueue(&mut tx, book_id, student_id, now).await?;
            info!(
                entry_id = entry.id,
                book_id,
                student_id,
                position = entry.position,
                "no copies available, student queued"
            );
            RequestOutcome::Queued { entry }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Returns a borrowed copy and hands the freed copy to the wait-list.
    ///
    /// The return and the promotion attempt are one transaction: the freed
    /// copy either goes to a newly notified waiter or stays available, never
    /// both and never neither.
    ///
    /// # Errors
    ///
    /// - `AllocationNotFound` for an unknown id
    /// - `AlreadyReturned` if the allocation is no longer active
    #[instrument(skip(self))]
    pub async fn return_book(&self, allocation_id: i64) -> Result<Allocation> {
        // Peek outside the lock to learn which book to serialize on; the
        // actual state checks repeat inside the transaction.
        let book_id = {
            let mut conn = self.db.pool().acquire().await?;
            allocation::fetch_allocation(&mut conn, allocation_id)
                .await?
                .book_id
        };

        let _guard = self.locks.lock(book_id).await;
        let mut tx = self.db.pool().begin().await?;
        let now = Utc::now();

        allocation::mark_returned(&mut tx, allocation_id, now).await?;
        catalog::adjust_availability(&mut tx, book_id, 1).await?;
        let promoted = queue::promote_next(&mut tx, book_id, now, self.config.claim_window()).await?;
        let updated = allocation::fetch_allocation(&mut tx, allocation_id).await?;

        tx.commit().await?;
        info!(
            allocation_id,
            book_id,
            promoted = promoted.as_ref().map(|entry| entry.id),
            "copy returned"
        );
        Ok(updated)
    }

    /// A student's active allocations and live queue entries, with derived
    /// due-date and position state.
    ///
    /// # Errors
    ///
    /// Returns `StudentNotFound` for an unknown student.
    #[instrument(skip(self))]
    pub async fn my_books(&self, student_id: i64) -> Result<MyBooks> {
        let mut conn = self.db.pool().acquire().await?;
        let now = Utc::now();

        student::ensure_student_exists(&mut conn, student_id).await?;
        let allocated = allocation::list_active_for_student(&mut conn, student_id).await?;
        let queued = queue::list_active_for_student(&mut conn, student_id).await?;

        Ok(MyBooks {
            allocated_books: allocated
                .into_iter()
                .map(|row| row.into_view(now))
                .collect(),
            queued_books: queued
                .into_iter()
                .map(crate::queue::QueueEntryWithBook::into_view)
                .collect(),
        })
    }

    /// All active allocations across students, with the holder's identity
    /// (admin view).
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the query fails.
    pub async fn active_allocations(&self) -> Result<Vec<AdminAllocationView>> {
        let mut conn = self.db.pool().acquire().await?;
        let now = Utc::now();
        let rows = allocation::list_active_all(&mut conn).await?;
        Ok(rows.into_iter().map(|row| row.into_view(now)).collect())
    }

    // ---- queue manager -----------------------------------------------------

    /// Claims a reserved copy from a notification, converting the queue entry
    /// into an allocation.
    ///
    /// The reservation already spent one unit of availability at notify time,
    /// so the claim itself does not touch the count.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the entry does not exist (or a racing expiry
    ///   already removed it)
    /// - `InvalidState` if the entry is still waiting or already expired
    /// - `ClaimExpired` if the deadline passed; the entry is expired and the
    ///   reservation cascades to the next waiter as a side effect
    #[instrument(skip(self))]
    pub async fn claim(&self, entry_id: i64) -> Result<Allocation> {
        let book_id = {
            let mut conn = self.db.pool().acquire().await?;
            queue::fetch_entry(&mut conn, entry_id).await?.book_id
        };

        let _guard = self.locks.lock(book_id).await;
        let mut tx = self.db.pool().begin().await?;
        let now = Utc::now();

        let entry = queue::fetch_entry(&mut tx, entry_id).await?;
        match entry.status() {
            QueueStatus::Notified => {}
            status => {
                return Err(LibraryError::InvalidState {
                    id: entry_id,
                    expected: QueueStatus::Notified.as_str(),
                    found: status.to_string(),
                });
            }
        }

        if entry.expires_at.is_some_and(|deadline| now > deadline) {
            // Lapsed but not yet swept: settle it here rather than leaving a
            // dead reservation until the next sweep.
            self.expire_in_tx(&mut tx, &entry, now).await?;
            tx.commit().await?;
            warn!(entry_id, book_id, "claim attempted after deadline");
            return Err(LibraryError::ClaimExpired(entry_id));
        }

        let due_date = now + self.config.loan_period();
        let id =
            allocation::insert_allocation(&mut tx, book_id, entry.student_id, now, due_date)
                .await?;
        queue::delete_entry(&mut tx, &entry).await?;
        let created = allocation::fetch_allocation(&mut tx, id).await?;

        tx.commit().await?;
        info!(
            allocation_id = id,
            entry_id,
            book_id,
            student_id = entry.student_id,
            "reserved copy claimed"
        );
        Ok(created)
    }

    /// Withdraws a waiting student from a book's wait-list.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` for an unknown entry
    /// - `InvalidState` if the entry is notified or expired; a notified
    ///   student declines by letting the claim window lapse
    #[instrument(skip(self))]
    pub async fn cancel(&self, entry_id: i64) -> Result<()> {
        let book_id = {
            let mut conn = self.db.pool().acquire().await?;
            queue::fetch_entry(&mut conn, entry_id).await?.book_id
        };

        let _guard = self.locks.lock(book_id).await;
        let mut tx = self.db.pool().begin().await?;

        let entry = queue::fetch_entry(&mut tx, entry_id).await?;
        if entry.status() != QueueStatus::Waiting {
            return Err(LibraryError::InvalidState {
                id: entry_id,
                expected: QueueStatus::Waiting.as_str(),
                found: entry.status().to_string(),
            });
        }

        queue::delete_entry(&mut tx, &entry).await?;
        tx.commit().await?;
        info!(entry_id, book_id, "queue entry cancelled");
        Ok(())
    }

    /// Expires one notified entry whose claim window has elapsed, cascading
    /// the freed reservation to the next waiter.
    ///
    /// Returns `false` when the entry was already settled by a racing claim
    /// or an earlier sweep; that outcome is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` for an unknown entry.
    #[instrument(skip(self))]
    pub async fn expire_entry(&self, entry_id: i64) -> Result<bool> {
        let book_id = {
            let mut conn = self.db.pool().acquire().await?;
            queue::fetch_entry(&mut conn, entry_id).await?.book_id
        };

        let _guard = self.locks.lock(book_id).await;
        let mut tx = self.db.pool().begin().await?;
        let now = Utc::now();

        let entry = match queue::fetch_entry(&mut tx, entry_id).await {
            Ok(entry) => entry,
            // Removed by a racing claim between the peek and the lock.
            Err(LibraryError::EntryNotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };

        if entry.status() != QueueStatus::Notified {
            return Ok(false);
        }

        self.expire_in_tx(&mut tx, &entry, now).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Sweeps all lapsed notifications, expiring each and cascading
    /// promotions. Failures on individual entries are logged and skipped so
    /// one bad entry cannot halt the sweep.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error only if the initial scan itself fails.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<SweepStats> {
        let lapsed = {
            let mut conn = self.db.pool().acquire().await?;
            queue::list_expired_notifications(&mut conn, Utc::now()).await?
        };

        let mut stats = SweepStats {
            examined: lapsed.len(),
            ..SweepStats::default()
        };

        for entry in lapsed {
            match self.expire_entry(entry.id).await {
                Ok(true) => stats.expired += 1,
                Ok(false) => stats.already_settled += 1,
                Err(err) => {
                    stats.failed += 1;
                    warn!(
                        entry_id = entry.id,
                        book_id = entry.book_id,
                        error = %err,
                        "failed to expire entry, skipping"
                    );
                }
            }
        }

        if stats.expired > 0 {
            info!(
                examined = stats.examined,
                expired = stats.expired,
                already_settled = stats.already_settled,
                failed = stats.failed,
                "expiry sweep complete"
            );
        }
        Ok(stats)
    }

    /// Per-book copy accounting snapshot.
    ///
    /// # Errors
    ///
    /// Returns `BookNotFound` for an unknown book.
    pub async fn copy_ledger(&self, book_id: i64) -> Result<CopyLedger> {
        let mut conn = self.db.pool().acquire().await?;
        let book = catalog::fetch_book(&mut conn, book_id).await?;
        let active = allocation::count_active_for_book(&mut conn, book_id).await?;
        let notified = queue::count_notified(&mut conn, book_id).await?;

        Ok(CopyLedger {
            total: book.total_copies,
            available: book.available_copies,
            active_allocations: active,
            notified_reservations: notified,
        })
    }

    /// Expire + release + cascade inside an open transaction.
    ///
    /// The freed reservation goes back through `adjust_availability` before
    /// `promote_next`, which re-spends it if another waiter exists.
    async fn expire_in_tx(
        &self,
        conn: &mut SqliteConnection,
        entry: &QueueEntry,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let transitioned = queue::mark_expired(&mut *conn, entry.id).await?;
        if !transitioned {
            return Ok(());
        }

        catalog::adjust_availability(&mut *conn, entry.book_id, 1).await?;
        let promoted =
            queue::promote_next(&mut *conn, entry.book_id, now, self.config.claim_window()).await?;
        info!(
            entry_id = entry.id,
            book_id = entry.book_id,
            promoted = promoted.as_ref().map(|next| next.id),
            "notification expired"
        );
        Ok(())
    }
}
