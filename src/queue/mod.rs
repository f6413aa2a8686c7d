//! Queue manager: per-book FIFO wait-lists.
//!
//! Each book keeps a dense, 1-based ranking of its `waiting` entries. Any
//! removal from the ranking (promotion, cancellation) renumbers the rest, so
//! the position a student sees is always their true place in line.
//!
//! A copy is reserved at *notify* time: [`promote_next`] spends one unit of
//! availability when it marks an entry notified, and expiry hands it back.
//! Reserving at claim time instead would let a second waiter be notified for
//! the same freed copy while the first notification is still outstanding.

mod entry;

pub use entry::{QueueEntry, QueueEntryView, QueueEntryWithBook, QueueStatus};

use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, instrument};

use crate::catalog;
use crate::error::{LibraryError, Result};

/// Appends a student to a book's wait-list.
///
/// The new entry takes the next dense position after the current waiting
/// tail. Duplicate checks belong to the engine, which sees allocations too.
#[instrument(skip(conn, now))]
pub(crate) async fn enqueue(
    conn: &mut SqliteConnection,
    book_id: i64,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<QueueEntry> {
    let position = count_waiting(conn, book_id).await? + 1;

    let entry = sqlx::query_as::<_, QueueEntry>(
        r"INSERT INTO queue_entries (book_id, student_id, position, status, requested_at)
          VALUES (?, ?, ?, ?, ?)
          RETURNING *",
    )
    .bind(book_id)
    .bind(student_id)
    .bind(position)
    .bind(QueueStatus::Waiting.as_str())
    .bind(now)
    .fetch_one(conn)
    .await?;

    debug!(entry_id = entry.id, position, "student enqueued");
    Ok(entry)
}

/// Fetches a queue entry by id, failing with `EntryNotFound` when absent.
pub(crate) async fn fetch_entry(conn: &mut SqliteConnection, entry_id: i64) -> Result<QueueEntry> {
    sqlx::query_as::<_, QueueEntry>(r"SELECT * FROM queue_entries WHERE id = ?")
        .bind(entry_id)
        .fetch_optional(conn)
        .await?
        .ok_or(LibraryError::EntryNotFound(entry_id))
}

/// Whether the student already has a live (waiting or notified) entry for
/// this book.
pub(crate) async fn has_active_entry(
    conn: &mut SqliteConnection,
    book_id: i64,
    student_id: i64,
) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r"SELECT COUNT(*) FROM queue_entries
          WHERE book_id = ? AND student_id = ? AND status IN (?, ?)",
    )
    .bind(book_id)
    .bind(student_id)
    .bind(QueueStatus::Waiting.as_str())
    .bind(QueueStatus::Notified.as_str())
    .fetch_one(conn)
    .await?;

    Ok(count > 0)
}

/// Promotes the head of a book's wait-list to `notified`, reserving a copy.
///
/// Picks the lowest-position waiting entry. If none exists, availability is
/// left as-is and `None` is returned: the freed copy stays openly
/// allocatable. Otherwise one unit of availability is spent on the
/// reservation, the entry gets its claim deadline, and the remaining waiting
/// entries are renumbered from 1.
#[instrument(skip(conn, now, claim_window))]
pub(crate) async fn promote_next(
    conn: &mut SqliteConnection,
    book_id: i64,
    now: DateTime<Utc>,
    claim_window: Duration,
) -> Result<Option<QueueEntry>> {
    let head = sqlx::query_as::<_, QueueEntry>(
        r"SELECT * FROM queue_entries
          WHERE book_id = ? AND status = ?
          ORDER BY position ASC
          LIMIT 1",
    )
    .bind(book_id)
    .bind(QueueStatus::Waiting.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(head) = head else {
        debug!(book_id, "no waiters to promote");
        return Ok(None);
    };

    // Reserve the copy for the promoted waiter before anyone else can see it
    // as available.
    catalog::adjust_availability(conn, book_id, -1).await?;

    let expires_at = now + claim_window;
    let entry = sqlx::query_as::<_, QueueEntry>(
        r"UPDATE queue_entries
          SET status = ?, position = 0, notified_at = ?, expires_at = ?
          WHERE id = ?
          RETURNING *",
    )
    .bind(QueueStatus::Notified.as_str())
    .bind(now)
    .bind(expires_at)
    .bind(head.id)
    .fetch_one(&mut *conn)
    .await?;

    repack_positions(conn, book_id).await?;

    debug!(
        entry_id = entry.id,
        student_id = entry.student_id,
        %expires_at,
        "waiter notified, copy reserved"
    );
    Ok(Some(entry))
}

/// Deletes an entry and renumbers the book's waiting ranking.
///
/// Used on claim (entry converts to an allocation) and on cancellation.
pub(crate) async fn delete_entry(conn: &mut SqliteConnection, entry: &QueueEntry) -> Result<()> {
    sqlx::query(r"DELETE FROM queue_entries WHERE id = ?")
        .bind(entry.id)
        .execute(&mut *conn)
        .await?;

    repack_positions(conn, entry.book_id).await
}

/// Transitions a notified entry to `expired`.
///
/// Returns `false` when the entry was no longer notified, the signal that a
/// racing claim or a previous sweep won, and the caller should no-op.
pub(crate) async fn mark_expired(conn: &mut SqliteConnection, entry_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r"UPDATE queue_entries
          SET status = ?
          WHERE id = ? AND status = ?",
    )
    .bind(QueueStatus::Expired.as_str())
    .bind(entry_id)
    .bind(QueueStatus::Notified.as_str())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Renumbers a book's waiting entries to a dense 1-based ranking.
///
/// Ordering is FIFO by request time (id as tie-break for equal timestamps),
/// so renumbering never reorders, only closes gaps. O(queue length) per
/// mutation, which is fine for per-book queues of tens of students.
pub(crate) async fn repack_positions(conn: &mut SqliteConnection, book_id: i64) -> Result<()> {
    sqlx::query(
        r"UPDATE queue_entries
          SET position = (
              SELECT ranked.rank FROM (
                  SELECT id, ROW_NUMBER() OVER (ORDER BY requested_at ASC, id ASC) AS rank
                  FROM queue_entries
                  WHERE book_id = ?1 AND status = ?2
              ) AS ranked
              WHERE ranked.id = queue_entries.id
          )
          WHERE book_id = ?1 AND status = ?2",
    )
    .bind(book_id)
    .bind(QueueStatus::Waiting.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

/// Live (waiting or notified) entries for one student, joined with book
/// identity.
pub(crate) async fn list_active_for_student(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Vec<QueueEntryWithBook>> {
    let rows = sqlx::query_as::<_, QueueEntryWithBook>(
        r"SELECT q.id, q.book_id, q.student_id, q.position, q.status,
                 q.requested_at, q.notified_at, q.expires_at,
                 b.title, b.author, b.isbn
          FROM queue_entries q
          JOIN books b ON b.id = q.book_id
          WHERE q.student_id = ? AND q.status IN (?, ?)
          ORDER BY q.requested_at ASC",
    )
    .bind(student_id)
    .bind(QueueStatus::Waiting.as_str())
    .bind(QueueStatus::Notified.as_str())
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Notified entries whose claim window has elapsed.
///
/// Read by the expiry scheduler; each returned entry is re-checked under its
/// book's lock before being transitioned.
pub(crate) async fn list_expired_notifications(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> Result<Vec<QueueEntry>> {
    let rows = sqlx::query_as::<_, QueueEntry>(
        r"SELECT * FROM queue_entries
          WHERE status = ? AND expires_at < ?
          ORDER BY expires_at ASC",
    )
    .bind(QueueStatus::Notified.as_str())
    .bind(now)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Count of waiting entries for one book.
pub(crate) async fn count_waiting(conn: &mut SqliteConnection, book_id: i64) -> Result<i64> {
    count_by_status(conn, book_id, QueueStatus::Waiting).await
}

/// Count of notified entries for one book (each holds one reserved copy).
pub(crate) async fn count_notified(conn: &mut SqliteConnection, book_id: i64) -> Result<i64> {
    count_by_status(conn, book_id, QueueStatus::Notified).await
}

async fn count_by_status(
    conn: &mut SqliteConnection,
    book_id: i64,
    status: QueueStatus,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r"SELECT COUNT(*) FROM queue_entries WHERE book_id = ? AND status = ?",
    )
    .bind(book_id)
    .bind(status.as_str())
    .fetch_one(conn)
    .await?;

    Ok(count)
}
