//! Allocation row operations.
//!
//! These are the raw reads and writes on the `allocations` table. The
//! transactional orchestration (allocate-or-enqueue, return-then-promote)
//! lives in [`crate::engine`], which owns per-book locking; every function
//! here expects to run on a connection inside that scope.

mod model;

pub use model::{
    AdminAllocationView, Allocation, AllocationStatus, AllocationView, AllocationWithBook,
    AllocationWithParties,
};

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::{LibraryError, Result};

/// Inserts an active allocation and returns its id.
pub(crate) async fn insert_allocation(
    conn: &mut SqliteConnection,
    book_id: i64,
    student_id: i64,
    now: DateTime<Utc>,
    due_date: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r"INSERT INTO allocations (book_id, student_id, allocated_at, due_date, status)
          VALUES (?, ?, ?, ?, ?)
          RETURNING id",
    )
    .bind(book_id)
    .bind(student_id)
    .bind(now)
    .bind(due_date)
    .bind(AllocationStatus::Active.as_str())
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Fetches an allocation by id, failing with `AllocationNotFound` when absent.
pub(crate) async fn fetch_allocation(
    conn: &mut SqliteConnection,
    allocation_id: i64,
) -> Result<Allocation> {
    sqlx::query_as::<_, Allocation>(r"SELECT * FROM allocations WHERE id = ?")
        .bind(allocation_id)
        .fetch_optional(conn)
        .await?
        .ok_or(LibraryError::AllocationNotFound(allocation_id))
}

/// Marks an active allocation as returned.
///
/// The status guard in the WHERE clause makes a double return observable:
/// zero affected rows means the allocation was no longer active.
pub(crate) async fn mark_returned(
    conn: &mut SqliteConnection,
    allocation_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r"UPDATE allocations
          SET status = ?, returned_at = ?
          WHERE id = ? AND status = ?",
    )
    .bind(AllocationStatus::Returned.as_str())
    .bind(now)
    .bind(allocation_id)
    .bind(AllocationStatus::Active.as_str())
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LibraryError::AlreadyReturned(allocation_id));
    }
    Ok(())
}

/// Whether the student already holds an active allocation of this book.
pub(crate) async fn has_active_allocation(
    conn: &mut SqliteConnection,
    book_id: i64,
    student_id: i64,
) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r"SELECT COUNT(*) FROM allocations
          WHERE book_id = ? AND student_id = ? AND status = ?",
    )
    .bind(book_id)
    .bind(student_id)
    .bind(AllocationStatus::Active.as_str())
    .fetch_one(conn)
    .await?;

    Ok(count > 0)
}

/// Active allocations for one student, joined with book identity.
pub(crate) async fn list_active_for_student(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Vec<AllocationWithBook>> {
    let rows = sqlx::query_as::<_, AllocationWithBook>(
        r"SELECT a.id, a.book_id, a.student_id, a.allocated_at, a.due_date,
                 a.returned_at, a.status, b.title, b.author, b.isbn
          FROM allocations a
          JOIN books b ON b.id = a.book_id
          WHERE a.student_id = ? AND a.status = ?
          ORDER BY a.due_date ASC",
    )
    .bind(student_id)
    .bind(AllocationStatus::Active.as_str())
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// All active allocations across students, joined with book and student
/// identity so the admin listing can say who holds each copy.
///
/// History (returned loans) is retained in the table but not surfaced here.
pub(crate) async fn list_active_all(
    conn: &mut SqliteConnection,
) -> Result<Vec<AllocationWithParties>> {
    let rows = sqlx::query_as::<_, AllocationWithParties>(
        r"SELECT a.id, a.book_id, a.student_id, a.allocated_at, a.due_date,
                 a.returned_at, a.status, b.title, b.author, b.isbn,
                 s.full_name, s.email
          FROM allocations a
          JOIN books b ON b.id = a.book_id
          JOIN students s ON s.id = a.student_id
          WHERE a.status = ?
          ORDER BY a.due_date ASC",
    )
    .bind(AllocationStatus::Active.as_str())
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Count of active allocations for one book, as read for the copy ledger.
pub(crate) async fn count_active_for_book(
    conn: &mut SqliteConnection,
    book_id: i64,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r"SELECT COUNT(*) FROM allocations WHERE book_id = ? AND status = ?",
    )
    .bind(book_id)
    .bind(AllocationStatus::Active.as_str())
    .fetch_one(conn)
    .await?;

    Ok(count)
}
