//! Catalog store: book records and copy counts.
//!
//! All mutation of `available_copies` happens through [`adjust_availability`];
//! no other module writes the field. Centralizing the bounds check in one
//! place keeps the `0 <= available_copies <= total_copies` invariant auditable.

mod book;

pub use book::{Book, BookOverview, BookSummary, NewBook};

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::error::{LibraryError, Result};

/// Fetches a book by id, failing with `BookNotFound` when absent.
pub(crate) async fn fetch_book(conn: &mut SqliteConnection, book_id: i64) -> Result<Book> {
    sqlx::query_as::<_, Book>(r"SELECT * FROM books WHERE id = ?")
        .bind(book_id)
        .fetch_optional(conn)
        .await?
        .ok_or(LibraryError::BookNotFound(book_id))
}

/// Inserts a new catalog record with availability equal to `total_copies`.
pub(crate) async fn insert_book(
    conn: &mut SqliteConnection,
    book: &NewBook,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r"INSERT INTO books (title, author, isbn, description, category, total_copies, available_copies, created_at)
          VALUES (?, ?, ?, ?, ?, ?, ?, ?)
          RETURNING id",
    )
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(&book.description)
    .bind(&book.category)
    .bind(book.total_copies)
    .bind(book.total_copies)
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Adjusts a book's availability by `delta`, enforcing the copy-count bounds.
///
/// The caller must hold the book's lock: the read-check-write sequence is only
/// atomic under per-book serialization.
///
/// # Errors
///
/// Returns `InvariantViolation` if the result would leave `[0, total_copies]`,
/// and `BookNotFound` if the book does not exist.
#[instrument(skip(conn))]
pub(crate) async fn adjust_availability(
    conn: &mut SqliteConnection,
    book_id: i64,
    delta: i64,
) -> Result<()> {
    let book = fetch_book(conn, book_id).await?;
    let adjusted = book.available_copies + delta;
    if adjusted < 0 || adjusted > book.total_copies {
        return Err(LibraryError::InvariantViolation {
            book_id,
            available: book.available_copies,
            delta,
            total: book.total_copies,
        });
    }

    sqlx::query(r"UPDATE books SET available_copies = available_copies + ? WHERE id = ?")
        .bind(delta)
        .bind(book_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Lists the catalog with derived per-book lending statistics.
///
/// `active_allocations` and `queue_count` come from correlated subqueries so
/// the listing reflects the same snapshot as the book rows.
pub(crate) async fn list_books(conn: &mut SqliteConnection) -> Result<Vec<BookOverview>> {
    let books = sqlx::query_as::<_, BookOverview>(
        r"SELECT
              b.id,
              b.title,
              b.author,
              b.isbn,
              b.description,
              b.category,
              b.total_copies,
              b.available_copies,
              (SELECT COUNT(*) FROM allocations a
                 WHERE a.book_id = b.id AND a.status = 'active') AS active_allocations,
              (SELECT COUNT(*) FROM queue_entries q
                 WHERE q.book_id = b.id AND q.status = 'waiting') AS queue_count,
              b.available_copies > 0 AS is_available
          FROM books b
          ORDER BY b.title ASC",
    )
    .fetch_all(conn)
    .await?;

    Ok(books)
}
