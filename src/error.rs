//! Error types for lending engine operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure.
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl DbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> DbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return DbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return DbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return DbErrorKind::BusyOrLocked;
    }

    DbErrorKind::Other
}

/// Errors surfaced by the lending engine.
///
/// None of these are transient: the caller must change input or wait, so no
/// automatic retry is performed anywhere in the engine.
#[derive(Debug, Clone, Error)]
pub enum LibraryError {
    /// Book does not exist in the catalog.
    #[error("book not found: id {0}")]
    BookNotFound(i64),

    /// Student does not exist in the registry.
    #[error("student not found: id {0}")]
    StudentNotFound(i64),

    /// Allocation does not exist.
    #[error("allocation not found: id {0}")]
    AllocationNotFound(i64),

    /// Queue entry does not exist, or was already transitioned by a
    /// concurrent claim/expiry.
    #[error("queue entry not found: id {0}")]
    EntryNotFound(i64),

    /// Student already holds an active allocation or queue entry for this book.
    #[error("duplicate request: student {student_id} already has an active request for book {book_id}")]
    DuplicateRequest {
        /// The book being requested again.
        book_id: i64,
        /// The requesting student.
        student_id: i64,
    },

    /// Return called on an allocation that is no longer active.
    #[error("allocation {0} has already been returned")]
    AlreadyReturned(i64),

    /// Claim attempted after the notification window elapsed.
    #[error("claim window for queue entry {0} has expired")]
    ClaimExpired(i64),

    /// Operation valid only in a different entry state (e.g. cancelling a
    /// notified entry, claiming a waiting one).
    #[error("invalid state for queue entry {id}: expected {expected}, found {found}")]
    InvalidState {
        /// The entry in the wrong state.
        id: i64,
        /// Status the operation requires.
        expected: &'static str,
        /// Status actually found.
        found: String,
    },

    /// Availability would leave the `[0, total_copies]` range. With
    /// per-book serialization in place this indicates a bug.
    #[error("availability invariant violated for book {book_id}: {available} + ({delta}) outside [0, {total}]")]
    InvariantViolation {
        /// The affected book.
        book_id: i64,
        /// Availability before the adjustment.
        available: i64,
        /// The rejected delta.
        delta: i64,
        /// Total copies of the book.
        total: i64,
    },

    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used for failure handling.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },
}

impl From<sqlx::Error> for LibraryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl LibraryError {
    /// Machine-readable error kind, stable across message wording changes.
    ///
    /// Exposed in API responses so clients can branch without parsing the
    /// human message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BookNotFound(_)
            | Self::StudentNotFound(_)
            | Self::AllocationNotFound(_)
            | Self::EntryNotFound(_) => "not_found",
            Self::DuplicateRequest { .. } => "conflict",
            Self::AlreadyReturned(_) | Self::ClaimExpired(_) | Self::InvalidState { .. } => {
                "invalid_state"
            }
            Self::InvariantViolation { .. } => "invariant_violation",
            Self::Database { .. } => "database",
        }
    }

    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<DbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns true when this error is a database busy/locked condition.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        self.database_kind() == Some(DbErrorKind::BusyOrLocked)
    }
}

/// Result type for lending engine operations.
pub type Result<T> = std::result::Result<T, LibraryError>;
