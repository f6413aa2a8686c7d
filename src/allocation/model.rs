//! Allocation types and status definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::catalog::BookSummary;
use crate::student::StudentSummary;

/// Seconds per day, for ceiling division in `days_remaining`.
const SECONDS_PER_DAY: i64 = 86_400;

/// Stored status of an allocation.
///
/// Overdue is deliberately not a stored status: it is derived from
/// `due_date` at read time so clock drift can never desynchronize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Loan is outstanding.
    Active,
    /// Copy has been returned.
    Returned,
}

impl AllocationStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Returned => "returned",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AllocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "returned" => Ok(Self::Returned),
            _ => Err(format!("invalid allocation status: {s}")),
        }
    }
}

/// A loan of one book copy to one student.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Allocation {
    /// Unique identifier.
    pub id: i64,
    /// The borrowed book.
    pub book_id: i64,
    /// The borrowing student.
    pub student_id: i64,
    /// When the copy was handed out.
    pub allocated_at: DateTime<Utc>,
    /// When the copy must be back.
    pub due_date: DateTime<Utc>,
    /// When the copy came back, if it has.
    pub returned_at: Option<DateTime<Utc>>,
    /// Stored status (stored as text, parsed via `status()`).
    #[sqlx(rename = "status")]
    #[serde(rename = "status")]
    pub status_str: String,
}

impl Allocation {
    /// Returns the parsed status enum.
    ///
    /// Falls back to `Active` if the status string is invalid.
    #[must_use]
    pub fn status(&self) -> AllocationStatus {
        self.status_str.parse().unwrap_or(AllocationStatus::Active)
    }

    /// Whether this loan is outstanding past its due date.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status() == AllocationStatus::Active && now > self.due_date
    }

    /// Whole days until the due date, rounded up, floored at zero.
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let seconds = (self.due_date - now).num_seconds();
        if seconds <= 0 {
            0
        } else {
            (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
        }
    }
}

/// Allocation row joined with its book, as read for student-facing listings.
#[derive(Debug, Clone, FromRow)]
pub struct AllocationWithBook {
    /// Allocation id.
    pub id: i64,
    /// The borrowed book.
    pub book_id: i64,
    /// The borrowing student.
    pub student_id: i64,
    /// When the copy was handed out.
    pub allocated_at: DateTime<Utc>,
    /// When the copy must be back.
    pub due_date: DateTime<Utc>,
    /// When the copy came back, if it has.
    pub returned_at: Option<DateTime<Utc>>,
    /// Stored status text.
    pub status: String,
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Book ISBN.
    pub isbn: String,
}

impl AllocationWithBook {
    /// Builds the API view, deriving overdue state against `now`.
    #[must_use]
    pub fn into_view(self, now: DateTime<Utc>) -> AllocationView {
        let allocation = Allocation {
            id: self.id,
            book_id: self.book_id,
            student_id: self.student_id,
            allocated_at: self.allocated_at,
            due_date: self.due_date,
            returned_at: self.returned_at,
            status_str: self.status,
        };
        AllocationView {
            id: allocation.id,
            book: BookSummary {
                id: allocation.book_id,
                title: self.title,
                author: self.author,
                isbn: self.isbn,
            },
            allocated_at: allocation.allocated_at,
            due_date: allocation.due_date,
            days_remaining: allocation.days_remaining(now),
            is_overdue: allocation.is_overdue(now),
            status: allocation.status(),
        }
    }
}

/// Allocation row joined with both parties, as read for the admin listing.
#[derive(Debug, Clone, FromRow)]
pub struct AllocationWithParties {
    /// Allocation id.
    pub id: i64,
    /// The borrowed book.
    pub book_id: i64,
    /// The borrowing student.
    pub student_id: i64,
    /// When the copy was handed out.
    pub allocated_at: DateTime<Utc>,
    /// When the copy must be back.
    pub due_date: DateTime<Utc>,
    /// When the copy came back, if it has.
    pub returned_at: Option<DateTime<Utc>>,
    /// Stored status text.
    pub status: String,
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Book ISBN.
    pub isbn: String,
    /// Student display name.
    pub full_name: String,
    /// Student campus email.
    pub email: String,
}

impl AllocationWithParties {
    /// Builds the admin view, deriving overdue state against `now`.
    #[must_use]
    pub fn into_view(self, now: DateTime<Utc>) -> AdminAllocationView {
        let allocation = Allocation {
            id: self.id,
            book_id: self.book_id,
            student_id: self.student_id,
            allocated_at: self.allocated_at,
            due_date: self.due_date,
            returned_at: self.returned_at,
            status_str: self.status,
        };
        AdminAllocationView {
            id: allocation.id,
            book: BookSummary {
                id: allocation.book_id,
                title: self.title,
                author: self.author,
                isbn: self.isbn,
            },
            student: StudentSummary {
                id: allocation.student_id,
                full_name: self.full_name,
                email: self.email,
            },
            allocated_at: allocation.allocated_at,
            due_date: allocation.due_date,
            days_remaining: allocation.days_remaining(now),
            is_overdue: allocation.is_overdue(now),
            status: allocation.status(),
        }
    }
}

/// Admin-facing allocation payload naming who holds each copy.
#[derive(Debug, Clone, Serialize)]
pub struct AdminAllocationView {
    /// Allocation id.
    pub id: i64,
    /// The borrowed book.
    pub book: BookSummary,
    /// The borrowing student.
    pub student: StudentSummary,
    /// When the copy was handed out.
    pub allocated_at: DateTime<Utc>,
    /// When the copy must be back.
    pub due_date: DateTime<Utc>,
    /// Whole days until due, never negative.
    pub days_remaining: i64,
    /// Whether the loan is outstanding past its due date.
    pub is_overdue: bool,
    /// Stored status.
    pub status: AllocationStatus,
}

/// Student-facing allocation payload with derived due-date state.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationView {
    /// Allocation id.
    pub id: i64,
    /// The borrowed book.
    pub book: BookSummary,
    /// When the copy was handed out.
    pub allocated_at: DateTime<Utc>,
    /// When the copy must be back.
    pub due_date: DateTime<Utc>,
    /// Whole days until due, never negative.
    pub days_remaining: i64,
    /// Whether the loan is outstanding past its due date.
    pub is_overdue: bool,
    /// Stored status.
    pub status: AllocationStatus,
}
