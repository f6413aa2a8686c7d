//! Queue entry types and status definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::catalog::BookSummary;

/// Status of a queue entry.
///
/// The state machine is `waiting → notified → expired`, with claimed entries
/// removed outright. A waiting entry never expires directly: only an
/// outstanding notification carries a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// In line, holding a dense 1-based position.
    Waiting,
    /// Offered a reserved copy, claim window running.
    Notified,
    /// Notification lapsed unclaimed; retained for audit.
    Expired,
}

impl QueueStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Notified => "notified",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "notified" => Ok(Self::Notified),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("invalid queue status: {s}")),
        }
    }
}

/// A student's place in one book's wait-list.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueEntry {
    /// Unique identifier.
    pub id: i64,
    /// The book being waited on.
    pub book_id: i64,
    /// The waiting student.
    pub student_id: i64,
    /// Dense 1-based rank among waiting entries; 0 once out of the ranking.
    pub position: i64,
    /// Stored status (stored as text, parsed via `status()`).
    #[sqlx(rename = "status")]
    #[serde(rename = "status")]
    pub status_str: String,
    /// When the student joined the queue.
    pub requested_at: DateTime<Utc>,
    /// When the student was offered a copy, if they have been.
    pub notified_at: Option<DateTime<Utc>>,
    /// Claim deadline, set when the entry becomes notified.
    pub expires_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Returns the parsed status enum.
    ///
    /// Falls back to `Waiting` if the status string is invalid.
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        self.status_str.parse().unwrap_or(QueueStatus::Waiting)
    }
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueEntry {{ id: {}, book: {}, position: {}, status: {} }}",
            self.id,
            self.book_id,
            self.position,
            self.status()
        )
    }
}

/// Queue entry joined with its book, as read for student-facing listings.
#[derive(Debug, Clone, FromRow)]
pub struct QueueEntryWithBook {
    /// Entry id.
    pub id: i64,
    /// The book being waited on.
    pub book_id: i64,
    /// The waiting student.
    pub student_id: i64,
    /// Dense rank among waiting entries.
    pub position: i64,
    /// Stored status text.
    pub status: String,
    /// When the student joined the queue.
    pub requested_at: DateTime<Utc>,
    /// When the student was offered a copy, if they have been.
    pub notified_at: Option<DateTime<Utc>>,
    /// Claim deadline, if notified.
    pub expires_at: Option<DateTime<Utc>>,
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Book ISBN.
    pub isbn: String,
}

impl QueueEntryWithBook {
    /// Builds the API view.
    #[must_use]
    pub fn into_view(self) -> QueueEntryView {
        let status = self.status.parse().unwrap_or(QueueStatus::Waiting);
        QueueEntryView {
            id: self.id,
            book: BookSummary {
                id: self.book_id,
                title: self.title,
                author: self.author,
                isbn: self.isbn,
            },
            position: self.position,
            status,
            requested_at: self.requested_at,
            notified_at: self.notified_at,
            expires_at: self.expires_at,
        }
    }
}

/// Student-facing queue payload.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntryView {
    /// Entry id.
    pub id: i64,
    /// The book being waited on.
    pub book: BookSummary,
    /// Dense rank among waiting entries; 0 once notified.
    pub position: i64,
    /// Current status.
    pub status: QueueStatus,
    /// When the student joined the queue.
    pub requested_at: DateTime<Utc>,
    /// When the student was offered a copy, if they have been.
    pub notified_at: Option<DateTime<Utc>>,
    /// Claim deadline, if notified.
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_status_as_str() {
        assert_eq!(QueueStatus::Waiting.as_str(), "waiting");
        assert_eq!(QueueStatus::Notified.as_str(), "notified");
        assert_eq!(QueueStatus::Expired.as_str(), "expired");
    }

    #[test]
    fn test_queue_status_from_str_valid() {
        assert_eq!(
            "waiting".parse::<QueueStatus>().unwrap(),
            QueueStatus::Waiting
        );
        assert_eq!(
            "notified".parse::<QueueStatus>().unwrap(),
            QueueStatus::Notified
        );
        assert_eq!(
            "expired".parse::<QueueStatus>().unwrap(),
            QueueStatus::Expired
        );
    }

    #[test]
    fn test_queue_status_from_str_invalid() {
        let result = "fulfilled".parse::<QueueStatus>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("invalid queue status"));
    }

    #[test]
    fn test_queue_status_serde_roundtrip() {
        let status = QueueStatus::Notified;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"notified\"");
        let parsed: QueueStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_queue_entry_status_fallback_on_invalid() {
        let entry = QueueEntry {
            id: 1,
            book_id: 1,
            student_id: 1,
            position: 1,
            status_str: "garbage".to_string(),
            requested_at: Utc::now(),
            notified_at: None,
            expires_at: None,
        };
        assert_eq!(entry.status(), QueueStatus::Waiting);
    }

    #[test]
    fn test_queue_entry_display() {
        let entry = QueueEntry {
            id: 42,
            book_id: 7,
            student_id: 3,
            position: 2,
            status_str: "waiting".to_string(),
            requested_at: Utc::now(),
            notified_at: None,
            expires_at: None,
        };
        let display = entry.to_string();
        assert!(display.contains("42"));
        assert!(display.contains("position: 2"));
        assert!(display.contains("waiting"));
    }
}
