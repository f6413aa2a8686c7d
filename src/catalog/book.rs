//! Book record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A book in the catalog.
///
/// `available_copies` is the number of copies a fresh requester could be
/// granted right now. Copies reserved for notified queue entries are not
/// counted: a reservation spends one unit of availability at notify time.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Book {
    /// Unique identifier.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Unique ISBN.
    pub isbn: String,
    /// Optional blurb shown in the catalog listing.
    pub description: Option<String>,
    /// Optional shelving category.
    pub category: Option<String>,
    /// Copies owned by the library.
    pub total_copies: i64,
    /// Copies currently grantable to a fresh requester.
    pub available_copies: i64,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a catalog record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Unique ISBN.
    pub isbn: String,
    /// Optional blurb.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional shelving category.
    #[serde(default)]
    pub category: Option<String>,
    /// Copies owned; availability starts equal to this.
    #[serde(default = "default_total_copies")]
    pub total_copies: i64,
}

fn default_total_copies() -> i64 {
    1
}

/// Minimal book identity embedded in allocation and queue payloads.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookSummary {
    /// Unique identifier.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Unique ISBN.
    pub isbn: String,
}

/// Catalog listing row with derived lending statistics.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookOverview {
    /// Unique identifier.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Unique ISBN.
    pub isbn: String,
    /// Optional blurb.
    pub description: Option<String>,
    /// Optional shelving category.
    pub category: Option<String>,
    /// Copies owned by the library.
    pub total_copies: i64,
    /// Copies currently grantable.
    pub available_copies: i64,
    /// Unreturned allocations of this book.
    pub active_allocations: i64,
    /// Students waiting in this book's queue.
    pub queue_count: i64,
    /// Whether a fresh request would be granted immediately.
    pub is_available: bool,
}
