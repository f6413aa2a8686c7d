//! Student registry.
//!
//! The lending engine only needs enough of a student record to validate
//! that requests reference a real person; authentication and profile
//! management live elsewhere in the campus platform.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use crate::error::{LibraryError, Result};

/// A registered student.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Student {
    /// Unique identifier.
    pub id: i64,
    /// Display name.
    pub full_name: String,
    /// Unique campus email.
    pub email: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Minimal student identity embedded in admin payloads.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentSummary {
    /// Unique identifier.
    pub id: i64,
    /// Display name.
    pub full_name: String,
    /// Unique campus email.
    pub email: String,
}

/// Inserts a new student and returns its id.
pub(crate) async fn insert_student(
    conn: &mut SqliteConnection,
    full_name: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        r"INSERT INTO students (full_name, email, created_at)
          VALUES (?, ?, ?)
          RETURNING id",
    )
    .bind(full_name)
    .bind(email)
    .bind(now)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Fetches a student by id, failing with `StudentNotFound` when absent.
pub(crate) async fn fetch_student(conn: &mut SqliteConnection, student_id: i64) -> Result<Student> {
    sqlx::query_as::<_, Student>(r"SELECT * FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_optional(conn)
        .await?
        .ok_or(LibraryError::StudentNotFound(student_id))
}

/// Verifies a student exists without materializing the full row.
pub(crate) async fn ensure_student_exists(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<()> {
    let count =
        sqlx::query_scalar::<_, i64>(r"SELECT COUNT(*) FROM students WHERE id = ?")
            .bind(student_id)
            .fetch_one(conn)
            .await?;

    if count == 0 {
        return Err(LibraryError::StudentNotFound(student_id));
    }
    Ok(())
}
