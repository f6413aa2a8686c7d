//! Request handlers for the library API.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::allocation::{AdminAllocationView, Allocation};
use crate::catalog::{Book, BookOverview, NewBook};
use crate::engine::{MyBooks, RequestOutcome};
use crate::error::LibraryError;
use crate::student::Student;

use super::response::ApiResponse;
use super::AppState;

/// Body of `POST /library/books/{book_id}/request`.
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    /// The requesting student.
    pub student_id: i64,
}

/// Body of `POST /library/students`.
#[derive(Debug, Deserialize)]
pub struct NewStudent {
    /// Display name.
    pub full_name: String,
    /// Unique campus email.
    pub email: String,
}

/// `GET /library/books`: catalog with per-book queue counts.
pub async fn list_books(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<BookOverview>>>, LibraryError> {
    let books = state.engine.list_books().await?;
    Ok(ApiResponse::ok("Books retrieved", books))
}

/// `POST /library/books`: admin adds a catalog record.
pub async fn create_book(
    State(state): State<AppState>,
    Json(book): Json<NewBook>,
) -> Result<Json<ApiResponse<Book>>, LibraryError> {
    let created = state.engine.create_book(book).await?;
    Ok(ApiResponse::ok("Book created", created))
}

/// `POST /library/students`: registers a student.
pub async fn create_student(
    State(state): State<AppState>,
    Json(student): Json<NewStudent>,
) -> Result<Json<ApiResponse<Student>>, LibraryError> {
    let created = state
        .engine
        .create_student(&student.full_name, &student.email)
        .await?;
    Ok(ApiResponse::ok("Student registered", created))
}

/// `POST /library/books/{book_id}/request`: allocate or enqueue.
pub async fn request_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    Json(request): Json<BookRequest>,
) -> Result<Json<ApiResponse<RequestOutcome>>, LibraryError> {
    let outcome = state
        .engine
        .request_allocation(book_id, request.student_id)
        .await?;

    let message = match &outcome {
        RequestOutcome::Allocated { .. } => "Book allocated successfully",
        RequestOutcome::Queued { entry } => {
            return Ok(ApiResponse::ok(
                format!(
                    "Book is not available. You have been added to the queue at position {}.",
                    entry.position
                ),
                outcome,
            ));
        }
    };
    Ok(ApiResponse::ok(message, outcome))
}

/// `GET /library/my-books/{student_id}`: a student's loans and queue places.
pub async fn my_books(
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> Result<Json<ApiResponse<MyBooks>>, LibraryError> {
    let books = state.engine.my_books(student_id).await?;
    Ok(ApiResponse::ok("Books retrieved", books))
}

/// `POST /library/allocations/{id}/return`: return a borrowed copy.
pub async fn return_book(
    State(state): State<AppState>,
    Path(allocation_id): Path<i64>,
) -> Result<Json<ApiResponse<Allocation>>, LibraryError> {
    let updated = state.engine.return_book(allocation_id).await?;
    Ok(ApiResponse::ok("Book returned successfully", updated))
}

/// `GET /library/allocations`: all active loans with their holders (admin).
pub async fn active_allocations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AdminAllocationView>>>, LibraryError> {
    let allocations = state.engine.active_allocations().await?;
    Ok(ApiResponse::ok("Allocations retrieved", allocations))
}

/// `POST /library/queue/{id}/cancel`: withdraw from a wait-list.
pub async fn cancel_queue_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, LibraryError> {
    state.engine.cancel(entry_id).await?;
    Ok(ApiResponse::message_only("Queue request cancelled"))
}

/// `POST /library/queue/{id}/accept`: claim a reserved copy.
pub async fn claim_queue_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
) -> Result<Json<ApiResponse<Allocation>>, LibraryError> {
    let allocation = state.engine.claim(entry_id).await?;
    Ok(ApiResponse::ok("Book allocated successfully", allocation))
}
