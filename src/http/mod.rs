//! HTTP surface for the lending engine.
//!
//! Thin axum layer over [`LendingEngine`]: handlers translate between JSON
//! and engine calls; all business rules live below. Responses use the portal
//! envelope `{success, message, data?}` with ISO-8601 dates.

mod handlers;
mod response;

pub use response::ApiResponse;

use axum::routing::{get, post};
use axum::Router;

use crate::engine::LendingEngine;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The lending engine.
    pub engine: LendingEngine,
}

/// Builds the `/library` router.
#[must_use]
pub fn router(engine: LendingEngine) -> Router {
    let state = AppState { engine };

    Router::new()
        .route(
            "/library/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route("/library/students", post(handlers::create_student))
        .route(
            "/library/books/{book_id}/request",
            post(handlers::request_book),
        )
        .route("/library/my-books/{student_id}", get(handlers::my_books))
        .route("/library/allocations", get(handlers::active_allocations))
        .route(
            "/library/allocations/{id}/return",
            post(handlers::return_book),
        )
        .route(
            "/library/queue/{id}/cancel",
            post(handlers::cancel_queue_entry),
        )
        .route(
            "/library/queue/{id}/accept",
            post(handlers::claim_queue_entry),
        )
        .with_state(state)
}
