//! Integration tests for the HTTP layer: routing, envelope shape, and
//! error-to-status mapping. Business behavior is covered by the engine
//! tests; here we exercise the axum surface end to end with `oneshot`.

mod support {
    pub mod fixtures;
}

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use library_lending::http::router;
use serde_json::{json, Value};
use tower::ServiceExt;

use support::fixtures::{seed_book, seed_student, setup_engine};

async fn setup_router() -> (Router, library_lending::LendingEngine, tempfile::TempDir) {
    let (engine, _db, tmp) = setup_engine().await;
    (router(engine.clone()), engine, tmp)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to route request");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).expect("Response body was not JSON");
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

#[tokio::test]
async fn test_create_and_list_books() {
    let (app, _engine, _tmp) = setup_router().await;

    let (status, body) = send(
        &app,
        post_json(
            "/library/books",
            &json!({
                "title": "Dune",
                "author": "Frank Herbert",
                "isbn": "9780441013593",
                "total_copies": 2
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["title"], json!("Dune"));
    assert_eq!(body["data"]["available_copies"], json!(2));

    let (status, body) = send(&app, get("/library/books")).await;
    assert_eq!(status, StatusCode::OK);
    let books = body["data"].as_array().expect("data should be an array");
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["queue_count"], json!(0));
    assert_eq!(books[0]["is_available"], json!(true));
}

#[tokio::test]
async fn test_request_returns_allocated_outcome() {
    let (app, engine, _tmp) = setup_router().await;
    let book_id = seed_book(&engine, "Dune", "9780441013593", 1).await;
    let student_id = seed_student(&engine, "Ada Lovelace").await;

    let (status, body) = send(
        &app,
        post_json(
            &format!("/library/books/{book_id}/request"),
            &json!({ "student_id": student_id }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("allocated"));
    assert_eq!(body["data"]["allocation"]["book_id"], json!(book_id));
}

#[tokio::test]
async fn test_request_returns_queued_outcome_with_position() {
    let (app, engine, _tmp) = setup_router().await;
    let book_id = seed_book(&engine, "Dune", "9780441013593", 1).await;
    let holder = seed_student(&engine, "Holder").await;
    let waiter = seed_student(&engine, "Waiter").await;
    engine.request_allocation(book_id, holder).await.unwrap();

    let (status, body) = send(
        &app,
        post_json(
            &format!("/library/books/{book_id}/request"),
            &json!({ "student_id": waiter }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("queued"));
    assert_eq!(body["data"]["entry"]["position"], json!(1));
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("position 1"), "got message: {message}");
}

#[tokio::test]
async fn test_request_unknown_book_is_404_with_kind() {
    let (app, engine, _tmp) = setup_router().await;
    let student_id = seed_student(&engine, "Ada Lovelace").await;

    let (status, body) = send(
        &app,
        post_json(
            "/library/books/999/request",
            &json!({ "student_id": student_id }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["kind"], json!("not_found"));
}

#[tokio::test]
async fn test_duplicate_request_is_409_conflict() {
    let (app, engine, _tmp) = setup_router().await;
    let book_id = seed_book(&engine, "Dune", "9780441013593", 2).await;
    let student_id = seed_student(&engine, "Ada Lovelace").await;
    engine.request_allocation(book_id, student_id).await.unwrap();

    let (status, body) = send(
        &app,
        post_json(
            &format!("/library/books/{book_id}/request"),
            &json!({ "student_id": student_id }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], json!("conflict"));
}

#[tokio::test]
async fn test_return_flow_over_http() {
    let (app, engine, _tmp) = setup_router().await;
    let book_id = seed_book(&engine, "Dune", "9780441013593", 1).await;
    let student_id = seed_student(&engine, "Ada Lovelace").await;
    let outcome = engine.request_allocation(book_id, student_id).await.unwrap();
    let allocation_id = match outcome {
        library_lending::RequestOutcome::Allocated { allocation } => allocation.id,
        other => panic!("expected allocation, got {other:?}"),
    };

    let (status, body) = send(
        &app,
        post_json(
            &format!("/library/allocations/{allocation_id}/return"),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("returned"));

    // Second return of the same allocation is rejected
    let (status, body) = send(
        &app,
        post_json(
            &format!("/library/allocations/{allocation_id}/return"),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("invalid_state"));
}

#[tokio::test]
async fn test_my_books_includes_loans_and_queue_places() {
    let (app, engine, _tmp) = setup_router().await;
    let dune = seed_book(&engine, "Dune", "9780441013593", 1).await;
    let foundation = seed_book(&engine, "Foundation", "9780553293357", 1).await;
    let holder = seed_student(&engine, "Holder").await;
    let student = seed_student(&engine, "Ada Lovelace").await;

    engine.request_allocation(dune, holder).await.unwrap();
    engine.request_allocation(foundation, student).await.unwrap();
    engine.request_allocation(dune, student).await.unwrap();

    let (status, body) = send(&app, get(&format!("/library/my-books/{student}"))).await;
    assert_eq!(status, StatusCode::OK);

    let allocated = body["data"]["allocated_books"].as_array().unwrap();
    assert_eq!(allocated.len(), 1);
    assert_eq!(allocated[0]["book"]["title"], json!("Foundation"));
    assert_eq!(allocated[0]["days_remaining"], json!(14));
    assert_eq!(allocated[0]["is_overdue"], json!(false));

    let queued = body["data"]["queued_books"].as_array().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0]["book"]["title"], json!("Dune"));
    assert_eq!(queued[0]["status"], json!("waiting"));
}

#[tokio::test]
async fn test_cancel_and_accept_routes() {
    let (app, engine, _tmp) = setup_router().await;
    let book_id = seed_book(&engine, "Dune", "9780441013593", 1).await;
    let holder = seed_student(&engine, "Holder").await;
    let waiter = seed_student(&engine, "Waiter").await;

    let allocation_id = match engine.request_allocation(book_id, holder).await.unwrap() {
        library_lending::RequestOutcome::Allocated { allocation } => allocation.id,
        other => panic!("expected allocation, got {other:?}"),
    };
    let entry_id = match engine.request_allocation(book_id, waiter).await.unwrap() {
        library_lending::RequestOutcome::Queued { entry } => entry.id,
        other => panic!("expected queue entry, got {other:?}"),
    };

    // Accepting before notification is a state error
    let (status, body) = send(
        &app,
        post_json(&format!("/library/queue/{entry_id}/accept"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("invalid_state"));

    engine.return_book(allocation_id).await.unwrap();

    let (status, body) = send(
        &app,
        post_json(&format!("/library/queue/{entry_id}/accept"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["student_id"], json!(waiter));

    // The entry is consumed; cancelling it now is a 404
    let (status, body) = send(
        &app,
        post_json(&format!("/library/queue/{entry_id}/cancel"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], json!("not_found"));
}

#[tokio::test]
async fn test_admin_allocations_include_student_identity() {
    let (app, engine, _tmp) = setup_router().await;
    let book_id = seed_book(&engine, "Dune", "9780441013593", 1).await;
    let student_id = seed_student(&engine, "Ada Lovelace").await;
    engine.request_allocation(book_id, student_id).await.unwrap();

    let (status, body) = send(&app, get("/library/allocations")).await;
    assert_eq!(status, StatusCode::OK);

    let allocations = body["data"].as_array().expect("data should be an array");
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0]["book"]["title"], json!("Dune"));
    assert_eq!(allocations[0]["student"]["id"], json!(student_id));
    assert_eq!(
        allocations[0]["student"]["full_name"],
        json!("Ada Lovelace")
    );
    assert_eq!(
        allocations[0]["student"]["email"],
        json!("ada.lovelace@campus.test")
    );
}

#[tokio::test]
async fn test_register_student() {
    let (app, _engine, _tmp) = setup_router().await;

    let (status, body) = send(
        &app,
        post_json(
            "/library/students",
            &json!({ "full_name": "Ada Lovelace", "email": "ada@campus.test" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["full_name"], json!("Ada Lovelace"));
    assert!(body["data"]["id"].as_i64().is_some());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _engine, _tmp) = setup_router().await;
    let response = app
        .clone()
        .oneshot(get("/library/nonexistent"))
        .await
        .expect("Failed to route request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
