//! Shared fixtures for integration tests.

use library_lending::{Database, LendingConfig, LendingEngine, NewBook};
use tempfile::TempDir;

/// Creates an engine over a fresh file-backed database with default policy.
///
/// The `Database` handle is returned alongside for tests that need raw SQL
/// (e.g. pushing a due date into the past).
pub async fn setup_engine() -> (LendingEngine, Database, TempDir) {
    setup_engine_with(LendingConfig::default()).await
}

/// Same as [`setup_engine`] with a custom policy.
pub async fn setup_engine_with(config: LendingConfig) -> (LendingEngine, Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    let engine = LendingEngine::new(db.clone(), config);

    (engine, db, temp_dir)
}

/// Adds a book with the given copy count and returns its id.
pub async fn seed_book(engine: &LendingEngine, title: &str, isbn: &str, copies: i64) -> i64 {
    engine
        .create_book(NewBook {
            title: title.to_string(),
            author: "Test Author".to_string(),
            isbn: isbn.to_string(),
            description: None,
            category: Some("fiction".to_string()),
            total_copies: copies,
        })
        .await
        .expect("Failed to seed book")
        .id
}

/// Registers a student and returns their id.
pub async fn seed_student(engine: &LendingEngine, name: &str) -> i64 {
    let email = format!("{}@campus.test", name.to_lowercase().replace(' ', "."));
    engine
        .create_student(name, &email)
        .await
        .expect("Failed to seed student")
        .id
}

/// Asserts the copy-count identity for one book:
/// `available + active_allocations + notified_reservations == total`.
pub async fn assert_ledger_balanced(engine: &LendingEngine, book_id: i64) {
    let ledger = engine
        .copy_ledger(book_id)
        .await
        .expect("Failed to read ledger");
    assert_eq!(
        ledger.available + ledger.active_allocations + ledger.notified_reservations,
        ledger.total,
        "copy ledger out of balance: {ledger:?}"
    );
    assert!(ledger.available >= 0, "negative availability: {ledger:?}");
    assert!(
        ledger.available <= ledger.total,
        "availability above total: {ledger:?}"
    );
}
