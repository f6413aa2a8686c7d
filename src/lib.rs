//! Library Lending & Queue Engine
//!
//! This library implements the lending backend for the campus portal's
//! library section: allocating book copies to students, tracking due dates,
//! and fairly queueing students when no copy is available.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`catalog`] - Book records and the availability choke point
//! - [`allocation`] - Loans and due-date state
//! - [`queue`] - Per-book FIFO wait-lists with dense positions
//! - [`engine`] - Transactional orchestration with per-book locking
//! - [`scheduler`] - Background expiry of unclaimed notifications
//! - [`http`] - axum routes exposing the portal contract

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocation;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod http;
pub mod locks;
pub mod queue;
pub mod scheduler;
pub mod student;

// Re-export commonly used types
pub use allocation::{AdminAllocationView, Allocation, AllocationStatus, AllocationView};
pub use catalog::{Book, BookOverview, BookSummary, NewBook};
pub use config::LendingConfig;
pub use db::Database;
pub use engine::{CopyLedger, LendingEngine, MyBooks, RequestOutcome, SweepStats};
pub use error::{DbErrorKind, LibraryError};
pub use locks::BookLocks;
pub use queue::{QueueEntry, QueueEntryView, QueueStatus};
pub use scheduler::ExpiryScheduler;
pub use student::{Student, StudentSummary};
