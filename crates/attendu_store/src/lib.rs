//! Firestore document-store integration for AttendU
//!
//! This crate provides the concrete document-store implementations of the
//! service seams defined in `attendu_common::services`:
//!
//! - [`FirestoreClient`]: a small REST client (point reads, creates,
//!   masked patches, structured queries)
//! - [`FirestoreDirectory`]: the default read-side lookups used by the
//!   notification dispatcher
//! - [`FirestoreNotificationWriter`]: notification persistence with
//!   dedupe-by-key enforcement
//! - [`FirestoreAttendanceRepository`]: attendance-record mutations for
//!   the finalize endpoint and the overdue-pending sweep
//!
//! Authentication uses a service-account key (Datastore scope); setting
//! `base_url` in the configuration switches the client to an emulator or
//! test server and skips auth entirely.

pub mod auth;
pub mod client;
pub mod queries;
pub mod repository;
pub mod value;
pub mod writer;

pub use client::{FirestoreClient, FirestoreError};
pub use queries::FirestoreDirectory;
pub use repository::FirestoreAttendanceRepository;
pub use writer::FirestoreNotificationWriter;
