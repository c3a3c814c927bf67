// --- File: crates/attendu_common/src/lib.rs ---

// Declare modules within this crate
pub mod models; // Data structures and models
pub mod status; // Status normalization
pub mod error; // Error handling
pub mod http; // HTTP utilities
pub mod services; // Service abstractions
pub mod logging; // Logging utilities

// Re-export error types and utilities for easier access
pub use error::{
    config_error, external_service_error, internal_error, not_found, validation_error,
    AttenduError, HttpStatusCode,
};

// Re-export HTTP utilities for easier access
pub use http::{
    client::{create_client, HTTP_CLIENT},
    handle_json_result, IntoHttpResponse,
};

// Re-export the service seams used throughout the workspace
pub use services::{
    AttendanceDirectory, AttendanceRepository, BoxFuture, BoxedError, DailySummary,
    NotificationWriter, WriteOutcome,
};

// Re-export status normalization
pub use status::{effective_status, is_record_pending, normalize_status, AttendanceStatus};

// This crate provides common functionality that can be used across the application.
// It includes shared models, service traits, error handling, and HTTP utilities.
