//! Attendance lifecycle core for AttendU
//!
//! This crate contains the server-side heart of the system: the
//! notification dispatch pipeline that reacts to attendance-record writes,
//! the finalization endpoint that converts pending records into terminal
//! statuses, and the sweep that catches records whose client-side
//! finalization never arrived.
//!
//! # Design
//!
//! - Every store dependency is injected through the seams in
//!   `attendu_common::services`, so the pipeline is testable without a
//!   live document store.
//! - Branching always happens on normalized statuses
//!   (`attendu_common::status`); raw strings never drive behavior.
//! - Every emitted notification carries a deterministic dedupe key, and
//!   the writer enforces at-most-one visible alert per key, so redelivered
//!   triggers are safe.
//!
//! # API Endpoints
//!
//! - `POST /attendance/events` - process one attendance write trigger
//! - `POST /attendance/finalize` - finalize a pending attendance record

pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod sweep;

#[cfg(feature = "openapi")]
pub mod doc;

#[cfg(test)]
mod pipeline_test;

// Re-export the routes function to be used by the main backend service
pub use routes::routes;
// Re-export the dispatcher and state types
pub use handlers::AttendanceState;
pub use pipeline::{DispatchError, NotificationDispatcher};
pub use sweep::PendingSweep;

#[cfg(feature = "openapi")]
pub mod openapi {
    pub use crate::doc::AttendanceApiDoc;
}
