use axum::{routing::post, Router};
use std::sync::Arc;
use tracing::info;

use crate::handlers::{
    finalize_attendance_handler, process_attendance_event_handler, AttendanceState,
};

/// Create attendance routes for the API
///
/// This function creates a router with the attendance lifecycle endpoints:
/// the write trigger and the finalization endpoint. The caller assembles
/// the state (dispatcher + repository) from whatever store implementation
/// is in use.
///
/// # Arguments
///
/// * `state` - Shared attendance state with the dispatcher and repository
///
/// # Returns
///
/// An Axum router with the attendance API endpoints
pub fn routes(state: Arc<AttendanceState>) -> Router {
    info!("Attendance routes initialized");

    Router::new()
        .route(
            "/attendance/events",
            post(process_attendance_event_handler),
        )
        .route("/attendance/finalize", post(finalize_attendance_handler))
        .with_state(state)
}
