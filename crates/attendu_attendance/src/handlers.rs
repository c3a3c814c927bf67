//! HTTP handlers for the attendance lifecycle
//!
//! This module provides the two HTTP entry points of the attendance core:
//! the trigger endpoint invoked on every attendance-record write, and the
//! finalization endpoint that converts a pending record into a terminal
//! status. Both are designed for the Axum web framework and include
//! OpenAPI documentation when the `openapi` feature is enabled.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use attendu_common::models::{AttendanceEvent, AttendanceRecord};
use attendu_common::services::{AttendanceRepository, BoxedError};

use crate::pipeline::{DispatchError, NotificationDispatcher};

/// Shared handle to the attendance-record repository.
pub type SharedRepository = Arc<dyn AttendanceRepository<Error = BoxedError>>;

/// Shared state for attendance handlers
#[derive(Clone)]
pub struct AttendanceState {
    /// The dispatcher run on every attendance transition
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Attendance-record reads and finalization writes
    pub repository: SharedRepository,
}

/// Response body for the trigger endpoint
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProcessEventResponse {
    /// "processed" on success, "error" otherwise
    pub status: String,

    /// Error message when processing failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request body for the finalization endpoint
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    /// Id of the pending attendance record. `record_id` is accepted too.
    #[serde(alias = "record_id", default)]
    pub record_id: Option<String>,
}

/// Response body for the finalization endpoint
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    /// "finalized" or "rejected"
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_status: Option<String>,
}

/// The terminal status a pending record resolves to: the proposed status
/// when one was recorded, else whatever is already in `status`, else
/// "Unknown".
pub(crate) fn resolve_final_status(record: &AttendanceRecord) -> String {
    record
        .proposed_status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| record.status.as_deref().filter(|s| !s.trim().is_empty()))
        .unwrap_or("Unknown")
        .to_string()
}

/// Handler for the attendance trigger endpoint
///
/// Invoked once per attendance-record write with `{before, after}`
/// snapshots. Runs the notification dispatcher; failures map to 5xx so the
/// delivery platform redelivers (the dedupe keys make that safe).
///
/// # Responses
///
/// - 200 OK: Event processed (including silent no-ops)
/// - 502 Bad Gateway: A store lookup failed
/// - 500 Internal Server Error: A notification write failed
#[axum::debug_handler]
pub async fn process_attendance_event_handler(
    State(state): State<Arc<AttendanceState>>,
    Json(event): Json<AttendanceEvent>,
) -> Response {
    debug!(
        record_id = event.after.as_ref().map(|r| r.id.as_str()).unwrap_or(""),
        "processing attendance event"
    );

    match state.dispatcher.process(&event).await {
        Ok(()) => Json(ProcessEventResponse {
            status: "processed".to_string(),
            message: None,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to process attendance event: {:?}", err);
            let status = match &err {
                DispatchError::Directory(_) => StatusCode::BAD_GATEWAY,
                DispatchError::Writer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ProcessEventResponse {
                    status: "error".to_string(),
                    message: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Handler for finalizing a pending attendance record
///
/// Converts a pending record into its terminal status, then dispatches the
/// resulting transition's notifications. A dispatch failure after a
/// committed finalization is logged rather than surfaced; the caller's
/// record is already finalized.
///
/// # Responses
///
/// - 200 OK: Record finalized
/// - 400 Bad Request: Missing record id
/// - 404 Not Found: Unknown record id
/// - 500 Internal Server Error: The store read or write failed
#[axum::debug_handler]
pub async fn finalize_attendance_handler(
    State(state): State<Arc<AttendanceState>>,
    Json(payload): Json<FinalizeRequest>,
) -> Response {
    let Some(record_id) = payload
        .record_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(FinalizeResponse {
                status: "rejected".to_string(),
                message: Some("Missing recordId.".to_string()),
                record_id: None,
                final_status: None,
            }),
        )
            .into_response();
    };

    let before = match state.repository.fetch_record(record_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(FinalizeResponse {
                    status: "rejected".to_string(),
                    message: Some("Attendance record not found.".to_string()),
                    record_id: Some(record_id.to_string()),
                    final_status: None,
                }),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to load attendance record {}: {}", record_id, err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FinalizeResponse {
                    status: "rejected".to_string(),
                    message: Some("Unable to load the attendance record.".to_string()),
                    record_id: Some(record_id.to_string()),
                    final_status: None,
                }),
            )
                .into_response();
        }
    };

    let final_status = resolve_final_status(&before);

    let after = match state
        .repository
        .apply_finalization(&before, &final_status, Utc::now())
        .await
    {
        Ok(after) => after,
        Err(err) => {
            error!("Failed to finalize attendance record {}: {}", record_id, err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FinalizeResponse {
                    status: "rejected".to_string(),
                    message: Some("Unable to finalize the attendance record.".to_string()),
                    record_id: Some(record_id.to_string()),
                    final_status: None,
                }),
            )
                .into_response();
        }
    };

    info!(
        record_id = %record_id,
        final_status = %final_status,
        "attendance record finalized"
    );

    let event = AttendanceEvent {
        before: Some(before),
        after: Some(after),
    };
    if let Err(err) = state.dispatcher.process(&event).await {
        error!(
            "Notification dispatch after finalizing {} failed: {:?}",
            record_id, err
        );
    }

    Json(FinalizeResponse {
        status: "finalized".to_string(),
        message: None,
        record_id: Some(record_id.to_string()),
        final_status: Some(final_status),
    })
    .into_response()
}
