#![allow(dead_code)]
use utoipa::OpenApi;

use crate::handlers::{FinalizeRequest, FinalizeResponse, ProcessEventResponse};

#[utoipa::path(
    post,
    path = "/attendance/events",
    request_body(content = serde_json::Value, description = "Before/after snapshots of one attendance write", example = json!({
        "before": null,
        "after": {
            "id": "att-20260203-stu1",
            "classId": "cls-cs4550",
            "studentId": "stu-1",
            "status": "pending",
            "isPending": true,
            "date": "2026-02-03T15:00:00Z"
        }
    })),
    responses(
        (status = 200, description = "Event processed", body = ProcessEventResponse,
         example = json!({ "status": "processed" })
        ),
        (status = 502, description = "Store lookup failed",
         example = json!({ "status": "error", "message": "Directory lookup failed: connection refused" })
        ),
        (status = 500, description = "Notification write failed",
         example = json!({ "status": "error", "message": "Notification write failed: permission denied" })
        )
    ),
    tag = "Attendance"
)]
fn doc_process_attendance_event_handler() {}

#[utoipa::path(
    post,
    path = "/attendance/finalize",
    request_body(content = FinalizeRequest, example = json!({
        "recordId": "att-20260203-stu1"
    })),
    responses(
        (status = 200, description = "Record finalized", body = FinalizeResponse,
         example = json!({
             "status": "finalized",
             "recordId": "att-20260203-stu1",
             "finalStatus": "Present"
         })
        ),
        (status = 400, description = "Missing record id",
         example = json!({ "status": "rejected", "message": "Missing recordId." })
        ),
        (status = 404, description = "Unknown record id",
         example = json!({ "status": "rejected", "message": "Attendance record not found." })
        ),
        (status = 500, description = "Store failure",
         example = json!({ "status": "rejected", "message": "Unable to finalize the attendance record." })
        )
    ),
    tag = "Attendance"
)]
fn doc_finalize_attendance_handler() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        doc_process_attendance_event_handler,
        doc_finalize_attendance_handler,
    ),
    components(
        schemas(
            ProcessEventResponse,
            FinalizeRequest,
            FinalizeResponse,
        )
    ),
    tags(
        (name = "Attendance", description = "Attendance lifecycle API")
    ),
    servers(
        (url = "/api", description = "Attendance API server")
    )
)]
pub struct AttendanceApiDoc;
