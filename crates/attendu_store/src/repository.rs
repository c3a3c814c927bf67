//! Attendance-record mutations backed by Firestore.
//!
//! Used by the finalize endpoint and the overdue-pending sweep. The
//! finalization write mirrors the record lifecycle: the terminal status
//! lands in `status`, the pending markers are cleared, and `finalizedAt`
//! records when the conversion happened.

use std::sync::Arc;

use attendu_common::models::AttendanceRecord;
use attendu_common::services::{AttendanceRepository, BoxFuture, BoxedError};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::client::{composite_and, field_filter, structured_query, FirestoreClient};
use crate::value::timestamp_value;

const ATTENDANCE_COLLECTION: &str = "attendance";

/// Firestore-backed [`AttendanceRepository`] implementation.
pub struct FirestoreAttendanceRepository {
    client: Arc<FirestoreClient>,
}

impl FirestoreAttendanceRepository {
    pub fn new(client: Arc<FirestoreClient>) -> Self {
        Self { client }
    }
}

impl AttendanceRepository for FirestoreAttendanceRepository {
    type Error = BoxedError;

    fn fetch_record(
        &self,
        record_id: &str,
    ) -> BoxFuture<'_, Option<AttendanceRecord>, Self::Error> {
        let record_id = record_id.to_string();
        Box::pin(async move {
            let document = self
                .client
                .get_document(ATTENDANCE_COLLECTION, &record_id)
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;
            let Some(document) = document else {
                return Ok(None);
            };
            let record: AttendanceRecord =
                serde_json::from_value(document).map_err(|e| BoxedError(Box::new(e)))?;
            Ok(Some(record))
        })
    }

    fn apply_finalization(
        &self,
        before: &AttendanceRecord,
        final_status: &str,
        finalized_at: DateTime<Utc>,
    ) -> BoxFuture<'_, AttendanceRecord, Self::Error> {
        let before = before.clone();
        let final_status = final_status.to_string();
        Box::pin(async move {
            let mut fields = serde_json::Map::new();
            fields.insert(
                "status".into(),
                json!({ "stringValue": final_status.clone() }),
            );
            fields.insert("isPending".into(), json!({ "booleanValue": false }));
            fields.insert("finalizedAt".into(), timestamp_value(finalized_at));
            // proposedStatus is in the mask but not the fields: deleted

            self.client
                .patch_document(
                    ATTENDANCE_COLLECTION,
                    &before.id,
                    serde_json::Value::Object(fields),
                    &["status", "isPending", "proposedStatus", "finalizedAt"],
                )
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;

            let mut after = before;
            after.status = Some(final_status);
            after.is_pending = Some(false);
            after.proposed_status = None;
            Ok(after)
        })
    }

    fn list_overdue_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<AttendanceRecord>, Self::Error> {
        Box::pin(async move {
            let filter = composite_and(vec![
                field_filter("isPending", "EQUAL", json!({ "booleanValue": true })),
                field_filter(
                    "scanTimestamp",
                    "LESS_THAN_OR_EQUAL",
                    timestamp_value(cutoff),
                ),
            ]);
            let documents = self
                .client
                .run_query(structured_query(ATTENDANCE_COLLECTION, filter, None))
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;

            let mut records = Vec::with_capacity(documents.len());
            for document in documents {
                let record: AttendanceRecord =
                    serde_json::from_value(document).map_err(|e| BoxedError(Box::new(e)))?;
                records.push(record);
            }
            Ok(records)
        })
    }
}
