//! Default read-side lookups backed by Firestore.
//!
//! These are the documented default implementations of the
//! [`AttendanceDirectory`] seam: point reads against `users`/`classes`,
//! the historical absence count, and the per-day class aggregate. The
//! dispatcher never talks to Firestore directly; everything goes through
//! this type so tests can swap in hand mocks.

use std::sync::Arc;

use attendu_common::models::{ClassInfo, UserProfile};
use attendu_common::services::{AttendanceDirectory, BoxFuture, BoxedError, DailySummary};
use attendu_common::status::{normalize_status, AttendanceStatus};
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{composite_and, field_filter, structured_query, FirestoreClient};
use crate::value::timestamp_value;

/// Firestore-backed [`AttendanceDirectory`] implementation.
pub struct FirestoreDirectory {
    client: Arc<FirestoreClient>,
    timezone: Tz,
}

impl FirestoreDirectory {
    pub fn new(client: Arc<FirestoreClient>, timezone: Tz) -> Self {
        Self { client, timezone }
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserProfile>, BoxedError> {
        let document = self
            .client
            .get_document("users", user_id)
            .await
            .map_err(|e| BoxedError(Box::new(e)))?;
        let Some(document) = document else {
            return Ok(None);
        };
        let profile: UserProfile =
            serde_json::from_value(document).map_err(|e| BoxedError(Box::new(e)))?;
        Ok(Some(profile))
    }
}

impl AttendanceDirectory for FirestoreDirectory {
    type Error = BoxedError;

    fn fetch_student(&self, student_id: &str) -> BoxFuture<'_, Option<UserProfile>, Self::Error> {
        let student_id = student_id.to_string();
        Box::pin(async move { self.fetch_user(&student_id).await })
    }

    fn fetch_class(&self, class_id: &str) -> BoxFuture<'_, Option<ClassInfo>, Self::Error> {
        let class_id = class_id.to_string();
        Box::pin(async move {
            let document = self
                .client
                .get_document("classes", &class_id)
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;
            let Some(document) = document else {
                return Ok(None);
            };
            let class: ClassInfo =
                serde_json::from_value(document).map_err(|e| BoxedError(Box::new(e)))?;
            Ok(Some(class))
        })
    }

    fn fetch_teacher(&self, teacher_id: &str) -> BoxFuture<'_, Option<UserProfile>, Self::Error> {
        let teacher_id = teacher_id.to_string();
        Box::pin(async move { self.fetch_user(&teacher_id).await })
    }

    /// Counts every stored absent record for the pair. The store holds both
    /// historical capitalizations, so the filter matches `Absent` and
    /// `absent` explicitly.
    fn count_absences(&self, class_id: &str, student_id: &str) -> BoxFuture<'_, u32, Self::Error> {
        let class_id = class_id.to_string();
        let student_id = student_id.to_string();
        Box::pin(async move {
            let filter = composite_and(vec![
                field_filter("classId", "EQUAL", json!({ "stringValue": class_id })),
                field_filter("studentId", "EQUAL", json!({ "stringValue": student_id })),
                field_filter(
                    "status",
                    "IN",
                    json!({
                        "arrayValue": {
                            "values": [
                                { "stringValue": "Absent" },
                                { "stringValue": "absent" },
                            ]
                        }
                    }),
                ),
            ]);
            let documents = self
                .client
                .run_query(structured_query("attendance", filter, None))
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;
            Ok(documents.len() as u32)
        })
    }

    /// Aggregates the class's records dated within one calendar day of the
    /// reference timezone, bucketing by normalized status.
    fn daily_summary(
        &self,
        class_id: &str,
        day: NaiveDate,
    ) -> BoxFuture<'_, DailySummary, Self::Error> {
        let class_id = class_id.to_string();
        Box::pin(async move {
            let start_local = day.and_hms_opt(0, 0, 0).expect("midnight is always valid");
            let start = match self.timezone.from_local_datetime(&start_local).earliest() {
                Some(start) => start.with_timezone(&Utc),
                None => Utc.from_utc_datetime(&start_local),
            };
            let end = start + chrono::Duration::days(1);

            let filter = composite_and(vec![
                field_filter("classId", "EQUAL", json!({ "stringValue": class_id.clone() })),
                field_filter("date", "GREATER_THAN_OR_EQUAL", timestamp_value(start)),
                field_filter("date", "LESS_THAN", timestamp_value(end)),
            ]);
            let documents = self
                .client
                .run_query(structured_query("attendance", filter, None))
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;

            let mut summary = DailySummary::default();
            for document in &documents {
                let status = document.get("status").and_then(Value::as_str);
                match normalize_status(status) {
                    Some(AttendanceStatus::Present) => summary.present += 1,
                    Some(AttendanceStatus::Absent) => summary.absent += 1,
                    Some(AttendanceStatus::Pending) => summary.pending += 1,
                    _ => summary.other += 1,
                }
            }
            debug!(class_id = %class_id, day = %day, ?summary, "computed daily summary");
            Ok(summary)
        })
    }
}
