// --- File: crates/attendu_common/src/models.rs ---
//! Shared wire models for the attendance pipeline.
//!
//! These types mirror the documents stored in the document database
//! (`attendance`, `users`, `classes`, `notifications`) and the trigger
//! payload delivered on every attendance write. Field names follow the
//! stored camelCase shape; historical spellings (`classID`, `studentID`)
//! are accepted as explicit serde aliases, first match wins.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One attendance document, as read from the store or a trigger snapshot.
///
/// Everything except `id` is optional on the wire: records are written by
/// several producers (check-in client, classifier backend, teacher edits)
/// and not all of them fill every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub id: String,

    /// Class foreign key. `classID` is the legacy spelling.
    #[serde(rename = "classId", alias = "classID", default)]
    pub class_id: Option<String>,

    /// Student foreign key. `studentID` is the legacy spelling.
    #[serde(rename = "studentId", alias = "studentID", default)]
    pub student_id: Option<String>,

    /// Raw status string; normalized before any branching.
    #[serde(default)]
    pub status: Option<String>,

    /// Tentative status used while `status` is not yet authoritative.
    #[serde(default)]
    pub proposed_status: Option<String>,

    /// Pending flag; may disagree with `status`. A record counts as pending
    /// when EITHER this is true OR the normalized status is pending.
    #[serde(default)]
    pub is_pending: Option<bool>,

    /// When the attendance applies. Absence means "now".
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub date: Option<DateTime<Utc>>,

    /// Deadline surfaced to the student while a manual review is pending.
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub pending_recheck_at: Option<DateTime<Utc>>,

    /// When the originating scan was taken; drives the overdue-pending sweep.
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub scan_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Trigger payload: `{before, after}` snapshots of one attendance write.
///
/// `before` absent means a creation, `after` absent a deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttendanceEvent {
    #[serde(default)]
    pub before: Option<AttendanceRecord>,
    #[serde(default)]
    pub after: Option<AttendanceRecord>,
}

/// Minimal class document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Assigned teacher's user id.
    #[serde(default)]
    pub teacher: Option<String>,
}

impl ClassInfo {
    /// Display name for messages, falling back to the class id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }
}

/// Minimal user document, used for both students and teachers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fname: Option<String>,
    #[serde(default)]
    pub lname: Option<String>,
}

impl UserProfile {
    /// "First Last" when a first name is present, otherwise the fallback id.
    pub fn display_name(&self, fallback: &str) -> String {
        match self.fname.as_deref().filter(|f| !f.is_empty()) {
            Some(fname) => match self.lname.as_deref() {
                Some(lname) => format!("{} {}", fname, lname).trim().to_string(),
                None => fname.to_string(),
            },
            None => fallback.to_string(),
        }
    }
}

/// Visual tone of a notification; drives styling only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

/// Delivery surface a notification appears on. A notification may target
/// several surfaces at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Toast,
    Inbox,
    Banner,
}

/// Semantic event tag carried in the notification `type` field. Used for
/// analytics and debugging, never for delivery routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum NotificationKind {
    #[serde(rename = "attendance-pending")]
    AttendancePending,
    #[serde(rename = "attendance-pending-review")]
    AttendancePendingReview,
    #[serde(rename = "attendance-pending-resolved")]
    AttendancePendingResolved,
    #[serde(rename = "attendance-result")]
    AttendanceResult,
    #[serde(rename = "attendance-missed-class")]
    AttendanceMissedClass,
    #[serde(rename = "attendance-absence-threshold")]
    AttendanceAbsenceThreshold,
    #[serde(rename = "attendance-summary")]
    AttendanceSummary,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AttendancePending => "attendance-pending",
            NotificationKind::AttendancePendingReview => "attendance-pending-review",
            NotificationKind::AttendancePendingResolved => "attendance-pending-resolved",
            NotificationKind::AttendanceResult => "attendance-result",
            NotificationKind::AttendanceMissedClass => "attendance-missed-class",
            NotificationKind::AttendanceAbsenceThreshold => "attendance-absence-threshold",
            NotificationKind::AttendanceSummary => "attendance-summary",
        }
    }
}

/// Per-toast display hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ToastHint {
    pub auto_dismiss: bool,
    /// Display duration in milliseconds.
    pub duration: u64,
}

/// Per-banner display hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BannerHint {
    pub persistent: bool,
}

/// Command object consumed by the notification writer.
///
/// Not persisted verbatim; the writer maps it to a [`NotificationDocument`]
/// adding the computed `targets` array, `read` flag and creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NotificationCreation {
    pub user_id: String,
    pub user_email: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub tone: Tone,
    pub surfaces: Vec<Surface>,
    /// Free-form structured data for the action link / rendering.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Deterministic key: redelivery of the same underlying trigger MUST
    /// produce a byte-identical key. The writer enforces at-most-one
    /// user-visible alert per key.
    pub dedupe_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toast: Option<ToastHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<BannerHint>,
}

impl NotificationCreation {
    /// Delivery targets: user id and email, deduplicated, order-preserving.
    /// The delivery surface subscribes by either identifier.
    pub fn targets(&self) -> Vec<String> {
        let mut targets = vec![self.user_id.clone()];
        if let Some(email) = self.user_email.as_deref().filter(|e| !e.is_empty()) {
            if email != self.user_id {
                targets.push(email.to_string());
            }
        }
        targets
    }
}

/// The persisted notification document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDocument {
    #[serde(flatten)]
    pub creation: NotificationCreation,
    pub targets: Vec<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationDocument {
    pub fn from_creation(creation: NotificationCreation, created_at: DateTime<Utc>) -> Self {
        let targets = creation.targets();
        Self {
            creation,
            targets,
            read: false,
            created_at,
        }
    }
}

/// Deserializes a timestamp that may arrive as an RFC 3339 string, epoch
/// milliseconds, a `{seconds, nanos}` map, or nothing at all.
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(raw) = raw else { return Ok(None) };
    Ok(parse_timestamp_value(&raw))
}

fn parse_timestamp_value(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => {
            let millis = n.as_i64()?;
            Utc.timestamp_millis_opt(millis).single()
        }
        serde_json::Value::Object(map) => {
            let seconds = map.get("seconds").and_then(|v| v.as_i64())?;
            let nanos = map.get("nanos").and_then(|v| v.as_i64()).unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos as u32).single()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accepts_legacy_field_spellings() {
        let record: AttendanceRecord = serde_json::from_value(serde_json::json!({
            "id": "rec-1",
            "classID": "cls-1",
            "studentID": "stu-1",
            "status": "Present",
        }))
        .unwrap();
        assert_eq!(record.class_id.as_deref(), Some("cls-1"));
        assert_eq!(record.student_id.as_deref(), Some("stu-1"));
    }

    #[test]
    fn record_parses_timestamp_shapes() {
        let record: AttendanceRecord = serde_json::from_value(serde_json::json!({
            "id": "rec-2",
            "date": "2026-02-03T15:00:00Z",
            "scanTimestamp": 1_767_452_400_000i64,
            "pendingRecheckAt": {"seconds": 1_767_452_460, "nanos": 0},
        }))
        .unwrap();
        assert!(record.date.is_some());
        assert!(record.scan_timestamp.is_some());
        assert!(record.pending_recheck_at.is_some());
    }

    #[test]
    fn targets_merge_id_and_email_without_duplicates() {
        let creation = NotificationCreation {
            user_id: "user-1".into(),
            user_email: Some("user@example.edu".into()),
            kind: NotificationKind::AttendanceResult,
            title: "t".into(),
            message: "m".into(),
            tone: Tone::Success,
            surfaces: vec![Surface::Toast, Surface::Inbox],
            payload: serde_json::Value::Null,
            dedupe_key: "k".into(),
            action_label: None,
            action_href: None,
            toast: None,
            banner: None,
        };
        assert_eq!(creation.targets(), vec!["user-1", "user@example.edu"]);

        let mut same = creation.clone();
        same.user_email = Some("user-1".into());
        assert_eq!(same.targets(), vec!["user-1"]);
    }

    #[test]
    fn notification_kind_round_trips_through_type_tag() {
        let json = serde_json::to_value(NotificationKind::AttendanceMissedClass).unwrap();
        assert_eq!(json, serde_json::json!("attendance-missed-class"));
    }
}
