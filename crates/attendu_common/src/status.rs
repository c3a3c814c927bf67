// --- File: crates/attendu_common/src/status.rs ---
//! Attendance status normalization.
//!
//! Status strings arrive from several producers with inconsistent casing
//! and wording ("Present", "present (remote)", "Absent", ...). Everything
//! that branches on a status goes through [`normalize_status`] first; the
//! synonym table below is the single source of truth. Unrecognized or empty
//! values normalize to `None` and never drive a notification.

use crate::models::AttendanceRecord;

/// A recognized attendance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
    Pending,
}

impl AttendanceStatus {
    /// Lowercase canonical form, e.g. `"present"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
            AttendanceStatus::Pending => "pending",
        }
    }

    /// Capitalized form for user-facing messages, e.g. `"Present"`.
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Excused => "Excused",
            AttendanceStatus::Pending => "Pending",
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes a raw status string.
///
/// Trims, lowercases, and maps recognized synonyms; anything else
/// (including empty input) is `None`.
pub fn normalize_status(raw: Option<&str>) -> Option<AttendanceStatus> {
    let lowered = raw?.trim().to_lowercase();
    match lowered.as_str() {
        "present" | "present (remote)" | "present(remote)" | "p" | "here" | "attended" => {
            Some(AttendanceStatus::Present)
        }
        "absent" | "a" | "missed" | "no show" | "no-show" => Some(AttendanceStatus::Absent),
        "late" | "tardy" => Some(AttendanceStatus::Late),
        "excused" | "excused absence" => Some(AttendanceStatus::Excused),
        "pending" | "pending review" | "in review" | "needs review" => {
            Some(AttendanceStatus::Pending)
        }
        _ => None,
    }
}

/// The status used for branching: `status`, falling back to
/// `proposedStatus` when `status` does not normalize.
pub fn effective_status(record: &AttendanceRecord) -> Option<AttendanceStatus> {
    normalize_status(record.status.as_deref())
        .or_else(|| normalize_status(record.proposed_status.as_deref()))
}

/// Whether a record is awaiting resolution.
///
/// Deliberately an OR: some producers set only the status string, others
/// only the flag.
pub fn is_record_pending(record: &AttendanceRecord) -> bool {
    normalize_status(record.status.as_deref()) == Some(AttendanceStatus::Pending)
        || record.is_pending == Some(true)
}
