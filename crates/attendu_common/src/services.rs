// --- File: crates/attendu_common/src/services.rs ---
//! Service abstractions for the attendance pipeline.
//!
//! This module provides trait definitions for the document-store operations
//! the pipeline depends on. The traits allow for dependency injection and
//! easier testing by decoupling the pipeline logic from the concrete store
//! client: every read the dispatcher performs (student, class, teacher,
//! absence count, daily summary) and every notification write goes through
//! one of these seams.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::models::{AttendanceRecord, ClassInfo, NotificationCreation, UserProfile};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A wrapper error type that implements std::error::Error for Box<dyn std::error::Error + Send + Sync>
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

/// Aggregate attendance counts for one class on one calendar day.
///
/// Statuses outside the three surfaced buckets land in `other` and are not
/// shown in the summary message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub present: u32,
    pub absent: u32,
    pub pending: u32,
    pub other: u32,
}

/// Result of a notification write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new notification document was created.
    Created(String),
    /// A document with the same dedupe key already existed; nothing written.
    Duplicate(String),
}

/// Read-side lookups the notification dispatcher depends on.
///
/// Lookup misses are `Ok(None)` (the dependent notification is skipped);
/// transport and store failures are errors and propagate.
pub trait AttendanceDirectory: Send + Sync {
    /// Error type returned by directory operations.
    type Error: StdError + Send + Sync + 'static;

    /// Point read of a student profile.
    fn fetch_student(&self, student_id: &str) -> BoxFuture<'_, Option<UserProfile>, Self::Error>;

    /// Point read of a class document.
    fn fetch_class(&self, class_id: &str) -> BoxFuture<'_, Option<ClassInfo>, Self::Error>;

    /// Point read of a teacher profile.
    fn fetch_teacher(&self, teacher_id: &str) -> BoxFuture<'_, Option<UserProfile>, Self::Error>;

    /// Count of historical absent records for a (class, student) pair,
    /// inclusive of any record just written.
    fn count_absences(
        &self,
        class_id: &str,
        student_id: &str,
    ) -> BoxFuture<'_, u32, Self::Error>;

    /// Aggregate counts for all attendance records of a class dated within
    /// one calendar day in the reference timezone.
    fn daily_summary(
        &self,
        class_id: &str,
        day: NaiveDate,
    ) -> BoxFuture<'_, DailySummary, Self::Error>;
}

/// Write side: persists notifications, enforcing dedupe-by-key.
///
/// Two `create` calls with the same dedupe key MUST NOT produce two
/// user-visible alerts; the second resolves to [`WriteOutcome::Duplicate`].
pub trait NotificationWriter: Send + Sync {
    /// Error type returned by writer operations.
    type Error: StdError + Send + Sync + 'static;

    fn create(
        &self,
        creation: NotificationCreation,
    ) -> BoxFuture<'_, WriteOutcome, Self::Error>;
}

/// Attendance-record mutations used by the finalize endpoint and the
/// overdue-pending sweep.
pub trait AttendanceRepository: Send + Sync {
    /// Error type returned by repository operations.
    type Error: StdError + Send + Sync + 'static;

    /// Point read of one attendance record.
    fn fetch_record(
        &self,
        record_id: &str,
    ) -> BoxFuture<'_, Option<AttendanceRecord>, Self::Error>;

    /// Converts a pending record into a terminal status: sets `status`,
    /// clears `isPending`/`proposedStatus`, stamps `finalizedAt`. Returns
    /// the post-write snapshot.
    fn apply_finalization(
        &self,
        before: &AttendanceRecord,
        final_status: &str,
        finalized_at: DateTime<Utc>,
    ) -> BoxFuture<'_, AttendanceRecord, Self::Error>;

    /// Records still pending whose scan is older than the cutoff.
    fn list_overdue_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<AttendanceRecord>, Self::Error>;
}
