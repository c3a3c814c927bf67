//! Notification dispatch pipeline.
//!
//! Invoked once per attendance-record write with `{before, after}`
//! snapshots, inspects the state transition and fans out zero or more
//! notifications to the affected student and teacher, plus a per-day class
//! summary. All store access goes through the injected
//! [`AttendanceDirectory`] / [`NotificationWriter`] seams.
//!
//! Every emitted notification carries a dedupe key that is a pure function
//! of the triggering event (kind, class, student, and record id / status /
//! calendar date / count). The hosting platform may redeliver a trigger;
//! redelivery must produce byte-identical keys, so wall-clock time never
//! participates in a key.

use std::sync::Arc;

use attendu_common::models::{
    AttendanceEvent, AttendanceRecord, BannerHint, ClassInfo, NotificationCreation,
    NotificationKind, Surface, ToastHint, Tone, UserProfile,
};
use attendu_common::services::{
    AttendanceDirectory, BoxedError, DailySummary, NotificationWriter,
};
use attendu_common::status::{effective_status, is_record_pending, AttendanceStatus};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Shared handle to the read-side lookups.
pub type SharedDirectory = Arc<dyn AttendanceDirectory<Error = BoxedError>>;
/// Shared handle to the notification writer.
pub type SharedWriter = Arc<dyn NotificationWriter<Error = BoxedError>>;

/// Errors that can occur while dispatching notifications for one event.
///
/// Both variants are retryable from the trigger host's point of view: a
/// failed dispatch propagates so the platform's redelivery policy applies,
/// and the dedupe keys make the redelivery safe.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A directory lookup failed (store or transport, not a miss).
    #[error("Directory lookup failed: {0}")]
    Directory(#[source] BoxedError),

    /// A notification write failed.
    #[error("Notification write failed: {0}")]
    Writer(#[source] BoxedError),
}

/// The server-side core: watches attendance transitions and emits
/// notifications.
pub struct NotificationDispatcher {
    directory: SharedDirectory,
    writer: SharedWriter,
    timezone: Tz,
    absence_alert_threshold: u32,
}

/// Everything the per-branch builders need about the event being processed.
struct EventContext<'a> {
    record: &'a AttendanceRecord,
    class_id: &'a str,
    student_id: &'a str,
    class: Option<&'a ClassInfo>,
    student: Option<&'a UserProfile>,
    class_name: &'a str,
    date_label: &'a str,
    date_key: NaiveDate,
}

impl EventContext<'_> {
    fn student_email(&self) -> Option<String> {
        self.student.and_then(|s| s.email.clone())
    }

    fn student_label(&self) -> String {
        match self.student {
            Some(student) => student.display_name(self.student_id),
            None => self.student_id.to_string(),
        }
    }

    fn student_href(&self) -> String {
        format!("/student/classes/{}", self.class_id)
    }

    fn teacher_href(&self) -> String {
        format!("/teacher/classes/{}", self.class_id)
    }
}

impl NotificationDispatcher {
    pub fn new(
        directory: SharedDirectory,
        writer: SharedWriter,
        timezone: Tz,
        absence_alert_threshold: u32,
    ) -> Self {
        Self {
            directory,
            writer,
            timezone,
            absence_alert_threshold,
        }
    }

    /// Processes one attendance write.
    ///
    /// `after` absent (a deletion) and records without both foreign keys
    /// are silent no-ops. Lookup misses skip only the notifications that
    /// depend on them; store failures propagate.
    pub async fn process(&self, event: &AttendanceEvent) -> Result<(), DispatchError> {
        let Some(after) = event.after.as_ref() else {
            return Ok(());
        };

        let status = effective_status(after);
        let was_pending = event.before.as_ref().is_some_and(is_record_pending);
        let now_pending = is_record_pending(after);

        let (Some(class_id), Some(student_id)) =
            (after.class_id.as_deref(), after.student_id.as_deref())
        else {
            debug!(record_id = %after.id, "attendance write without class/student, skipping");
            return Ok(());
        };

        let (student, class) = tokio::try_join!(
            self.directory.fetch_student(student_id),
            self.directory.fetch_class(class_id),
        )
        .map_err(DispatchError::Directory)?;

        let class_name = class
            .as_ref()
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| class_id.to_string());
        let record_date = resolve_record_date(after, self.timezone);
        let date_label = format_display_date(&record_date);
        let date_key = record_date.date_naive();

        let ctx = EventContext {
            record: after,
            class_id,
            student_id,
            class: class.as_ref(),
            student: student.as_ref(),
            class_name: &class_name,
            date_label: &date_label,
            date_key,
        };

        // A brand-new pending record notifies both parties and nothing else.
        if event.before.is_none() && now_pending {
            tokio::try_join!(
                self.write(student_pending_notification(&ctx)),
                self.send_teacher_pending_review(&ctx),
            )?;
            return Ok(());
        }

        if was_pending && !now_pending {
            if let Some(status) = status {
                self.write(pending_resolved_notification(&ctx, status))
                    .await?;
            }
        }

        let Some(status) = status else {
            return Ok(());
        };
        if status == AttendanceStatus::Pending {
            return Ok(());
        }

        self.write(attendance_result_notification(&ctx, status, self.timezone))
            .await?;

        if status == AttendanceStatus::Absent {
            let absence_count = self
                .directory
                .count_absences(class_id, student_id)
                .await
                .map_err(DispatchError::Directory)?;
            self.write(missed_class_notification(&ctx, absence_count))
                .await?;

            if absence_count == self.absence_alert_threshold {
                self.send_teacher_absence_alert(&ctx, absence_count).await?;
            }
        }

        self.send_class_summary(&ctx).await?;

        Ok(())
    }

    async fn write(&self, creation: NotificationCreation) -> Result<(), DispatchError> {
        self.writer
            .create(creation)
            .await
            .map(|_| ())
            .map_err(DispatchError::Writer)
    }

    /// Looks up the class's teacher; a missing teacher silently skips the
    /// alert without aborting the rest of the pipeline.
    async fn resolve_teacher(
        &self,
        ctx: &EventContext<'_>,
    ) -> Result<Option<UserProfile>, DispatchError> {
        let Some(teacher_id) = ctx.class.and_then(|c| c.teacher.as_deref()) else {
            debug!(class_id = %ctx.class_id, "class has no assigned teacher");
            return Ok(None);
        };
        let teacher = self
            .directory
            .fetch_teacher(teacher_id)
            .await
            .map_err(DispatchError::Directory)?;
        if teacher.is_none() {
            debug!(teacher_id = %teacher_id, "teacher profile not found, skipping alert");
        }
        Ok(teacher)
    }

    async fn send_teacher_pending_review(
        &self,
        ctx: &EventContext<'_>,
    ) -> Result<(), DispatchError> {
        let Some(teacher) = self.resolve_teacher(ctx).await? else {
            return Ok(());
        };
        let student_label = ctx.student_label();

        self.write(NotificationCreation {
            user_id: teacher.id.clone(),
            user_email: teacher.email.clone(),
            kind: NotificationKind::AttendancePendingReview,
            title: format!("Attendance pending review for {}", ctx.class_name),
            message: format!(
                "{} submitted a scan on {} that needs manual review.",
                student_label, ctx.date_label
            ),
            tone: Tone::Info,
            surfaces: vec![Surface::Inbox],
            payload: json!({
                "classId": ctx.class_id,
                "className": ctx.class_name,
                "studentId": ctx.student_id,
                "studentName": student_label,
            }),
            dedupe_key: format!(
                "pending-review-{}-{}-{}",
                ctx.class_id, ctx.student_id, ctx.date_key
            ),
            action_label: Some("Open review queue".to_string()),
            action_href: Some(ctx.teacher_href()),
            toast: None,
            banner: None,
        })
        .await
    }

    async fn send_teacher_absence_alert(
        &self,
        ctx: &EventContext<'_>,
        absence_count: u32,
    ) -> Result<(), DispatchError> {
        let Some(teacher) = self.resolve_teacher(ctx).await? else {
            return Ok(());
        };
        let student_label = ctx.student_label();

        self.write(NotificationCreation {
            user_id: teacher.id.clone(),
            user_email: teacher.email.clone(),
            kind: NotificationKind::AttendanceAbsenceThreshold,
            title: format!("{} reached {} absences", student_label, absence_count),
            message: format!(
                "{} has {} absences in {} as of {}.",
                student_label, absence_count, ctx.class_name, ctx.date_label
            ),
            tone: Tone::Warning,
            surfaces: vec![Surface::Inbox],
            payload: json!({
                "classId": ctx.class_id,
                "className": ctx.class_name,
                "studentId": ctx.student_id,
                "studentName": student_label,
                "absenceCount": absence_count,
            }),
            dedupe_key: format!(
                "absence-threshold-{}-{}-{}",
                ctx.class_id, ctx.student_id, absence_count
            ),
            action_label: Some("View attendance".to_string()),
            action_href: Some(ctx.teacher_href()),
            toast: None,
            banner: None,
        })
        .await
    }

    /// Recomputes the day's aggregate for the class and emits the teacher
    /// summary. Runs for every actionable status.
    async fn send_class_summary(&self, ctx: &EventContext<'_>) -> Result<(), DispatchError> {
        let Some(teacher) = self.resolve_teacher(ctx).await? else {
            return Ok(());
        };

        let counts: DailySummary = self
            .directory
            .daily_summary(ctx.class_id, ctx.date_key)
            .await
            .map_err(DispatchError::Directory)?;

        self.write(NotificationCreation {
            user_id: teacher.id.clone(),
            user_email: teacher.email.clone(),
            kind: NotificationKind::AttendanceSummary,
            title: format!("{} attendance summary", ctx.class_name),
            message: format!(
                "{}: {} present, {} absent, {} pending.",
                ctx.date_label, counts.present, counts.absent, counts.pending
            ),
            tone: Tone::Info,
            surfaces: vec![Surface::Inbox],
            payload: json!({
                "classId": ctx.class_id,
                "className": ctx.class_name,
                "date": ctx.date_key.to_string(),
                "counts": {
                    "present": counts.present,
                    "absent": counts.absent,
                    "pending": counts.pending,
                },
            }),
            dedupe_key: format!("attendance-summary-{}-{}", ctx.class_id, ctx.date_key),
            action_label: Some("Open class".to_string()),
            action_href: Some(ctx.teacher_href()),
            toast: None,
            banner: None,
        })
        .await
    }
}

fn student_pending_notification(ctx: &EventContext<'_>) -> NotificationCreation {
    NotificationCreation {
        user_id: ctx.student_id.to_string(),
        user_email: ctx.student_email(),
        kind: NotificationKind::AttendancePending,
        title: format!("{} attendance pending", ctx.class_name),
        message: "We need a quick manual review. You'll be notified when it's resolved."
            .to_string(),
        tone: Tone::Info,
        surfaces: vec![Surface::Toast, Surface::Inbox],
        payload: json!({
            "classId": ctx.class_id,
            "className": ctx.class_name,
            "attendanceId": ctx.record.id.clone(),
            "status": "pending",
            "reviewDueAt": ctx.record.pending_recheck_at.map(|at| at.to_rfc3339()),
        }),
        dedupe_key: format!(
            "pending-scan-{}-{}-{}",
            ctx.class_id, ctx.student_id, ctx.date_key
        ),
        action_label: Some("View status".to_string()),
        action_href: Some(ctx.student_href()),
        toast: Some(ToastHint {
            auto_dismiss: false,
            duration: 12_000,
        }),
        banner: None,
    }
}

fn pending_resolved_notification(
    ctx: &EventContext<'_>,
    status: AttendanceStatus,
) -> NotificationCreation {
    let is_absent = status == AttendanceStatus::Absent;
    NotificationCreation {
        user_id: ctx.student_id.to_string(),
        user_email: ctx.student_email(),
        kind: NotificationKind::AttendancePendingResolved,
        title: "Attendance review completed".to_string(),
        message: format!(
            "Your {} attendance on {} is now {}.",
            ctx.class_name,
            ctx.date_label,
            status.label()
        ),
        tone: if is_absent { Tone::Warning } else { Tone::Success },
        surfaces: if is_absent {
            vec![Surface::Banner, Surface::Inbox]
        } else {
            vec![Surface::Toast, Surface::Inbox]
        },
        payload: json!({
            "classId": ctx.class_id,
            "className": ctx.class_name,
            "attendanceId": ctx.record.id.clone(),
            "status": status.label(),
        }),
        dedupe_key: format!("pending-resolved-{}-{}", ctx.record.id, status),
        action_label: Some("View attendance".to_string()),
        action_href: Some(ctx.student_href()),
        toast: if is_absent {
            None
        } else {
            Some(ToastHint {
                auto_dismiss: false,
                duration: 10_000,
            })
        },
        banner: if is_absent {
            Some(BannerHint { persistent: true })
        } else {
            None
        },
    }
}

fn attendance_result_notification(
    ctx: &EventContext<'_>,
    status: AttendanceStatus,
    timezone: Tz,
) -> NotificationCreation {
    let is_absent = status == AttendanceStatus::Absent;
    NotificationCreation {
        user_id: ctx.student_id.to_string(),
        user_email: ctx.student_email(),
        kind: NotificationKind::AttendanceResult,
        title: format!("{} attendance recorded", ctx.class_name),
        message: format!(
            "Your attendance for {} is marked {}.",
            ctx.date_label,
            status.label()
        ),
        tone: if is_absent { Tone::Warning } else { Tone::Success },
        surfaces: if is_absent {
            vec![Surface::Banner, Surface::Inbox]
        } else {
            vec![Surface::Toast, Surface::Inbox]
        },
        payload: json!({
            "classId": ctx.class_id,
            "className": ctx.class_name,
            "attendanceId": ctx.record.id.clone(),
            "status": status.label(),
            "recordedAt": Utc::now().with_timezone(&timezone).to_rfc3339(),
        }),
        dedupe_key: format!("attendance-result-{}-{}", ctx.record.id, status),
        action_label: Some("View details".to_string()),
        action_href: Some(ctx.student_href()),
        toast: if is_absent {
            None
        } else {
            Some(ToastHint {
                auto_dismiss: true,
                duration: 8_000,
            })
        },
        banner: if is_absent {
            Some(BannerHint { persistent: true })
        } else {
            None
        },
    }
}

fn missed_class_notification(ctx: &EventContext<'_>, absence_count: u32) -> NotificationCreation {
    NotificationCreation {
        user_id: ctx.student_id.to_string(),
        user_email: ctx.student_email(),
        kind: NotificationKind::AttendanceMissedClass,
        title: format!("You missed {}", ctx.class_name),
        message: format!(
            "We did not record you in class on {}. This is absence #{}.",
            ctx.date_label, absence_count
        ),
        tone: Tone::Warning,
        surfaces: vec![Surface::Inbox],
        payload: json!({
            "classId": ctx.class_id,
            "className": ctx.class_name,
            "attendanceId": ctx.record.id.clone(),
            "absenceCount": absence_count,
        }),
        dedupe_key: format!(
            "absent-alert-{}-{}-{}",
            ctx.class_id, ctx.student_id, ctx.date_key
        ),
        action_label: Some("Review attendance".to_string()),
        action_href: Some(ctx.student_href()),
        toast: None,
        banner: None,
    }
}

/// The instant a record applies to, in the reference timezone. Records
/// without a date count as "now".
fn resolve_record_date(record: &AttendanceRecord, timezone: Tz) -> DateTime<Tz> {
    record
        .date
        .unwrap_or_else(Utc::now)
        .with_timezone(&timezone)
}

/// Human-readable date for message text, e.g. "Feb 3, 2026".
fn format_display_date(date: &DateTime<Tz>) -> String {
    date.format("%b %-d, %Y").to_string()
}
