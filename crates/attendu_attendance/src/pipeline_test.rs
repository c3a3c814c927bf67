#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use attendu_common::models::{
        AttendanceEvent, AttendanceRecord, ClassInfo, NotificationCreation, NotificationKind,
        Surface, Tone, UserProfile,
    };
    use attendu_common::services::{
        AttendanceDirectory, BoxFuture, BoxedError, DailySummary, NotificationWriter,
        WriteOutcome,
    };
    use chrono::{TimeZone, Utc};

    use crate::pipeline::NotificationDispatcher;

    #[derive(Clone)]
    struct MockDirectory {
        student: Option<UserProfile>,
        class: Option<ClassInfo>,
        teacher: Option<UserProfile>,
        absence_count: u32,
        summary: DailySummary,
    }

    impl Default for MockDirectory {
        fn default() -> Self {
            Self {
                student: Some(UserProfile {
                    id: "stu-1".into(),
                    email: Some("dana@example.edu".into()),
                    fname: Some("Dana".into()),
                    lname: Some("Whitley".into()),
                }),
                class: Some(ClassInfo {
                    id: "cls-1".into(),
                    name: Some("CS 4550".into()),
                    teacher: Some("teach-1".into()),
                }),
                teacher: Some(UserProfile {
                    id: "teach-1".into(),
                    email: Some("rivera@example.edu".into()),
                    fname: Some("Riley".into()),
                    lname: Some("Rivera".into()),
                }),
                absence_count: 1,
                summary: DailySummary::default(),
            }
        }
    }

    impl AttendanceDirectory for MockDirectory {
        type Error = BoxedError;

        fn fetch_student(&self, _: &str) -> BoxFuture<'_, Option<UserProfile>, Self::Error> {
            let student = self.student.clone();
            Box::pin(async move { Ok(student) })
        }

        fn fetch_class(&self, _: &str) -> BoxFuture<'_, Option<ClassInfo>, Self::Error> {
            let class = self.class.clone();
            Box::pin(async move { Ok(class) })
        }

        fn fetch_teacher(&self, _: &str) -> BoxFuture<'_, Option<UserProfile>, Self::Error> {
            let teacher = self.teacher.clone();
            Box::pin(async move { Ok(teacher) })
        }

        fn count_absences(&self, _: &str, _: &str) -> BoxFuture<'_, u32, Self::Error> {
            let count = self.absence_count;
            Box::pin(async move { Ok(count) })
        }

        fn daily_summary(
            &self,
            _: &str,
            _: chrono::NaiveDate,
        ) -> BoxFuture<'_, DailySummary, Self::Error> {
            let summary = self.summary;
            Box::pin(async move { Ok(summary) })
        }
    }

    /// Records every attempted creation and enforces dedupe-by-key the way
    /// the real writer does.
    #[derive(Default)]
    struct RecordingWriter {
        attempts: Mutex<Vec<NotificationCreation>>,
        created: Mutex<Vec<NotificationCreation>>,
        seen_keys: Mutex<HashSet<String>>,
    }

    impl RecordingWriter {
        fn created_kinds(&self) -> Vec<NotificationKind> {
            self.created.lock().unwrap().iter().map(|c| c.kind).collect()
        }

        fn created_of(&self, kind: NotificationKind) -> Vec<NotificationCreation> {
            self.created
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.kind == kind)
                .cloned()
                .collect()
        }
    }

    impl NotificationWriter for RecordingWriter {
        type Error = BoxedError;

        fn create(
            &self,
            creation: NotificationCreation,
        ) -> BoxFuture<'_, WriteOutcome, Self::Error> {
            Box::pin(async move {
                self.attempts.lock().unwrap().push(creation.clone());
                let mut seen = self.seen_keys.lock().unwrap();
                if !seen.insert(creation.dedupe_key.clone()) {
                    return Ok(WriteOutcome::Duplicate(creation.dedupe_key.clone()));
                }
                let id = format!("notif-{}", seen.len());
                self.created.lock().unwrap().push(creation);
                Ok(WriteOutcome::Created(id))
            })
        }
    }

    fn dispatcher(
        directory: MockDirectory,
        writer: Arc<RecordingWriter>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::new(directory),
            writer,
            chrono_tz::America::Chicago,
            5,
        )
    }

    fn base_record() -> AttendanceRecord {
        AttendanceRecord {
            id: "att-1".into(),
            class_id: Some("cls-1".into()),
            student_id: Some("stu-1".into()),
            date: Some(Utc.with_ymd_and_hms(2026, 2, 3, 15, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    fn pending_record() -> AttendanceRecord {
        AttendanceRecord {
            status: Some("Pending".into()),
            is_pending: Some(true),
            ..base_record()
        }
    }

    fn resolved_record(status: &str) -> AttendanceRecord {
        AttendanceRecord {
            status: Some(status.into()),
            is_pending: Some(false),
            ..base_record()
        }
    }

    #[tokio::test]
    async fn new_pending_record_notifies_student_and_teacher() {
        let writer = Arc::new(RecordingWriter::default());
        let dispatcher = dispatcher(MockDirectory::default(), writer.clone());

        let event = AttendanceEvent {
            before: None,
            after: Some(pending_record()),
        };
        dispatcher.process(&event).await.unwrap();

        let mut kinds = writer.created_kinds();
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(
            kinds,
            vec![
                NotificationKind::AttendancePending,
                NotificationKind::AttendancePendingReview,
            ]
        );

        let student = &writer.created_of(NotificationKind::AttendancePending)[0];
        assert_eq!(student.user_id, "stu-1");
        assert_eq!(student.surfaces, vec![Surface::Toast, Surface::Inbox]);
        assert_eq!(student.dedupe_key, "pending-scan-cls-1-stu-1-2026-02-03");
        assert!(!student.toast.as_ref().unwrap().auto_dismiss);

        let teacher = &writer.created_of(NotificationKind::AttendancePendingReview)[0];
        assert_eq!(teacher.user_id, "teach-1");
        assert!(teacher.message.contains("Dana Whitley"));
        assert!(teacher.message.contains("Feb 3, 2026"));
    }

    #[tokio::test]
    async fn new_pending_without_teacher_only_notifies_student() {
        let writer = Arc::new(RecordingWriter::default());
        let directory = MockDirectory {
            teacher: None,
            ..MockDirectory::default()
        };
        let dispatcher = dispatcher(directory, writer.clone());

        let event = AttendanceEvent {
            before: None,
            after: Some(pending_record()),
        };
        dispatcher.process(&event).await.unwrap();

        assert_eq!(writer.created_kinds(), vec![NotificationKind::AttendancePending]);
    }

    #[tokio::test]
    async fn pending_resolution_to_present_is_a_success_toast() {
        let writer = Arc::new(RecordingWriter::default());
        let dispatcher = dispatcher(MockDirectory::default(), writer.clone());

        let event = AttendanceEvent {
            before: Some(pending_record()),
            after: Some(resolved_record("Present")),
        };
        dispatcher.process(&event).await.unwrap();

        let resolved = writer.created_of(NotificationKind::AttendancePendingResolved);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].tone, Tone::Success);
        assert_eq!(resolved[0].surfaces, vec![Surface::Toast, Surface::Inbox]);
        assert!(resolved[0].banner.is_none());
        assert!(resolved[0].message.contains("now Present"));
    }

    #[tokio::test]
    async fn pending_resolution_to_absent_is_a_persistent_banner() {
        let writer = Arc::new(RecordingWriter::default());
        let dispatcher = dispatcher(MockDirectory::default(), writer.clone());

        let event = AttendanceEvent {
            before: Some(pending_record()),
            after: Some(resolved_record("Absent")),
        };
        dispatcher.process(&event).await.unwrap();

        let resolved = writer.created_of(NotificationKind::AttendancePendingResolved);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].tone, Tone::Warning);
        assert_eq!(resolved[0].surfaces, vec![Surface::Banner, Surface::Inbox]);
        assert!(resolved[0].banner.as_ref().unwrap().persistent);
        assert!(resolved[0].toast.is_none());
    }

    #[tokio::test]
    async fn unrecognized_resolution_status_emits_nothing() {
        let writer = Arc::new(RecordingWriter::default());
        let dispatcher = dispatcher(MockDirectory::default(), writer.clone());

        let event = AttendanceEvent {
            before: Some(pending_record()),
            after: Some(resolved_record("Rejected")),
        };
        dispatcher.process(&event).await.unwrap();

        assert!(writer.created_kinds().is_empty());
    }

    #[tokio::test]
    async fn absent_write_reports_running_count() {
        let writer = Arc::new(RecordingWriter::default());
        let directory = MockDirectory {
            absence_count: 3,
            ..MockDirectory::default()
        };
        let dispatcher = dispatcher(directory, writer.clone());

        let event = AttendanceEvent {
            before: Some(resolved_record("Present")),
            after: Some(resolved_record("Absent")),
        };
        dispatcher.process(&event).await.unwrap();

        let missed = writer.created_of(NotificationKind::AttendanceMissedClass);
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].payload["absenceCount"], 3);
        assert!(missed[0].message.contains("absence #3"));

        // Threshold alert only fires at exactly the configured count
        assert!(writer
            .created_of(NotificationKind::AttendanceAbsenceThreshold)
            .is_empty());
    }

    #[tokio::test]
    async fn absence_threshold_fires_only_at_exact_count() {
        for (count, expected) in [(4u32, 0usize), (5, 1), (6, 0)] {
            let writer = Arc::new(RecordingWriter::default());
            let directory = MockDirectory {
                absence_count: count,
                ..MockDirectory::default()
            };
            let dispatcher = dispatcher(directory, writer.clone());

            let event = AttendanceEvent {
                before: Some(resolved_record("Present")),
                after: Some(resolved_record("Absent")),
            };
            dispatcher.process(&event).await.unwrap();

            let alerts = writer.created_of(NotificationKind::AttendanceAbsenceThreshold);
            assert_eq!(alerts.len(), expected, "count {}", count);
            if expected == 1 {
                assert_eq!(alerts[0].user_id, "teach-1");
                assert_eq!(alerts[0].dedupe_key, "absence-threshold-cls-1-stu-1-5");
                assert_eq!(alerts[0].payload["absenceCount"], 5);
            }
        }
    }

    #[tokio::test]
    async fn daily_summary_reports_the_days_counts() {
        let writer = Arc::new(RecordingWriter::default());
        let directory = MockDirectory {
            summary: DailySummary {
                present: 2,
                absent: 1,
                pending: 1,
                other: 0,
            },
            ..MockDirectory::default()
        };
        let dispatcher = dispatcher(directory, writer.clone());

        let event = AttendanceEvent {
            before: Some(resolved_record("Present")),
            after: Some(resolved_record("Present")),
        };
        dispatcher.process(&event).await.unwrap();

        let summary = writer.created_of(NotificationKind::AttendanceSummary);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].user_id, "teach-1");
        assert_eq!(
            summary[0].message,
            "Feb 3, 2026: 2 present, 1 absent, 1 pending."
        );
        assert_eq!(
            summary[0].payload["counts"],
            serde_json::json!({ "present": 2, "absent": 1, "pending": 1 })
        );
        assert_eq!(summary[0].dedupe_key, "attendance-summary-cls-1-2026-02-03");
    }

    #[tokio::test]
    async fn redelivered_trigger_produces_identical_dedupe_keys() {
        let writer = Arc::new(RecordingWriter::default());
        let directory = MockDirectory {
            absence_count: 5,
            ..MockDirectory::default()
        };
        let dispatcher = dispatcher(directory, writer.clone());

        // An absent write exercises every student- and teacher-facing branch
        let event = AttendanceEvent {
            before: Some(resolved_record("Present")),
            after: Some(resolved_record("Absent")),
        };
        dispatcher.process(&event).await.unwrap();
        let first_created = writer.created.lock().unwrap().len();

        dispatcher.process(&event).await.unwrap();

        // Redelivery attempted the same notifications with identical keys...
        let attempts = writer.attempts.lock().unwrap();
        let mut keys_by_kind: HashMap<NotificationKind, HashSet<String>> = HashMap::new();
        for attempt in attempts.iter() {
            keys_by_kind
                .entry(attempt.kind)
                .or_default()
                .insert(attempt.dedupe_key.clone());
        }
        for (kind, keys) in &keys_by_kind {
            assert_eq!(keys.len(), 1, "{:?} produced divergent keys", kind);
        }
        drop(attempts);

        // ...and the enforcing writer created nothing new.
        assert_eq!(writer.created.lock().unwrap().len(), first_created);
    }

    #[tokio::test]
    async fn missing_identifiers_are_a_silent_no_op() {
        let writer = Arc::new(RecordingWriter::default());
        let dispatcher = dispatcher(MockDirectory::default(), writer.clone());

        let event = AttendanceEvent {
            before: None,
            after: Some(AttendanceRecord {
                class_id: None,
                ..pending_record()
            }),
        };
        dispatcher.process(&event).await.unwrap();
        assert!(writer.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deletion_is_a_no_op() {
        let writer = Arc::new(RecordingWriter::default());
        let dispatcher = dispatcher(MockDirectory::default(), writer.clone());

        let event = AttendanceEvent {
            before: Some(resolved_record("Present")),
            after: None,
        };
        dispatcher.process(&event).await.unwrap();
        assert!(writer.attempts.lock().unwrap().is_empty());
    }
}
