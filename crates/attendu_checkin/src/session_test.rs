#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use attendu_common::models::Tone;
    use attendu_common::services::BoxFuture;
    use attendu_config::CheckinConfig;
    use tokio::time::advance;

    use crate::camera::{CameraError, CameraSource, CapturedFrame};
    use crate::client::{CheckInError, FinalizeOutcome, RecognitionClient, ScanOutcome};
    use crate::session::{CheckInSession, CheckInState};

    struct MockCamera {
        active: AtomicBool,
    }

    impl MockCamera {
        fn new() -> Self {
            Self {
                active: AtomicBool::new(false),
            }
        }
    }

    impl CameraSource for MockCamera {
        fn start(&self) -> BoxFuture<'_, (), CameraError> {
            Box::pin(async move {
                self.active.store(true, Ordering::SeqCst);
                Ok(())
            })
        }

        fn stop(&self) {
            self.active.store(false, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn capture_frame(&self) -> BoxFuture<'_, CapturedFrame, CameraError> {
            Box::pin(async move {
                if !self.is_active() {
                    return Err(CameraError::Inactive);
                }
                Ok(CapturedFrame {
                    jpeg: vec![0xFF, 0xD8],
                    width: 640,
                    height: 480,
                })
            })
        }
    }

    struct ScriptedClient {
        scan_outcome: ScanOutcome,
        finalize_outcome: FinalizeOutcome,
        finalize_fails: bool,
        classify_calls: AtomicUsize,
        finalize_calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn pending(finalize_outcome: FinalizeOutcome) -> Self {
            Self {
                scan_outcome: ScanOutcome::Pending {
                    record_id: Some("rec-1".to_string()),
                },
                finalize_outcome,
                finalize_fails: false,
                classify_calls: AtomicUsize::new(0),
                finalize_calls: AtomicUsize::new(0),
            }
        }

        fn with_scan(scan_outcome: ScanOutcome) -> Self {
            Self {
                scan_outcome,
                finalize_outcome: FinalizeOutcome::Finalized,
                finalize_fails: false,
                classify_calls: AtomicUsize::new(0),
                finalize_calls: AtomicUsize::new(0),
            }
        }
    }

    impl RecognitionClient for ScriptedClient {
        fn classify(
            &self,
            _frame: &CapturedFrame,
            _class_id: &str,
            _student_id: &str,
        ) -> BoxFuture<'_, ScanOutcome, CheckInError> {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.scan_outcome.clone();
            Box::pin(async move { Ok(outcome) })
        }

        fn finalize(&self, _record_id: &str) -> BoxFuture<'_, FinalizeOutcome, CheckInError> {
            self.finalize_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.finalize_outcome.clone();
            let fails = self.finalize_fails;
            Box::pin(async move {
                if fails {
                    return Err(CheckInError::Transport("connection reset".to_string()));
                }
                Ok(outcome)
            })
        }
    }

    fn config() -> CheckinConfig {
        CheckinConfig {
            pending_verification_minutes: 1,
            redirect_delay_secs: 2,
        }
    }

    fn session(client: Arc<ScriptedClient>) -> (CheckInSession, Arc<MockCamera>) {
        let camera = Arc::new(MockCamera::new());
        let session = CheckInSession::new(client, camera.clone(), &config(), "cls-1", "stu-1");
        (session, camera)
    }

    /// Lets spawned timer tasks run without parking the runtime (parking
    /// would auto-advance the paused clock).
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn enter_pending(session: &CheckInSession) {
        session.start().await.unwrap();
        session.set_consent(true);
        let outcome = session.capture().await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Pending { record_id: Some(_) }));
        assert_eq!(session.state(), CheckInState::Pending);
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_fires_exactly_once_at_the_full_duration() {
        let client = Arc::new(ScriptedClient::pending(FinalizeOutcome::Finalized));
        let (session, camera) = session(client.clone());

        enter_pending(&session).await;
        assert!(!camera.is_active(), "stream stops while pending");

        advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 0);

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), CheckInState::Finalized);

        // Never more than once, no matter how long the session lingers
        advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_down_for_display() {
        let client = Arc::new(ScriptedClient::pending(FinalizeOutcome::Finalized));
        let (session, _camera) = session(client);

        enter_pending(&session).await;
        let countdown = session.watch_countdown();
        assert_eq!(*countdown.borrow(), Some(60));

        for _ in 0..5 {
            advance(Duration::from_secs(1)).await;
            settle().await;
        }
        assert_eq!(*countdown.borrow(), Some(55));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_pending_cancels_the_finalization() {
        let client = Arc::new(ScriptedClient::pending(FinalizeOutcome::Finalized));
        let (session, camera) = session(client.clone());

        enter_pending(&session).await;
        advance(Duration::from_secs(30)).await;
        settle().await;

        session.shutdown();
        assert!(!camera.is_active());
        assert_eq!(*session.watch_countdown().borrow(), None);

        advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_session_cancels_the_finalization() {
        let client = Arc::new(ScriptedClient::pending(FinalizeOutcome::Finalized));
        let (session, _camera) = session(client.clone());

        enter_pending(&session).await;
        drop(session);

        advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_without_record_id_is_fatal_for_the_scan() {
        let client = Arc::new(ScriptedClient::with_scan(ScanOutcome::Pending {
            record_id: None,
        }));
        let (session, _camera) = session(client.clone());

        session.start().await.unwrap();
        session.set_consent(true);
        let result = session.capture().await;
        assert!(matches!(result, Err(CheckInError::MissingPendingRecordId)));
        assert_eq!(session.state(), CheckInState::Idle);

        let alert = session.watch_alerts().borrow().clone().unwrap();
        assert_eq!(alert.tone, Tone::Error);

        // No finalization can ever be scheduled
        advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_finalization_restarts_the_stream_for_retry() {
        let client = Arc::new(ScriptedClient::pending(FinalizeOutcome::Rejected {
            message: Some("Follow-up request must originate from campus".to_string()),
        }));
        let (session, camera) = session(client.clone());

        enter_pending(&session).await;
        advance(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), CheckInState::Rejected);
        assert!(camera.is_active(), "stream restarts so the user can retry");

        let alert = session.watch_alerts().borrow().clone().unwrap();
        assert_eq!(alert.tone, Tone::Warning);
        assert!(alert.message.contains("try again"));

        // A fresh capture starts a fresh countdown
        let outcome = session.capture().await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Pending { .. }));
        settle().await;
        advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(client.finalize_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_during_finalization_surfaces_and_restarts() {
        let mut scripted = ScriptedClient::pending(FinalizeOutcome::Finalized);
        scripted.finalize_fails = true;
        let client = Arc::new(scripted);
        let (session, camera) = session(client.clone());

        enter_pending(&session).await;
        advance(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(session.state(), CheckInState::Rejected);
        assert!(camera.is_active());
        let alert = session.watch_alerts().borrow().clone().unwrap();
        assert_eq!(alert.tone, Tone::Error);
        assert!(alert.message.contains("lost connection"));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_requires_consent() {
        let client = Arc::new(ScriptedClient::pending(FinalizeOutcome::Finalized));
        let (session, _camera) = session(client.clone());

        session.start().await.unwrap();
        let result = session.capture().await;
        assert!(matches!(result, Err(CheckInError::ConsentRequired)));
        assert_eq!(client.classify_calls.load(Ordering::SeqCst), 0);

        let alert = session.watch_alerts().borrow().clone().unwrap();
        assert!(alert.message.contains("privacy policy"));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_is_unavailable_while_a_countdown_runs() {
        let client = Arc::new(ScriptedClient::pending(FinalizeOutcome::Finalized));
        let (session, _camera) = session(client.clone());

        enter_pending(&session).await;
        let result = session.capture().await;
        assert!(matches!(result, Err(CheckInError::CaptureUnavailable)));
        assert_eq!(client.classify_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confident_match_redirects_after_the_display_delay() {
        let client = Arc::new(ScriptedClient::with_scan(ScanOutcome::Recorded {
            attendance_status: "present".to_string(),
        }));
        let (session, camera) = session(client);

        session.start().await.unwrap();
        session.set_consent(true);
        session.capture().await.unwrap();

        assert_eq!(session.state(), CheckInState::Success);
        assert!(!camera.is_active(), "terminal states stop the stream");
        assert_eq!(*session.watch_redirect().borrow(), None);

        // Let the spawned redirect timer register its sleep before the
        // paused clock moves, matching the settle-before-advance ordering
        // used by enter_pending for the other timer tests.
        settle().await;
        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(
            session.watch_redirect().borrow().as_deref(),
            Some("/student/classes/cls-1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn already_marked_is_terminal_with_a_warning() {
        let client = Arc::new(ScriptedClient::with_scan(ScanOutcome::AlreadyMarked));
        let (session, camera) = session(client);

        session.start().await.unwrap();
        session.set_consent(true);
        session.capture().await.unwrap();

        assert_eq!(session.state(), CheckInState::AlreadyMarked);
        assert!(!camera.is_active());
        let alert = session.watch_alerts().borrow().clone().unwrap();
        assert_eq!(alert.tone, Tone::Warning);
    }
}
