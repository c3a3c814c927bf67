//! Check-in pending-flow state machine.
//!
//! One session drives one student's face-scan check-in for one class:
//! camera capture, classification, and, when the classifier cannot
//! confirm, a bounded pending countdown that finalizes the record on its
//! own if the user takes no further action.
//!
//! States: `Idle → Scanning → {Success | AlreadyMarked | Pending |
//! Rejected}`, then `Pending → Finalizing → {Finalized | Rejected}`.
//!
//! Two timers run while pending: a 1-second display ticker and a single
//! deferred finalization that fires exactly once when the full duration
//! elapses. Both are cancellable tasks bound to the session: `shutdown`
//! (and `Drop`) aborts every timer and stops the stream, so no timer or
//! network call fires after the session ends. Cancellation is total;
//! clearing one pending timer without the other is not a valid state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use attendu_common::models::Tone;
use attendu_config::CheckinConfig;

use crate::camera::CameraSource;
use crate::client::{CheckInError, FinalizeOutcome, RecognitionClient, ScanOutcome};

/// Where the session currently is in the check-in flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInState {
    /// Camera active, capture enabled (gated on consent).
    Idle,
    /// A capture is in flight; exactly one at a time.
    Scanning,
    /// Confident match; terminal for the session.
    Success,
    /// Attendance already recorded; terminal for the session.
    AlreadyMarked,
    /// Ambiguous match; countdown running.
    Pending,
    /// The deferred finalization call is in flight.
    Finalizing,
    /// Finalization reached a terminal status.
    Finalized,
    /// Rejected (scan or finalization); capture re-enabled.
    Rejected,
}

/// A plain-language message for the user. No raw error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAlert {
    pub tone: Tone,
    pub message: String,
}

#[derive(Default)]
struct PendingTimers {
    countdown: Option<JoinHandle<()>>,
    finalize: Option<JoinHandle<()>>,
    navigation: Option<JoinHandle<()>>,
}

impl PendingTimers {
    /// Clears both pending timers together; partial cancellation is not a
    /// valid state.
    fn clear_pending(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        if let Some(handle) = self.finalize.take() {
            handle.abort();
        }
    }

    fn clear_all(&mut self) {
        self.clear_pending();
        if let Some(handle) = self.navigation.take() {
            handle.abort();
        }
    }
}

struct SessionShared {
    client: Arc<dyn RecognitionClient>,
    camera: Arc<dyn CameraSource>,
    class_id: String,
    student_id: String,
    pending_duration: Duration,
    redirect_delay: Duration,
    state_tx: watch::Sender<CheckInState>,
    countdown_tx: watch::Sender<Option<u64>>,
    alert_tx: watch::Sender<Option<UserAlert>>,
    redirect_tx: watch::Sender<Option<String>>,
    consented: AtomicBool,
    shut_down: AtomicBool,
    timers: Mutex<PendingTimers>,
}

/// One student's check-in session for one class.
pub struct CheckInSession {
    shared: Arc<SessionShared>,
}

impl CheckInSession {
    pub fn new(
        client: Arc<dyn RecognitionClient>,
        camera: Arc<dyn CameraSource>,
        config: &CheckinConfig,
        class_id: impl Into<String>,
        student_id: impl Into<String>,
    ) -> Self {
        let (state_tx, _) = watch::channel(CheckInState::Idle);
        let (countdown_tx, _) = watch::channel(None);
        let (alert_tx, _) = watch::channel(None);
        let (redirect_tx, _) = watch::channel(None);

        Self {
            shared: Arc::new(SessionShared {
                client,
                camera,
                class_id: class_id.into(),
                student_id: student_id.into(),
                pending_duration: Duration::from_secs(config.pending_verification_minutes * 60),
                redirect_delay: Duration::from_secs(config.redirect_delay_secs),
                state_tx,
                countdown_tx,
                alert_tx,
                redirect_tx,
                consented: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                timers: Mutex::new(PendingTimers::default()),
            }),
        }
    }

    /// Acquires the camera stream. Call once when the session mounts.
    pub async fn start(&self) -> Result<(), CheckInError> {
        self.shared.camera.start().await.map_err(|err| {
            self.shared.set_alert(
                Tone::Error,
                "Unable to access the camera. Please check your permissions and try again.",
            );
            CheckInError::Camera(err)
        })
    }

    /// Records the privacy-policy consent flag. Capture is refused until
    /// consent is given.
    pub fn set_consent(&self, consented: bool) {
        self.shared.consented.store(consented, Ordering::SeqCst);
        if consented {
            self.shared.alert_tx.send_replace(None);
        } else {
            self.shared.set_alert(
                Tone::Warning,
                "Please agree to the privacy policy to enable scanning.",
            );
        }
    }

    pub fn state(&self) -> CheckInState {
        *self.shared.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CheckInState> {
        self.shared.state_tx.subscribe()
    }

    /// Remaining pending seconds, for display only.
    pub fn watch_countdown(&self) -> watch::Receiver<Option<u64>> {
        self.shared.countdown_tx.subscribe()
    }

    pub fn watch_alerts(&self) -> watch::Receiver<Option<UserAlert>> {
        self.shared.alert_tx.subscribe()
    }

    /// Target route once a terminal state has been displayed long enough.
    pub fn watch_redirect(&self) -> watch::Receiver<Option<String>> {
        self.shared.redirect_tx.subscribe()
    }

    /// Captures one frame and runs it through the classifier.
    ///
    /// Exactly one capture may be in flight; capture is also unavailable
    /// while a pending countdown runs or after a terminal state.
    pub async fn capture(&self) -> Result<ScanOutcome, CheckInError> {
        let shared = &self.shared;

        let current = *shared.state_tx.borrow();
        if !matches!(current, CheckInState::Idle | CheckInState::Rejected) {
            return Err(CheckInError::CaptureUnavailable);
        }

        if !shared.consented.load(Ordering::SeqCst) {
            shared.set_alert(
                Tone::Error,
                "Please agree to the privacy policy before starting your scan.",
            );
            return Err(CheckInError::ConsentRequired);
        }

        let frame = match shared.camera.capture_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                shared.set_alert(
                    Tone::Error,
                    "Unable to capture a photo. Please check the camera and try again.",
                );
                return Err(CheckInError::Camera(err));
            }
        };

        shared.alert_tx.send_replace(None);
        shared.set_state(CheckInState::Scanning);

        let result = shared
            .client
            .classify(&frame, &shared.class_id, &shared.student_id)
            .await;

        if shared.shut_down.load(Ordering::SeqCst) {
            return Err(CheckInError::CaptureUnavailable);
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("classification failed: {}", err);
                shared.set_alert(
                    Tone::Error,
                    "Error during face recognition. Please try again.",
                );
                shared.set_state(CheckInState::Idle);
                return Err(err);
            }
        };

        match &outcome {
            ScanOutcome::Recorded { attendance_status } => {
                shared.camera.stop();
                shared.set_alert(
                    Tone::Success,
                    format!("Attendance recorded! Status: {}.", attendance_status),
                );
                shared.set_state(CheckInState::Success);
                shared.schedule_redirect();
            }
            ScanOutcome::AlreadyMarked => {
                shared.camera.stop();
                shared.set_alert(Tone::Warning, "Attendance already recorded today.");
                shared.set_state(CheckInState::AlreadyMarked);
                shared.schedule_redirect();
            }
            ScanOutcome::Pending {
                record_id: Some(record_id),
            } => {
                shared.begin_pending(record_id.clone());
            }
            ScanOutcome::Pending { record_id: None } => {
                // Without the record id no finalization can be scheduled;
                // fatal for this scan, distinct from a normal rejection.
                shared.set_alert(
                    Tone::Error,
                    "Your scan is pending, but we could not start the verification \
                     timer. Please try scanning again.",
                );
                shared.set_state(CheckInState::Idle);
                return Err(CheckInError::MissingPendingRecordId);
            }
            ScanOutcome::Rejected { message } => {
                shared.set_alert(
                    Tone::Error,
                    message
                        .clone()
                        .unwrap_or_else(|| {
                            "Face recognition did not match. Please try again.".to_string()
                        }),
                );
                shared.set_state(CheckInState::Idle);
            }
        }

        Ok(outcome)
    }

    /// Ends the session: aborts every timer and stops the stream. No timer
    /// or network call fires afterwards. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

impl Drop for CheckInSession {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl SessionShared {
    fn set_state(&self, state: CheckInState) {
        self.state_tx.send_replace(state);
    }

    fn set_alert(&self, tone: Tone, message: impl Into<String>) {
        self.alert_tx.send_replace(Some(UserAlert {
            tone,
            message: message.into(),
        }));
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.timers
            .lock()
            .expect("timer registry poisoned")
            .clear_all();
        self.camera.stop();
        self.countdown_tx.send_replace(None);
        debug!("check-in session shut down");
    }

    /// Enters the pending state: stops the stream, starts the display
    /// ticker and schedules the single deferred finalization.
    fn begin_pending(self: &Arc<Self>, record_id: String) {
        self.camera.stop();
        let total_seconds = self.pending_duration.as_secs();
        self.countdown_tx.send_replace(Some(total_seconds));
        self.set_alert(
            Tone::Info,
            "Verification pending. Stay connected and keep this page open \
             while we verify your attendance.",
        );
        self.set_state(CheckInState::Pending);
        info!(record_id = %record_id, total_seconds, "pending verification started");

        // Hold the registry across the spawns so no task can observe a
        // half-stored pending pair
        let mut timers = self.timers.lock().expect("timer registry poisoned");
        // A stale pending pair must never survive a new one
        timers.clear_pending();

        timers.countdown = Some({
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // the first tick completes immediately
                interval.tick().await;
                let mut remaining = total_seconds;
                while remaining > 0 {
                    interval.tick().await;
                    remaining -= 1;
                    shared.countdown_tx.send_replace(Some(remaining));
                }
            })
        });

        timers.finalize = Some({
            let shared = Arc::clone(self);
            let duration = self.pending_duration;
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                shared.finalize_pending(&record_id).await;
            })
        });
    }

    /// Runs inside the finalize timer task once the full countdown has
    /// elapsed.
    async fn finalize_pending(self: &Arc<Self>, record_id: &str) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut timers = self.timers.lock().expect("timer registry poisoned");
            // Our own handle: dropping it does not cancel this task
            timers.finalize.take();
            if let Some(handle) = timers.countdown.take() {
                handle.abort();
            }
        }
        self.countdown_tx.send_replace(None);

        self.set_state(CheckInState::Finalizing);
        self.set_alert(
            Tone::Info,
            "Finalizing your attendance. This may take a moment...",
        );

        let result = self.client.finalize(record_id).await;

        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }

        match result {
            Ok(FinalizeOutcome::Finalized) => {
                self.set_alert(Tone::Success, "Attendance finalized! You're all set.");
                self.set_state(CheckInState::Finalized);
                self.schedule_redirect();
            }
            Ok(FinalizeOutcome::Rejected { message }) => {
                let guidance = "Please stay connected and try again.";
                let combined = match message {
                    Some(message) => {
                        let message = message.trim();
                        if message.ends_with('.') {
                            format!("{} {}", message, guidance)
                        } else {
                            format!("{}. {}", message, guidance)
                        }
                    }
                    None => format!("We could not confirm your attendance. {}", guidance),
                };
                warn!(record_id = %record_id, "finalization rejected");
                self.set_alert(Tone::Warning, combined);
                self.restart_for_retry().await;
            }
            Ok(FinalizeOutcome::Completed { message }) => {
                // The backend probably did its job; optimistic redirect
                self.set_alert(
                    Tone::Info,
                    message.unwrap_or_else(|| {
                        "Attendance update completed. Please verify your status in the \
                         class page."
                            .to_string()
                    }),
                );
                self.set_state(CheckInState::Finalized);
                self.schedule_redirect();
            }
            Err(err) => {
                warn!(record_id = %record_id, "finalization transport failure: {}", err);
                self.set_alert(
                    Tone::Error,
                    "We lost connection while finalizing. Check your network and \
                     recapture your photo.",
                );
                self.restart_for_retry().await;
            }
        }
    }

    /// Re-enables capture after a rejected or failed finalization.
    async fn restart_for_retry(self: &Arc<Self>) {
        self.set_state(CheckInState::Rejected);
        if let Err(err) = self.camera.start().await {
            error!("failed to restart camera stream: {}", err);
            self.set_alert(
                Tone::Error,
                "Unable to access the camera. Please check your permissions and try again.",
            );
        }
    }

    /// Emits the redirect target after the fixed display delay.
    fn schedule_redirect(self: &Arc<Self>) {
        let target = format!("/student/classes/{}", self.class_id);
        let delay = self.redirect_delay;
        let handle = {
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shared.redirect_tx.send_replace(Some(target));
            })
        };
        let mut timers = self.timers.lock().expect("timer registry poisoned");
        if let Some(previous) = timers.navigation.replace(handle) {
            previous.abort();
        }
    }
}
