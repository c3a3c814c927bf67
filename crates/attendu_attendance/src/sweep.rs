//! Overdue-pending sweep.
//!
//! A pending scan normally finalizes from the check-in client's own timer.
//! When that never happens (tab closed, network lost), the record would
//! stay pending forever; this sweep finalizes any record still pending past
//! the recheck window and dispatches the resulting notifications.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use attendu_common::models::AttendanceEvent;
use attendu_common::services::BoxedError;

use crate::handlers::{resolve_final_status, SharedRepository};
use crate::pipeline::NotificationDispatcher;

/// Periodically finalizes attendance records stuck in pending.
pub struct PendingSweep {
    repository: SharedRepository,
    dispatcher: Arc<NotificationDispatcher>,
    recheck_minutes: i64,
}

impl PendingSweep {
    pub fn new(
        repository: SharedRepository,
        dispatcher: Arc<NotificationDispatcher>,
        recheck_minutes: i64,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            recheck_minutes,
        }
    }

    /// One sweep pass. Returns how many records were finalized; per-record
    /// failures are logged and do not abort the pass.
    pub async fn run_once(&self) -> Result<usize, BoxedError> {
        let cutoff = Utc::now() - chrono::Duration::minutes(self.recheck_minutes);
        let overdue = self.repository.list_overdue_pending(cutoff).await?;

        if overdue.is_empty() {
            debug!("no overdue pending records");
            return Ok(0);
        }

        let mut finalized = 0usize;
        for before in overdue {
            let final_status = resolve_final_status(&before);
            match self
                .repository
                .apply_finalization(&before, &final_status, Utc::now())
                .await
            {
                Ok(after) => {
                    finalized += 1;
                    info!(
                        record_id = %after.id,
                        final_status = %final_status,
                        "swept overdue pending record"
                    );
                    let event = AttendanceEvent {
                        before: Some(before),
                        after: Some(after),
                    };
                    if let Err(err) = self.dispatcher.process(&event).await {
                        error!("Notification dispatch during sweep failed: {:?}", err);
                    }
                }
                Err(err) => {
                    error!(
                        record_id = %before.id,
                        "Failed to finalize overdue record: {}", err
                    );
                }
            }
        }

        Ok(finalized)
    }

    /// Runs the sweep on a fixed interval until the task is dropped.
    pub async fn run(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(0) => {}
                Ok(count) => info!(count, "pending sweep finalized records"),
                Err(err) => error!("Pending sweep pass failed: {:?}", err),
            }
        }
    }
}
