// ABOUTME: Arms one-shot tokio tasks for pending timers and alarms and delivers them when due.
// ABOUTME: On startup persisted records are reconciled: future ones re-armed, overdue ones fired late.

use anyhow::Result;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use smarthomebot_core::metrics;
use smarthomebot_core::timers::TimerRecord;
use smarthomebot_core::traits::{MessageContent, MessagingPlatform};
use smarthomebot_core::SharedState;

/// What startup reconciliation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub rearmed: usize,
    pub missed: usize,
}

pub struct Scheduler {
    state: SharedState,
    platform: Arc<dyn MessagingPlatform>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(state: SharedState, platform: Arc<dyn MessagingPlatform>) -> Self {
        Self {
            state,
            platform,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a task that sleeps until `record` is due, then delivers it
    pub fn arm(&self, record: TimerRecord) {
        let delay = record.remaining(Utc::now());
        let state = self.state.clone();
        let platform = Arc::clone(&self.platform);

        tracing::debug!(
            kind = %record.kind,
            label = %record.label,
            chat_id = record.chat_id,
            delay_secs = delay.as_secs(),
            "Arming timer"
        );

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(&state, platform.as_ref(), &record, false).await;
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|t| !t.is_finished());
            tasks.push(handle);
        }
    }

    /// Re-arm persisted records; deliver the ones that came due while offline
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let now = Utc::now();
        let mut report = ReconcileReport::default();

        for record in self.state.all_timers().await {
            if record.fire_at <= now {
                fire(&self.state, self.platform.as_ref(), &record, true).await;
                report.missed += 1;
            } else {
                self.arm(record);
                report.rearmed += 1;
            }
        }

        tracing::info!(
            rearmed = report.rearmed,
            missed = report.missed,
            "Timers reconciled"
        );
        Ok(report)
    }

    /// Number of armed tasks that have not fired yet
    pub fn armed(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }

    /// Abort armed tasks. Their records stay persisted for the next start.
    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            let count = tasks.len();
            for task in tasks.drain(..) {
                task.abort();
            }
            tracing::info!(aborted = count, "Scheduler stopped");
        }
    }
}

/// Notify the originating chat and drop the record from persisted state
async fn fire(
    state: &SharedState,
    platform: &dyn MessagingPlatform,
    record: &TimerRecord,
    late: bool,
) {
    tracing::info!(
        kind = %record.kind,
        label = %record.label,
        chat_id = record.chat_id,
        late,
        "Timer fired"
    );
    metrics::record_timer_fired(&record.kind.to_string());

    if let Err(e) = platform
        .send(record.chat_id, MessageContent::plain(record.fired_text(late)))
        .await
    {
        tracing::warn!(error = %e, chat_id = record.chat_id, "Failed to deliver timer");
    }

    match state.remove_timer(record).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(label = %record.label, "Timer record already removed"),
        Err(e) => tracing::error!(error = %e, "Failed to persist fired timer removal"),
    }
}
