//! Background polling of the evaluation history while a run is in flight.
//!
//! A [`HistoryPoller`] refreshes the history on a fixed interval and
//! publishes each result as a [`HistorySnapshot`] on a watch channel. The
//! spawned task is owned by the returned [`PollHandle`]: stopping or dropping
//! the handle ends it, and it ends on its own once the tracked run reaches a
//! terminal status.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use tachyon_core::{defaults, logging, EvaluationStatus};

use crate::client::SharedClient;
use crate::history::{project_rows, HistoryRow};

/// One poll result.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    /// Run the poller was started for.
    pub evaluation_id: String,
    /// Projected history, statuses already guarded against regressions.
    pub rows: Vec<HistoryRow>,
    /// Number of successful polls so far, this one included.
    pub polls: u64,
    pub fetched_at: DateTime<Utc>,
}

impl HistorySnapshot {
    /// Row of the tracked run, if the server lists it yet.
    pub fn tracked(&self) -> Option<&HistoryRow> {
        self.rows.iter().find(|r| r.id == self.evaluation_id)
    }

    pub fn tracked_status(&self) -> Option<EvaluationStatus> {
        self.tracked().map(|r| r.status)
    }

    pub fn is_finished(&self) -> bool {
        self.tracked_status().is_some_and(|s| s.is_terminal())
    }
}

/// Remembers the furthest status observed per run so that a stale server
/// response never moves a run backwards.
#[derive(Debug, Default)]
pub struct StatusGuard {
    seen: HashMap<String, EvaluationStatus>,
}

impl StatusGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite regressed statuses in place and record the new high-water marks.
    pub fn apply(&mut self, rows: &mut [HistoryRow]) {
        for row in rows.iter_mut() {
            let guarded = match self.seen.get(&row.id) {
                Some(previous) => previous.advance(row.status),
                None => row.status,
            };
            if guarded != row.status {
                debug!(
                    { logging::EVALUATION_ID } = row.id.as_str(),
                    reported = %row.status,
                    kept = %guarded,
                    "Ignoring status regression"
                );
                row.status = guarded;
            }
            self.seen.insert(row.id.clone(), guarded);
        }
    }

    pub fn status(&self, evaluation_id: &str) -> Option<EvaluationStatus> {
        self.seen.get(evaluation_id).copied()
    }
}

/// Fixed-interval history poller for one evaluation run.
pub struct HistoryPoller {
    client: SharedClient,
    evaluation_id: String,
    interval: Duration,
}

impl HistoryPoller {
    pub fn new(client: SharedClient, evaluation_id: impl Into<String>) -> Self {
        Self {
            client,
            evaluation_id: evaluation_id.into(),
            interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
        }
    }

    /// Set the time between polls. The first poll happens immediately.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the polling task. Must be called within a tokio runtime.
    pub fn start(self) -> PollHandle {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(self.run(tx));
        PollHandle { receiver: rx, task }
    }

    #[instrument(
        name = "history_poller",
        skip_all,
        fields(evaluation_id = %self.evaluation_id, interval_ms = self.interval.as_millis() as u64)
    )]
    async fn run(self, tx: watch::Sender<Option<HistorySnapshot>>) {
        info!("History poller started");

        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut guard = StatusGuard::new();
        let mut polls: u64 = 0;

        loop {
            ticker.tick().await;

            let history = match self.client.refresh_evaluation_history().await {
                Ok(history) => history,
                Err(e) => {
                    warn!(error = %e, "History poll failed, retrying on next tick");
                    continue;
                }
            };
            let datasets = match self.client.get_datasets().await {
                Ok(datasets) => datasets,
                Err(e) => {
                    warn!(error = %e, "Dataset lookup failed, showing dataset ids");
                    Vec::new()
                }
            };

            let mut rows = project_rows(&history, &datasets);
            guard.apply(&mut rows);
            polls += 1;

            let snapshot = HistorySnapshot {
                evaluation_id: self.evaluation_id.clone(),
                rows,
                polls,
                fetched_at: Utc::now(),
            };
            let finished = snapshot.is_finished();
            debug!(
                { logging::RESULT_COUNT } = snapshot.rows.len(),
                status = ?snapshot.tracked_status(),
                polls,
                "History snapshot published"
            );

            if tx.send(Some(snapshot)).is_err() {
                debug!("No subscribers left");
                break;
            }
            if finished {
                info!(
                    status = ?guard.status(&self.evaluation_id),
                    polls,
                    "Tracked evaluation finished, poller stopping"
                );
                break;
            }
        }
    }
}

/// Owner of a running poller.
///
/// Dropping the handle aborts the task.
pub struct PollHandle {
    receiver: watch::Receiver<Option<HistorySnapshot>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Most recent snapshot, `None` before the first successful poll.
    pub fn latest(&self) -> Option<HistorySnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the poller has ended and every snapshot has been
    /// seen.
    pub async fn changed(&mut self) -> Option<HistorySnapshot> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }

    /// Stop polling. Idempotent.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the task has ended, on its own or through [`stop`](Self::stop).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
