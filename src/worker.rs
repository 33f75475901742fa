// Background refresh worker: recompute billing-cycle traffic and publish it to the
// snapshot cell read by the HTTP handlers.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::time::Duration;
use tracing::instrument;

use crate::billing::{CycleError, cycle_start};
use crate::config::RefreshConfig;
use crate::models::TrafficSnapshot;
use crate::vnstat_repo::{VnstatError, VnstatRepo};

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("billing cycle: {0}")]
    Cycle(#[from] CycleError),
    #[error("vnstat query: {0}")]
    Collection(#[from] VnstatError),
}

/// Computes the current cycle's traffic from vnstat.
pub struct TrafficAggregator {
    repo: VnstatRepo,
    start_day: u32,
}

impl TrafficAggregator {
    pub fn new(repo: VnstatRepo, start_day: u32) -> Self {
        Self { repo, start_day }
    }

    /// Traffic for `[cycle start, today]`.
    #[instrument(skip(self), fields(start_day = self.start_day))]
    pub async fn refresh(&self, today: NaiveDate) -> Result<TrafficSnapshot, RefreshError> {
        let start = cycle_start(today, self.start_day)?;
        let interface = self.repo.select_interface().await;
        let totals = self
            .repo
            .get_traffic(interface.as_deref(), start, today)
            .await?;
        Ok(TrafficSnapshot::new(start, totals))
    }
}

/// What one refresh did to the snapshot cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was published.
    Updated,
    /// vnstat could not be queried; the previous snapshot stays.
    Stale,
    /// Refresh failed for a reason other than vnstat itself.
    Failed,
}

/// Run one refresh and publish its result. Errors never leave this function.
pub async fn refresh_once(
    aggregator: &TrafficAggregator,
    today: NaiveDate,
    snapshot_tx: &watch::Sender<TrafficSnapshot>,
) -> RefreshOutcome {
    match aggregator.refresh(today).await {
        Ok(snapshot) => {
            tracing::info!(
                start_date = %snapshot.start_date,
                received_mb = snapshot.received_mb,
                transmitted_mb = snapshot.transmitted_mb,
                "traffic updated"
            );
            snapshot_tx.send_replace(snapshot);
            RefreshOutcome::Updated
        }
        Err(RefreshError::Collection(e)) => {
            tracing::warn!(
                error = %e,
                operation = "query_traffic",
                "vnstat query failed, keeping cached traffic"
            );
            RefreshOutcome::Stale
        }
        Err(e) => {
            tracing::error!(error = %e, operation = "refresh", "traffic refresh failed");
            RefreshOutcome::Failed
        }
    }
}

/// Worker timing.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Wait after a refresh that updated or kept the snapshot.
    pub interval: Duration,
    /// Wait after a failed refresh, for that one iteration.
    pub retry_interval: Duration,
}

impl From<&RefreshConfig> for WorkerConfig {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            retry_interval: Duration::from_secs(config.retry_interval_secs),
        }
    }
}

pub fn next_delay(outcome: RefreshOutcome, config: &WorkerConfig) -> Duration {
    match outcome {
        RefreshOutcome::Updated | RefreshOutcome::Stale => config.interval,
        RefreshOutcome::Failed => config.retry_interval,
    }
}

/// One refresh step driven by the worker loop.
pub trait RefreshSource: Send + Sync + 'static {
    fn refresh_into(
        &self,
        today: NaiveDate,
        snapshot_tx: &watch::Sender<TrafficSnapshot>,
    ) -> impl Future<Output = RefreshOutcome> + Send;
}

impl RefreshSource for TrafficAggregator {
    async fn refresh_into(
        &self,
        today: NaiveDate,
        snapshot_tx: &watch::Sender<TrafficSnapshot>,
    ) -> RefreshOutcome {
        refresh_once(self, today, snapshot_tx).await
    }
}

/// Refresh source, snapshot cell and shutdown for the worker.
pub struct WorkerDeps<R = TrafficAggregator> {
    pub source: Arc<R>,
    pub snapshot_tx: Arc<watch::Sender<TrafficSnapshot>>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

#[instrument(skip_all, fields(interval_secs = config.interval.as_secs()))]
async fn run<R: RefreshSource>(
    source: Arc<R>,
    snapshot_tx: Arc<watch::Sender<TrafficSnapshot>>,
    config: WorkerConfig,
) {
    // First refresh runs immediately so the cell is populated as soon as possible.
    loop {
        let today = chrono::Local::now().date_naive();
        let outcome = source.refresh_into(today, &snapshot_tx).await;
        let delay = next_delay(outcome, &config);
        tracing::debug!(?outcome, delay_secs = delay.as_secs(), "next refresh scheduled");
        tokio::time::sleep(delay).await;
    }
}

/// Spawns the refresh loop under a supervisor that restarts it if it panics.
/// The returned handle completes once `shutdown_rx` fires (or its sender is dropped).
pub fn spawn<R: RefreshSource>(
    deps: WorkerDeps<R>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        source,
        snapshot_tx,
        mut shutdown_rx,
    } = deps;

    tokio::spawn(async move {
        loop {
            let mut handle = tokio::spawn(run(source.clone(), snapshot_tx.clone(), config));
            tokio::select! {
                result = &mut handle => {
                    match result {
                        Err(e) if e.is_panic() => {
                            tracing::error!(error = %e, "refresh loop panicked, restarting");
                            tokio::select! {
                                _ = tokio::time::sleep(config.retry_interval) => {}
                                _ = &mut shutdown_rx => break,
                            }
                        }
                        _ => break,
                    }
                }
                _ = &mut shutdown_rx => {
                    handle.abort();
                    tracing::debug!("Worker shutting down");
                    break;
                }
            }
        }
    })
}
