// Worker tests: aggregation against a scripted vnstat, stale-on-failure, shutdown

#![cfg(unix)]

mod common;

use chrono::NaiveDate;
use common::{FakeVnstat, IFLIST, JSON_TOTALS};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{oneshot, watch};
use tokio::time::Duration;
use vnstat_exporter::billing::cycle_start;
use vnstat_exporter::models::TrafficSnapshot;
use vnstat_exporter::worker::{
    RefreshOutcome, RefreshSource, TrafficAggregator, WorkerConfig, WorkerDeps, refresh_once,
    spawn,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn refresh_queries_cycle_range_on_selected_interface() {
    let fake = FakeVnstat::new(IFLIST, JSON_TOTALS);
    let aggregator = TrafficAggregator::new(fake.repo(), 15);

    let snapshot = aggregator.refresh(date(2024, 1, 3)).await.unwrap();
    assert_eq!(
        snapshot,
        TrafficSnapshot {
            start_date: date(2023, 12, 15),
            received_mb: 1.0,
            transmitted_mb: 2.0,
        }
    );
    assert_eq!(
        fake.calls(),
        vec![
            "--iflist",
            "-i eth0 --begin 2023-12-15 --end 2024-01-03 --json"
        ]
    );
}

#[tokio::test]
async fn refresh_without_physical_interface_is_unscoped() {
    let fake = FakeVnstat::new("Available interfaces: lo veth12", JSON_TOTALS);
    let aggregator = TrafficAggregator::new(fake.repo(), 1);

    aggregator.refresh(date(2024, 5, 10)).await.unwrap();
    assert_eq!(
        fake.calls().last().map(String::as_str),
        Some("--begin 2024-05-01 --end 2024-05-10 --json")
    );
}

#[tokio::test]
async fn refresh_once_publishes_snapshot() {
    let fake = FakeVnstat::new(IFLIST, JSON_TOTALS);
    let aggregator = TrafficAggregator::new(fake.repo(), 1);
    let (tx, rx) = watch::channel(TrafficSnapshot::empty(date(2024, 5, 1)));

    let outcome = refresh_once(&aggregator, date(2024, 5, 20), &tx).await;
    assert_eq!(outcome, RefreshOutcome::Updated);
    assert_eq!(rx.borrow().received_mb, 1.0);
    assert_eq!(rx.borrow().transmitted_mb, 2.0);
}

#[tokio::test]
async fn failing_query_keeps_previous_snapshot() {
    let fake = FakeVnstat::with_branches(
        &format!("echo '{}'\nexit 0", IFLIST),
        "echo 'vnstat: database locked' >&2\nexit 1",
    );
    let aggregator = TrafficAggregator::new(fake.repo(), 1);
    let previous = TrafficSnapshot {
        start_date: date(2024, 5, 1),
        received_mb: 42.0,
        transmitted_mb: 7.5,
    };
    let (tx, rx) = watch::channel(previous.clone());

    let outcome = refresh_once(&aggregator, date(2024, 5, 20), &tx).await;
    assert_eq!(outcome, RefreshOutcome::Stale);
    assert_eq!(*rx.borrow(), previous);
}

#[tokio::test]
async fn blank_query_output_keeps_previous_snapshot() {
    let fake = FakeVnstat::with_branches(&format!("echo '{}'\nexit 0", IFLIST), "exit 0");
    let aggregator = TrafficAggregator::new(fake.repo(), 1);
    let previous = TrafficSnapshot {
        start_date: date(2024, 5, 1),
        received_mb: 42.0,
        transmitted_mb: 7.5,
    };
    let (tx, rx) = watch::channel(previous.clone());

    let outcome = refresh_once(&aggregator, date(2024, 5, 20), &tx).await;
    assert_eq!(outcome, RefreshOutcome::Stale);
    assert_eq!(*rx.borrow(), previous);
    assert_eq!(fake.calls().len(), 2);
}

#[tokio::test]
async fn unparseable_output_publishes_zero_traffic() {
    let fake = FakeVnstat::new(IFLIST, "vnstat: no data available for the given range");
    let aggregator = TrafficAggregator::new(fake.repo(), 1);
    let (tx, rx) = watch::channel(TrafficSnapshot {
        start_date: date(2024, 4, 1),
        received_mb: 9.0,
        transmitted_mb: 9.0,
    });

    let outcome = refresh_once(&aggregator, date(2024, 5, 20), &tx).await;
    assert_eq!(outcome, RefreshOutcome::Updated);
    assert_eq!(*rx.borrow(), TrafficSnapshot::empty(date(2024, 5, 1)));
}

#[tokio::test]
async fn worker_refreshes_immediately_and_shuts_down() {
    let fake = FakeVnstat::new(IFLIST, JSON_TOTALS);
    let aggregator = Arc::new(TrafficAggregator::new(fake.repo(), 1));
    let today = chrono::Local::now().date_naive();
    let seed = TrafficSnapshot::empty(cycle_start(today, 1).unwrap());
    let (tx, mut rx) = watch::channel(seed);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let handle = spawn(
        WorkerDeps {
            source: aggregator,
            snapshot_tx: Arc::new(tx),
            shutdown_rx,
        },
        WorkerConfig {
            interval: Duration::from_secs(3600),
            retry_interval: Duration::from_secs(3600),
        },
    );

    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("first refresh within 5s")
        .unwrap();
    assert_eq!(rx.borrow().received_mb, 1.0);
    assert_eq!(rx.borrow().transmitted_mb, 2.0);

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker stops after shutdown")
        .unwrap();
}

/// Replays a fixed sequence of outcomes; `Updated` publishes a marker snapshot.
/// `None` panics, standing in for a crash inside the loop.
struct ScriptedRefresh {
    script: Vec<Option<RefreshOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedRefresh {
    fn new(script: Vec<Option<RefreshOutcome>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RefreshSource for ScriptedRefresh {
    async fn refresh_into(
        &self,
        today: NaiveDate,
        snapshot_tx: &watch::Sender<TrafficSnapshot>,
    ) -> RefreshOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .get(n)
            .copied()
            .unwrap_or(Some(RefreshOutcome::Stale));
        match step {
            None => panic!("refresh step {n} crashed"),
            Some(RefreshOutcome::Updated) => {
                snapshot_tx.send_replace(TrafficSnapshot {
                    start_date: today,
                    received_mb: 3.0,
                    transmitted_mb: 4.0,
                });
                RefreshOutcome::Updated
            }
            Some(outcome) => outcome,
        }
    }
}

fn spawn_scripted(
    source: Arc<ScriptedRefresh>,
    config: WorkerConfig,
) -> (
    watch::Receiver<TrafficSnapshot>,
    oneshot::Sender<()>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, rx) = watch::channel(TrafficSnapshot::empty(date(2024, 5, 1)));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = spawn(
        WorkerDeps {
            source,
            snapshot_tx: Arc::new(tx),
            shutdown_rx,
        },
        config,
    );
    (rx, shutdown_tx, handle)
}

#[tokio::test]
async fn worker_restarts_after_panic_and_retries_failed_refresh() {
    let source = ScriptedRefresh::new(vec![
        None,
        Some(RefreshOutcome::Failed),
        Some(RefreshOutcome::Updated),
    ]);
    let (mut rx, shutdown_tx, handle) = spawn_scripted(
        source.clone(),
        WorkerConfig {
            interval: Duration::from_secs(3600),
            retry_interval: Duration::from_millis(20),
        },
    );

    // Only the short retry interval separates the three steps.
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("published after panic and failed refresh")
        .unwrap();
    assert_eq!(rx.borrow().received_mb, 3.0);
    assert_eq!(rx.borrow().transmitted_mb, 4.0);
    assert_eq!(source.calls(), 3);

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker stops after shutdown")
        .unwrap();
}

#[tokio::test]
async fn stale_refresh_waits_full_interval() {
    let source = ScriptedRefresh::new(vec![Some(RefreshOutcome::Stale)]);
    let (_rx, shutdown_tx, handle) = spawn_scripted(
        source.clone(),
        WorkerConfig {
            interval: Duration::from_secs(3600),
            retry_interval: Duration::from_millis(20),
        },
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(source.calls(), 1);

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker stops after shutdown")
        .unwrap();
}
