use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use vnstat_exporter::*;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        version = %version::banner(),
        webhook_path = %app_config.exporter.webhook_path,
        start_day = app_config.exporter.start_day,
        port = app_config.server.port,
        vnstat = %app_config.vnstat.binary,
        "starting"
    );

    // Until the first refresh lands, serve zero traffic for the current cycle.
    let today = chrono::Local::now().date_naive();
    let seed = billing::cycle_start(today, app_config.exporter.start_day)?;
    let (snapshot_tx, snapshot_rx) = watch::channel(models::TrafficSnapshot::empty(seed));

    let aggregator = Arc::new(worker::TrafficAggregator::new(
        vnstat_repo::VnstatRepo::from_config(&app_config.vnstat),
        app_config.exporter.start_day,
    ));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            source: aggregator,
            snapshot_tx: Arc::new(snapshot_tx),
            shutdown_rx,
        },
        worker::WorkerConfig::from(&app_config.refresh),
    );

    let app = routes::app(snapshot_rx, &app_config);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!(
        "Webhook URL: http://localhost:{}{}",
        app_config.server.port,
        app_config.exporter.webhook_path
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = worker_handle.await;
        }
    }

    Ok(())
}
