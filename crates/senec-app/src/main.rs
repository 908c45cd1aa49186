use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lala_client::LalaClient;
use poller_actor::{snapshot_channel, PollerActor};
use reading_publisher::{
    publish_all, run_publisher, FanoutSink, LogSink, MemorySink, ReadingSet, ReadingSink,
};
use senec_app::http::{self, HttpState};
use senec_app::SenecConfig;
use state_store::StateStore;
use types::DeviceIdentity;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = parse_config_arg();
    let config = SenecConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("metrics recorder install failed")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let client = LalaClient::new(config.client.clone()).context("device client init failed")?;
    let mut readings =
        ReadingSet::from_ids(&config.monitored_conditions).context("reading setup failed")?;
    gauge!("senec_readings_configured").set(readings.len() as f64);

    let memory = MemorySink::new();
    let sink: Arc<dyn ReadingSink> = Arc::new(FanoutSink::new(vec![
        Arc::new(LogSink) as Arc<dyn ReadingSink>,
        Arc::new(memory.clone()),
    ]));

    let store = StateStore::new(&config.state_path)
        .await
        .context("state store init failed")?;
    match store.load_all().await {
        Ok(stored) => {
            let restored = readings.restore(&stored);
            publish_all(&restored, sink.as_ref(), None).await;
            info!(restored = restored.len(), readings = readings.len(), "reading state restored");
        }
        Err(err) => warn!(error = %err, "reading state restore failed"),
    }

    let (snapshot_tx, snapshot_rx) = snapshot_channel();
    let publisher_handle = tokio::spawn(run_publisher(
        snapshot_rx,
        readings,
        sink,
        Some(store),
        shutdown_rx.clone(),
    ));

    let identity = DeviceIdentity {
        host: config.host().to_string(),
    };
    info!(
        host = %identity.host,
        url = client.url(),
        interval_ms = config.poller.poll_interval.as_millis(),
        "starting poller"
    );
    let poller = PollerActor::new(
        identity,
        client,
        snapshot_tx,
        shutdown_rx.clone(),
        config.poller.clone(),
    );
    let mut poller_handle = tokio::spawn(poller.run());

    let listener = TcpListener::bind(&config.http_bind)
        .await
        .with_context(|| format!("bind http listener {}", config.http_bind))?;
    let app = http::router(HttpState {
        readings: memory,
        metrics: Some(metrics_handle),
    });
    let http_handle = tokio::spawn(http::serve(listener, app, shutdown_rx.clone()));

    notify_ready();
    let watchdog_handle = start_watchdog(shutdown_rx.clone());

    let poller_finished = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "ctrl-c handler failed");
            }
            info!("shutdown signal received");
            false
        }
        outcome = &mut poller_handle => {
            match outcome {
                Ok(Ok(())) => info!("poller exited cleanly"),
                Ok(Err(err)) => warn!(error = %err, "poller exited with error"),
                Err(err) => warn!(error = %err, "poller task failed"),
            }
            true
        }
    };

    let _ = shutdown_tx.send(true);

    if !poller_finished {
        if let Err(err) = poller_handle.await {
            warn!(error = %err, "poller task join failed");
        }
    }
    let _ = publisher_handle.await;
    match http_handle.await {
        Ok(Err(err)) => warn!(error = %err, "http server failed"),
        Err(err) => warn!(error = %err, "http task join failed"),
        Ok(Ok(())) => {}
    }
    if let Some(handle) = watchdog_handle {
        let _ = handle.await;
    }
    Ok(())
}

fn parse_config_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn notify_ready() {
    if let Err(err) = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %err, "systemd ready notify failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn notify_ready() {}

#[cfg(target_os = "linux")]
fn start_watchdog(
    mut shutdown: watch::Receiver<bool>,
) -> Option<tokio::task::JoinHandle<()>> {
    let interval = watchdog_interval()?;
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    if let Err(err) = sd_notify::notify(false, &[sd_notify::NotifyState::Watchdog]) {
                        warn!(error = %err, "systemd watchdog notify failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }))
}

#[cfg(not(target_os = "linux"))]
fn start_watchdog(_shutdown: watch::Receiver<bool>) -> Option<tokio::task::JoinHandle<()>> {
    None
}

#[cfg(target_os = "linux")]
fn watchdog_interval() -> Option<Duration> {
    let watchdog_usec = env::var("WATCHDOG_USEC").ok()?.parse::<u64>().ok()?;
    if let Some(pid) = env::var("WATCHDOG_PID")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
    {
        if pid != std::process::id() {
            return None;
        }
    }

    let interval = watchdog_usec.saturating_div(2).max(100_000);
    Some(Duration::from_micros(interval))
}
