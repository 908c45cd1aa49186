use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use lala_client::LalaClient;
use types::{unix_ms, DeviceIdentity, TelemetrySnapshot};

/// Latest successful snapshot, `None` until the first fetch completes.
pub type SharedSnapshot = Option<Arc<TelemetrySnapshot>>;
pub type SnapshotSender = watch::Sender<SharedSnapshot>;
pub type SnapshotReceiver = watch::Receiver<SharedSnapshot>;

pub fn snapshot_channel() -> (SnapshotSender, SnapshotReceiver) {
    watch::channel(None)
}

#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub poll_interval: Duration,
    pub jitter_ms: u64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            jitter_ms: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("every snapshot subscriber is gone")]
    NoSubscribers,
}

/// Drives the device fetch on a fixed interval and swaps in every snapshot that arrives.
///
/// Fetches are not serialized: a slow request may still be running when the next tick fires, and
/// whichever completes last provides the current snapshot.
pub struct PollerActor {
    identity: DeviceIdentity,
    client: LalaClient,
    snapshots: Arc<SnapshotSender>,
    shutdown: watch::Receiver<bool>,
    config: ActorConfig,
}

impl PollerActor {
    pub fn new(
        identity: DeviceIdentity,
        client: LalaClient,
        snapshots: SnapshotSender,
        shutdown: watch::Receiver<bool>,
        config: ActorConfig,
    ) -> Self {
        Self {
            identity,
            client,
            snapshots: Arc::new(snapshots),
            shutdown,
            config,
        }
    }

    pub async fn run(mut self) -> Result<(), PollerError> {
        let mut in_flight: JoinSet<bool> = JoinSet::new();
        let mut iteration = 0u64;
        let mut succeeded = 0u64;
        let mut failed = 0u64;

        'ticks: loop {
            if *self.shutdown.borrow() {
                info!(host = %self.identity.host, "poller shutdown requested");
                break;
            }
            if self.snapshots.is_closed() {
                in_flight.abort_all();
                return Err(PollerError::NoSubscribers);
            }

            let overlapping = in_flight.len();
            in_flight.spawn(fetch_snapshot(
                self.identity.clone(),
                self.client.clone(),
                Arc::clone(&self.snapshots),
            ));

            iteration = iteration.wrapping_add(1);
            let delay = jittered_delay(self.config.poll_interval, self.config.jitter_ms, iteration);
            debug!(
                host = %self.identity.host,
                overlapping,
                succeeded,
                failed,
                delay_ms = delay.as_millis(),
                "poll tick"
            );

            let next_tick = Instant::now() + delay;
            loop {
                tokio::select! {
                    _ = sleep_until(next_tick) => break,
                    Some(result) = in_flight.join_next() => {
                        match result {
                            Ok(true) => succeeded = succeeded.saturating_add(1),
                            Ok(false) => failed = failed.saturating_add(1),
                            Err(err) if err.is_cancelled() => {}
                            Err(err) => {
                                warn!(host = %self.identity.host, error = %err, "fetch task failed");
                                failed = failed.saturating_add(1);
                            }
                        }
                    }
                    changed = self.shutdown.changed() => {
                        if changed.is_err() || *self.shutdown.borrow() {
                            info!(host = %self.identity.host, "poller shutdown requested");
                            break 'ticks;
                        }
                    }
                }
            }
        }

        in_flight.abort_all();
        Ok(())
    }
}

async fn fetch_snapshot(
    identity: DeviceIdentity,
    client: LalaClient,
    snapshots: Arc<SnapshotSender>,
) -> bool {
    let started = Instant::now();
    counter!("senec_fetch_total").increment(1);

    match client.fetch().await {
        Ok(snapshot) => {
            let elapsed = started.elapsed();
            histogram!("senec_fetch_duration_seconds").record(elapsed.as_secs_f64());
            let categories = snapshot.categories().count();
            snapshots.send_replace(Some(Arc::new(snapshot)));
            debug!(
                host = %identity.host,
                categories,
                elapsed_ms = elapsed.as_millis(),
                "snapshot replaced"
            );
            true
        }
        Err(err) => {
            counter!("senec_fetch_failures_total").increment(1);
            warn!(
                host = %identity.host,
                error = %err,
                "telemetry fetch failed, keeping previous snapshot"
            );
            false
        }
    }
}

fn jittered_delay(base: Duration, jitter_ms: u64, iteration: u64) -> Duration {
    if jitter_ms == 0 {
        return base;
    }

    let jitter_window = jitter_ms.max(1);
    let seed = unix_ms().wrapping_add(iteration.wrapping_mul(1_664_525));
    let offset = seed % jitter_window;
    base + Duration::from_millis(offset)
}
