use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use metrics::counter;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use senec_decoder::{decode, find_spec, ReadingSpec};
use state_store::{StateStore, StoredReading};
use types::{unix_ms, DecodedValue, PublishedReading, TelemetrySnapshot};

#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("unknown reading identifier {0:?}")]
    UnknownReading(String),
}

/// Host-side capability for receiving reading updates.
pub trait ReadingSink: Send + Sync {
    fn publish(&self, reading: &PublishedReading);
}

/// Writes each update to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReadingSink for LogSink {
    fn publish(&self, reading: &PublishedReading) {
        info!(
            reading = %reading.id,
            name = %reading.name,
            state = reading.state().as_deref().unwrap_or("unknown"),
            unit = reading.unit.as_deref().unwrap_or(""),
            icon = %reading.icon,
            "reading published"
        );
    }
}

/// Keeps the latest update per reading for whoever wants to serve them.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    readings: Arc<RwLock<BTreeMap<String, PublishedReading>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<PublishedReading> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn all(&self) -> Vec<PublishedReading> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl ReadingSink for MemorySink {
    fn publish(&self, reading: &PublishedReading) {
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reading.id.clone(), reading.clone());
    }
}

/// Forwards every update to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ReadingSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ReadingSink>>) -> Self {
        Self { sinks }
    }
}

impl ReadingSink for FanoutSink {
    fn publish(&self, reading: &PublishedReading) {
        for sink in &self.sinks {
            sink.publish(reading);
        }
    }
}

struct ReadingState {
    spec: &'static ReadingSpec,
    last: Option<DecodedValue>,
    icon: String,
    updated_at_ms: u64,
    announced: bool,
}

impl ReadingState {
    fn new(spec: &'static ReadingSpec) -> Self {
        Self {
            spec,
            last: None,
            icon: spec.icon.to_string(),
            updated_at_ms: 0,
            announced: false,
        }
    }

    fn published(&mut self) -> PublishedReading {
        self.announced = true;
        PublishedReading {
            id: self.spec.id.to_string(),
            name: self.spec.entity_name(),
            value: self.last.clone(),
            unit: self.spec.unit.map(str::to_string),
            icon: self.icon.clone(),
            updated_at_ms: self.updated_at_ms,
        }
    }
}

/// The configured readings and the value each one last published.
pub struct ReadingSet {
    readings: Vec<ReadingState>,
}

impl ReadingSet {
    pub fn new(specs: impl IntoIterator<Item = &'static ReadingSpec>) -> Self {
        Self {
            readings: specs.into_iter().map(ReadingState::new).collect(),
        }
    }

    pub fn from_ids<S: AsRef<str>>(ids: &[S]) -> Result<Self, ReadingError> {
        let specs = ids
            .iter()
            .map(|id| {
                find_spec(id.as_ref()).ok_or_else(|| ReadingError::UnknownReading(id.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(specs))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.readings.iter().map(|state| state.spec.id)
    }

    /// Current value of one reading, if it has one.
    pub fn value(&self, id: &str) -> Option<&DecodedValue> {
        self.readings
            .iter()
            .find(|state| state.spec.id == id)
            .and_then(|state| state.last.as_ref())
    }

    /// Seeds last-known values from persisted state. Entries for readings that are not configured
    /// are ignored.
    pub fn restore(&mut self, stored: &[StoredReading]) -> Vec<PublishedReading> {
        let mut restored = Vec::new();
        for entry in stored {
            let Some(state) = self
                .readings
                .iter_mut()
                .find(|state| state.spec.id == entry.reading_id)
            else {
                debug!(reading = %entry.reading_id, "ignoring stored value for unconfigured reading");
                continue;
            };

            state.last = Some(entry.value.clone());
            if let Some(icon) = entry.icon.as_ref() {
                state.icon = icon.clone();
            }
            state.updated_at_ms = u64::try_from(entry.updated_at_ms).unwrap_or_default();
            restored.push(state.published());
        }
        restored
    }

    /// Decodes every reading against one snapshot and returns the updates to publish.
    ///
    /// A reading that fails to decode keeps its previous value and produces no update, unless it
    /// has never had a value, in which case it is announced once as unknown.
    pub fn apply(&mut self, snapshot: &TelemetrySnapshot) -> Vec<PublishedReading> {
        let mut updates = Vec::with_capacity(self.readings.len());

        for state in &mut self.readings {
            match decode(snapshot, state.spec) {
                Ok(decoded) => {
                    state.last = Some(decoded.value);
                    state.icon = decoded.icon.unwrap_or_else(|| state.spec.icon.to_string());
                    state.updated_at_ms = snapshot.collected_at_ms();
                    updates.push(state.published());
                }
                Err(err) => {
                    counter!("senec_decode_failures_total", "reading" => state.spec.id).increment(1);
                    warn!(
                        reading = state.spec.id,
                        path = state.spec.path,
                        error = %err,
                        "reading decode failed, keeping previous value"
                    );
                    if state.last.is_none() && !state.announced {
                        updates.push(state.published());
                    }
                }
            }
        }

        updates
    }
}

/// Hands each update to the sink and persists it when a store is configured.
pub async fn publish_all(
    updates: &[PublishedReading],
    sink: &dyn ReadingSink,
    store: Option<&StateStore>,
) {
    for reading in updates {
        sink.publish(reading);
        if let Some(store) = store {
            if let Err(err) = store.save(reading).await {
                warn!(reading = %reading.id, error = %err, "state store save failed");
            }
        }
    }
}

/// Recomputes every reading whenever a new snapshot is swapped in.
pub async fn run_publisher(
    mut snapshots: watch::Receiver<Option<Arc<TelemetrySnapshot>>>,
    mut readings: ReadingSet,
    sink: Arc<dyn ReadingSink>,
    store: Option<StateStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    info!("snapshot channel closed");
                    break;
                }
                let current = snapshots.borrow_and_update().clone();
                let Some(snapshot) = current else {
                    continue;
                };

                let started = unix_ms();
                let updates = readings.apply(&snapshot);
                publish_all(&updates, sink.as_ref(), store.as_ref()).await;
                debug!(
                    updates = updates.len(),
                    readings = readings.len(),
                    snapshot_ms = snapshot.collected_at_ms(),
                    elapsed_ms = unix_ms().saturating_sub(started),
                    "readings refreshed"
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("publisher shutdown requested");
                    break;
                }
            }
        }
    }
}
