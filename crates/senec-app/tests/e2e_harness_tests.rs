use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lala_client::{ClientConfig, LalaClient, REQUEST_BODY};
use mockito::{Matcher, Server};
use poller_actor::{snapshot_channel, ActorConfig, PollerActor};
use reading_publisher::{run_publisher, MemorySink, ReadingSet, ReadingSink};
use state_store::StateStore;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use types::{DecodedValue, DeviceIdentity};

const MONITORED: &[&str] = &[
    "stat_state",
    "grid_import",
    "grid_export",
    "battery_level",
    "bms_module_count",
];

#[tokio::test]
async fn device_snapshot_flows_to_readings_and_state() {
    let body = fs::read_to_string(fixture_path("lala.json")).expect("fixture");
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/lala.cgi")
        .match_body(Matcher::JsonString(REQUEST_BODY.to_string()))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let db_path = temp_db_path("device_snapshot_flows");
    let location = db_path.to_str().expect("path").to_string();
    let store = StateStore::new(&location).await.expect("store");

    let (snapshot_tx, snapshot_rx) = snapshot_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sink = MemorySink::new();

    let publisher = tokio::spawn(run_publisher(
        snapshot_rx,
        ReadingSet::from_ids(MONITORED).expect("ids"),
        Arc::new(sink.clone()) as Arc<dyn ReadingSink>,
        Some(store),
        shutdown_rx.clone(),
    ));

    let host = server.host_with_port();
    let client = LalaClient::new(ClientConfig {
        host: host.clone(),
        timeout_ms: 1_000,
        ..ClientConfig::default()
    })
    .expect("client");
    let poller = tokio::spawn(
        PollerActor::new(
            DeviceIdentity { host },
            client,
            snapshot_tx,
            shutdown_rx,
            ActorConfig {
                poll_interval: Duration::from_millis(100),
                jitter_ms: 0,
            },
        )
        .run(),
    );

    timeout(Duration::from_secs(5), async {
        while sink.all().len() < MONITORED.len() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("readings published");

    let state = sink.get("stat_state").expect("stat_state");
    assert_eq!(state.state().as_deref(), Some("Charge"));
    assert_eq!(state.name, "Senec System State");

    let import = sink.get("grid_import").expect("grid_import");
    assert_eq!(import.value, Some(DecodedValue::Zero));
    let export = sink.get("grid_export").expect("grid_export");
    assert_eq!(export.value, Some(DecodedValue::Number(1234.5)));

    let level = sink.get("battery_level").expect("battery_level");
    assert_eq!(level.value, Some(DecodedValue::Integer(68)));
    assert_eq!(level.icon, "mdi:battery-60");

    let modules = sink.get("bms_module_count").expect("bms_module_count");
    assert_eq!(modules.state().as_deref(), Some("4.0"));

    shutdown_tx.send(true).expect("shutdown");
    let outcome = timeout(Duration::from_secs(5), poller)
        .await
        .expect("poller stops")
        .expect("join");
    assert!(outcome.is_ok());
    timeout(Duration::from_secs(5), publisher)
        .await
        .expect("publisher stops")
        .expect("join");

    // A restart picks the last values back up from the state store.
    let reopened = StateStore::new(&location).await.expect("reopen");
    let stored = reopened.load_all().await.expect("load");
    assert_eq!(stored.len(), MONITORED.len());

    let mut restarted = ReadingSet::from_ids(MONITORED).expect("ids");
    let restored = restarted.restore(&stored);
    assert_eq!(restored.len(), MONITORED.len());
    assert_eq!(
        restarted.value("stat_state"),
        Some(&DecodedValue::Label("Charge".to_string()))
    );
    assert_eq!(restarted.value("battery_level"), Some(&DecodedValue::Integer(68)));
    let level = restored
        .iter()
        .find(|reading| reading.id == "battery_level")
        .expect("battery_level restored");
    assert_eq!(level.icon, "mdi:battery-60");

    drop(reopened);
    cleanup_db(&db_path);
}

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn temp_db_path(prefix: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let pid = std::process::id();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    path.push(format!("{prefix}-{pid}-{ts}.sqlite"));
    path
}

fn cleanup_db(path: &PathBuf) {
    let _ = fs::remove_file(path);
    let wal = PathBuf::from(format!("{}-wal", path.display()));
    let shm = PathBuf::from(format!("{}-shm", path.display()));
    let _ = fs::remove_file(wal);
    let _ = fs::remove_file(shm);
}
