use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use state_store::StateStore;
use types::{DecodedValue, PublishedReading};

#[tokio::test]
async fn save_load_and_overwrite() {
    let path = temp_db_path("save_load_and_overwrite");
    let store = StateStore::new(path.to_str().expect("path")).await.expect("init");

    assert!(store
        .save(&reading("grid_import", Some(DecodedValue::Number(812.75)), 1_000))
        .await
        .expect("save"));
    assert!(store
        .save(&reading("grid_export", Some(DecodedValue::Zero), 1_000))
        .await
        .expect("save"));
    assert!(store
        .save(&reading("grid_import", Some(DecodedValue::Zero), 2_000))
        .await
        .expect("save"));

    assert_eq!(store.count().await.expect("count"), 2);

    let stored = store.load_all().await.expect("load");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].reading_id, "grid_export");
    assert_eq!(stored[1].reading_id, "grid_import");
    assert_eq!(stored[1].value, DecodedValue::Zero);
    assert_eq!(stored[1].updated_at_ms, 2_000);
    assert_eq!(stored[1].icon.as_deref(), Some("mdi:test"));

    drop(store);
    cleanup_db(&path);
}

#[tokio::test]
async fn unknown_readings_are_not_persisted() {
    let path = temp_db_path("unknown_readings_are_not_persisted");
    let store = StateStore::new(path.to_str().expect("path")).await.expect("init");

    assert!(!store
        .save(&reading("stat_state", None, 1_000))
        .await
        .expect("save"));
    assert_eq!(store.count().await.expect("count"), 0);

    drop(store);
    cleanup_db(&path);
}

#[tokio::test]
async fn values_survive_reopen() {
    let path = temp_db_path("values_survive_reopen");
    let location = path.to_str().expect("path").to_string();

    let store = StateStore::new(&location).await.expect("init");
    store
        .save(&reading(
            "stat_state",
            Some(DecodedValue::Label("Charge".to_string())),
            5_000,
        ))
        .await
        .expect("save");
    store
        .save(&reading("battery_level", Some(DecodedValue::Integer(68)), 5_000))
        .await
        .expect("save");
    drop(store);

    let reopened = StateStore::new(&location).await.expect("reopen");
    let stored = reopened.load_all().await.expect("load");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].value, DecodedValue::Integer(68));
    assert_eq!(stored[1].value, DecodedValue::Label("Charge".to_string()));

    drop(reopened);
    cleanup_db(&path);
}

fn reading(id: &str, value: Option<DecodedValue>, updated_at_ms: u64) -> PublishedReading {
    PublishedReading {
        id: id.to_string(),
        name: format!("Senec {id}"),
        value,
        unit: None,
        icon: "mdi:test".to_string(),
        updated_at_ms,
    }
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
    let _ = std::fs::remove_file(path);
    let wal = PathBuf::from(format!("{}-wal", path.display()));
    let shm = PathBuf::from(format!("{}-shm", path.display()));
    let _ = std::fs::remove_file(wal);
    let _ = std::fs::remove_file(shm);
}
