use std::env;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use senec_app::config::parse_conditions;
use senec_app::SenecConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const SENEC_VARS: &[&str] = &[
    "SENEC_CONFIG",
    "SENEC_HOST",
    "SENEC_SCAN_INTERVAL_MS",
    "SENEC_MONITORED_CONDITIONS",
    "SENEC_TIMEOUT_MS",
    "SENEC_RETRY_COUNT",
    "SENEC_JITTER_MS",
    "SENEC_STATE_PATH",
    "SENEC_HTTP_BIND",
];

#[test]
fn toml_config_validates() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("SENEC_CONFIG", fixture_path("config-valid.toml"));

    let config = SenecConfig::load().expect("load config");
    config.validate().expect("validate config");
    assert_eq!(config.host(), "192.168.178.40");
    assert_eq!(config.poller.poll_interval, Duration::from_millis(15_000));
    assert_eq!(config.poller.jitter_ms, 250);
    assert_eq!(config.client.timeout_ms, 3_000);
    assert_eq!(config.client.retry_count, 1);
    assert_eq!(config.monitored_conditions.len(), 5);
    assert_eq!(config.state_path, "/var/lib/senec/state.sqlite");
    assert_eq!(config.http_bind, "127.0.0.1:8089");

    clear_env();
}

#[test]
fn json_config_validates_with_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("SENEC_CONFIG", fixture_path("config-valid.json"));

    let config = SenecConfig::load().expect("load config");
    config.validate().expect("validate config");
    assert_eq!(config.host(), "senec.local");
    assert_eq!(config.poller.poll_interval, Duration::from_secs(10));
    assert_eq!(config.client.retry_count, 0);
    assert_eq!(
        config.monitored_conditions.len(),
        senec_decoder::reading_specs().len()
    );

    clear_env();
}

#[test]
fn invalid_config_fails_validation() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("SENEC_CONFIG", fixture_path("config-invalid.toml"));

    let config = SenecConfig::load().expect("load config");
    assert!(config.validate().is_err());

    env::set_var("SENEC_SCAN_INTERVAL_MS", "10000");
    let config = SenecConfig::load().expect("load config");
    let err = config.validate().expect_err("unknown reading");
    assert!(err.to_string().contains("wind_power"));

    clear_env();
}

#[test]
fn missing_host_fails_validation() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();

    let config = SenecConfig::load().expect("load config");
    let err = config.validate().expect_err("host required");
    assert!(err.to_string().contains("senec.host"));
}

#[test]
fn env_overrides_file_values() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("SENEC_CONFIG", fixture_path("config-valid.toml"));
    env::set_var("SENEC_HOST", "10.0.0.7:8080");
    env::set_var("SENEC_MONITORED_CONDITIONS", "grid_import, grid_export,,");
    env::set_var("SENEC_HTTP_BIND", "not-an-address");

    let config = SenecConfig::load().expect("load config");
    assert_eq!(config.host(), "10.0.0.7:8080");
    assert_eq!(config.monitored_conditions, vec!["grid_import", "grid_export"]);
    assert!(config.validate().is_err());

    env::set_var("SENEC_HTTP_BIND", "127.0.0.1:0");
    let config = SenecConfig::load().expect("load config");
    config.validate().expect("validate config");

    clear_env();
}

#[test]
fn conditions_parse_trims_and_drops_blanks() {
    assert_eq!(parse_conditions(" a ,b,, c"), vec!["a", "b", "c"]);
    assert!(parse_conditions(" , ").is_empty());
}

fn clear_env() {
    for key in SENEC_VARS {
        env::remove_var(key);
    }
}

fn fixture_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path.to_string_lossy().to_string()
}
