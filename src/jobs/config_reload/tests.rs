use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::audit::{AuditAction, Severity};
use crate::config::{RuntimeConfig, load_config};
use crate::engine::{Engine, EngineParts};
use crate::monitor::{ScriptedHostProbe, ScriptedResourceProvider};

use super::{apply_runtime_reload_from_path, reload_and_record};

fn config_toml(sampling_interval_ms: u64, cpu_enter: f32, cpu_clear: f32) -> String {
    format!(
        r#"sampling_interval_ms = {sampling_interval_ms}
cooldown_ms = 600000
probe_timeout_ms = 2000

[thresholds.cpu]
enter_value = {cpu_enter}
clear_value = {cpu_clear}
consecutive_breaches = 2

[thresholds.memory]
enter_value = 90.0

[sinks]
console = false
durable_store = false
"#
    )
}

fn engine_for(config_path: &Path) -> Engine {
    let config = load_config(config_path).expect("initial config should load");
    let parts = EngineParts {
        host_probe: Box::new(ScriptedHostProbe::new(Vec::new())),
        provider: Box::new(ScriptedResourceProvider::new(Vec::new())),
        store: None,
        sinks: Vec::new(),
    };
    Engine::new(config, Some(config_path.to_path_buf()), parts).expect("engine should build")
}

#[tokio::test]
async fn hot_reload_applies_valid_runtime_changes_without_restart() {
    let temp = tempdir().expect("tempdir should be created");
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, config_toml(60_000, 85.0, 70.0))
        .expect("initial config should be written");
    let engine = engine_for(&config_path);

    fs::write(&config_path, config_toml(5_000, 72.5, 60.0))
        .expect("updated config should be written");

    let applied = apply_runtime_reload_from_path(engine.context(), &config_path)
        .await
        .expect("valid hot-reload should apply");
    assert_eq!(applied.sampling_interval_ms, 5_000);

    let current = engine.current_runtime_config().await;
    let cpu = current.thresholds.cpu.as_ref().expect("cpu threshold");
    assert_eq!(current.sampling_interval_ms, 5_000);
    assert!((cpu.enter_value - 72.5).abs() < f32::EPSILON);
    assert!((cpu.effective_clear_value() - 60.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn hot_reload_rejects_invalid_config_and_preserves_last_runtime() {
    let temp = tempdir().expect("tempdir should be created");
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, config_toml(60_000, 85.0, 70.0))
        .expect("initial config should be written");
    let engine = engine_for(&config_path);
    let expected: RuntimeConfig = engine.current_runtime_config().await;

    fs::write(&config_path, config_toml(10, 72.5, 60.0))
        .expect("invalid config should be written");

    let error = apply_runtime_reload_from_path(engine.context(), &config_path)
        .await
        .expect_err("invalid config should be rejected");
    assert!(error.contains("sampling_interval_ms must be at least 1000"));

    let current = engine.current_runtime_config().await;
    assert_eq!(current.sampling_interval_ms, expected.sampling_interval_ms);
    assert_eq!(
        current.thresholds.cpu.map(|cpu| cpu.enter_value),
        expected.thresholds.cpu.map(|cpu| cpu.enter_value)
    );
}

#[tokio::test]
async fn every_reload_attempt_is_audited() {
    let temp = tempdir().expect("tempdir should be created");
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, config_toml(60_000, 85.0, 70.0))
        .expect("initial config should be written");
    let engine = engine_for(&config_path);

    fs::write(&config_path, config_toml(30_000, 80.0, 65.0))
        .expect("updated config should be written");
    let applied = reload_and_record(engine.context(), &config_path).await;
    assert_eq!(applied.action, AuditAction::ConfigReloaded);
    assert_eq!(applied.severity, Severity::Info);
    assert_eq!(applied.metadata["sampling_interval_ms"], 30_000);

    fs::write(&config_path, config_toml(30_000, 60.0, 75.0))
        .expect("invalid config should be written");
    let rejected = reload_and_record(engine.context(), &config_path).await;
    assert_eq!(rejected.action, AuditAction::ConfigReloadRejected);
    assert_eq!(rejected.severity, Severity::Warning);
    assert!(
        rejected.metadata["error"]
            .as_str()
            .is_some_and(|error| error.contains("clear_value must not exceed enter_value"))
    );

    assert_eq!(engine.current_runtime_config().await.sampling_interval_ms, 30_000);
}
