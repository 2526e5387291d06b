use serde::Deserialize;

use crate::audit::{DetailLevel, Severity};
use crate::monitor::Metric;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_max_consecutive_misses")]
    pub max_consecutive_misses: u32,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub network_capacity_mbit: Option<u64>,
    #[serde(default)]
    pub retention_window: RetentionWindow,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub sinks: SinksConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub simulation: Simulation,
}

/// The subset of [`Config`] that can change through a hot reload.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub sampling_interval_ms: u64,
    pub cooldown_ms: u64,
    pub thresholds: Thresholds,
}

impl RuntimeConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sampling_interval_ms: config.sampling_interval_ms,
            cooldown_ms: config.cooldown_ms,
            thresholds: config.thresholds.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionWindow {
    Samples(usize),
    DurationSecs(u64),
}

impl RetentionWindow {
    /// Number of samples kept per series at the given sampling interval.
    pub fn capacity(&self, sampling_interval_ms: u64) -> usize {
        match *self {
            RetentionWindow::Samples(count) => count.max(1),
            RetentionWindow::DurationSecs(secs) => {
                let interval_secs = (sampling_interval_ms / 1000).max(1);
                (secs / interval_secs).max(1) as usize
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub cpu: Option<ThresholdConfig>,
    #[serde(default)]
    pub memory: Option<ThresholdConfig>,
    #[serde(default)]
    pub disk: Option<ThresholdConfig>,
    #[serde(default)]
    pub network: Option<ThresholdConfig>,
}

impl Thresholds {
    pub fn for_metric(&self, metric: Metric) -> Option<&ThresholdConfig> {
        match metric {
            Metric::Cpu => self.cpu.as_ref(),
            Metric::Memory => self.memory.as_ref(),
            Metric::Disk => self.disk.as_ref(),
            Metric::Network => self.network.as_ref(),
        }
    }

    pub fn configured(&self) -> impl Iterator<Item = (Metric, &ThresholdConfig)> {
        Metric::ALL
            .into_iter()
            .filter_map(|metric| self.for_metric(metric).map(|threshold| (metric, threshold)))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThresholdConfig {
    pub enter_value: f32,
    #[serde(default)]
    pub clear_value: Option<f32>,
    #[serde(default = "default_consecutive_breaches")]
    pub consecutive_breaches: u32,
    #[serde(default = "default_threshold_severity")]
    pub severity: Severity,
}

impl ThresholdConfig {
    pub fn effective_clear_value(&self) -> f32 {
        self.clear_value.unwrap_or(self.enter_value)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_detail_level")]
    pub detail_level: DetailLevel,
    #[serde(default = "default_audit_retention_days")]
    pub retention_days: u16,
    #[serde(default = "default_audit_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_audit_store_path")]
    pub store_path: String,
    #[serde(default = "default_audit_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinksConfig {
    #[serde(default = "default_sink_console")]
    pub console: bool,
    #[serde(default = "default_sink_durable_store")]
    pub durable_store: bool,
    #[serde(default)]
    pub chat_channel: bool,
    #[serde(default)]
    pub chat_channel_target: Option<String>,
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_chat_min_severity")]
    pub chat_min_severity: Severity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_dispatch_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_dispatch_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_dispatch_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_dispatch_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_dispatch_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_simulation_server_count")]
    pub server_count: usize,
}
