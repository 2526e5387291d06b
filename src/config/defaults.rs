use crate::audit::{DetailLevel, Severity};

use super::schema::{
    AuditConfig, Config, DispatchConfig, RetentionWindow, Simulation, SinksConfig, Thresholds,
};

pub(super) fn default_sampling_interval_ms() -> u64 {
    300_000
}

pub(super) fn default_probe_timeout_ms() -> u64 {
    10_000
}

pub(super) fn default_max_consecutive_misses() -> u32 {
    3
}

pub(super) fn default_cooldown_ms() -> u64 {
    900_000
}

pub(super) fn default_retention_samples() -> usize {
    288
}

pub(super) fn default_consecutive_breaches() -> u32 {
    1
}

pub(super) fn default_threshold_severity() -> Severity {
    Severity::Warning
}

pub(super) fn default_audit_detail_level() -> DetailLevel {
    DetailLevel::Medium
}

pub(super) fn default_audit_retention_days() -> u16 {
    90
}

pub(super) fn default_audit_cache_size() -> usize {
    200
}

pub(super) fn default_audit_store_path() -> String {
    "data/audit_store".to_string()
}

pub(super) fn default_audit_prune_interval_secs() -> u64 {
    24 * 3600
}

pub(super) fn default_sink_console() -> bool {
    true
}

pub(super) fn default_sink_durable_store() -> bool {
    true
}

pub(super) fn default_chat_min_severity() -> Severity {
    Severity::Warning
}

pub(super) fn default_dispatch_queue_capacity() -> usize {
    256
}

pub(super) fn default_dispatch_max_attempts() -> u32 {
    3
}

pub(super) fn default_dispatch_backoff_ms() -> u64 {
    500
}

pub(super) fn default_dispatch_attempt_timeout_ms() -> u64 {
    10_000
}

pub(super) fn default_dispatch_shutdown_grace_ms() -> u64 {
    5_000
}

pub(super) fn default_simulation_server_count() -> usize {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_consecutive_misses: default_max_consecutive_misses(),
            cooldown_ms: default_cooldown_ms(),
            network_capacity_mbit: None,
            retention_window: RetentionWindow::default(),
            thresholds: Thresholds::default(),
            audit: AuditConfig::default(),
            sinks: SinksConfig::default(),
            dispatch: DispatchConfig::default(),
            simulation: Simulation::default(),
        }
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        RetentionWindow::Samples(default_retention_samples())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            detail_level: default_audit_detail_level(),
            retention_days: default_audit_retention_days(),
            cache_size: default_audit_cache_size(),
            store_path: default_audit_store_path(),
            prune_interval_secs: default_audit_prune_interval_secs(),
        }
    }
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            console: default_sink_console(),
            durable_store: default_sink_durable_store(),
            chat_channel: false,
            chat_channel_target: None,
            bot_token: None,
            chat_min_severity: default_chat_min_severity(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_dispatch_queue_capacity(),
            max_attempts: default_dispatch_max_attempts(),
            backoff_ms: default_dispatch_backoff_ms(),
            attempt_timeout_ms: default_dispatch_attempt_timeout_ms(),
            shutdown_grace_ms: default_dispatch_shutdown_grace_ms(),
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            enabled: false,
            server_count: default_simulation_server_count(),
        }
    }
}
