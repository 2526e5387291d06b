use teloxide::types::ChatId;
use thiserror::Error;

use super::schema::{Config, RetentionWindow, ThresholdConfig};

const MIN_SAMPLING_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Validation(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_interval_ms < MIN_SAMPLING_INTERVAL_MS {
            return Err(ConfigError::Validation(format!(
                "sampling_interval_ms must be at least {}",
                MIN_SAMPLING_INTERVAL_MS
            )));
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "probe_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_consecutive_misses == 0 {
            return Err(ConfigError::Validation(
                "max_consecutive_misses must be at least 1".to_string(),
            ));
        }
        if self.cooldown_ms == 0 {
            return Err(ConfigError::Validation(
                "cooldown_ms must be greater than 0".to_string(),
            ));
        }
        match self.retention_window {
            RetentionWindow::Samples(0) => {
                return Err(ConfigError::Validation(
                    "retention_window.samples must be greater than 0".to_string(),
                ));
            }
            RetentionWindow::DurationSecs(0) => {
                return Err(ConfigError::Validation(
                    "retention_window.duration_secs must be greater than 0".to_string(),
                ));
            }
            _ => {}
        }

        for (metric, threshold) in self.thresholds.configured() {
            validate_threshold(&format!("thresholds.{}", metric), threshold)?;
        }

        if self.audit.retention_days == 0 {
            return Err(ConfigError::Validation(
                "audit.retention_days must be greater than 0".to_string(),
            ));
        }
        if self.audit.cache_size == 0 {
            return Err(ConfigError::Validation(
                "audit.cache_size must be greater than 0".to_string(),
            ));
        }
        if self.audit.prune_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "audit.prune_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sinks.durable_store && self.audit.store_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "audit.store_path must not be empty when sinks.durable_store is true".to_string(),
            ));
        }

        if self.sinks.chat_channel {
            self.chat_channel_id()?;
            let token_missing = self
                .sinks
                .bot_token
                .as_deref()
                .map(|token| token.trim().is_empty())
                .unwrap_or(true);
            if token_missing {
                return Err(ConfigError::Validation(
                    "sinks.bot_token is required when sinks.chat_channel is true".to_string(),
                ));
            }
        }

        if self.dispatch.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "dispatch.queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "dispatch.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.dispatch.attempt_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "dispatch.attempt_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parses `sinks.chat_channel_target` into a Telegram chat id.
    pub fn chat_channel_id(&self) -> Result<ChatId, ConfigError> {
        let target = self
            .sinks
            .chat_channel_target
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
            .ok_or_else(|| {
                ConfigError::Validation(
                    "sinks.chat_channel_target is required when sinks.chat_channel is true"
                        .to_string(),
                )
            })?;

        let chat_id = target.parse::<i64>().map_err(|_| {
            ConfigError::Validation(format!(
                "sinks.chat_channel_target '{}' is not a valid chat id",
                target
            ))
        })?;
        Ok(ChatId(chat_id))
    }
}

fn validate_threshold(field: &str, threshold: &ThresholdConfig) -> Result<(), ConfigError> {
    validate_percentage(&format!("{}.enter_value", field), threshold.enter_value)?;
    if let Some(clear_value) = threshold.clear_value {
        validate_percentage(&format!("{}.clear_value", field), clear_value)?;
        if clear_value > threshold.enter_value {
            return Err(ConfigError::Validation(format!(
                "{}.clear_value must not exceed enter_value",
                field
            )));
        }
    }
    if threshold.consecutive_breaches == 0 {
        return Err(ConfigError::Validation(format!(
            "{}.consecutive_breaches must be at least 1",
            field
        )));
    }
    Ok(())
}

fn validate_percentage(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_nan() || !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 0 and 100",
            field
        )));
    }
    Ok(())
}
