use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// How much entry metadata survives into the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Minimal,
    Medium,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SystemStartup,
    SystemShutdown,
    ConfigReloaded,
    ConfigReloadRejected,
    UserAction,
    ServerStarted,
    ServerStopped,
    ServerRestarted,
    ServerOffline,
    ServerRecovered,
    AlertFired,
    AlertRepeated,
    AlertCleared,
    DispatchFailed,
    ProbeFailed,
}

impl AuditAction {
    pub const ALL: [AuditAction; 15] = [
        AuditAction::SystemStartup,
        AuditAction::SystemShutdown,
        AuditAction::ConfigReloaded,
        AuditAction::ConfigReloadRejected,
        AuditAction::UserAction,
        AuditAction::ServerStarted,
        AuditAction::ServerStopped,
        AuditAction::ServerRestarted,
        AuditAction::ServerOffline,
        AuditAction::ServerRecovered,
        AuditAction::AlertFired,
        AuditAction::AlertRepeated,
        AuditAction::AlertCleared,
        AuditAction::DispatchFailed,
        AuditAction::ProbeFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SystemStartup => "system_startup",
            AuditAction::SystemShutdown => "system_shutdown",
            AuditAction::ConfigReloaded => "config_reloaded",
            AuditAction::ConfigReloadRejected => "config_reload_rejected",
            AuditAction::UserAction => "user_action",
            AuditAction::ServerStarted => "server_started",
            AuditAction::ServerStopped => "server_stopped",
            AuditAction::ServerRestarted => "server_restarted",
            AuditAction::ServerOffline => "server_offline",
            AuditAction::ServerRecovered => "server_recovered",
            AuditAction::AlertFired => "alert_fired",
            AuditAction::AlertRepeated => "alert_repeated",
            AuditAction::AlertCleared => "alert_cleared",
            AuditAction::DispatchFailed => "dispatch_failed",
            AuditAction::ProbeFailed => "probe_failed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        AuditAction::ALL
            .into_iter()
            .find(|action| action.as_str() == needle)
            .ok_or_else(|| format!("unknown audit action: {s}"))
    }
}

/// Immutable once `id` is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub action: AuditAction,
    pub severity: Severity,
    pub actor: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// An entry as handed to the recorder, before it gets an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub severity: Severity,
    pub actor: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub metadata: Value,
}

impl NewAuditEntry {
    pub fn new(action: AuditAction, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            action,
            severity,
            actor: None,
            subject: None,
            message: message.into(),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub id: Option<u64>,
    pub actor: Option<String>,
    pub action: Option<AuditAction>,
    /// Minimum severity.
    pub severity: Option<Severity>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.id.is_none_or(|id| entry.id == id)
            && self
                .actor
                .as_deref()
                .is_none_or(|actor| entry.actor.as_deref() == Some(actor))
            && self.action.is_none_or(|action| entry.action == action)
            && self.severity.is_none_or(|severity| entry.severity >= severity)
            && self.since.is_none_or(|since| entry.created_at >= since)
            && self.until.is_none_or(|until| entry.created_at <= until)
    }
}
