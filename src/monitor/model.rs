use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::Severity;

const HOST_ENTITY_ID: &str = "host";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Cpu, Metric::Memory, Metric::Disk, Metric::Network];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
            Metric::Network => "network",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cpu => "CPU",
            Metric::Memory => "Memory",
            Metric::Disk => "Disk",
            Metric::Network => "Network",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn host() -> Self {
        Self(HOST_ENTITY_ID.to_string())
    }

    pub fn is_host(&self) -> bool {
        self.0 == HOST_ENTITY_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub entity_id: EntityId,
    pub metric: Metric,
    pub value: f32,
    pub taken_at: DateTime<Utc>,
}

/// One probe reading, already normalized to percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub cpu: f32,
    pub memory: f32,
    pub disk: f32,
    pub network: Option<f32>,
}

impl ResourceUsage {
    pub fn values(&self) -> impl Iterator<Item = (Metric, f32)> {
        [
            Some((Metric::Cpu, self.cpu)),
            Some((Metric::Memory, self.memory)),
            Some((Metric::Disk, self.disk)),
            self.network.map(|value| (Metric::Network, value)),
        ]
        .into_iter()
        .flatten()
        .filter(|(_, value)| value.is_finite())
        .map(|(metric, value)| (metric, value.clamp(0.0, 100.0)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Running,
    Starting,
    Stopping,
    Offline,
}

/// What the resource provider reports for one managed service.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityReading {
    pub entity_id: EntityId,
    pub name: String,
    pub status: EntityStatus,
    pub usage: Option<ResourceUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertKey {
    pub entity_id: EntityId,
    pub metric: Metric,
}

impl AlertKey {
    pub fn new(entity_id: EntityId, metric: Metric) -> Self {
        Self { entity_id, metric }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_id, self.metric)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTransition {
    Fired,
    Repeated,
    Cleared,
}

impl AlertTransition {
    /// Edges between idle and active are never suppressed by cooldown.
    pub fn is_edge(&self) -> bool {
        matches!(self, AlertTransition::Fired | AlertTransition::Cleared)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub key: AlertKey,
    pub transition: AlertTransition,
    pub severity: Severity,
    pub value: f32,
    pub threshold: f32,
    pub first_breach_at: DateTime<Utc>,
    pub fired_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn summary(&self) -> String {
        let subject = if self.key.entity_id.is_host() {
            self.key.metric.label().to_string()
        } else {
            format!("{} {}", self.key.entity_id, self.key.metric.label())
        };

        match self.transition {
            AlertTransition::Fired => format!(
                "{} usage is high ({:.1}% > {:.1}%)",
                subject, self.value, self.threshold
            ),
            AlertTransition::Repeated => format!(
                "{} usage is still high ({:.1}% > {:.1}%)",
                subject, self.value, self.threshold
            ),
            AlertTransition::Cleared => format!(
                "{} usage is back to normal ({:.1}% <= {:.1}%)",
                subject, self.value, self.threshold
            ),
        }
    }
}
