use crate::audit::{AuditEntry, Severity};
use crate::monitor::AlertEvent;

/// Which sinks a notification is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    All,
    /// Console and durable store only.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Alert {
        event: AlertEvent,
        entry: AuditEntry,
        delivery: Delivery,
    },
    Audit {
        entry: AuditEntry,
        delivery: Delivery,
    },
}

impl Notification {
    pub fn alert(event: AlertEvent, entry: AuditEntry) -> Self {
        Notification::Alert {
            event,
            entry,
            delivery: Delivery::All,
        }
    }

    pub fn audit(entry: AuditEntry) -> Self {
        Notification::Audit {
            entry,
            delivery: Delivery::All,
        }
    }

    pub fn with_delivery(mut self, audience: Delivery) -> Self {
        match &mut self {
            Notification::Alert { delivery, .. } | Notification::Audit { delivery, .. } => {
                *delivery = audience;
            }
        }
        self
    }

    pub fn entry(&self) -> &AuditEntry {
        match self {
            Notification::Alert { entry, .. } | Notification::Audit { entry, .. } => entry,
        }
    }

    pub fn delivery(&self) -> Delivery {
        match self {
            Notification::Alert { delivery, .. } | Notification::Audit { delivery, .. } => {
                *delivery
            }
        }
    }

    pub fn severity(&self) -> Severity {
        self.entry().severity
    }

    pub fn is_critical(&self) -> bool {
        self.severity() == Severity::Critical
    }

    /// One-line human text, shared by the console and chat sinks.
    pub fn headline(&self) -> String {
        match self {
            Notification::Alert { event, .. } => event.summary(),
            Notification::Audit { entry, .. } => entry.message.clone(),
        }
    }
}
