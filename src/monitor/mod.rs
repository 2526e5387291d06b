mod evaluator;
mod history;
mod model;
mod presence;
mod provider;
mod service;
mod state;

pub use history::{HistoryStore, MetricHistory};
pub use model::{
    AlertEvent, AlertKey, AlertTransition, EntityId, EntityReading, EntityStatus, Metric,
    MetricSample, ResourceUsage,
};
pub use presence::{Presence, PresenceChange, PresenceTracker};
pub use provider::{
    HostProbe, NoResourceProvider, ProbeError, ResourceProvider, SimulatedHostProbe,
    SimulatedResourceProvider, SystemHostProbe,
};
pub use service::{
    AlertKeySnapshot, AlertSnapshot, EntityPresenceSnapshot, Monitor, MuteActionError, TickReport,
};
pub use state::{AlertBook, AlertState, CooldownTracker};

#[cfg(test)]
pub(crate) use provider::{ScriptedHostProbe, ScriptedResourceProvider, usage};
