mod core;
mod mute;
mod snapshot;

pub use core::{Monitor, TickReport};
pub use mute::MuteActionError;
pub use snapshot::{AlertKeySnapshot, AlertSnapshot, EntityPresenceSnapshot};
