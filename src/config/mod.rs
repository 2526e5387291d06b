mod defaults;
mod io;
mod schema;
mod validate;

pub use io::load_config;
pub use schema::{
    AuditConfig, Config, DispatchConfig, RetentionWindow, RuntimeConfig, Simulation, SinksConfig,
    ThresholdConfig, Thresholds,
};
pub use validate::ConfigError;
