pub mod app_context;
pub mod audit;
pub mod audit_store;
pub mod config;
pub mod dispatch;
pub mod engine;
mod jobs;
pub mod monitor;

pub use engine::{Engine, EngineError, EngineParts};
