mod cache;
mod detail;
mod model;
mod recorder;

pub use cache::RecentAuditCache;
pub use model::{AuditAction, AuditEntry, AuditFilter, DetailLevel, NewAuditEntry, Severity};
pub use recorder::AuditRecorder;

#[cfg(test)]
mod tests;
