// medallion-core/src/ports/mod.rs

// Contracts the application needs, without knowing how they are fulfilled.

pub mod audit;
pub mod publisher;
pub mod source;

pub use audit::{AuditFilter, AuditQuery, AuditRecorder, Recorded};
pub use publisher::{AggregateStore, SnapshotPublisher, ValidatedStore};
pub use source::RawSource;
