// medallion-core/src/domain/mod.rs

pub mod aggregation;
pub mod canonical;
pub mod config;
pub mod error;
pub mod graph;
pub mod quality;
pub mod reconciliation;
pub mod record;
pub mod run;
pub mod schema;
pub mod validation;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use error::{DomainError, RunError};
