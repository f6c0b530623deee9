// medallion-core/src/domain/config/mod.rs

pub mod configuration;
pub mod taxonomy;

pub use configuration::{AggregationConfig, EntityRules, PipelineConfig, ProjectConfig};
pub use taxonomy::{ReasonSpec, RejectionKind, RejectionTaxonomy};
