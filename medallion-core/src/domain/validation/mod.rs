// medallion-core/src/domain/validation/mod.rs

pub mod dedup;
pub mod engine;
pub mod rejection;
pub mod scoring;
pub mod silver;

pub use engine::{RowCheck, ValidationEngine};
pub use rejection::{Classifier, RejectedRow, Rejection, ValidationStage};
pub use scoring::ScoringTable;
pub use silver::{EntityOutcome, KeyIndex, SilverSnapshot, Validated};
