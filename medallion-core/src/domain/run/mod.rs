// medallion-core/src/domain/run/mod.rs

pub mod context;
pub mod id;
pub mod metadata;
pub mod state;

pub use context::RunContext;
pub use id::RunId;
pub use metadata::{Layer, RowCounts, RunMetadata, RunOutcome, RunStatus};
pub use state::RunState;
