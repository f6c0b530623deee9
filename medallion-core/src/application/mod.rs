// medallion-core/src/application/mod.rs

pub mod audit_query;
pub mod clean;
pub mod guard;
pub mod pipeline;

// --- RE-EXPORTS (FACADE PATTERN) ---
// `use medallion_core::application::{run_project, clean_project, Pipeline};`
// sans connaître la structure interne des fichiers.

pub use audit_query::{RunSummary, latest_run, open_audit_store, summarize_runs};
pub use clean::clean_project;
pub use guard::{ActiveRuns, RunGuard};
pub use pipeline::{Pipeline, RunReport, run_project};
