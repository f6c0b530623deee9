// medallion-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::run::{Layer, RunId, RunState};

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Circular dependency detected involving: {0}")]
    #[diagnostic(
        code(medallion::domain::cycle),
        help("Check the foreign keys declared between entities.")
    )]
    CircularDependency(String),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(medallion::domain::config))]
    ConfigurationError(String),

    #[error("Rejection taxonomy Error: {0}")]
    #[diagnostic(
        code(medallion::domain::taxonomy),
        help("Every reason code must be mapped to a kind its validation stage can produce.")
    )]
    TaxonomyError(String),

    #[error("Schema Error: {0}")]
    #[diagnostic(code(medallion::domain::schema))]
    SchemaError(String),
}

/// Run-level failures. Any of these marks the run FAILED and leaves the
/// previously published snapshot in place.
#[derive(Error, Debug, Diagnostic)]
pub enum RunError {
    #[error(
        "Reconciliation failed on '{metric}': validated={validated}, aggregated={aggregated}, variance={variance} > tolerance={tolerance}"
    )]
    #[diagnostic(
        code(medallion::run::reconciliation),
        help("Aggregates diverged from validated totals. Nothing was published.")
    )]
    Reconciliation {
        metric: String,
        validated: String,
        aggregated: String,
        variance: String,
        tolerance: String,
    },

    #[error("Run {run_id} exceeded its {secs}s budget during {state}")]
    #[diagnostic(
        code(medallion::run::timeout),
        help("Raise `pipeline.run_timeout_secs` or reduce the input volume.")
    )]
    Timeout {
        run_id: RunId,
        secs: u64,
        state: RunState,
    },

    #[error("A {layer} run is already active")]
    #[diagnostic(
        code(medallion::run::in_progress),
        help("Wait for the active run to finish before starting another one.")
    )]
    RunInProgress { layer: Layer },

    #[error("Run {run_id} already has metadata for ({layer}, {table})")]
    #[diagnostic(code(medallion::run::duplicate))]
    DuplicateRun {
        run_id: RunId,
        layer: Layer,
        table: String,
    },

    #[error("Run {run_id} ({layer}, {table}) is already finalized")]
    #[diagnostic(code(medallion::run::finalized))]
    RunAlreadyFinalized {
        run_id: RunId,
        layer: Layer,
        table: String,
    },

    #[error("No metadata for run {run_id} ({layer}, {table})")]
    #[diagnostic(code(medallion::run::unknown))]
    UnknownRun {
        run_id: RunId,
        layer: Layer,
        table: String,
    },

    #[error("Invalid run transition {from} -> {to}")]
    #[diagnostic(code(medallion::run::transition))]
    InvalidTransition { from: RunState, to: RunState },
}
