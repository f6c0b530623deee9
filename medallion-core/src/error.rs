// medallion-core/src/error.rs

use crate::domain::error::{DomainError, RunError};
use crate::infrastructure::error::InfrastructureError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum MedallionError {
    // --- ERREURS DU DOMAINE (Taxonomie, Cycles, Schéma) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS DE RUN (Réconciliation, Timeout, Concurrence) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Run(#[from] RunError),

    // --- ERREURS D'INFRASTRUCTURE (IO, Parsing, DuckDB) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- ERREURS GÉNÉRIQUES / APPLICATIVES ---
    #[error("Internal Error: {0}")]
    InternalError(String),

    #[error("Unsafe path traversal detected: {0}")]
    UnsafePath(String),
}

impl MedallionError {
    /// The run-level error behind this one, if any.
    pub fn as_run_error(&self) -> Option<&RunError> {
        match self {
            Self::Run(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MedallionError {
    fn from(err: std::io::Error) -> Self {
        MedallionError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<duckdb::Error> for MedallionError {
    fn from(err: duckdb::Error) -> Self {
        MedallionError::Infrastructure(err.into())
    }
}
