// medallion-core/src/ports/audit.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::quality::QualityCheckResult;
use crate::domain::run::{Layer, RunId, RunMetadata, RunOutcome};
use crate::domain::validation::RejectedRow;
use crate::error::MedallionError;

/// Append-only sink for the audit trail.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// Next run id: strictly greater than every id the store has seen.
    async fn allocate_run_id(&self) -> Result<RunId, MedallionError>;

    /// Opens the metadata row for (run_id, layer, table).
    /// Fails with `RunError::DuplicateRun` if that row already exists.
    async fn begin_run(&self, run_id: RunId, layer: Layer, table: &str) -> Result<(), MedallionError>;

    /// Closes a metadata row. Finalized rows are immutable.
    async fn finalize_run(
        &self,
        run_id: RunId,
        layer: Layer,
        table: &str,
        outcome: RunOutcome,
    ) -> Result<(), MedallionError>;

    async fn record_rejections(&self, rows: &[RejectedRow]) -> Result<(), MedallionError>;

    async fn record_rejection(&self, row: &RejectedRow) -> Result<(), MedallionError> {
        self.record_rejections(std::slice::from_ref(row)).await
    }

    async fn record_quality_checks(&self, results: &[QualityCheckResult]) -> Result<(), MedallionError>;

    async fn record_quality_check(&self, result: &QualityCheckResult) -> Result<(), MedallionError> {
        self.record_quality_checks(std::slice::from_ref(result)).await
    }
}

/// Operator-side filter. Every criterion is optional; the date range is
/// inclusive and applies to the recording time (start time for runs).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub run_id: Option<RunId>,
    pub table: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recorded<T> {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub item: T,
}

#[async_trait]
pub trait AuditQuery: Send + Sync {
    async fn rejections(&self, filter: &AuditFilter) -> Result<Vec<Recorded<RejectedRow>>, MedallionError>;

    async fn quality_checks(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<Recorded<QualityCheckResult>>, MedallionError>;

    async fn runs(&self, filter: &AuditFilter) -> Result<Vec<RunMetadata>, MedallionError>;
}
