// medallion-core/src/application/audit_query.rs

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::config::RejectionKind;
use crate::domain::run::{Layer, RowCounts, RunId, RunMetadata, RunStatus};
use crate::error::MedallionError;
use crate::infrastructure::adapters::DuckDbAuditStore;
use crate::infrastructure::config::load_project_config;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::audit::{AuditFilter, AuditQuery};

pub const AUDIT_DB_FILE: &str = "audit.duckdb";

pub fn audit_db_path(target_dir: &Path) -> PathBuf {
    target_dir.join(AUDIT_DB_FILE)
}

/// Opens the audit trail of an existing project. Never creates one.
pub fn open_audit_store(project_dir: &Path) -> Result<DuckDbAuditStore, MedallionError> {
    let config = load_project_config(project_dir)?;
    let path = audit_db_path(&project_dir.join(&config.target_path));
    if !path.exists() {
        return Err(InfrastructureError::ConfigError(format!(
            "No audit trail at {:?}. Run the pipeline first.",
            path
        ))
        .into());
    }
    Ok(DuckDbAuditStore::new(&path.to_string_lossy())?)
}

/// One line per run, as shown by `medallion audit runs`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub counts: RowCounts,
    pub error: Option<String>,
    /// Rejections per (table, kind).
    pub rejections: BTreeMap<(String, RejectionKind), u64>,
}

impl RunSummary {
    pub fn rejected_total(&self) -> u64 {
        self.rejections.values().sum()
    }
}

/// Folds metadata rows and rejections into per-run summaries, newest first.
/// Runs without a whole-run row (other writers) are summarized from their
/// stage rows.
pub async fn summarize_runs(
    audit: &dyn AuditQuery,
    filter: &AuditFilter,
) -> Result<Vec<RunSummary>, MedallionError> {
    let rows = audit.runs(filter).await?;

    let mut by_run: BTreeMap<RunId, Vec<RunMetadata>> = BTreeMap::new();
    for row in rows {
        by_run.entry(row.run_id).or_default().push(row);
    }

    let mut summaries = Vec::with_capacity(by_run.len());
    for (run_id, rows) in by_run.into_iter().rev() {
        let rejected = audit
            .rejections(&AuditFilter {
                run_id: Some(run_id),
                ..Default::default()
            })
            .await?;
        let mut rejections = BTreeMap::new();
        for r in rejected {
            *rejections
                .entry((r.item.table.clone(), r.item.kind))
                .or_insert(0) += 1;
        }

        let whole = rows.iter().find(|r| r.layer == Layer::Pipeline);
        let started_at = rows
            .iter()
            .map(|r| r.started_at)
            .min()
            .unwrap_or_default();
        let summary = match whole {
            Some(row) => RunSummary {
                run_id,
                status: row.status,
                started_at,
                duration_ms: row.duration_ms,
                counts: row.counts,
                error: row.error.clone(),
                rejections,
            },
            None => RunSummary {
                run_id,
                status: stage_status(&rows),
                started_at,
                duration_ms: None,
                counts: silver_counts(&rows),
                error: rows.iter().find_map(|r| r.error.clone()),
                rejections,
            },
        };
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Most recent run id in the trail.
pub async fn latest_run(audit: &dyn AuditQuery) -> Result<Option<RunId>, MedallionError> {
    let rows = audit.runs(&AuditFilter::default()).await?;
    Ok(rows.iter().map(|r| r.run_id).max())
}

fn stage_status(rows: &[RunMetadata]) -> RunStatus {
    if rows.iter().any(|r| r.status == RunStatus::Failed) {
        RunStatus::Failed
    } else if rows.iter().any(|r| r.status == RunStatus::Running) {
        RunStatus::Running
    } else if rows.iter().any(|r| r.status == RunStatus::Published) {
        RunStatus::Published
    } else {
        RunStatus::Succeeded
    }
}

fn silver_counts(rows: &[RunMetadata]) -> RowCounts {
    rows.iter()
        .filter(|r| r.layer == Layer::Silver)
        .fold(RowCounts::default(), |mut acc, r| {
            acc.read += r.counts.read;
            acc.validated += r.counts.validated;
            acc.rejected += r.counts.rejected;
            acc.written += r.counts.written;
            acc
        })
}
