// medallion-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Config, Connection, params, params_from_iter};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

// Imports Hexagonaux
use crate::domain::error::RunError;
use crate::domain::quality::QualityCheckResult;
use crate::domain::run::{Layer, RowCounts, RunId, RunMetadata, RunOutcome, RunStatus};
use crate::domain::validation::RejectedRow;
use crate::error::MedallionError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::audit::{AuditFilter, AuditQuery, AuditRecorder, Recorded};

const AUDIT_DDL: &str = "
CREATE TABLE IF NOT EXISTS audit_run_metadata (
    run_id          BIGINT  NOT NULL,
    layer           VARCHAR NOT NULL,
    table_name      VARCHAR NOT NULL,
    status          VARCHAR NOT NULL,
    rows_read       BIGINT  NOT NULL DEFAULT 0,
    rows_validated  BIGINT  NOT NULL DEFAULT 0,
    rows_rejected   BIGINT  NOT NULL DEFAULT 0,
    rows_written    BIGINT  NOT NULL DEFAULT 0,
    data_checksum   VARCHAR,
    started_at      BIGINT  NOT NULL,
    finished_at     BIGINT,
    duration_ms     BIGINT,
    error           VARCHAR,
    PRIMARY KEY (run_id, layer, table_name)
);
CREATE TABLE IF NOT EXISTS audit_rejected_rows (
    run_id       BIGINT  NOT NULL,
    table_name   VARCHAR NOT NULL,
    batch_id     VARCHAR NOT NULL,
    seq          BIGINT  NOT NULL,
    payload      VARCHAR NOT NULL,
    reason       VARCHAR NOT NULL,
    kind         VARCHAR NOT NULL,
    field        VARCHAR,
    detail       VARCHAR NOT NULL,
    recorded_at  BIGINT  NOT NULL
);
CREATE TABLE IF NOT EXISTS audit_dq_results (
    run_id         BIGINT  NOT NULL,
    layer          VARCHAR NOT NULL,
    scope          VARCHAR NOT NULL,
    check_name     VARCHAR NOT NULL,
    passed         BOOLEAN NOT NULL,
    bad_row_count  BIGINT  NOT NULL,
    suite_version  VARCHAR NOT NULL,
    recorded_at    BIGINT  NOT NULL
);
";

/// Durable, append-only audit trail. Timestamps are epoch milliseconds.
pub struct DuckDbAuditStore {
    conn: Arc<Mutex<Connection>>,
    last_issued: Mutex<Option<RunId>>,
}

impl std::fmt::Debug for DuckDbAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last_issued = self.last_issued.lock().ok().and_then(|g| *g);
        f.debug_struct("DuckDbAuditStore")
            .field("last_issued", &last_issued)
            .finish_non_exhaustive()
    }
}

impl DuckDbAuditStore {
    pub fn new(db_path: &str) -> Result<Self, InfrastructureError> {
        let config = Config::default();

        let conn = if db_path == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(db_path, config)?
        };
        conn.execute_batch(AUDIT_DDL)?;
        debug!(path = db_path, "audit store ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            last_issued: Mutex::new(None),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, MedallionError> {
        self.conn
            .lock()
            .map_err(|_| MedallionError::Infrastructure(DatabaseError::Poisoned.into()))
    }
}

fn sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> MedallionError {
    MedallionError::InternalError(format!("Corrupt audit row in {}: {}", what, detail))
}

/// WHERE clause + bound values for an operator filter.
/// `time_column` is the column the date range applies to.
fn where_clause(filter: &AuditFilter, time_column: &str) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(run_id) = filter.run_id {
        conditions.push("run_id = ?".to_string());
        values.push(Value::BigInt(run_id.as_i64()));
    }
    if let Some(table) = &filter.table {
        conditions.push("table_name = ?".to_string());
        values.push(Value::Text(table.clone()));
    }
    if let Some(since) = filter.since {
        conditions.push(format!("{} >= ?", time_column));
        values.push(Value::BigInt(millis(since)));
    }
    if let Some(until) = filter.until {
        conditions.push(format!("{} <= ?", time_column));
        values.push(Value::BigInt(millis(until)));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

#[async_trait]
impl AuditRecorder for DuckDbAuditStore {
    async fn allocate_run_id(&self) -> Result<RunId, MedallionError> {
        let conn = self.lock()?;
        let stored: Option<i64> =
            conn.query_row("SELECT max(run_id) FROM audit_run_metadata", [], |row| {
                row.get(0)
            })?;

        let mut last_issued = self
            .last_issued
            .lock()
            .map_err(|_| MedallionError::Infrastructure(DatabaseError::Poisoned.into()))?;
        let last = stored.map(|v| RunId(from_sql_int(v))).max(*last_issued);
        let now_ms = from_sql_int(Utc::now().timestamp_millis());
        let run_id = RunId::next_after(last, now_ms);
        *last_issued = Some(run_id);

        debug!(%run_id, "allocated run id");
        Ok(run_id)
    }

    #[instrument(skip(self))]
    async fn begin_run(&self, run_id: RunId, layer: Layer, table: &str) -> Result<(), MedallionError> {
        let conn = self.lock()?;
        let existing: i64 = conn.query_row(
            "SELECT count(*) FROM audit_run_metadata WHERE run_id = ? AND layer = ? AND table_name = ?",
            params![run_id.as_i64(), layer.as_str(), table],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(RunError::DuplicateRun {
                run_id,
                layer,
                table: table.to_string(),
            }
            .into());
        }

        conn.execute(
            "INSERT INTO audit_run_metadata (run_id, layer, table_name, status, started_at) VALUES (?, ?, ?, ?, ?)",
            params![
                run_id.as_i64(),
                layer.as_str(),
                table,
                RunStatus::Running.as_str(),
                millis(Utc::now())
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self, outcome), fields(status = %outcome.status))]
    async fn finalize_run(
        &self,
        run_id: RunId,
        layer: Layer,
        table: &str,
        outcome: RunOutcome,
    ) -> Result<(), MedallionError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT finished_at FROM audit_run_metadata WHERE run_id = ? AND layer = ? AND table_name = ?",
        )?;
        let mut rows = stmt.query(params![run_id.as_i64(), layer.as_str(), table])?;
        let finished_at: Option<i64> = match rows.next()? {
            Some(row) => row.get(0)?,
            None => {
                return Err(RunError::UnknownRun {
                    run_id,
                    layer,
                    table: table.to_string(),
                }
                .into());
            }
        };
        if finished_at.is_some() {
            return Err(RunError::RunAlreadyFinalized {
                run_id,
                layer,
                table: table.to_string(),
            }
            .into());
        }

        conn.execute(
            "UPDATE audit_run_metadata
             SET status = ?, rows_read = ?, rows_validated = ?, rows_rejected = ?, rows_written = ?,
                 data_checksum = ?, finished_at = ?, duration_ms = ?, error = ?
             WHERE run_id = ? AND layer = ? AND table_name = ?",
            params![
                outcome.status.as_str(),
                sql_int(outcome.counts.read),
                sql_int(outcome.counts.validated),
                sql_int(outcome.counts.rejected),
                sql_int(outcome.counts.written),
                outcome.checksum,
                millis(Utc::now()),
                sql_int(outcome.duration_ms),
                outcome.error,
                run_id.as_i64(),
                layer.as_str(),
                table
            ],
        )?;
        Ok(())
    }

    async fn record_rejections(&self, rows: &[RejectedRow]) -> Result<(), MedallionError> {
        if rows.is_empty() {
            return Ok(());
        }
        let recorded_at = millis(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO audit_rejected_rows
                 (run_id, table_name, batch_id, seq, payload, reason, kind, field, detail, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for row in rows {
                let payload = serde_json::to_string(&row.payload).map_err(InfrastructureError::Json)?;
                stmt.execute(params![
                    row.run_id.as_i64(),
                    row.table,
                    row.batch_id,
                    sql_int(row.seq),
                    payload,
                    row.reason,
                    row.kind.as_str(),
                    row.field,
                    row.detail,
                    recorded_at
                ])?;
            }
        }
        tx.commit()?;
        info!(count = rows.len(), table = %rows[0].table, "rejections recorded");
        Ok(())
    }

    async fn record_quality_checks(&self, results: &[QualityCheckResult]) -> Result<(), MedallionError> {
        if results.is_empty() {
            return Ok(());
        }
        let recorded_at = millis(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO audit_dq_results
                 (run_id, layer, scope, check_name, passed, bad_row_count, suite_version, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for r in results {
                stmt.execute(params![
                    r.run_id.as_i64(),
                    r.layer.as_str(),
                    r.scope,
                    r.check_name,
                    r.passed,
                    sql_int(r.bad_row_count),
                    r.suite_version,
                    recorded_at
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = results.len(), "quality checks recorded");
        Ok(())
    }
}

// Raw column tuples; decoded outside the DuckDB row closure.
type RejectionColumns = (i64, String, String, i64, String, String, String, Option<String>, String, i64);
type CheckColumns = (i64, String, String, String, bool, i64, String, i64);

#[async_trait]
impl AuditQuery for DuckDbAuditStore {
    async fn rejections(&self, filter: &AuditFilter) -> Result<Vec<Recorded<RejectedRow>>, MedallionError> {
        let (clause, values) = where_clause(filter, "recorded_at");
        let sql = format!(
            "SELECT run_id, table_name, batch_id, seq, payload, reason, kind, field, detail, recorded_at
             FROM audit_rejected_rows{} ORDER BY run_id, table_name, seq",
            clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| -> duckdb::Result<RejectionColumns> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (run_id, table, batch_id, seq, payload, reason, kind, field, detail, recorded_at) = row?;
            out.push(Recorded {
                recorded_at: from_millis(recorded_at),
                item: RejectedRow {
                    run_id: RunId(from_sql_int(run_id)),
                    table,
                    batch_id,
                    seq: from_sql_int(seq),
                    payload: serde_json::from_str(&payload).map_err(|e| corrupt("audit_rejected_rows", e))?,
                    reason,
                    kind: FromStr::from_str(&kind).map_err(|e| corrupt("audit_rejected_rows", e))?,
                    field,
                    detail,
                },
            });
        }
        Ok(out)
    }

    async fn quality_checks(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<Recorded<QualityCheckResult>>, MedallionError> {
        // Quality checks are keyed by scope, which is the table they ran against.
        let (clause, values) = where_clause(filter, "recorded_at");
        let sql = format!(
            "SELECT run_id, layer, scope, check_name, passed, bad_row_count, suite_version, recorded_at
             FROM (SELECT *, scope AS table_name FROM audit_dq_results){} ORDER BY run_id, layer, scope, check_name",
            clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| -> duckdb::Result<CheckColumns> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (run_id, layer, scope, check_name, passed, bad_row_count, suite_version, recorded_at) = row?;
            out.push(Recorded {
                recorded_at: from_millis(recorded_at),
                item: QualityCheckResult {
                    run_id: RunId(from_sql_int(run_id)),
                    layer: Layer::from_str(&layer).map_err(|e| corrupt("audit_dq_results", e))?,
                    scope,
                    check_name,
                    passed,
                    bad_row_count: from_sql_int(bad_row_count),
                    suite_version,
                },
            });
        }
        Ok(out)
    }

    async fn runs(&self, filter: &AuditFilter) -> Result<Vec<RunMetadata>, MedallionError> {
        let (clause, values) = where_clause(filter, "started_at");
        let sql = format!(
            "SELECT run_id, layer, table_name, status, rows_read, rows_validated, rows_rejected, rows_written,
                    data_checksum, started_at, finished_at, duration_ms, error
             FROM audit_run_metadata{} ORDER BY run_id, started_at, layer, table_name",
            clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((
                (
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ),
                (
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ),
                (
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, Option<i64>>(10)?,
                    row.get::<_, Option<i64>>(11)?,
                    row.get::<_, Option<String>>(12)?,
                ),
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (
                (run_id, layer, table, status),
                (read, validated, rejected, written),
                (data_checksum, started_at, finished_at, duration_ms, error),
            ) = row?;
            out.push(RunMetadata {
                run_id: RunId(from_sql_int(run_id)),
                layer: Layer::from_str(&layer).map_err(|e| corrupt("audit_run_metadata", e))?,
                table,
                status: RunStatus::from_str(&status).map_err(|e| corrupt("audit_run_metadata", e))?,
                counts: RowCounts {
                    read: from_sql_int(read),
                    validated: from_sql_int(validated),
                    rejected: from_sql_int(rejected),
                    written: from_sql_int(written),
                },
                data_checksum,
                started_at: from_millis(started_at),
                finished_at: finished_at.map(from_millis),
                duration_ms: duration_ms.map(from_sql_int),
                error,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::config::RejectionKind;
    use anyhow::Result;
    use tempfile::tempdir;

    fn rejected(run_id: RunId, table: &str, seq: u64) -> RejectedRow {
        RejectedRow {
            run_id,
            table: table.to_string(),
            batch_id: format!("{}@abc", table),
            seq,
            payload: serde_json::json!({ "quantity_on_hand": "-5", "last_stocked_date": null }),
            reason: "negative_quantity".to_string(),
            kind: RejectionKind::RangeViolation,
            field: Some("quantity_on_hand".to_string()),
            detail: "quantity_on_hand must be >= 0".to_string(),
        }
    }

    fn succeeded(read: u64) -> RunOutcome {
        RunOutcome {
            status: RunStatus::Succeeded,
            counts: RowCounts {
                read,
                validated: read,
                rejected: 0,
                written: read,
            },
            duration_ms: 12,
            error: None,
            checksum: Some("abc".to_string()),
        }
    }

    #[tokio::test]
    async fn test_run_ids_strictly_increase() -> Result<()> {
        let store = DuckDbAuditStore::new(":memory:")?;
        let a = store.allocate_run_id().await?;
        let b = store.allocate_run_id().await?;
        assert!(b > a);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_ids_survive_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("audit.duckdb");
        let path = path.to_string_lossy();

        // A stored id far in the future must still be exceeded.
        let future = RunId(u64::MAX / 4);
        {
            let store = DuckDbAuditStore::new(&path)?;
            store.begin_run(future, Layer::Pipeline, "*").await?;
        }
        let store = DuckDbAuditStore::new(&path)?;
        assert!(store.allocate_run_id().await? > future);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_begin_is_rejected() -> Result<()> {
        let store = DuckDbAuditStore::new(":memory:")?;
        let run_id = store.allocate_run_id().await?;
        store.begin_run(run_id, Layer::Silver, "suppliers").await?;
        store.begin_run(run_id, Layer::Silver, "products").await?;

        let err = store
            .begin_run(run_id, Layer::Silver, "suppliers")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MedallionError::Run(RunError::DuplicateRun { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_finalized_metadata_is_immutable() -> Result<()> {
        let store = DuckDbAuditStore::new(":memory:")?;
        let run_id = store.allocate_run_id().await?;
        store.begin_run(run_id, Layer::Gold, "forecasts").await?;
        store
            .finalize_run(run_id, Layer::Gold, "forecasts", succeeded(3))
            .await?;

        let again = store
            .finalize_run(run_id, Layer::Gold, "forecasts", RunOutcome::failed(1, "late"))
            .await;
        assert!(matches!(
            again,
            Err(MedallionError::Run(RunError::RunAlreadyFinalized { .. }))
        ));

        let unknown = store
            .finalize_run(run_id, Layer::Gold, "nope", succeeded(0))
            .await;
        assert!(matches!(
            unknown,
            Err(MedallionError::Run(RunError::UnknownRun { .. }))
        ));

        let runs = store.runs(&AuditFilter::default()).await?;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Succeeded);
        assert_eq!(runs[0].counts.read, 3);
        assert_eq!(runs[0].data_checksum.as_deref(), Some("abc"));
        assert!(runs[0].is_finalized());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejections_round_trip_with_filters() -> Result<()> {
        let store = DuckDbAuditStore::new(":memory:")?;
        let first = store.allocate_run_id().await?;
        let second = store.allocate_run_id().await?;
        store
            .record_rejections(&[rejected(first, "inventory", 4), rejected(first, "products", 1)])
            .await?;
        store.record_rejection(&rejected(second, "inventory", 2)).await?;

        let all = store.rejections(&AuditFilter::default()).await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].item, rejected(first, "inventory", 4));

        let by_run = store
            .rejections(&AuditFilter {
                run_id: Some(first),
                table: Some("inventory".to_string()),
                ..Default::default()
            })
            .await?;
        assert_eq!(by_run.len(), 1);
        assert_eq!(by_run[0].item.seq, 4);

        let future = store
            .rejections(&AuditFilter {
                since: Some(Utc::now() + chrono::Duration::days(1)),
                ..Default::default()
            })
            .await?;
        assert!(future.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_quality_checks_filter_by_scope() -> Result<()> {
        let store = DuckDbAuditStore::new(":memory:")?;
        let check = |scope: &str, passed: bool| QualityCheckResult {
            run_id: RunId(5),
            layer: Layer::Silver,
            scope: scope.to_string(),
            check_name: "pk_uniqueness".to_string(),
            passed,
            bad_row_count: u64::from(!passed),
            suite_version: "dq-v1".to_string(),
        };
        store
            .record_quality_checks(&[check("suppliers", true), check("products", false)])
            .await?;

        let products = store
            .quality_checks(&AuditFilter {
                table: Some("products".to_string()),
                ..Default::default()
            })
            .await?;
        assert_eq!(products.len(), 1);
        assert!(!products[0].item.passed);
        assert_eq!(products[0].item.bad_row_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_batches_are_noops() -> Result<()> {
        let store = DuckDbAuditStore::new(":memory:")?;
        store.record_rejections(&[]).await?;
        store.record_quality_checks(&[]).await?;
        assert!(store.rejections(&AuditFilter::default()).await?.is_empty());
        Ok(())
    }
}
