// medallion-core/src/application/pipeline.rs

use chrono::{NaiveDate, Utc};
use futures::StreamExt;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::application::audit_query::audit_db_path;
use crate::application::guard::ActiveRuns;
use crate::error::MedallionError;
use crate::ports::{AuditRecorder, RawSource, SnapshotPublisher};

// Domain
use crate::domain::aggregation::forecast::FORECAST_TABLE;
use crate::domain::aggregation::{Aggregated, GOLD_TABLES, GoldSnapshot, aggregate};
use crate::domain::canonical;
use crate::domain::config::{AggregationConfig, ProjectConfig};
use crate::domain::error::{DomainError, RunError};
use crate::domain::graph::GraphSolver;
use crate::domain::quality::{self, QualityCheckResult};
use crate::domain::reconciliation::{self, ReconciliationReport};
use crate::domain::record::entities::{
    Inventory, Product, RetailStore, Supplier, SupplyOrder, Warehouse,
};
use crate::domain::record::{Entity, RawBatch, RawStore};
use crate::domain::run::{Layer, RowCounts, RunContext, RunId, RunOutcome, RunState, RunStatus};
use crate::domain::schema::EntityKind;
use crate::domain::validation::{
    Classifier, KeyIndex, RowCheck, SilverSnapshot, Validated, ValidationEngine,
};

// Infrastructure
use crate::infrastructure::adapters::{CsvSource, DuckDbAuditStore};
use crate::infrastructure::config::load_project_config;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::store::SnapshotStore;

/// Metadata table name of the whole-run record.
pub const PIPELINE_TABLE: &str = "*";

/// Signature of the gold builder. Swappable in tests only.
pub type Aggregator =
    fn(&RunContext, &SilverSnapshot, &AggregationConfig, Option<&RawBatch>, &Classifier) -> Aggregated;

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub table: String,
    pub read: u64,
    pub validated: u64,
    pub rejected: u64,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub rows: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub as_of: NaiveDate,
    pub state: RunState,
    pub entities: Vec<EntitySummary>,
    pub forecasts: Option<EntitySummary>,
    pub gold: Vec<TableSummary>,
    pub reconciliation: ReconciliationReport,
    pub quality_checks: usize,
    pub quality_failures: usize,
    pub duration_ms: u64,
}

impl RunReport {
    fn totals(&self) -> RowCounts {
        self.entities.iter().fold(RowCounts::default(), |mut acc, e| {
            acc.read += e.read;
            acc.validated += e.validated;
            acc.rejected += e.rejected;
            acc.written += e.validated;
            acc
        })
    }
}

// What the timed section hands back.
struct GoldStage {
    gold: GoldSnapshot,
    forecasts: Option<EntitySummary>,
    reconciliation: ReconciliationReport,
    quality: Vec<QualityCheckResult>,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn json_err(e: serde_json::Error) -> MedallionError {
    InfrastructureError::Json(e).into()
}

/// Bronze -> Silver -> Gold for one project. One handle can serve many runs;
/// runs sharing an `ActiveRuns` never overlap.
pub struct Pipeline {
    config: ProjectConfig,
    engine: Arc<ValidationEngine>,
    plan: Vec<Vec<EntityKind>>,
    tolerance: Decimal,
    run_timeout: Duration,
    source: Arc<dyn RawSource>,
    audit: Arc<dyn AuditRecorder>,
    publisher: Arc<dyn SnapshotPublisher>,
    active: ActiveRuns,
    aggregator: Aggregator,
}

impl Pipeline {
    pub fn new(
        config: ProjectConfig,
        source: Arc<dyn RawSource>,
        audit: Arc<dyn AuditRecorder>,
        publisher: Arc<dyn SnapshotPublisher>,
    ) -> Result<Self, MedallionError> {
        config.check()?;
        let engine = Arc::new(ValidationEngine::from_config(&config)?);
        let plan = GraphSolver::plan_entities()?;
        let tolerance = Decimal::from_f64(config.pipeline.reconciliation_tolerance).ok_or_else(|| {
            DomainError::ConfigurationError(format!(
                "reconciliation_tolerance {} is not representable",
                config.pipeline.reconciliation_tolerance
            ))
        })?;
        let run_timeout = Duration::from_secs(config.pipeline.run_timeout_secs);

        Ok(Self {
            config,
            engine,
            plan,
            tolerance,
            run_timeout,
            source,
            audit,
            publisher,
            active: ActiveRuns::default(),
            aggregator: aggregate,
        })
    }

    /// Shares the single-active-run registry with other handles.
    pub fn with_active_runs(mut self, active: ActiveRuns) -> Self {
        self.active = active;
        self
    }

    /// Overrides the aggregation + reconciliation budget.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn plan(&self) -> &[Vec<EntityKind>] {
        &self.plan
    }

    #[instrument(skip(self), fields(project = %self.config.name))]
    pub async fn run(&self) -> Result<RunReport, MedallionError> {
        // Fails immediately if any layer is busy; released on every exit path.
        let _guard = self
            .active
            .try_acquire(&[Layer::Bronze, Layer::Silver, Layer::Gold])?;

        let run_id = self.audit.allocate_run_id().await?;
        let as_of = self
            .config
            .pipeline
            .as_of
            .unwrap_or_else(|| Utc::now().date_naive());
        let ctx = RunContext::new(run_id, as_of, Utc::now());
        self.audit
            .begin_run(run_id, Layer::Pipeline, PIPELINE_TABLE)
            .await?;
        info!(%run_id, %as_of, "🚀 Run started");

        let mut state = RunState::Pending;
        let result = self.execute(&ctx, &mut state).await;
        let duration_ms = ctx.elapsed_ms(Utc::now());

        match result {
            Ok(mut report) => {
                report.duration_ms = duration_ms;
                let outcome = RunOutcome {
                    status: RunStatus::Published,
                    counts: report.totals(),
                    duration_ms,
                    error: None,
                    checksum: None,
                };
                // Already visible to readers: a failing audit write cannot undo that.
                if let Err(audit_err) = self
                    .audit
                    .finalize_run(run_id, Layer::Pipeline, PIPELINE_TABLE, outcome)
                    .await
                {
                    warn!(%run_id, error = %audit_err, "could not finalize run metadata");
                }
                info!(%run_id, duration_ms, "✨ Run published");
                Ok(report)
            }
            Err(e) => {
                if !state.is_terminal() {
                    state.advance(RunState::Failed)?;
                }
                warn!(%run_id, error = %e, "❌ Run failed");
                self.publisher.discard(run_id).await;
                self.close_failed(run_id, Layer::Pipeline, &[PIPELINE_TABLE], duration_ms, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        state: &mut RunState,
    ) -> Result<RunReport, MedallionError> {
        // 1. EXTRACTION (Bronze)
        state.advance(RunState::Extracting)?;
        let raw = self.extract(ctx).await?;

        // 2. VALIDATION (Silver), entities in dependency order
        state.advance(RunState::Validating)?;
        let (silver, entities) = self.validate_all(ctx, &raw).await?;
        let silver = Arc::new(silver);
        self.publisher.stage_validated(silver.clone()).await?;
        let silver_quality = quality::silver_checks(&silver);
        self.audit.record_quality_checks(&silver_quality).await?;

        // 3 + 4. AGGREGATION + RECONCILIATION under the run budget
        state.advance(RunState::Aggregating)?;
        let gold_started = Instant::now();
        for table in GOLD_TABLES {
            self.audit.begin_run(ctx.run_id, Layer::Gold, table).await?;
        }

        let timed = self.aggregate_and_reconcile(ctx, silver.clone(), raw.forecasts(), state);
        let deadline = tokio::time::timeout(self.run_timeout, timed).await;
        let stage = match deadline {
            Ok(Ok(stage)) => stage,
            Ok(Err(e)) => {
                self.close_failed(ctx.run_id, Layer::Gold, &GOLD_TABLES, elapsed_ms(gold_started), &e)
                    .await;
                return Err(e);
            }
            Err(_) => {
                // Whatever the blocking task still computes is dropped unseen.
                let e: MedallionError = RunError::Timeout {
                    run_id: ctx.run_id,
                    secs: self.run_timeout.as_secs(),
                    state: *state,
                }
                .into();
                self.close_failed(ctx.run_id, Layer::Gold, &GOLD_TABLES, elapsed_ms(gold_started), &e)
                    .await;
                return Err(e);
            }
        };

        // 5. PUBLICATION (all-or-nothing swap)
        let gold = Arc::new(stage.gold);
        if let Err(e) = self.publisher.publish(ctx.run_id, gold.clone()).await {
            self.close_failed(ctx.run_id, Layer::Gold, &GOLD_TABLES, elapsed_ms(gold_started), &e)
                .await;
            return Err(e);
        }
        state.advance(RunState::Published)?;

        let mut tables = Vec::with_capacity(GOLD_TABLES.len());
        for table in GOLD_TABLES {
            let rows = gold.row_count(table).unwrap_or(0) as u64;
            let checksum = gold
                .table_bytes(table)
                .transpose()
                .map_err(json_err)?
                .map(|bytes| canonical::sha256_hex(&bytes))
                .unwrap_or_default();
            let outcome = RunOutcome {
                status: RunStatus::Published,
                counts: RowCounts {
                    read: rows,
                    validated: rows,
                    rejected: 0,
                    written: rows,
                },
                duration_ms: elapsed_ms(gold_started),
                error: None,
                checksum: Some(checksum.clone()),
            };
            if let Err(audit_err) = self
                .audit
                .finalize_run(ctx.run_id, Layer::Gold, table, outcome)
                .await
            {
                warn!(run_id = %ctx.run_id, table, error = %audit_err, "could not finalize run metadata");
            }
            tables.push(TableSummary {
                table: table.to_string(),
                rows,
                checksum,
            });
        }

        let quality_checks = silver_quality.len() + stage.quality.len();
        let quality_failures = silver_quality
            .iter()
            .chain(stage.quality.iter())
            .filter(|c| !c.passed)
            .count();

        Ok(RunReport {
            run_id: ctx.run_id,
            as_of: ctx.as_of,
            state: *state,
            entities,
            forecasts: stage.forecasts,
            gold: tables,
            reconciliation: stage.reconciliation,
            quality_checks,
            quality_failures,
            duration_ms: 0,
        })
    }

    async fn extract(&self, ctx: &RunContext) -> Result<RawStore, MedallionError> {
        let mut raw = RawStore::default();

        for kind in self.plan.iter().flatten() {
            let table = kind.table_name();
            let started = Instant::now();
            self.audit.begin_run(ctx.run_id, Layer::Bronze, table).await?;
            match self.source.fetch(*kind).await {
                Ok(batch) => {
                    self.close_bronze(ctx.run_id, table, started, &batch).await?;
                    raw.replace(*kind, batch);
                }
                Err(e) => {
                    self.close_failed(ctx.run_id, Layer::Bronze, &[table], elapsed_ms(started), &e)
                        .await;
                    return Err(e);
                }
            }
        }

        let started = Instant::now();
        match self.source.fetch_forecasts().await {
            Ok(Some(batch)) => {
                self.audit
                    .begin_run(ctx.run_id, Layer::Bronze, FORECAST_TABLE)
                    .await?;
                self.close_bronze(ctx.run_id, FORECAST_TABLE, started, &batch)
                    .await?;
                raw.replace_forecasts(Some(batch));
            }
            Ok(None) => debug!("no forecast extract"),
            Err(e) => return Err(e),
        }

        Ok(raw)
    }

    async fn close_bronze(
        &self,
        run_id: RunId,
        table: &str,
        started: Instant,
        batch: &RawBatch,
    ) -> Result<(), MedallionError> {
        let rows = batch.len() as u64;
        let outcome = RunOutcome {
            status: RunStatus::Succeeded,
            counts: RowCounts {
                read: rows,
                validated: 0,
                rejected: 0,
                written: rows,
            },
            duration_ms: elapsed_ms(started),
            error: None,
            checksum: Some(canonical::checksum(&batch.rows).map_err(json_err)?),
        };
        self.audit
            .finalize_run(run_id, Layer::Bronze, table, outcome)
            .await
    }

    /// Best effort: the original error matters more than a failing audit write.
    async fn close_failed(
        &self,
        run_id: RunId,
        layer: Layer,
        tables: &[&str],
        duration_ms: u64,
        error: &MedallionError,
    ) {
        for table in tables {
            let outcome = RunOutcome::failed(duration_ms, error.to_string());
            if let Err(audit_err) = self.audit.finalize_run(run_id, layer, table, outcome).await {
                warn!(%run_id, %layer, table, error = %audit_err, "could not finalize run metadata");
            }
        }
    }

    async fn validate_all(
        &self,
        ctx: &RunContext,
        raw: &RawStore,
    ) -> Result<(SilverSnapshot, Vec<EntitySummary>), MedallionError> {
        let mut silver = SilverSnapshot::new(ctx.run_id);
        let mut parents = KeyIndex::default();
        let mut summaries = Vec::new();

        for (i, layer) in self.plan.iter().enumerate() {
            debug!(layer = i + 1, entities = ?layer, "validating layer");
            for kind in layer {
                let batch = raw.batch(*kind).ok_or_else(|| {
                    MedallionError::InternalError(format!("no raw batch for {}", kind))
                })?;
                let summary = match kind {
                    EntityKind::Supplier => {
                        let (v, s) = self.validate_entity::<Supplier>(ctx, batch, &mut parents).await?;
                        silver.suppliers = v;
                        s
                    }
                    EntityKind::Product => {
                        let (v, s) = self.validate_entity::<Product>(ctx, batch, &mut parents).await?;
                        silver.products = v;
                        s
                    }
                    EntityKind::Warehouse => {
                        let (v, s) = self.validate_entity::<Warehouse>(ctx, batch, &mut parents).await?;
                        silver.warehouses = v;
                        s
                    }
                    EntityKind::Inventory => {
                        let (v, s) = self.validate_entity::<Inventory>(ctx, batch, &mut parents).await?;
                        silver.inventory = v;
                        s
                    }
                    EntityKind::RetailStore => {
                        let (v, s) = self.validate_entity::<RetailStore>(ctx, batch, &mut parents).await?;
                        silver.retail_stores = v;
                        s
                    }
                    EntityKind::SupplyOrder => {
                        let (v, s) = self.validate_entity::<SupplyOrder>(ctx, batch, &mut parents).await?;
                        silver.supply_orders = v;
                        s
                    }
                };
                summaries.push(summary);
            }
        }

        Ok((silver, summaries))
    }

    async fn validate_entity<E: Entity>(
        &self,
        ctx: &RunContext,
        batch: Arc<RawBatch>,
        parents: &mut KeyIndex,
    ) -> Result<(Vec<Validated<E>>, EntitySummary), MedallionError> {
        let table = E::KIND.table_name();
        let started = Instant::now();
        self.audit.begin_run(ctx.run_id, Layer::Silver, table).await?;

        match self.validate_batch::<E>(ctx, &batch, parents).await {
            Ok((validated, summary)) => {
                let outcome = RunOutcome {
                    status: RunStatus::Succeeded,
                    counts: RowCounts {
                        read: summary.read,
                        validated: summary.validated,
                        rejected: summary.rejected,
                        written: summary.validated,
                    },
                    duration_ms: elapsed_ms(started),
                    error: None,
                    checksum: summary.checksum.clone(),
                };
                self.audit
                    .finalize_run(ctx.run_id, Layer::Silver, table, outcome)
                    .await?;
                info!(
                    table,
                    read = summary.read,
                    validated = summary.validated,
                    rejected = summary.rejected,
                    "✅ Entity validated"
                );
                Ok((validated, summary))
            }
            Err(e) => {
                self.close_failed(ctx.run_id, Layer::Silver, &[table], elapsed_ms(started), &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn validate_batch<E: Entity>(
        &self,
        ctx: &RunContext,
        batch: &Arc<RawBatch>,
        parents: &mut KeyIndex,
    ) -> Result<(Vec<Validated<E>>, EntitySummary), MedallionError> {
        let checks = check_rows::<E>(
            self.engine.clone(),
            batch.clone(),
            Arc::new(parents.clone()),
            self.config.pipeline.worker_concurrency,
        )
        .await?;
        let outcome = self.engine.finish(ctx, batch, checks);
        if !outcome.is_balanced() {
            return Err(MedallionError::InternalError(format!(
                "{}: {} validated + {} rejected != {} read",
                E::KIND,
                outcome.validated.len(),
                outcome.rejected.len(),
                outcome.raw_count
            )));
        }

        self.audit.record_rejections(&outcome.rejected).await?;
        parents.register(&outcome.validated);

        let summary = EntitySummary {
            table: E::KIND.table_name().to_string(),
            read: outcome.raw_count as u64,
            validated: outcome.validated.len() as u64,
            rejected: outcome.rejected.len() as u64,
            checksum: Some(canonical::checksum(&outcome.validated).map_err(json_err)?),
        };
        Ok((outcome.validated, summary))
    }

    async fn aggregate_and_reconcile(
        &self,
        ctx: &RunContext,
        silver: Arc<SilverSnapshot>,
        forecasts: Option<Arc<RawBatch>>,
        state: &mut RunState,
    ) -> Result<GoldStage, MedallionError> {
        let aggregator = self.aggregator;
        let params = self.config.aggregation.clone();
        let classifier = self.engine.classifier().clone();
        let task_ctx = *ctx;
        let task_silver = silver.clone();
        let task_forecasts = forecasts.clone();

        let aggregated = tokio::task::spawn_blocking(move || {
            aggregator(
                &task_ctx,
                &task_silver,
                &params,
                task_forecasts.as_deref(),
                &classifier,
            )
        })
        .await
        .map_err(|e| MedallionError::InternalError(format!("aggregation task: {}", e)))?;

        self.audit
            .record_rejections(&aggregated.rejected_forecasts)
            .await?;
        let forecast_summary = forecasts.map(|batch| EntitySummary {
            table: FORECAST_TABLE.to_string(),
            read: batch.len() as u64,
            validated: aggregated.gold.forecasts.len() as u64,
            rejected: aggregated.rejected_forecasts.len() as u64,
            checksum: None,
        });

        let gold_quality = quality::gold_checks(ctx.run_id, &aggregated.gold, ctx.as_of);
        self.audit.record_quality_checks(&gold_quality).await?;

        state.advance(RunState::Reconciling)?;
        let report = reconciliation::reconcile(&silver, &aggregated.gold, self.tolerance).into_result()?;
        debug!(metrics = report.checks.len(), "reconciliation passed");

        Ok(GoldStage {
            gold: aggregated.gold,
            forecasts: forecast_summary,
            reconciliation: report,
            quality: gold_quality,
        })
    }
}

/// Stages 1-4 on a bounded pool of blocking workers, one contiguous chunk of
/// rows each. Chunks come back in order, so checks stay aligned with rows.
async fn check_rows<E: Entity>(
    engine: Arc<ValidationEngine>,
    batch: Arc<RawBatch>,
    parents: Arc<KeyIndex>,
    workers: usize,
) -> Result<Vec<RowCheck<E>>, MedallionError> {
    let workers = workers.max(1);
    let len = batch.rows.len();
    let chunk = len.div_ceil(workers).max(1);

    let tasks = (0..len).step_by(chunk).map(|start| {
        let engine = engine.clone();
        let batch = batch.clone();
        let parents = parents.clone();
        let end = (start + chunk).min(len);
        tokio::task::spawn_blocking(move || {
            batch.rows[start..end]
                .iter()
                .map(|raw| engine.check_row::<E>(raw, &parents))
                .collect::<Vec<_>>()
        })
    });

    let chunks: Vec<_> = futures::stream::iter(tasks).buffered(workers).collect().await;

    let mut checks = Vec::with_capacity(len);
    for chunk in chunks {
        let chunk = chunk
            .map_err(|e| MedallionError::InternalError(format!("validation worker: {}", e)))?;
        checks.extend(chunk);
    }
    Ok(checks)
}

fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), MedallionError> {
    let content = serde_json::to_string_pretty(data).map_err(json_err)?;
    crate::infrastructure::fs::atomic_write(path, content)?;
    Ok(())
}

/// Runs the project in `project_dir` against its CSV extracts, with the
/// DuckDB audit trail and the JSON snapshot mirror under the target path.
pub async fn run_project(project_dir: &Path) -> Result<RunReport, MedallionError> {
    println!("🚀 Starting Medallion pipeline...");
    let start_time = Instant::now();

    // 1. SETUP (Config + Infra)
    let config = load_project_config(project_dir)?;
    let data_dir = project_dir.join(&config.data_path);
    let target_dir = project_dir.join(&config.target_path);
    if !target_dir.exists() {
        fs::create_dir_all(&target_dir)?;
    }

    println!("🔌 Opening sources and audit store...");
    let source = CsvSource::new(&data_dir)?;
    let audit = DuckDbAuditStore::new(&audit_db_path(&target_dir).to_string_lossy())?;
    let store = SnapshotStore::with_target(&target_dir);

    let pipeline = Pipeline::new(config, Arc::new(source), Arc::new(audit), Arc::new(store))?;
    println!(
        "🧠 Entity plan: {}",
        pipeline
            .plan()
            .iter()
            .map(|layer| layer.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "))
            .collect::<Vec<_>>()
            .join(" → ")
    );

    // 2. RUN
    println!("🟢 Processing...");
    let report = pipeline.run().await?;

    // 3. FINALIZE
    save_json(&target_dir.join("run_results.json"), &report)?;
    println!(
        "✨ Done in {:.2}s. Run {} published.",
        start_time.elapsed().as_secs_f64(),
        report.run_id
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::config::RejectionKind;
    use crate::domain::validation::RejectedRow;
    use crate::infrastructure::adapters::InMemorySource;
    use crate::ports::audit::{AuditFilter, AuditQuery};
    use crate::ports::publisher::{AggregateStore, ValidatedStore};
    use crate::test_support::{self, raw_batch};
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct Harness {
        audit: Arc<DuckDbAuditStore>,
        store: Arc<SnapshotStore>,
        source: Arc<InMemorySource>,
    }

    impl Harness {
        fn new(source: InMemorySource) -> Self {
            Self {
                audit: Arc::new(DuckDbAuditStore::new(":memory:").unwrap()),
                store: Arc::new(SnapshotStore::in_memory()),
                source: Arc::new(source),
            }
        }

        fn clean() -> Self {
            Self::new(InMemorySource::new(test_support::clean_batches()))
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                test_support::project_config(),
                self.source.clone(),
                self.audit.clone(),
                self.store.clone(),
            )
            .unwrap()
        }
    }

    fn tampered(
        ctx: &RunContext,
        silver: &SilverSnapshot,
        params: &AggregationConfig,
        forecasts: Option<&RawBatch>,
        classifier: &Classifier,
    ) -> Aggregated {
        let mut aggregated = aggregate(ctx, silver, params, forecasts, classifier);
        if let Some(row) = aggregated.gold.monthly_sales_performance.first_mut() {
            row.total_revenue += Decimal::from(1_000_000);
        }
        aggregated
    }

    fn slow(
        ctx: &RunContext,
        silver: &SilverSnapshot,
        params: &AggregationConfig,
        forecasts: Option<&RawBatch>,
        classifier: &Classifier,
    ) -> Aggregated {
        std::thread::sleep(Duration::from_millis(300));
        aggregate(ctx, silver, params, forecasts, classifier)
    }

    #[tokio::test]
    async fn test_clean_run_is_published_and_audited() -> Result<()> {
        let h = Harness::clean();
        let report = h.pipeline().run().await?;

        assert_eq!(report.state, RunState::Published);
        assert_eq!(h.store.published_run(), Some(report.run_id));
        assert!(report.reconciliation.passed());
        assert!(report.entities.iter().all(|e| e.rejected == 0 && e.read == e.validated));
        // Parents before children
        let order: Vec<&str> = report.entities.iter().map(|e| e.table.as_str()).collect();
        let pos = |t: &str| order.iter().position(|x| *x == t).unwrap();
        assert!(pos("suppliers") < pos("products"));
        assert!(pos("products") < pos("supply_orders"));

        let runs = h
            .audit
            .runs(&AuditFilter {
                run_id: Some(report.run_id),
                ..Default::default()
            })
            .await?;
        // 1 pipeline + 6 bronze + 6 silver + 6 gold
        assert_eq!(runs.len(), 19);
        assert!(runs.iter().all(|r| r.is_finalized()));
        assert!(
            runs.iter()
                .any(|r| r.layer == Layer::Pipeline && r.status == RunStatus::Published)
        );

        let checks = h.audit.quality_checks(&AuditFilter::default()).await?;
        assert_eq!(checks.len(), report.quality_checks);
        Ok(())
    }

    #[tokio::test]
    async fn test_every_row_is_accounted_for() -> Result<()> {
        let mut batches = test_support::clean_batches();
        for (kind, batch) in batches.iter_mut() {
            if *kind == EntityKind::Product {
                let orphan = raw_batch(
                    "products",
                    &["product_id", "unit_cost", "selling_price", "supplier_id"],
                    &[&["77", "1.00", "2.00", "404"]],
                );
                let mut row = orphan.rows[0].clone();
                row.seq = batch.rows.len() as u64;
                batch.rows.push(row);
            }
        }
        let h = Harness::new(InMemorySource::new(batches));
        let report = h.pipeline().run().await?;

        for e in &report.entities {
            assert_eq!(e.validated + e.rejected, e.read, "{}", e.table);
        }
        let rejected = h.audit.rejections(&AuditFilter::default()).await?;
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].item.reason, "unknown_supplier");
        assert_eq!(rejected[0].item.kind, RejectionKind::ReferentialIntegrityError);

        let products = h.store.validated(report.run_id, EntityKind::Product).unwrap();
        assert_eq!(products.as_array().map(Vec::len), Some(3));
        assert!(report.reconciliation.passed());
        Ok(())
    }

    #[tokio::test]
    async fn test_unchanged_input_gives_identical_aggregates() -> Result<()> {
        let h = Harness::clean();
        let pipeline = h.pipeline();

        pipeline.run().await?;
        let (_, first) = h.store.published().unwrap();
        let second_report = pipeline.run().await?;
        let (second_run, second) = h.store.published().unwrap();

        assert_eq!(second_run, second_report.run_id);
        for table in GOLD_TABLES {
            let a = first.table_bytes(table).unwrap()?;
            let b = second.table_bytes(table).unwrap()?;
            assert_eq!(a, b, "{} differs between runs", table);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_reconciliation_failure_keeps_previous_snapshot() -> Result<()> {
        let h = Harness::clean();
        let first = h.pipeline().run().await?;

        let err = h
            .pipeline()
            .with_aggregator(tampered)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MedallionError::Run(RunError::Reconciliation { ref metric, .. }) if metric == "total_revenue"
        ));
        assert_eq!(h.store.published_run(), Some(first.run_id));

        let runs = h.audit.runs(&AuditFilter::default()).await?;
        let failed = runs
            .iter()
            .find(|r| r.layer == Layer::Pipeline && r.run_id != first.run_id)
            .unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.error.as_deref().is_some_and(|e| e.contains("total_revenue")));

        // The failed run's validated layer never becomes visible either.
        assert_eq!(h.store.latest_validated_run(), Some(first.run_id));
        assert!(h.store.validated(failed.run_id, EntityKind::Product).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_fails_the_run_without_publishing() -> Result<()> {
        let h = Harness::clean();
        let err = h
            .pipeline()
            .with_aggregator(slow)
            .with_run_timeout(Duration::from_millis(20))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MedallionError::Run(RunError::Timeout {
                state: RunState::Aggregating,
                ..
            })
        ));
        assert_eq!(h.store.published_run(), None);
        let runs = h.audit.runs(&AuditFilter::default()).await?;
        let gold: Vec<_> = runs.iter().filter(|r| r.layer == Layer::Gold).collect();
        assert_eq!(gold.len(), GOLD_TABLES.len());
        assert!(gold.iter().all(|r| r.status == RunStatus::Failed));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_extract_fails_during_extraction() -> Result<()> {
        let batches = test_support::clean_batches()
            .into_iter()
            .filter(|(k, _)| *k != EntityKind::Warehouse);
        let h = Harness::new(InMemorySource::new(batches));
        let err = h.pipeline().run().await.unwrap_err();
        assert!(matches!(err, MedallionError::Infrastructure(InfrastructureError::SourceError { .. })));
        assert_eq!(h.store.published_run(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_invoices_are_rejected_not_aggregated() -> Result<()> {
        let mut batches = test_support::clean_batches();
        for (kind, batch) in batches.iter_mut() {
            if *kind == EntityKind::SupplyOrder {
                let huge = "40000000000000000000000000000";
                let extra = raw_batch(
                    "supply_orders",
                    &["supply_order_id", "product_id", "warehouse_id", "retail_store_id", "quantity", "price", "total_invoice", "order_date", "status"],
                    &[
                        &["9100", "10", "100", "500", "1", huge, huge, "2024-06-01", "pending"],
                        &["9101", "10", "100", "500", "1", huge, huge, "2024-06-02", "pending"],
                    ],
                );
                for mut row in extra.rows {
                    row.seq = batch.rows.len() as u64;
                    batch.rows.push(row);
                }
            }
        }
        let h = Harness::new(InMemorySource::new(batches));
        let report = h.pipeline().run().await?;

        assert_eq!(report.state, RunState::Published);
        assert!(report.reconciliation.passed());
        let rejected = h
            .audit
            .rejections(&AuditFilter {
                table: Some("supply_orders".to_string()),
                ..Default::default()
            })
            .await?;
        assert_eq!(rejected.len(), 2);
        assert!(rejected.iter().all(|r| r.item.reason == "amount_out_of_range"
            && r.item.kind == RejectionKind::RangeViolation));
        Ok(())
    }

    /// Audit store whose Gold-row finalization always fails.
    struct GoldFinalizeFails(Arc<DuckDbAuditStore>);

    #[async_trait]
    impl AuditRecorder for GoldFinalizeFails {
        async fn allocate_run_id(&self) -> Result<RunId, MedallionError> {
            self.0.allocate_run_id().await
        }

        async fn begin_run(&self, run_id: RunId, layer: Layer, table: &str) -> Result<(), MedallionError> {
            self.0.begin_run(run_id, layer, table).await
        }

        async fn finalize_run(
            &self,
            run_id: RunId,
            layer: Layer,
            table: &str,
            outcome: RunOutcome,
        ) -> Result<(), MedallionError> {
            if layer == Layer::Gold {
                return Err(MedallionError::InternalError("audit store unavailable".to_string()));
            }
            self.0.finalize_run(run_id, layer, table, outcome).await
        }

        async fn record_rejections(&self, rows: &[RejectedRow]) -> Result<(), MedallionError> {
            self.0.record_rejections(rows).await
        }

        async fn record_quality_checks(&self, results: &[QualityCheckResult]) -> Result<(), MedallionError> {
            self.0.record_quality_checks(results).await
        }
    }

    #[tokio::test]
    async fn test_audit_failure_after_publish_keeps_the_run_published() -> Result<()> {
        let h = Harness::clean();
        let pipeline = Pipeline::new(
            test_support::project_config(),
            h.source.clone(),
            Arc::new(GoldFinalizeFails(h.audit.clone())),
            h.store.clone(),
        )?;
        let report = pipeline.run().await?;

        assert_eq!(report.state, RunState::Published);
        assert_eq!(h.store.published_run(), Some(report.run_id));
        let runs = h
            .audit
            .runs(&AuditFilter {
                run_id: Some(report.run_id),
                ..Default::default()
            })
            .await?;
        let whole = runs.iter().find(|r| r.layer == Layer::Pipeline).unwrap();
        assert_eq!(whole.status, RunStatus::Published);
        Ok(())
    }

    #[tokio::test]
    async fn test_forecasts_are_sanity_checked() -> Result<()> {
        let forecasts = raw_batch(
            "forecasts",
            &["date", "entity_id", "level", "predicted_value", "lower_bound", "upper_bound", "model_name", "granularity"],
            &[
                &["2024-08-01", "10", "product", "42.5", "38", "47", "sarimax", "daily"],
                &["2024-08-01", "10", "product", "42.5", "50", "47", "sarimax", "daily"],
            ],
        );
        let h = Harness::new(InMemorySource::new(test_support::clean_batches()).with_forecasts(forecasts));
        let report = h.pipeline().run().await?;

        let summary = report.forecasts.unwrap();
        assert_eq!((summary.read, summary.validated, summary.rejected), (2, 1, 1));
        let rejected = h
            .audit
            .rejections(&AuditFilter {
                table: Some(FORECAST_TABLE.to_string()),
                ..Default::default()
            })
            .await?;
        assert_eq!(rejected[0].item.reason, "forecast_bounds_inverted");
        Ok(())
    }

    #[tokio::test]
    async fn test_parallel_checks_match_sequential_validation() -> Result<()> {
        let config = test_support::project_config();
        let engine = Arc::new(ValidationEngine::from_config(&config)?);
        let batch = raw_batch(
            "suppliers",
            &["supplier_id", "supplier_name", "contact_email"],
            &[
                &["1", "Acme", "a@x.io"],
                &["2", "Beta", "b@x.io"],
                &["x", "Gamma", "c@x.io"],
                &["4", "Delta", "A@X.io"],
                &["5", "Eps", ""],
            ],
        );
        let ctx = test_support::ctx();
        let parents = KeyIndex::default();

        let sequential = engine.validate::<Supplier>(&ctx, &batch, &parents);
        let checks = check_rows::<Supplier>(engine.clone(), Arc::new(batch.clone()), Arc::new(parents), 3).await?;
        let parallel = engine.finish(&ctx, &batch, checks);

        assert_eq!(parallel.validated, sequential.validated);
        assert_eq!(parallel.rejected, sequential.rejected);
        Ok(())
    }

    /// Publisher that parks inside `publish` until released.
    struct BlockingPublisher {
        inner: Arc<SnapshotStore>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl SnapshotPublisher for BlockingPublisher {
        async fn stage_validated(&self, silver: Arc<SilverSnapshot>) -> Result<(), MedallionError> {
            self.inner.stage_validated(silver).await
        }

        async fn publish(&self, run_id: RunId, gold: Arc<GoldSnapshot>) -> Result<(), MedallionError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.publish(run_id, gold).await
        }

        async fn discard(&self, run_id: RunId) {
            self.inner.discard(run_id).await
        }
    }

    #[tokio::test]
    async fn test_second_run_while_publishing_is_refused() -> Result<()> {
        let h = Harness::clean();
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let publisher = Arc::new(BlockingPublisher {
            inner: h.store.clone(),
            entered: entered.clone(),
            release: release.clone(),
        });
        let pipeline = Arc::new(Pipeline::new(
            test_support::project_config(),
            h.source.clone(),
            h.audit.clone(),
            publisher,
        )?);

        let first = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run().await }
        });
        entered.notified().await;

        let second = pipeline.run().await.unwrap_err();
        assert!(matches!(second, MedallionError::Run(RunError::RunInProgress { .. })));

        release.notify_one();
        let report = first.await??;
        assert_eq!(report.state, RunState::Published);
        assert_eq!(h.store.published_run(), Some(report.run_id));
        Ok(())
    }
}
