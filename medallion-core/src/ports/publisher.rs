// medallion-core/src/ports/publisher.rs

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::aggregation::GoldSnapshot;
use crate::domain::run::RunId;
use crate::domain::schema::EntityKind;
use crate::domain::validation::SilverSnapshot;
use crate::error::MedallionError;

/// Where validated and aggregated snapshots go.
#[async_trait]
pub trait SnapshotPublisher: Send + Sync {
    /// Holds the validated layer of a run until it is published or discarded.
    /// Staged snapshots are invisible to readers.
    async fn stage_validated(&self, silver: Arc<SilverSnapshot>) -> Result<(), MedallionError>;

    /// Makes `gold` and the run's staged validated layer visible together.
    /// All-or-nothing for readers.
    async fn publish(&self, run_id: RunId, gold: Arc<GoldSnapshot>) -> Result<(), MedallionError>;

    /// Drops whatever a failed run staged.
    async fn discard(&self, run_id: RunId);
}

/// Read side of the validated layer: published runs only.
pub trait ValidatedStore: Send + Sync {
    fn validated(&self, run_id: RunId, kind: EntityKind) -> Option<serde_json::Value>;
    fn latest_validated_run(&self) -> Option<RunId>;
}

/// Read side of the aggregate layer: always the latest published run.
pub trait AggregateStore: Send + Sync {
    fn aggregate(&self, table: &str) -> Option<serde_json::Value>;
    fn published_run(&self) -> Option<RunId>;
}
