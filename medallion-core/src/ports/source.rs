// medallion-core/src/ports/source.rs

// What the pipeline needs from the raw record source (spreadsheet export,
// CSV drop, in-memory fixture...). Rows arrive as strings; typing is ours.

use crate::domain::record::RawBatch;
use crate::domain::schema::EntityKind;
use crate::error::MedallionError;
use async_trait::async_trait;

#[async_trait]
pub trait RawSource: Send + Sync {
    /// Full current extract of one entity, tagged with its source batch id.
    async fn fetch(&self, kind: EntityKind) -> Result<RawBatch, MedallionError>;

    /// Forecast producer output, if the producer has delivered any.
    async fn fetch_forecasts(&self) -> Result<Option<RawBatch>, MedallionError>;
}
