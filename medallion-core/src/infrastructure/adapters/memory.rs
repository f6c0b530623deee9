// medallion-core/src/infrastructure/adapters/memory.rs

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::record::RawBatch;
use crate::domain::schema::EntityKind;
use crate::error::MedallionError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::RawSource;

/// Raw source backed by batches handed over in memory (embedding, tests).
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    batches: BTreeMap<EntityKind, RawBatch>,
    forecasts: Option<RawBatch>,
}

impl InMemorySource {
    pub fn new(batches: impl IntoIterator<Item = (EntityKind, RawBatch)>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
            forecasts: None,
        }
    }

    pub fn with_forecasts(mut self, batch: RawBatch) -> Self {
        self.forecasts = Some(batch);
        self
    }
}

#[async_trait]
impl RawSource for InMemorySource {
    async fn fetch(&self, kind: EntityKind) -> Result<RawBatch, MedallionError> {
        self.batches.get(&kind).cloned().ok_or_else(|| {
            InfrastructureError::SourceError {
                table: kind.table_name().to_string(),
                reason: "no batch supplied".to_string(),
            }
            .into()
        })
    }

    async fn fetch_forecasts(&self) -> Result<Option<RawBatch>, MedallionError> {
        Ok(self.forecasts.clone())
    }
}
