// medallion-core/src/infrastructure/adapters/csv_source.rs

use async_trait::async_trait;
use duckdb::{Config, Connection};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::aggregation::forecast::FORECAST_TABLE;
use crate::domain::canonical::sha256_hex;
use crate::domain::record::{RawBatch, RawRecord};
use crate::domain::schema::EntityKind;
use crate::error::MedallionError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::source::RawSource;

/// Reads `<table>.csv` extracts with DuckDB, every column as VARCHAR so that
/// typing stays with the validation engine.
pub struct CsvSource {
    files: BTreeMap<String, PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl CsvSource {
    pub fn new(data_dir: &Path) -> Result<Self, InfrastructureError> {
        if !data_dir.is_dir() {
            return Err(InfrastructureError::SourceError {
                table: "*".to_string(),
                reason: format!("data directory {:?} does not exist", data_dir),
            });
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(data_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let table = stem.to_lowercase();
            if let Some(existing) = files.get(&table) {
                warn!(table = %table, kept = ?existing, ignored = ?path, "Duplicate extract, keeping the first");
                continue;
            }
            files.insert(table, path.to_path_buf());
        }
        debug!(count = files.len(), "CSV extracts discovered");

        Ok(Self {
            files,
            conn: Arc::new(Mutex::new(Connection::open_in_memory_with_flags(Config::default())?)),
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn read(&self, table: &str, path: &Path) -> Result<RawBatch, MedallionError> {
        let bytes = fs::read(path)?;
        let digest = sha256_hex(&bytes);
        let batch_id = format!("{}@{}", table, &digest[..12.min(digest.len())]);

        let conn = self
            .conn
            .lock()
            .map_err(|_| MedallionError::Infrastructure(DatabaseError::Poisoned.into()))?;

        let source = format!(
            "read_csv('{}', header = true, all_varchar = true)",
            path.to_string_lossy().replace('\'', "''")
        );

        // Header, in file order
        let mut describe = conn.prepare(&format!("DESCRIBE SELECT * FROM {}", source))?;
        let columns: Vec<String> = describe
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", source))?;
        let width = columns.len();
        let cells = stmt.query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Option<String>>(i))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let mut rows = Vec::new();
        for (seq, values) in cells.enumerate() {
            let values = values?;
            rows.push(RawRecord::new(
                seq as u64,
                columns.iter().map(String::as_str).zip(values),
            ));
        }

        info!(table, rows = rows.len(), batch_id = %batch_id, "📥 Extract loaded");
        Ok(RawBatch::new(table, batch_id, rows))
    }
}

#[async_trait]
impl RawSource for CsvSource {
    async fn fetch(&self, kind: EntityKind) -> Result<RawBatch, MedallionError> {
        let table = kind.table_name();
        let path = self.files.get(table).ok_or_else(|| InfrastructureError::SourceError {
            table: table.to_string(),
            reason: format!("no {}.csv extract", table),
        })?;
        self.read(table, path)
    }

    async fn fetch_forecasts(&self) -> Result<Option<RawBatch>, MedallionError> {
        match self.files.get(FORECAST_TABLE) {
            Some(path) => self.read(FORECAST_TABLE, path).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::record::RawField;
    use anyhow::Result;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_strings_verbatim() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("inventory.csv"),
            "inventory_id,product_id,warehouse_id,quantity_on_hand,last_stocked_date\n\
             1,10,100,007,2024-06-01\n\
             2,10,101,-5,\n",
        )?;

        let source = CsvSource::new(dir.path())?;
        let batch = source.fetch(EntityKind::Inventory).await?;

        assert_eq!(batch.len(), 2);
        assert!(batch.batch_id.starts_with("inventory@"));
        assert_eq!(batch.rows[0].seq, 0);
        // No numeric inference: leading zeros survive.
        assert_eq!(batch.rows[0].get("quantity_on_hand").as_str(), Some("007"));
        assert_eq!(batch.rows[1].get("quantity_on_hand").as_str(), Some("-5"));
        assert_eq!(batch.rows[1].get("last_stocked_date"), &RawField::Absent);
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_id_tracks_content() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("suppliers.csv");
        fs::write(&path, "supplier_id,contact_email\n1,a@x.io\n")?;
        let first = CsvSource::new(dir.path())?.fetch(EntityKind::Supplier).await?;
        let again = CsvSource::new(dir.path())?.fetch(EntityKind::Supplier).await?;
        assert_eq!(first.batch_id, again.batch_id);

        fs::write(&path, "supplier_id,contact_email\n1,b@x.io\n")?;
        let changed = CsvSource::new(dir.path())?.fetch(EntityKind::Supplier).await?;
        assert_ne!(first.batch_id, changed.batch_id);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_extract() -> Result<()> {
        let dir = tempdir()?;
        let source = CsvSource::new(dir.path())?;
        assert!(source.fetch(EntityKind::Product).await.is_err());
        assert!(source.fetch_forecasts().await?.is_none());
        Ok(())
    }
}
