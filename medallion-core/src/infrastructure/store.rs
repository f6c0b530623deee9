// medallion-core/src/infrastructure/store.rs
//
// Validated and aggregate stores. Readers hold an `Arc` to a frozen snapshot;
// publishing swaps the pointer, so a reader sees the old set or the new set
// and never a mix. A run's validated layer stays staged (private) until its
// aggregates publish. With a target directory the published layout is
// mirrored on disk, `CURRENT` being the on-disk pointer:
//
//   target/runs/<run_id>/silver/<table>.json
//   target/runs/<run_id>/gold/<table>.json
//   target/CURRENT

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::domain::aggregation::{GOLD_TABLES, GoldSnapshot};
use crate::domain::run::RunId;
use crate::domain::schema::EntityKind;
use crate::domain::validation::SilverSnapshot;
use crate::error::MedallionError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;
use crate::ports::publisher::{AggregateStore, SnapshotPublisher, ValidatedStore};

pub const CURRENT_FILE: &str = "CURRENT";

/// Validated snapshots kept in memory, oldest evicted first.
const VALIDATED_HISTORY: usize = 16;

#[derive(Clone)]
struct Published {
    run_id: RunId,
    gold: Arc<GoldSnapshot>,
}

#[derive(Default)]
pub struct SnapshotStore {
    staged: RwLock<BTreeMap<RunId, Arc<SilverSnapshot>>>,
    validated: RwLock<BTreeMap<RunId, Arc<SilverSnapshot>>>,
    published: RwLock<Option<Published>>,
    target_dir: Option<PathBuf>,
}

fn poisoned() -> MedallionError {
    MedallionError::InternalError("Snapshot store lock poisoned".to_string())
}

fn json_err(e: serde_json::Error) -> MedallionError {
    InfrastructureError::Json(e).into()
}

pub fn run_dir(target_dir: &Path, run_id: RunId) -> PathBuf {
    target_dir.join("runs").join(run_id.to_string())
}

impl SnapshotStore {
    /// Memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Memory plus a JSON mirror under `target_dir`.
    pub fn with_target(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: Some(target_dir.into()),
            ..Self::default()
        }
    }

    /// Latest published gold snapshot, if any.
    pub fn published(&self) -> Option<(RunId, Arc<GoldSnapshot>)> {
        let guard = self.published.read().ok()?;
        guard.as_ref().map(|p| (p.run_id, p.gold.clone()))
    }

    pub fn validated_snapshot(&self, run_id: RunId) -> Option<Arc<SilverSnapshot>> {
        self.validated.read().ok()?.get(&run_id).cloned()
    }

    fn staged_snapshot(&self, run_id: RunId) -> Result<Option<Arc<SilverSnapshot>>, MedallionError> {
        Ok(self.staged.read().map_err(|_| poisoned())?.get(&run_id).cloned())
    }

    fn write_run(
        target: &Path,
        run_id: RunId,
        silver: Option<&SilverSnapshot>,
        gold: &GoldSnapshot,
    ) -> Result<(), MedallionError> {
        let dir = run_dir(target, run_id);
        if let Some(silver) = silver {
            for kind in EntityKind::ALL {
                let bytes = silver.table_bytes(kind).map_err(json_err)?;
                atomic_write(dir.join("silver").join(format!("{}.json", kind.table_name())), bytes)?;
            }
        }
        for table in GOLD_TABLES {
            let bytes = gold
                .table_bytes(table)
                .ok_or_else(|| MedallionError::InternalError(format!("unknown table {}", table)))?
                .map_err(json_err)?;
            atomic_write(dir.join("gold").join(format!("{}.json", table)), bytes)?;
        }
        atomic_write(target.join(CURRENT_FILE), run_id.to_string())?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotPublisher for SnapshotStore {
    async fn stage_validated(&self, silver: Arc<SilverSnapshot>) -> Result<(), MedallionError> {
        let run_id = silver.run_id;
        self.staged
            .write()
            .map_err(|_| poisoned())?
            .insert(run_id, silver);
        debug!(%run_id, "validated snapshot staged");
        Ok(())
    }

    async fn publish(&self, run_id: RunId, gold: Arc<GoldSnapshot>) -> Result<(), MedallionError> {
        let silver = self.staged_snapshot(run_id)?;

        // Every file first, CURRENT last; only then move the pointers.
        if let Some(target) = &self.target_dir
            && let Err(e) = Self::write_run(target, run_id, silver.as_deref(), &gold)
        {
            // CURRENT was not moved: the partial run directory is unreachable.
            if let Err(cleanup) = fs::remove_dir_all(run_dir(target, run_id)) {
                warn!(%run_id, error = %cleanup, "could not remove partial run directory");
            }
            return Err(e);
        }

        {
            let mut validated = self.validated.write().map_err(|_| poisoned())?;
            let mut published = self.published.write().map_err(|_| poisoned())?;
            if let Some(silver) = silver {
                validated.insert(run_id, silver);
                while validated.len() > VALIDATED_HISTORY {
                    validated.pop_first();
                }
            }
            *published = Some(Published { run_id, gold });
        }
        self.staged.write().map_err(|_| poisoned())?.remove(&run_id);
        info!(%run_id, "📣 Aggregates published");
        Ok(())
    }

    async fn discard(&self, run_id: RunId) {
        match self.staged.write() {
            Ok(mut staged) => {
                if staged.remove(&run_id).is_some() {
                    debug!(%run_id, "staged snapshot discarded");
                }
            }
            Err(_) => warn!(%run_id, "snapshot store lock poisoned, staged snapshot kept"),
        }
    }
}

impl ValidatedStore for SnapshotStore {
    fn validated(&self, run_id: RunId, kind: EntityKind) -> Option<serde_json::Value> {
        self.validated_snapshot(run_id)?.table_json(kind).ok()
    }

    fn latest_validated_run(&self) -> Option<RunId> {
        self.validated.read().ok()?.keys().next_back().copied()
    }
}

impl AggregateStore for SnapshotStore {
    fn aggregate(&self, table: &str) -> Option<serde_json::Value> {
        let (_, gold) = self.published()?;
        gold.table_json(table)?.ok()
    }

    fn published_run(&self) -> Option<RunId> {
        self.published().map(|(run_id, _)| run_id)
    }
}

// --- LECTURE DISQUE (autre processus: CLI inspect) ---

/// Run id `CURRENT` points at, if something was ever published.
pub fn read_current(target_dir: &Path) -> Result<Option<RunId>, InfrastructureError> {
    let path = target_dir.join(CURRENT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    content
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| InfrastructureError::ConfigError(format!("{:?} is not a run id", path)))
}

/// A published aggregate table, read from the mirror.
pub fn read_published_table(
    target_dir: &Path,
    table: &str,
) -> Result<Option<(RunId, serde_json::Value)>, InfrastructureError> {
    let Some(run_id) = read_current(target_dir)? else {
        return Ok(None);
    };
    let path = run_dir(target_dir, run_id).join("gold").join(format!("{}.json", table));
    if !path.exists() {
        return Ok(None);
    }
    let value = serde_json::from_slice(&fs::read(path)?)?;
    Ok(Some((run_id, value)))
}

/// A validated table of a given run, read from the mirror.
pub fn read_validated_table(
    target_dir: &Path,
    run_id: RunId,
    kind: EntityKind,
) -> Result<Option<serde_json::Value>, InfrastructureError> {
    let path = run_dir(target_dir, run_id)
        .join("silver")
        .join(format!("{}.json", kind.table_name()));
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
}
