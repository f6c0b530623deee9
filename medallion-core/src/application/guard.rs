// medallion-core/src/application/guard.rs

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::domain::error::RunError;
use crate::domain::run::Layer;

/// Layers with a run in flight. Shared by every pipeline handle of a process.
#[derive(Debug, Clone, Default)]
pub struct ActiveRuns {
    layers: Arc<Mutex<BTreeSet<Layer>>>,
}

/// Held for the duration of a run; releases its layers on drop, whatever the
/// outcome (success, error, timeout or panic).
#[derive(Debug)]
pub struct RunGuard {
    runs: ActiveRuns,
    layers: Vec<Layer>,
}

impl ActiveRuns {
    /// Claims all `layers` or none. Never waits.
    pub fn try_acquire(&self, layers: &[Layer]) -> Result<RunGuard, RunError> {
        // A poisoned set still holds valid data: a panicking run released its
        // layers through its guard before unwinding finished.
        let mut active = self.layers.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(busy) = layers.iter().find(|l| active.contains(l)) {
            return Err(RunError::RunInProgress { layer: *busy });
        }
        active.extend(layers.iter().copied());
        Ok(RunGuard {
            runs: self.clone(),
            layers: layers.to_vec(),
        })
    }

    pub fn is_active(&self, layer: Layer) -> bool {
        self.layers
            .lock()
            .map(|active| active.contains(&layer))
            .unwrap_or(true)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self.runs.layers.lock().unwrap_or_else(|p| p.into_inner());
        for layer in &self.layers {
            active.remove(layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_fails_until_release() -> anyhow::Result<()> {
        let runs = ActiveRuns::default();
        let guard = runs.try_acquire(&[Layer::Silver, Layer::Gold])?;

        let err = runs.try_acquire(&[Layer::Gold]).unwrap_err();
        assert!(matches!(err, RunError::RunInProgress { layer: Layer::Gold }));
        assert!(runs.is_active(Layer::Silver));

        drop(guard);
        assert!(!runs.is_active(Layer::Silver));
        runs.try_acquire(&[Layer::Gold])?;
        Ok(())
    }

    #[test]
    fn test_claim_is_all_or_nothing() -> anyhow::Result<()> {
        let runs = ActiveRuns::default();
        let _gold = runs.try_acquire(&[Layer::Gold])?;
        assert!(runs.try_acquire(&[Layer::Silver, Layer::Gold]).is_err());
        // The failed claim must not have left Silver behind.
        assert!(!runs.is_active(Layer::Silver));
        Ok(())
    }
}
