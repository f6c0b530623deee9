// medallion-core/src/application/clean.rs

use crate::error::MedallionError;
use crate::infrastructure::config::load_project_config;
use crate::infrastructure::fs::contained_path;
use std::fs;
use std::path::Path;

/// Removes the configured build artifacts (snapshots, audit trail, reports).
/// Returns the targets that were actually removed.
pub fn clean_project(project_dir: &Path) -> Result<Vec<String>, MedallionError> {
    tracing::info!("🧹 Initializing Medallion cleanup sequence...");

    let config = load_project_config(project_dir)?;

    let targets = if config.clean_targets.is_empty() {
        vec![config.target_path.clone()]
    } else {
        config.clean_targets
    };

    let mut removed = Vec::new();
    for target_rel_path in targets {
        // Zero-Trust Path Traversal Guard
        let Some(full_path) = contained_path(project_dir, &target_rel_path) else {
            return Err(MedallionError::UnsafePath(target_rel_path));
        };

        if full_path.exists() {
            if full_path.is_dir() {
                fs::remove_dir_all(&full_path)?;
            } else {
                fs::remove_file(&full_path)?;
            }
            println!("   🗑️  Artifact removed: {}", target_rel_path);
            removed.push(target_rel_path);
        }
    }

    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn project(dir: &Path, clean_targets: &str) -> Result<()> {
        let manifest = include_str!("../../../demos/supply_chain/medallion.yaml")
            .replace("clean-targets: [\"target\"]", clean_targets);
        fs::write(dir.join("medallion.yaml"), manifest)?;
        let config_dir = dir.join("config");
        fs::create_dir_all(&config_dir)?;
        fs::write(
            config_dir.join("taxonomy.yml"),
            include_str!("../../../demos/supply_chain/config/taxonomy.yml"),
        )?;
        fs::write(
            config_dir.join("entities.yml"),
            include_str!("../../../demos/supply_chain/config/entities.yml"),
        )?;
        Ok(())
    }

    #[test]
    fn test_removes_targets_only() -> Result<()> {
        let dir = tempdir()?;
        project(dir.path(), "clean-targets: [\"target\", \"missing\"]")?;
        fs::create_dir_all(dir.path().join("target/runs/1"))?;
        fs::write(dir.path().join("target/CURRENT"), "1")?;

        let removed = clean_project(dir.path())?;

        assert_eq!(removed, vec!["target".to_string()]);
        assert!(!dir.path().join("target").exists());
        assert!(dir.path().join("medallion.yaml").exists());
        Ok(())
    }

    #[test]
    fn test_refuses_escaping_targets() -> Result<()> {
        let dir = tempdir()?;
        project(dir.path(), "clean-targets: [\"../outside\"]")?;

        let err = clean_project(dir.path()).unwrap_err();
        assert!(matches!(err, MedallionError::UnsafePath(ref p) if p == "../outside"));
        Ok(())
    }
}
