// medallion-core/src/infrastructure/config/project.rs

use serde::{Deserialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, instrument};

use crate::domain::config::{EntityRules, ProjectConfig, RejectionTaxonomy};
use crate::domain::schema::EntityKind;
use crate::error::MedallionError;
use crate::infrastructure::error::InfrastructureError;

pub const TAXONOMY_FILE: &str = "taxonomy.yml";
pub const ENTITIES_FILE: &str = "entities.yml";

#[derive(Deserialize)]
struct TaxonomyWrapper {
    rejection_taxonomy: RejectionTaxonomy,
}

#[derive(Deserialize)]
struct EntitiesWrapper {
    scoring_version: String,
    entities: BTreeMap<EntityKind, EntityRules>,
}

// --- LOADER ---

/// Main file, then satellites, then environment, then the semantic checks.
/// A project that fails any of these never reaches a run.
#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, MedallionError> {
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project manifest");

    // 2. Chargement YAML Base
    let mut config: ProjectConfig = load_fragment(&config_path)?;

    // 3. Hydratation des Satellites (Fail-Secure)
    if let Some(config_folder) = config.config_paths.first() {
        let config_dir = project_dir.join(config_folder);
        if config_dir.exists() {
            load_satellite_configs(&mut config, &config_dir)?;
        }
    }

    // 4. Override via Variables d'Environnement
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    config.check()?;
    Ok(config)
}

/// Same layering as `load_project_config` but from in-memory documents.
/// No environment overrides, no semantic checks.
pub fn parse_project_config(
    main: &str,
    taxonomy: Option<&str>,
    entities: Option<&str>,
) -> Result<ProjectConfig, InfrastructureError> {
    let mut config: ProjectConfig = parse_fragment(main, "<main>")?;
    if let Some(content) = taxonomy {
        hydrate_taxonomy(&mut config, parse_fragment(content, TAXONOMY_FILE)?);
    }
    if let Some(content) = entities {
        hydrate_entities(&mut config, parse_fragment(content, ENTITIES_FILE)?);
    }
    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    let candidates = ["medallion.yaml", "medallion_project.yaml"];
    for filename in candidates {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, candidates
    )))
}

// --- LOGIQUE GÉNÉRIQUE ---

fn parse_fragment<T: DeserializeOwned>(content: &str, origin: &str) -> Result<T, InfrastructureError> {
    serde_yaml::from_str(content).map_err(|source| InfrastructureError::YamlError {
        path: origin.to_string(),
        source,
    })
}

/// Charge un fragment de configuration typé depuis un fichier.
fn load_fragment<T: DeserializeOwned>(path: &Path) -> Result<T, InfrastructureError> {
    let content = fs::read_to_string(path)?;
    parse_fragment(&content, &path.display().to_string())
}

fn hydrate_taxonomy(config: &mut ProjectConfig, wrapper: TaxonomyWrapper) {
    config.rejection_taxonomy = wrapper.rejection_taxonomy;
}

fn hydrate_entities(config: &mut ProjectConfig, wrapper: EntitiesWrapper) {
    config.scoring_version = wrapper.scoring_version;
    config.entities = wrapper.entities;
}

fn load_satellite_configs(
    config: &mut ProjectConfig,
    config_dir: &Path,
) -> Result<(), InfrastructureError> {
    // A. Rejection taxonomy
    let taxonomy_path = config_dir.join(TAXONOMY_FILE);
    if taxonomy_path.exists() {
        // Fichier corrompu : on ARRÊTE tout.
        hydrate_taxonomy(config, load_fragment(&taxonomy_path)?);
        info!(
            version = %config.rejection_taxonomy.version,
            "  🏷️  Rejection taxonomy loaded"
        );
    }

    // B. Required fields + soft-rule weights
    let entities_path = config_dir.join(ENTITIES_FILE);
    if entities_path.exists() {
        hydrate_entities(config, load_fragment(&entities_path)?);
        info!(
            scoring = %config.scoring_version,
            "  ⚖️  Entity rules loaded"
        );
    }

    Ok(())
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T, InfrastructureError> {
    raw.trim()
        .parse()
        .map_err(|_| InfrastructureError::ConfigError(format!("{}: invalid value '{}'", key, raw)))
}

fn apply_env_overrides(
    config: &mut ProjectConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), InfrastructureError> {
    if let Some(val) = var("MEDALLION_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
    if let Some(val) = var("MEDALLION_DATA_PATH") {
        info!(old = ?config.data_path, new = ?val, "Overriding data path via ENV");
        config.data_path = val;
    }
    if let Some(val) = var("MEDALLION_WORKER_CONCURRENCY") {
        let parsed = parse_env("MEDALLION_WORKER_CONCURRENCY", &val)?;
        info!(old = config.pipeline.worker_concurrency, new = parsed, "Overriding worker concurrency via ENV");
        config.pipeline.worker_concurrency = parsed;
    }
    if let Some(val) = var("MEDALLION_RUN_TIMEOUT_SECS") {
        let parsed = parse_env("MEDALLION_RUN_TIMEOUT_SECS", &val)?;
        info!(old = config.pipeline.run_timeout_secs, new = parsed, "Overriding run timeout via ENV");
        config.pipeline.run_timeout_secs = parsed;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const MAIN: &str = include_str!("../../../../demos/supply_chain/medallion.yaml");
    const TAXONOMY: &str = include_str!("../../../../demos/supply_chain/config/taxonomy.yml");
    const ENTITIES: &str = include_str!("../../../../demos/supply_chain/config/entities.yml");

    #[test]
    fn test_demo_project_passes_semantic_checks() -> Result<()> {
        let config = parse_project_config(MAIN, Some(TAXONOMY), Some(ENTITIES))?;
        config.check()?;
        assert_eq!(config.entities.len(), EntityKind::ALL.len());
        Ok(())
    }

    #[test]
    fn test_missing_satellites_fail_the_check() -> Result<()> {
        let config = parse_project_config(MAIN, None, None)?;
        assert!(config.check().is_err());
        Ok(())
    }

    #[test]
    fn test_load_from_directory() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("medallion.yaml"), MAIN)?;
        fs::create_dir_all(dir.path().join("config"))?;
        fs::write(dir.path().join("config").join(TAXONOMY_FILE), TAXONOMY)?;
        fs::write(dir.path().join("config").join(ENTITIES_FILE), ENTITIES)?;

        let config = load_project_config(dir.path())?;
        assert_eq!(config.name, "supply_chain");
        Ok(())
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let err = load_project_config(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            MedallionError::Infrastructure(InfrastructureError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let mut config = parse_project_config(MAIN, Some(TAXONOMY), Some(ENTITIES))?;
        apply_env_overrides(&mut config, |key| match key {
            "MEDALLION_WORKER_CONCURRENCY" => Some("3".to_string()),
            "MEDALLION_TARGET_PATH" => Some("/tmp/out".to_string()),
            _ => None,
        })?;
        assert_eq!(config.pipeline.worker_concurrency, 3);
        assert_eq!(config.target_path, "/tmp/out");

        let bad = apply_env_overrides(&mut config, |key| {
            (key == "MEDALLION_RUN_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(bad, Err(InfrastructureError::ConfigError(_))));
        Ok(())
    }

    #[test]
    fn test_corrupt_satellite_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("medallion.yaml"), MAIN)?;
        fs::create_dir_all(dir.path().join("config"))?;
        fs::write(dir.path().join("config").join(TAXONOMY_FILE), "rejection_taxonomy: [")?;
        let err = load_project_config(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            MedallionError::Infrastructure(InfrastructureError::YamlError { .. })
        ));
        Ok(())
    }
}
