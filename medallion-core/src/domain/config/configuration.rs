// medallion-core/src/domain/config/configuration.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use validator::Validate;

use super::taxonomy::RejectionTaxonomy;
use crate::domain::error::DomainError;
use crate::domain::graph::GraphSolver;
use crate::domain::schema::EntityKind;
use crate::domain::validation::rejection::Classifier;
use crate::domain::validation::scoring::ScoringTable;

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    pub name: String,
    pub version: String,

    #[serde(rename = "config-paths", default)]
    pub config_paths: Vec<String>,

    #[serde(rename = "data-path", default = "default_data_path")]
    pub data_path: String,

    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,

    #[serde(rename = "clean-targets", default = "default_clean_targets")]
    pub clean_targets: Vec<String>,

    #[validate(nested)]
    pub pipeline: PipelineConfig,

    #[validate(nested)]
    pub aggregation: AggregationConfig,

    // Satellites (config/taxonomy.yml, config/entities.yml) fill these in.
    #[validate(nested)]
    #[serde(default)]
    pub rejection_taxonomy: RejectionTaxonomy,

    #[serde(default)]
    pub scoring_version: String,

    #[serde(default)]
    pub entities: BTreeMap<EntityKind, EntityRules>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct PipelineConfig {
    /// Maximum relative variance between aggregate and validated totals.
    #[validate(range(min = 0.0, max = 1.0))]
    pub reconciliation_tolerance: f64,

    #[validate(range(min = 1))]
    pub worker_concurrency: usize,

    /// Budget for aggregation + reconciliation.
    #[validate(range(min = 1))]
    pub run_timeout_secs: u64,

    /// Reference date for date-relative soft rules. Today when unset.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct AggregationConfig {
    /// A delivered order is on time when delivered within this many days.
    #[validate(range(min = 0))]
    pub on_time_threshold_days: i64,

    /// Stock lines below this quantity count as low stock.
    #[validate(range(min = 0))]
    pub low_stock_threshold: i64,

    /// More out-of-stock lines than this marks a group "Critical".
    pub critical_out_of_stock_items: u64,

    /// More low-stock lines than this marks a group "Warning".
    pub warning_low_stock_items: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct EntityRules {
    #[serde(default)]
    pub required: Vec<String>,
    /// Soft rule name -> score weight.
    #[serde(default)]
    pub soft_rules: BTreeMap<String, u32>,
}

fn default_data_path() -> String {
    "data".to_string()
}
fn default_target_path() -> String {
    "target".to_string()
}
fn default_clean_targets() -> Vec<String> {
    vec!["target".to_string()]
}

impl ProjectConfig {
    /// Structural validation (ranges) followed by the cross-file checks the
    /// derive cannot express.
    pub fn check(&self) -> Result<(), DomainError> {
        self.validate()
            .map_err(|e| DomainError::ConfigurationError(e.to_string()))?;

        Classifier::new(&self.rejection_taxonomy)?;
        ScoringTable::from_config(self)?;
        GraphSolver::plan_entities()?;

        for kind in EntityKind::ALL {
            let rules = self.entity_rules(kind)?;
            let schema = kind.schema();

            let required: BTreeSet<&str> = rules.required.iter().map(String::as_str).collect();
            if let Some(unknown) = required.iter().find(|f| schema.field(f).is_none()) {
                return Err(DomainError::ConfigurationError(format!(
                    "{}: required field '{}' is not declared",
                    kind, unknown
                )));
            }
            if let Some(missing) = schema.non_nullable_fields().find(|f| !required.contains(f)) {
                return Err(DomainError::ConfigurationError(format!(
                    "{}: '{}' is a key or non-nullable field and must be listed as required",
                    kind, missing
                )));
            }
        }
        Ok(())
    }

    pub fn entity_rules(&self, kind: EntityKind) -> Result<&EntityRules, DomainError> {
        self.entities.get(&kind).ok_or_else(|| {
            DomainError::ConfigurationError(format!("No rules configured for entity '{}'", kind))
        })
    }
}
