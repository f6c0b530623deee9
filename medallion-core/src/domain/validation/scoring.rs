// medallion-core/src/domain/validation/scoring.rs

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::config::ProjectConfig;
use crate::domain::error::DomainError;
use crate::domain::schema::EntityKind;

/// Versioned soft-rule weights: quality_score = 100 - sum(weights of failed rules).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringTable {
    pub version: String,
    weights: BTreeMap<EntityKind, BTreeMap<String, u32>>,
}

impl ScoringTable {
    pub const MAX_SCORE: u8 = 100;

    /// Every soft rule the schema declares must carry a weight, and nothing else may.
    pub fn from_config(config: &ProjectConfig) -> Result<Self, DomainError> {
        if config.scoring_version.trim().is_empty() {
            return Err(DomainError::ConfigurationError(
                "scoring_version must be set".to_string(),
            ));
        }

        let mut weights = BTreeMap::new();
        for kind in EntityKind::ALL {
            let rules = config.entity_rules(kind)?;
            let declared = kind.schema().soft_rules;

            if let Some(missing) = declared.iter().find(|r| !rules.soft_rules.contains_key(**r)) {
                return Err(DomainError::ConfigurationError(format!(
                    "{}: soft rule '{}' has no weight",
                    kind, missing
                )));
            }
            if let Some(unknown) = rules
                .soft_rules
                .keys()
                .find(|r| !declared.contains(&r.as_str()))
            {
                return Err(DomainError::ConfigurationError(format!(
                    "{}: '{}' is not a soft rule of this entity",
                    kind, unknown
                )));
            }
            weights.insert(kind, rules.soft_rules.clone());
        }

        Ok(Self {
            version: config.scoring_version.clone(),
            weights,
        })
    }

    pub fn score(&self, kind: EntityKind, failed: &[&str]) -> u8 {
        let penalty: u32 = self.weights.get(&kind).map_or(0, |table| {
            failed
                .iter()
                .filter_map(|rule| table.get(*rule))
                .fold(0u32, |acc, w| acc.saturating_add(*w))
        });
        let score = u32::from(Self::MAX_SCORE).saturating_sub(penalty);
        u8::try_from(score).unwrap_or(Self::MAX_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_score_subtracts_and_clamps() -> anyhow::Result<()> {
        let mut config = test_support::project_config();
        let supplier = config
            .entities
            .get_mut(&EntityKind::Supplier)
            .ok_or_else(|| anyhow::anyhow!("supplier rules"))?;
        supplier.soft_rules.insert("email_format".into(), 30);
        supplier.soft_rules.insert("phone_format".into(), 10);
        supplier.soft_rules.insert("name_casing".into(), 90);

        let table = ScoringTable::from_config(&config)?;
        assert_eq!(table.score(EntityKind::Supplier, &[]), 100);
        assert_eq!(table.score(EntityKind::Supplier, &["email_format", "phone_format"]), 60);
        assert_eq!(table.score(EntityKind::Supplier, &["email_format", "name_casing"]), 0);
        Ok(())
    }

    #[test]
    fn test_unweighted_soft_rule_fails_config() {
        let mut config = test_support::project_config();
        if let Some(rules) = config.entities.get_mut(&EntityKind::Warehouse) {
            rules.soft_rules.remove("capacity_outlier");
        }
        assert!(ScoringTable::from_config(&config).is_err());
    }
}
