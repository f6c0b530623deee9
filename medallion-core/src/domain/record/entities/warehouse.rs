// medallion-core/src/domain/record/entities/warehouse.rs

use serde::{Deserialize, Serialize};

use super::{Entity, RuleContext, RuleViolation};
use crate::domain::record::coercion::{CoercedRow, MissingField};
use crate::domain::schema::EntityKind;

/// Capacity above which a warehouse is flagged as a probable data-entry error.
pub const CAPACITY_OUTLIER: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: i64,
    pub warehouse_name: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub storage_capacity: i64,
}

impl Entity for Warehouse {
    const KIND: EntityKind = EntityKind::Warehouse;

    fn from_row(row: &CoercedRow) -> Result<Self, MissingField> {
        Ok(Self {
            warehouse_id: row.require_int("warehouse_id")?,
            warehouse_name: row.text("warehouse_name"),
            city: row.text("city"),
            region: row.text("region"),
            storage_capacity: row.require_int("storage_capacity")?,
        })
    }

    fn primary_key(&self) -> i64 {
        self.warehouse_id
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        Vec::new()
    }

    fn check_rules(&self) -> Option<RuleViolation> {
        (self.storage_capacity <= 0).then(|| {
            RuleViolation::new(
                "non_positive_capacity",
                "storage_capacity",
                format!("storage_capacity {} <= 0", self.storage_capacity),
            )
        })
    }

    fn soft_rule_failures(&self, _ctx: &RuleContext) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if self.region.is_none() {
            failed.push("missing_region");
        }
        if self.storage_capacity > CAPACITY_OUTLIER {
            failed.push("capacity_outlier");
        }
        failed
    }
}
