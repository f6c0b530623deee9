// medallion-core/src/domain/record/entities/retail_store.rs

use serde::{Deserialize, Serialize};

use super::{Entity, RuleContext, normalized};
use crate::domain::record::coercion::{CoercedRow, MissingField};
use crate::domain::schema::EntityKind;

const KNOWN_STORE_STATUSES: [&str; 3] = ["active", "inactive", "closed"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailStore {
    pub retail_store_id: i64,
    pub store_name: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub store_type: Option<String>,
    pub store_status: Option<String>,
}

impl Entity for RetailStore {
    const KIND: EntityKind = EntityKind::RetailStore;

    fn from_row(row: &CoercedRow) -> Result<Self, MissingField> {
        Ok(Self {
            retail_store_id: row.require_int("retail_store_id")?,
            store_name: row.text("store_name"),
            city: row.text("city"),
            region: row.text("region"),
            store_type: row.text("store_type"),
            store_status: normalized(row.text("store_status")),
        })
    }

    fn primary_key(&self) -> i64 {
        self.retail_store_id
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        Vec::new()
    }

    fn soft_rule_failures(&self, _ctx: &RuleContext) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if self.region.is_none() {
            failed.push("missing_region");
        }
        if !self
            .store_status
            .as_deref()
            .is_some_and(|s| KNOWN_STORE_STATUSES.contains(&s))
        {
            failed.push("unknown_store_status");
        }
        failed
    }
}
