// medallion-core/src/domain/validation/silver.rs

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::rejection::RejectedRow;
use crate::domain::canonical;
use crate::domain::record::Entity;
use crate::domain::record::entities::{
    Inventory, Product, RetailStore, Supplier, SupplyOrder, Warehouse,
};
use crate::domain::run::RunId;
use crate::domain::schema::EntityKind;

/// A record that passed every hard check, with its soft-rule verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validated<E> {
    pub seq: u64,
    pub quality_score: u8,
    pub soft_failures: Vec<&'static str>,
    #[serde(flatten)]
    pub record: E,
}

/// Validation result for one entity in one run.
#[derive(Debug, Clone)]
pub struct EntityOutcome<E> {
    pub kind: EntityKind,
    pub raw_count: usize,
    pub validated: Vec<Validated<E>>,
    pub rejected: Vec<RejectedRow>,
}

impl<E> EntityOutcome<E> {
    /// No row silently dropped, none counted twice.
    pub fn is_balanced(&self) -> bool {
        self.validated.len() + self.rejected.len() == self.raw_count
    }
}

/// Primary keys of the validated rows of every entity processed so far.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    keys: BTreeMap<EntityKind, HashSet<i64>>,
}

impl KeyIndex {
    pub fn register<E: Entity>(&mut self, validated: &[Validated<E>]) {
        self.keys
            .insert(E::KIND, validated.iter().map(|v| v.record.primary_key()).collect());
    }

    pub fn contains(&self, kind: EntityKind, key: i64) -> bool {
        self.keys.get(&kind).is_some_and(|set| set.contains(&key))
    }
}

/// The validated layer of one run. Built once and never mutated after.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SilverSnapshot {
    pub run_id: RunId,
    pub suppliers: Vec<Validated<Supplier>>,
    pub products: Vec<Validated<Product>>,
    pub warehouses: Vec<Validated<Warehouse>>,
    pub inventory: Vec<Validated<Inventory>>,
    pub retail_stores: Vec<Validated<RetailStore>>,
    pub supply_orders: Vec<Validated<SupplyOrder>>,
}

impl SilverSnapshot {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Supplier => self.suppliers.len(),
            EntityKind::Product => self.products.len(),
            EntityKind::Warehouse => self.warehouses.len(),
            EntityKind::Inventory => self.inventory.len(),
            EntityKind::RetailStore => self.retail_stores.len(),
            EntityKind::SupplyOrder => self.supply_orders.len(),
        }
    }

    pub fn table_json(&self, kind: EntityKind) -> Result<serde_json::Value, serde_json::Error> {
        match kind {
            EntityKind::Supplier => serde_json::to_value(&self.suppliers),
            EntityKind::Product => serde_json::to_value(&self.products),
            EntityKind::Warehouse => serde_json::to_value(&self.warehouses),
            EntityKind::Inventory => serde_json::to_value(&self.inventory),
            EntityKind::RetailStore => serde_json::to_value(&self.retail_stores),
            EntityKind::SupplyOrder => serde_json::to_value(&self.supply_orders),
        }
    }

    pub fn table_bytes(&self, kind: EntityKind) -> Result<Vec<u8>, serde_json::Error> {
        match kind {
            EntityKind::Supplier => canonical::to_canonical_json(&self.suppliers),
            EntityKind::Product => canonical::to_canonical_json(&self.products),
            EntityKind::Warehouse => canonical::to_canonical_json(&self.warehouses),
            EntityKind::Inventory => canonical::to_canonical_json(&self.inventory),
            EntityKind::RetailStore => canonical::to_canonical_json(&self.retail_stores),
            EntityKind::SupplyOrder => canonical::to_canonical_json(&self.supply_orders),
        }
    }
}
