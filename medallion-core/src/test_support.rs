// medallion-core/src/test_support.rs
//
// Shared fixtures for unit tests. The configuration is the demo project's,
// so tests and the shipped example cannot drift apart.

#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::aggregation::{GoldSnapshot, aggregate};
use crate::domain::config::{ProjectConfig, RejectionTaxonomy};
use crate::domain::record::entities::{
    Inventory, Product, RetailStore, Supplier, SupplyOrder, Warehouse,
};
use crate::domain::record::{Entity, RawBatch, RawRecord};
use crate::domain::run::{RunContext, RunId};
use crate::domain::schema::EntityKind;
use crate::domain::validation::{
    Classifier, KeyIndex, SilverSnapshot, Validated, ValidationEngine,
};
use crate::infrastructure::config::parse_project_config;

const MAIN: &str = include_str!("../../demos/supply_chain/medallion.yaml");
const TAXONOMY: &str = include_str!("../../demos/supply_chain/config/taxonomy.yml");
const ENTITIES: &str = include_str!("../../demos/supply_chain/config/entities.yml");

pub fn project_config() -> ProjectConfig {
    parse_project_config(MAIN, Some(TAXONOMY), Some(ENTITIES)).unwrap()
}

pub fn taxonomy() -> RejectionTaxonomy {
    project_config().rejection_taxonomy
}

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 31).unwrap()
}

pub fn ctx() -> RunContext {
    RunContext::new(
        RunId(1),
        as_of(),
        Utc.with_ymd_and_hms(2024, 7, 31, 6, 0, 0).unwrap(),
    )
}

/// Builds a batch from a header and string rows; blank cells are absent.
pub fn raw_batch(table: &str, columns: &[&str], rows: &[&[&str]]) -> RawBatch {
    let records = rows
        .iter()
        .enumerate()
        .map(|(seq, row)| {
            RawRecord::new(
                seq as u64,
                columns.iter().zip(row.iter()).map(|(c, v)| (*c, Some(*v))),
            )
        })
        .collect();
    RawBatch::new(table, format!("{}@test", table), records)
}

pub fn validated<E>(record: E) -> Validated<E> {
    Validated {
        seq: 0,
        quality_score: 100,
        soft_failures: Vec::new(),
        record,
    }
}

pub fn product(id: i64, supplier_id: i64) -> Product {
    Product {
        product_id: id,
        product_name: Some(format!("Product {}", id)),
        unit_cost: Decimal::from_str("1.00").unwrap(),
        selling_price: Decimal::from_str("2.00").unwrap(),
        supplier_id,
        product_category: Some("Hardware".to_string()),
        status: Some("active".to_string()),
    }
}

pub fn warehouse(id: i64) -> Warehouse {
    Warehouse {
        warehouse_id: id,
        warehouse_name: Some(format!("Warehouse {}", id)),
        city: Some("Lyon".to_string()),
        region: Some("South".to_string()),
        storage_capacity: 1_000,
    }
}

/// A small, fully valid raw extract: every row survives validation.
pub fn clean_batches() -> Vec<(EntityKind, RawBatch)> {
    vec![
        (
            EntityKind::Supplier,
            raw_batch(
                "suppliers",
                &["supplier_id", "supplier_name", "contact_email", "phone_number"],
                &[
                    &["1", "Acme Components", "sales@acme.example", "+1 555 0100"],
                    &["2", "Borealis Trading", "orders@borealis.example", "+1 555 0101"],
                ],
            ),
        ),
        (
            EntityKind::Product,
            raw_batch(
                "products",
                &["product_id", "product_name", "unit_cost", "selling_price", "supplier_id", "product_category", "status"],
                &[
                    &["10", "Steel Bracket", "2.50", "4.00", "1", "Hardware", "active"],
                    &["11", "Copper Wire", "8.00", "12.50", "2", "Electrical", "active"],
                    &["12", "LED Panel", "15.00", "22.00", "2", "Lighting", "active"],
                ],
            ),
        ),
        (
            EntityKind::Warehouse,
            raw_batch(
                "warehouses",
                &["warehouse_id", "warehouse_name", "city", "region", "storage_capacity"],
                &[
                    &["100", "North Hub", "Oslo", "North", "5000"],
                    &["101", "South Hub", "Seville", "South", "8000"],
                ],
            ),
        ),
        (
            EntityKind::Inventory,
            raw_batch(
                "inventory",
                &["inventory_id", "product_id", "warehouse_id", "quantity_on_hand", "last_stocked_date"],
                &[
                    &["1000", "10", "100", "120", "2024-06-01"],
                    &["1001", "11", "100", "0", "2024-05-15"],
                    &["1002", "12", "101", "35", "2024-06-20"],
                ],
            ),
        ),
        (
            EntityKind::RetailStore,
            raw_batch(
                "retail_stores",
                &["retail_store_id", "store_name", "city", "region", "store_type", "store_status"],
                &[
                    &["500", "Oslo Central", "Oslo", "North", "Flagship", "active"],
                    &["501", "Seville Mall", "Seville", "South", "Mall", "active"],
                ],
            ),
        ),
        (
            EntityKind::SupplyOrder,
            raw_batch(
                "supply_orders",
                &[
                    "supply_order_id", "product_id", "warehouse_id", "retail_store_id", "quantity",
                    "price", "total_invoice", "order_date", "shipped_date", "delivered_date", "status",
                ],
                &[
                    &["9000", "10", "100", "500", "10", "4.00", "40.00", "2024-06-01", "2024-06-02", "2024-06-05", "delivered"],
                    &["9001", "11", "100", "501", "5", "12.50", "62.50", "2024-06-03", "2024-06-04", "2024-06-20", "delivered"],
                    &["9002", "12", "101", "501", "3", "22.00", "66.00", "2024-07-10", "2024-07-12", "", "shipped"],
                    &["9003", "10", "101", "500", "2", "4.00", "8.00", "2024-07-20", "", "", "pending"],
                ],
            ),
        ),
    ]
}

fn validate_into<E: Entity>(
    engine: &ValidationEngine,
    parents: &mut KeyIndex,
    batch: &RawBatch,
) -> Vec<Validated<E>> {
    let outcome = engine.validate::<E>(&ctx(), batch, parents);
    parents.register(&outcome.validated);
    outcome.validated
}

/// `clean_batches` pushed through the sequential validation path.
pub fn silver_snapshot() -> SilverSnapshot {
    let engine = ValidationEngine::from_config(&project_config()).unwrap();
    let batches = clean_batches();
    let batch = |kind: EntityKind| {
        batches
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, b)| b.clone())
            .unwrap()
    };

    let mut parents = KeyIndex::default();
    let mut silver = SilverSnapshot::new(ctx().run_id);
    silver.suppliers = validate_into::<Supplier>(&engine, &mut parents, &batch(EntityKind::Supplier));
    silver.products = validate_into::<Product>(&engine, &mut parents, &batch(EntityKind::Product));
    silver.warehouses = validate_into::<Warehouse>(&engine, &mut parents, &batch(EntityKind::Warehouse));
    silver.inventory = validate_into::<Inventory>(&engine, &mut parents, &batch(EntityKind::Inventory));
    silver.retail_stores =
        validate_into::<RetailStore>(&engine, &mut parents, &batch(EntityKind::RetailStore));
    silver.supply_orders =
        validate_into::<SupplyOrder>(&engine, &mut parents, &batch(EntityKind::SupplyOrder));
    silver
}

pub fn gold_for(silver: &SilverSnapshot) -> GoldSnapshot {
    let config = project_config();
    let classifier = Classifier::new(&config.rejection_taxonomy).unwrap();
    aggregate(&ctx(), silver, &config.aggregation, None, &classifier).gold
}
