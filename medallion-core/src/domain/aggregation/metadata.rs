// medallion-core/src/domain/aggregation/metadata.rs

use serde::Serialize;

use super::GoldSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMetadata {
    pub table_name: String,
    pub description: String,
    pub source_tables: Vec<String>,
    pub refresh_frequency: String,
    pub row_count: u64,
}

const CATALOGUE: [(&str, &str, &[&str], &str); 5] = [
    (
        "monthly_sales_performance",
        "Monthly sales performance by region, store type, and product category",
        &["silver.supply_orders", "silver.retail_stores", "silver.products"],
        "Monthly",
    ),
    (
        "inventory_health_metrics",
        "Inventory health and capacity utilization metrics by warehouse and category",
        &["silver.inventory", "silver.warehouses", "silver.products"],
        "Daily",
    ),
    (
        "supplier_performance_monthly",
        "Monthly supplier performance metrics including lead time and on-time rate",
        &["silver.supply_orders", "silver.products", "silver.suppliers"],
        "Monthly",
    ),
    (
        "supply_chain_dashboard",
        "Order-level wide table joining every dimension, for BI tools",
        &[
            "silver.supply_orders",
            "silver.products",
            "silver.suppliers",
            "silver.warehouses",
            "silver.retail_stores",
        ],
        "Daily",
    ),
    (
        "forecasts",
        "Forecast producer output that passed null and range checks",
        &["bronze.forecasts"],
        "Daily",
    ),
];

/// Describes every other gold table.
pub fn describe(gold: &GoldSnapshot) -> Vec<TableMetadata> {
    CATALOGUE
        .iter()
        .map(|(name, description, sources, refresh)| TableMetadata {
            table_name: name.to_string(),
            description: description.to_string(),
            source_tables: sources.iter().map(|s| s.to_string()).collect(),
            refresh_frequency: refresh.to_string(),
            row_count: gold.row_count(name).unwrap_or(0) as u64,
        })
        .collect()
}
