// medallion-core/src/domain/aggregation/mod.rs
//
// Gold layer. Pure functions of the validated snapshot: no clock, no I/O,
// BTreeMap grouping and explicit sort keys so equal input gives equal bytes.

pub mod dashboard;
pub mod forecast;
pub mod inventory;
pub mod metadata;
pub mod sales;
pub mod supplier;

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::canonical;
use crate::domain::config::AggregationConfig;
use crate::domain::record::RawBatch;
use crate::domain::record::entities::{Product, RetailStore, Supplier, Warehouse};
use crate::domain::run::RunContext;
use crate::domain::validation::{Classifier, RejectedRow, SilverSnapshot};

pub use dashboard::DashboardRow;
pub use forecast::ForecastRow;
pub use inventory::InventoryHealth;
pub use metadata::TableMetadata;
pub use sales::MonthlySales;
pub use supplier::SupplierPerformance;

pub const UNKNOWN: &str = "Unknown";

/// Published derived tables, in publication order.
pub const GOLD_TABLES: [&str; 6] = [
    "monthly_sales_performance",
    "inventory_health_metrics",
    "supplier_performance_monthly",
    "supply_chain_dashboard",
    "forecasts",
    "table_metadata",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoldSnapshot {
    pub monthly_sales_performance: Vec<MonthlySales>,
    pub inventory_health_metrics: Vec<InventoryHealth>,
    pub supplier_performance_monthly: Vec<SupplierPerformance>,
    pub supply_chain_dashboard: Vec<DashboardRow>,
    pub forecasts: Vec<ForecastRow>,
    pub table_metadata: Vec<TableMetadata>,
}

impl GoldSnapshot {
    pub fn row_count(&self, table: &str) -> Option<usize> {
        match table {
            "monthly_sales_performance" => Some(self.monthly_sales_performance.len()),
            "inventory_health_metrics" => Some(self.inventory_health_metrics.len()),
            "supplier_performance_monthly" => Some(self.supplier_performance_monthly.len()),
            "supply_chain_dashboard" => Some(self.supply_chain_dashboard.len()),
            "forecasts" => Some(self.forecasts.len()),
            "table_metadata" => Some(self.table_metadata.len()),
            _ => None,
        }
    }

    /// Canonical bytes of one table; `None` for an unknown table name.
    pub fn table_bytes(&self, table: &str) -> Option<Result<Vec<u8>, serde_json::Error>> {
        Some(match table {
            "monthly_sales_performance" => canonical::to_canonical_json(&self.monthly_sales_performance),
            "inventory_health_metrics" => canonical::to_canonical_json(&self.inventory_health_metrics),
            "supplier_performance_monthly" => {
                canonical::to_canonical_json(&self.supplier_performance_monthly)
            }
            "supply_chain_dashboard" => canonical::to_canonical_json(&self.supply_chain_dashboard),
            "forecasts" => canonical::to_canonical_json(&self.forecasts),
            "table_metadata" => canonical::to_canonical_json(&self.table_metadata),
            _ => return None,
        })
    }

    pub fn table_json(&self, table: &str) -> Option<Result<serde_json::Value, serde_json::Error>> {
        Some(match table {
            "monthly_sales_performance" => serde_json::to_value(&self.monthly_sales_performance),
            "inventory_health_metrics" => serde_json::to_value(&self.inventory_health_metrics),
            "supplier_performance_monthly" => serde_json::to_value(&self.supplier_performance_monthly),
            "supply_chain_dashboard" => serde_json::to_value(&self.supply_chain_dashboard),
            "forecasts" => serde_json::to_value(&self.forecasts),
            "table_metadata" => serde_json::to_value(&self.table_metadata),
            _ => return None,
        })
    }
}

/// Result of the aggregation stage: the gold tables plus the forecast rows
/// that failed sanity checks.
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub gold: GoldSnapshot,
    pub rejected_forecasts: Vec<RejectedRow>,
}

/// Builds every gold table from validated data only.
pub fn aggregate(
    ctx: &RunContext,
    silver: &SilverSnapshot,
    params: &AggregationConfig,
    forecasts: Option<&RawBatch>,
    classifier: &Classifier,
) -> Aggregated {
    let dims = Dimensions::new(silver);

    let (forecast_rows, rejected_forecasts) = match forecasts {
        Some(batch) => forecast::ingest(ctx, batch, classifier),
        None => (Vec::new(), Vec::new()),
    };

    let mut gold = GoldSnapshot {
        monthly_sales_performance: sales::monthly_sales(silver, &dims),
        inventory_health_metrics: inventory::inventory_health(silver, &dims, params),
        supplier_performance_monthly: supplier::supplier_performance(silver, &dims, params),
        supply_chain_dashboard: dashboard::dashboard(silver, &dims, ctx.as_of),
        forecasts: forecast_rows,
        table_metadata: Vec::new(),
    };
    gold.table_metadata = metadata::describe(&gold);

    Aggregated {
        gold,
        rejected_forecasts,
    }
}

/// Primary-key lookups over the validated dimensions.
pub(crate) struct Dimensions<'a> {
    pub suppliers: BTreeMap<i64, &'a Supplier>,
    pub products: BTreeMap<i64, &'a Product>,
    pub warehouses: BTreeMap<i64, &'a Warehouse>,
    pub stores: BTreeMap<i64, &'a RetailStore>,
}

impl<'a> Dimensions<'a> {
    pub fn new(silver: &'a SilverSnapshot) -> Self {
        Self {
            suppliers: silver
                .suppliers
                .iter()
                .map(|v| (v.record.supplier_id, &v.record))
                .collect(),
            products: silver
                .products
                .iter()
                .map(|v| (v.record.product_id, &v.record))
                .collect(),
            warehouses: silver
                .warehouses
                .iter()
                .map(|v| (v.record.warehouse_id, &v.record))
                .collect(),
            stores: silver
                .retail_stores
                .iter()
                .map(|v| (v.record.retail_store_id, &v.record))
                .collect(),
        }
    }
}

pub(crate) fn round2(value: Decimal) -> Decimal {
    let mut v = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    v.rescale(2);
    v
}

/// `num / den * 100` at two decimals, `None` when `den` is zero.
pub(crate) fn pct(num: Decimal, den: Decimal) -> Option<Decimal> {
    if den.is_zero() {
        return None;
    }
    num.checked_div(den)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .map(round2)
}

/// `num / den` at two decimals, `None` when `den` is zero.
pub(crate) fn ratio(num: Decimal, den: Decimal) -> Option<Decimal> {
    if den.is_zero() {
        return None;
    }
    num.checked_div(den).map(round2)
}

pub(crate) fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub(crate) fn label(value: Option<&String>) -> String {
    value.cloned().unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_and_ratio() {
        assert_eq!(pct(Decimal::from(1), Decimal::from(3)).map(|d| d.to_string()), Some("33.33".into()));
        assert_eq!(pct(Decimal::from(2), Decimal::ZERO), None);
        assert_eq!(ratio(Decimal::from(5), Decimal::from(2)).map(|d| d.to_string()), Some("2.50".into()));
    }
}
