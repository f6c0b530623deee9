// medallion-core/src/domain/aggregation/inventory.rs

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{Dimensions, UNKNOWN, label, pct, ratio, round2};
use crate::domain::config::AggregationConfig;
use crate::domain::validation::SilverSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryHealth {
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub region: String,
    pub city: String,
    pub product_category: String,
    pub product_count: u64,
    pub total_stock_quantity: i64,
    pub total_stock_value: Decimal,
    pub avg_stock_per_product: Decimal,
    pub min_stock_level: i64,
    pub max_stock_level: i64,
    pub out_of_stock_items: u64,
    pub low_stock_items: u64,
    pub storage_capacity: i64,
    pub capacity_utilization_pct: Option<Decimal>,
    pub utilization_status: String,
    pub stock_health_status: String,
}

struct Acc {
    products: BTreeSet<i64>,
    lines: u64,
    quantity: i64,
    value: Decimal,
    min: i64,
    max: i64,
    out_of_stock: u64,
    low_stock: u64,
}

impl Default for Acc {
    fn default() -> Self {
        Self {
            products: BTreeSet::new(),
            lines: 0,
            quantity: 0,
            value: Decimal::ZERO,
            min: i64::MAX,
            max: i64::MIN,
            out_of_stock: 0,
            low_stock: 0,
        }
    }
}

pub fn utilization_status(pct: Option<Decimal>) -> &'static str {
    let Some(p) = pct else {
        return UNKNOWN;
    };
    if p >= Decimal::from(90) {
        "Over Capacity"
    } else if p >= Decimal::from(75) {
        "High Utilization"
    } else if p >= Decimal::from(50) {
        "Optimal"
    } else if p >= Decimal::from(25) {
        "Under Utilized"
    } else {
        "Very Low Utilization"
    }
}

/// Stock position per warehouse and product category.
pub fn inventory_health(
    silver: &SilverSnapshot,
    dims: &Dimensions<'_>,
    params: &AggregationConfig,
) -> Vec<InventoryHealth> {
    let mut groups: BTreeMap<(i64, String), Acc> = BTreeMap::new();

    for line in silver.inventory.iter().map(|v| &v.record) {
        let product = dims.products.get(&line.product_id);
        let key = (
            line.warehouse_id,
            label(product.and_then(|p| p.product_category.as_ref())),
        );
        let acc = groups.entry(key).or_default();
        acc.products.insert(line.product_id);
        acc.lines += 1;
        acc.quantity = acc.quantity.saturating_add(line.quantity_on_hand);
        acc.value += product.map_or(Decimal::ZERO, |p| {
            p.unit_cost * Decimal::from(line.quantity_on_hand)
        });
        acc.min = acc.min.min(line.quantity_on_hand);
        acc.max = acc.max.max(line.quantity_on_hand);
        if line.quantity_on_hand == 0 {
            acc.out_of_stock += 1;
        }
        if line.quantity_on_hand < params.low_stock_threshold {
            acc.low_stock += 1;
        }
    }

    let mut rows: Vec<InventoryHealth> = groups
        .into_iter()
        .map(|((warehouse_id, product_category), acc)| {
            let warehouse = dims.warehouses.get(&warehouse_id);
            let capacity = warehouse.map_or(0, |w| w.storage_capacity);
            let utilization = pct(Decimal::from(acc.quantity), Decimal::from(capacity));
            let stock_health = if acc.out_of_stock > params.critical_out_of_stock_items {
                "Critical"
            } else if acc.low_stock > params.warning_low_stock_items {
                "Warning"
            } else {
                "Healthy"
            };
            InventoryHealth {
                warehouse_id,
                warehouse_name: label(warehouse.and_then(|w| w.warehouse_name.as_ref())),
                region: label(warehouse.and_then(|w| w.region.as_ref())),
                city: label(warehouse.and_then(|w| w.city.as_ref())),
                product_category,
                product_count: acc.products.len() as u64,
                total_stock_quantity: acc.quantity,
                total_stock_value: round2(acc.value),
                avg_stock_per_product: ratio(Decimal::from(acc.quantity), Decimal::from(acc.lines))
                    .unwrap_or_default(),
                min_stock_level: acc.min,
                max_stock_level: acc.max,
                out_of_stock_items: acc.out_of_stock,
                low_stock_items: acc.low_stock,
                storage_capacity: capacity,
                capacity_utilization_pct: utilization,
                utilization_status: utilization_status(utilization).to_string(),
                stock_health_status: stock_health.to_string(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_stock_value
            .cmp(&a.total_stock_value)
            .then_with(|| b.capacity_utilization_pct.cmp(&a.capacity_utilization_pct))
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
            .then_with(|| a.product_category.cmp(&b.product_category))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization_buckets() {
        assert_eq!(utilization_status(Some(Decimal::from(95))), "Over Capacity");
        assert_eq!(utilization_status(Some(Decimal::from(75))), "High Utilization");
        assert_eq!(utilization_status(Some(Decimal::from(60))), "Optimal");
        assert_eq!(utilization_status(Some(Decimal::from(25))), "Under Utilized");
        assert_eq!(utilization_status(Some(Decimal::from(3))), "Very Low Utilization");
        assert_eq!(utilization_status(None), "Unknown");
    }
}
