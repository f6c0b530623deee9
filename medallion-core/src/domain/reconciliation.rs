// medallion-core/src/domain/reconciliation.rs
//
// Recomputes top-level scalars from validated data and compares them with
// the same scalars summed from the freshly built aggregates.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::aggregation::GoldSnapshot;
use crate::domain::error::RunError;
use crate::domain::validation::SilverSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCheck {
    pub metric: &'static str,
    pub validated: Decimal,
    pub aggregated: Decimal,
    pub variance: Decimal,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub tolerance: Decimal,
    pub checks: Vec<MetricCheck>,
}

impl ReconciliationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// The first failing metric as a run-level error.
    pub fn into_result(self) -> Result<Self, RunError> {
        match self.checks.iter().find(|c| !c.passed) {
            Some(c) => Err(RunError::Reconciliation {
                metric: c.metric.to_string(),
                validated: c.validated.to_string(),
                aggregated: c.aggregated.to_string(),
                variance: c.variance.to_string(),
                tolerance: self.tolerance.to_string(),
            }),
            None => Ok(self),
        }
    }
}

/// `|aggregated - validated| / validated`. A zero baseline only matches zero.
pub fn relative_variance(validated: Decimal, aggregated: Decimal) -> Decimal {
    if validated.is_zero() {
        return if aggregated.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE
        };
    }
    (aggregated - validated)
        .abs()
        .checked_div(validated.abs())
        .unwrap_or(Decimal::ONE)
        .round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero)
}

fn count<T>(items: impl Iterator<Item = T>) -> Decimal {
    Decimal::from(items.count() as u64)
}

fn distinct(items: impl Iterator<Item = i64>) -> Decimal {
    Decimal::from(items.collect::<BTreeSet<_>>().len() as u64)
}

pub fn reconcile(silver: &SilverSnapshot, gold: &GoldSnapshot, tolerance: Decimal) -> ReconciliationReport {
    let orders = || silver.supply_orders.iter().map(|v| &v.record);
    let sales = || gold.monthly_sales_performance.iter();
    let supplier_of: BTreeMap<i64, i64> = silver
        .products
        .iter()
        .map(|p| (p.record.product_id, p.record.supplier_id))
        .collect();

    let pairs: Vec<(&'static str, Decimal, Decimal)> = vec![
        (
            "total_revenue",
            orders().map(|o| o.total_invoice).sum(),
            sales().map(|r| r.total_revenue).sum(),
        ),
        (
            "total_revenue_by_supplier",
            orders().map(|o| o.total_invoice).sum(),
            gold.supplier_performance_monthly
                .iter()
                .map(|r| r.total_revenue)
                .sum(),
        ),
        (
            "total_orders",
            count(orders()),
            sales().map(|r| Decimal::from(r.total_orders)).sum(),
        ),
        (
            "total_quantity",
            orders().map(|o| Decimal::from(o.quantity)).sum(),
            sales().map(|r| Decimal::from(r.total_quantity_sold)).sum(),
        ),
        (
            "total_stock_quantity",
            silver
                .inventory
                .iter()
                .map(|v| Decimal::from(v.record.quantity_on_hand))
                .sum(),
            gold.inventory_health_metrics
                .iter()
                .map(|r| Decimal::from(r.total_stock_quantity))
                .sum(),
        ),
        (
            "distinct_orders",
            distinct(orders().map(|o| o.supply_order_id)),
            distinct(gold.supply_chain_dashboard.iter().map(|r| r.supply_order_id)),
        ),
        (
            "distinct_ordered_products",
            distinct(orders().map(|o| o.product_id)),
            distinct(gold.supply_chain_dashboard.iter().map(|r| r.product_id)),
        ),
        (
            "distinct_stocked_warehouses",
            distinct(silver.inventory.iter().map(|v| v.record.warehouse_id)),
            distinct(gold.inventory_health_metrics.iter().map(|r| r.warehouse_id)),
        ),
        (
            "distinct_suppliers_with_orders",
            distinct(orders().filter_map(|o| supplier_of.get(&o.product_id).copied())),
            distinct(gold.supplier_performance_monthly.iter().map(|r| r.supplier_id)),
        ),
    ];

    let checks = pairs
        .into_iter()
        .map(|(metric, validated, aggregated)| {
            let variance = relative_variance(validated, aggregated);
            MetricCheck {
                metric,
                validated,
                aggregated,
                variance,
                passed: variance <= tolerance,
            }
        })
        .collect();

    ReconciliationReport { tolerance, checks }
}
