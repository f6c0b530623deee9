// medallion-core/src/domain/aggregation/supplier.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{Dimensions, label, month_start, pct, ratio};
use crate::domain::config::AggregationConfig;
use crate::domain::record::entities::OrderStatus;
use crate::domain::validation::SilverSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierPerformance {
    pub month: NaiveDate,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub total_orders: u64,
    pub total_units: i64,
    pub total_revenue: Decimal,
    pub avg_lead_time_days: Option<Decimal>,
    pub fulfilled_orders: u64,
    pub delivered_orders: u64,
    pub on_time_orders: u64,
    pub on_time_rate_pct: Option<Decimal>,
    pub fulfillment_rate_pct: Option<Decimal>,
}

#[derive(Default)]
struct Acc {
    orders: u64,
    units: i64,
    revenue: Decimal,
    lead_time_total: i64,
    lead_time_count: u64,
    fulfilled: u64,
    delivered: u64,
    on_time: u64,
}

/// Monthly delivery performance per supplier (through the ordered product).
pub fn supplier_performance(
    silver: &SilverSnapshot,
    dims: &Dimensions<'_>,
    params: &AggregationConfig,
) -> Vec<SupplierPerformance> {
    let mut groups: BTreeMap<(NaiveDate, i64), Acc> = BTreeMap::new();

    for order in silver.supply_orders.iter().map(|v| &v.record) {
        let Some(product) = dims.products.get(&order.product_id) else {
            continue;
        };
        let acc = groups
            .entry((month_start(order.order_date), product.supplier_id))
            .or_default();
        acc.orders += 1;
        acc.units = acc.units.saturating_add(order.quantity);
        acc.revenue += order.total_invoice;

        let status = order.order_status();
        if status.is_some_and(|s| s.is_fulfilled()) {
            acc.fulfilled += 1;
        }
        if status == Some(OrderStatus::Delivered) {
            acc.delivered += 1;
        }
        if let Some(days) = order.lead_time_days() {
            acc.lead_time_total = acc.lead_time_total.saturating_add(days);
            acc.lead_time_count += 1;
            if days <= params.on_time_threshold_days {
                acc.on_time += 1;
            }
        }
    }

    let mut rows: Vec<SupplierPerformance> = groups
        .into_iter()
        .map(|((month, supplier_id), acc)| {
            let total = Decimal::from(acc.orders);
            SupplierPerformance {
                month,
                supplier_id,
                supplier_name: label(
                    dims.suppliers
                        .get(&supplier_id)
                        .and_then(|s| s.supplier_name.as_ref()),
                ),
                total_orders: acc.orders,
                total_units: acc.units,
                total_revenue: acc.revenue,
                avg_lead_time_days: ratio(
                    Decimal::from(acc.lead_time_total),
                    Decimal::from(acc.lead_time_count),
                ),
                fulfilled_orders: acc.fulfilled,
                delivered_orders: acc.delivered,
                on_time_orders: acc.on_time,
                on_time_rate_pct: pct(Decimal::from(acc.on_time), total),
                fulfillment_rate_pct: pct(Decimal::from(acc.fulfilled), total),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.month
            .cmp(&a.month)
            .then_with(|| b.total_revenue.cmp(&a.total_revenue))
            .then_with(|| a.supplier_id.cmp(&b.supplier_id))
    });
    rows
}
