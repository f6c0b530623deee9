// medallion-core/src/domain/aggregation/sales.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{Dimensions, label, month_start, ratio, round2};
use crate::domain::validation::SilverSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySales {
    pub sales_month: NaiveDate,
    pub region: String,
    pub store_type: String,
    pub product_category: String,
    pub total_orders: u64,
    pub total_quantity_sold: i64,
    pub total_revenue: Decimal,
    pub total_margin: Decimal,
    pub avg_order_value: Decimal,
    pub active_stores: u64,
    pub unique_products: u64,
    pub avg_revenue_per_unit: Option<Decimal>,
    pub revenue_per_store: Option<Decimal>,
}

#[derive(Default)]
struct Acc {
    orders: u64,
    quantity: i64,
    revenue: Decimal,
    margin: Decimal,
    stores: BTreeSet<i64>,
    products: BTreeSet<i64>,
}

type GroupKey = (NaiveDate, String, String, String);

/// Revenue by month, store region, store type and product category. Every
/// validated order counts, whatever its status, so the table sums back to
/// the validated invoice total.
pub fn monthly_sales(silver: &SilverSnapshot, dims: &Dimensions<'_>) -> Vec<MonthlySales> {
    let mut groups: BTreeMap<GroupKey, Acc> = BTreeMap::new();

    for order in silver.supply_orders.iter().map(|v| &v.record) {
        let store = dims.stores.get(&order.retail_store_id);
        let product = dims.products.get(&order.product_id);
        let key = (
            month_start(order.order_date),
            label(store.and_then(|s| s.region.as_ref())),
            label(store.and_then(|s| s.store_type.as_ref())),
            label(product.and_then(|p| p.product_category.as_ref())),
        );

        let cost = product.map_or(Decimal::ZERO, |p| p.unit_cost * Decimal::from(order.quantity));
        let acc = groups.entry(key).or_default();
        acc.orders += 1;
        acc.quantity = acc.quantity.saturating_add(order.quantity);
        acc.revenue += order.total_invoice;
        acc.margin += order.total_invoice - cost;
        acc.stores.insert(order.retail_store_id);
        acc.products.insert(order.product_id);
    }

    let mut rows: Vec<MonthlySales> = groups
        .into_iter()
        .map(|((sales_month, region, store_type, product_category), acc)| {
            let stores = acc.stores.len() as u64;
            MonthlySales {
                sales_month,
                region,
                store_type,
                product_category,
                total_orders: acc.orders,
                total_quantity_sold: acc.quantity,
                total_revenue: acc.revenue,
                total_margin: round2(acc.margin),
                avg_order_value: ratio(acc.revenue, Decimal::from(acc.orders)).unwrap_or_default(),
                active_stores: stores,
                unique_products: acc.products.len() as u64,
                avg_revenue_per_unit: ratio(acc.revenue, Decimal::from(acc.quantity)),
                revenue_per_store: ratio(acc.revenue, Decimal::from(stores)),
            }
        })
        .collect();

    // Latest month first, biggest revenue first; group key breaks ties.
    rows.sort_by(|a, b| {
        b.sales_month
            .cmp(&a.sales_month)
            .then_with(|| b.total_revenue.cmp(&a.total_revenue))
            .then_with(|| a.region.cmp(&b.region))
            .then_with(|| a.store_type.cmp(&b.store_type))
            .then_with(|| a.product_category.cmp(&b.product_category))
    });
    rows
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_monthly_sales_groups_and_order() {
        let silver = test_support::silver_snapshot();
        let rows = monthly_sales(&silver, &Dimensions::new(&silver));

        assert_eq!(rows.len(), 4);
        let months: Vec<_> = rows.iter().map(|r| r.sales_month.to_string()).collect();
        assert_eq!(months, ["2024-07-01", "2024-07-01", "2024-06-01", "2024-06-01"]);

        let top = &rows[0];
        assert_eq!(top.region, "South");
        assert_eq!(top.product_category, "Lighting");
        assert_eq!(top.total_orders, 1);
        assert_eq!(top.total_quantity_sold, 3);
        assert_eq!(top.total_revenue, dec("66.00"));
        assert_eq!(top.total_margin, dec("21.00"));
        assert_eq!(top.avg_revenue_per_unit, Some(dec("22.00")));
        assert_eq!(top.revenue_per_store, Some(dec("66.00")));

        // Every order counts, pending included
        let total: Decimal = rows.iter().map(|r| r.total_revenue).sum();
        assert_eq!(total, dec("176.50"));
    }
}
