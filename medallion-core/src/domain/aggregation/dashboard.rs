// medallion-core/src/domain/aggregation/dashboard.rs

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Dimensions, UNKNOWN, label, pct, round2};
use crate::domain::record::entities::OrderStatus;
use crate::domain::validation::SilverSnapshot;

/// One wide row per validated order, denormalized for BI tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub supply_order_id: i64,
    pub order_date: NaiveDate,
    pub shipped_date: Option<NaiveDate>,
    pub delivered_date: Option<NaiveDate>,
    pub order_status: String,
    pub quantity: i64,
    pub price: Decimal,
    pub total_invoice: Decimal,

    pub product_id: i64,
    pub warehouse_id: i64,
    pub retail_store_id: i64,

    pub product_name: String,
    pub product_category: String,
    pub unit_cost: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub profit_margin: Option<Decimal>,
    pub profit_margin_pct: Option<Decimal>,

    pub supplier_id: Option<i64>,
    pub supplier_name: String,
    pub supplier_email: Option<String>,

    pub warehouse_name: String,
    pub warehouse_city: String,
    pub warehouse_region: String,
    pub storage_capacity: Option<i64>,

    pub store_name: String,
    pub store_city: String,
    pub store_region: String,
    pub store_type: String,
    pub store_status: String,

    pub delivery_days: Option<i64>,
    pub processing_days: Option<i64>,
    pub order_year: i32,
    pub order_month: u32,
    pub order_quarter: u32,
    pub order_year_month: String,
    pub order_isodow: u32,
    pub order_date_key: i64,

    pub total_cost: Option<Decimal>,
    pub total_profit: Option<Decimal>,
    pub is_shipped: bool,
    pub is_delivered: bool,
    pub is_canceled: bool,
    pub order_age_days: i64,
    pub is_backlog: bool,

    pub delivery_performance: String,
    pub order_value_category: String,
    pub profit_category: String,
    pub distribution_type: String,
}

fn delivery_performance(status: Option<OrderStatus>, delivery_days: Option<i64>) -> &'static str {
    match (status, delivery_days) {
        (Some(OrderStatus::Delivered), Some(d)) if d <= 3 => "Excellent",
        (Some(OrderStatus::Delivered), Some(d)) if d <= 7 => "Good",
        (Some(OrderStatus::Delivered), Some(d)) if d <= 14 => "Average",
        (Some(OrderStatus::Delivered), _) => "Poor",
        (Some(OrderStatus::Shipped), _) => "In Transit",
        (Some(OrderStatus::Pending), _) => "Processing",
        (Some(OrderStatus::Canceled), _) => "Canceled",
        (None, _) => UNKNOWN,
    }
}

fn order_value_category(total_invoice: Decimal) -> &'static str {
    if total_invoice >= Decimal::from(100_000) {
        "High Value"
    } else if total_invoice >= Decimal::from(50_000) {
        "Medium Value"
    } else if total_invoice >= Decimal::from(10_000) {
        "Standard Value"
    } else {
        "Low Value"
    }
}

fn profit_category(margin_pct: Option<Decimal>) -> &'static str {
    match margin_pct {
        Some(p) if p >= Decimal::from(50) => "High Margin",
        Some(p) if p >= Decimal::from(25) => "Medium Margin",
        Some(p) if p >= Decimal::from(10) => "Low Margin",
        _ => "Very Low Margin",
    }
}

pub fn dashboard(silver: &SilverSnapshot, dims: &Dimensions<'_>, as_of: NaiveDate) -> Vec<DashboardRow> {
    let mut rows: Vec<DashboardRow> = silver
        .supply_orders
        .iter()
        .map(|v| {
            let order = &v.record;
            let product = dims.products.get(&order.product_id);
            let supplier = product.and_then(|p| dims.suppliers.get(&p.supplier_id));
            let warehouse = dims.warehouses.get(&order.warehouse_id);
            let store = dims.stores.get(&order.retail_store_id);
            let status = order.order_status();

            let delivery_days = match (order.shipped_date, order.delivered_date) {
                (Some(s), Some(d)) => Some((d - s).num_days()),
                _ => None,
            };
            let processing_days = order.shipped_date.map(|s| (s - order.order_date).num_days());
            let margin = product.map(|p| p.margin());
            let margin_pct = product.and_then(|p| pct(p.margin(), p.unit_cost));
            let total_cost = product.map(|p| round2(p.unit_cost * Decimal::from(order.quantity)));
            let order_age_days = (as_of - order.order_date).num_days();
            let warehouse_region = label(warehouse.and_then(|w| w.region.as_ref()));
            let store_region = label(store.and_then(|s| s.region.as_ref()));

            DashboardRow {
                supply_order_id: order.supply_order_id,
                order_date: order.order_date,
                shipped_date: order.shipped_date,
                delivered_date: order.delivered_date,
                order_status: order.status.clone().unwrap_or_else(|| UNKNOWN.to_lowercase()),
                quantity: order.quantity,
                price: order.price,
                total_invoice: order.total_invoice,
                product_id: order.product_id,
                warehouse_id: order.warehouse_id,
                retail_store_id: order.retail_store_id,
                product_name: label(product.and_then(|p| p.product_name.as_ref())),
                product_category: label(product.and_then(|p| p.product_category.as_ref())),
                unit_cost: product.map(|p| p.unit_cost),
                selling_price: product.map(|p| p.selling_price),
                profit_margin: margin,
                profit_margin_pct: margin_pct,
                supplier_id: supplier.map(|s| s.supplier_id),
                supplier_name: label(supplier.and_then(|s| s.supplier_name.as_ref())),
                supplier_email: supplier.map(|s| s.contact_email.clone()),
                warehouse_name: label(warehouse.and_then(|w| w.warehouse_name.as_ref())),
                warehouse_city: label(warehouse.and_then(|w| w.city.as_ref())),
                distribution_type: if warehouse_region == store_region {
                    "Same Region".to_string()
                } else {
                    "Cross Region".to_string()
                },
                warehouse_region,
                storage_capacity: warehouse.map(|w| w.storage_capacity),
                store_name: label(store.and_then(|s| s.store_name.as_ref())),
                store_city: label(store.and_then(|s| s.city.as_ref())),
                store_region,
                store_type: label(store.and_then(|s| s.store_type.as_ref())),
                store_status: store
                    .and_then(|s| s.store_status.clone())
                    .unwrap_or_else(|| UNKNOWN.to_lowercase()),
                delivery_days,
                processing_days,
                order_year: order.order_date.year(),
                order_month: order.order_date.month(),
                order_quarter: (order.order_date.month() - 1) / 3 + 1,
                order_year_month: order.order_date.format("%Y-%m").to_string(),
                order_isodow: order.order_date.weekday().number_from_monday(),
                order_date_key: i64::from(order.order_date.year()) * 10_000
                    + i64::from(order.order_date.month()) * 100
                    + i64::from(order.order_date.day()),
                total_cost,
                total_profit: total_cost.map(|c| round2(order.total_invoice - c)),
                is_shipped: status == Some(OrderStatus::Shipped),
                is_delivered: status == Some(OrderStatus::Delivered),
                is_canceled: status == Some(OrderStatus::Canceled),
                order_age_days,
                is_backlog: status != Some(OrderStatus::Delivered) && order_age_days > 7,
                delivery_performance: delivery_performance(status, delivery_days).to_string(),
                order_value_category: order_value_category(order.total_invoice).to_string(),
                profit_category: profit_category(margin_pct).to_string(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.order_date
            .cmp(&a.order_date)
            .then_with(|| b.total_invoice.cmp(&a.total_invoice))
            .then_with(|| a.supply_order_id.cmp(&b.supply_order_id))
    });
    rows
}
