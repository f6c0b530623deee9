// medallion-core/src/domain/record/entities/supply_order.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    Entity, RuleContext, RuleViolation, amount_out_of_range, normalized, quantity_out_of_range,
};
use crate::domain::record::coercion::{CoercedRow, MissingField};
use crate::domain::schema::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyOrder {
    pub supply_order_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub retail_store_id: i64,
    pub quantity: i64,
    pub price: Decimal,
    pub total_invoice: Decimal,
    pub order_date: NaiveDate,
    pub shipped_date: Option<NaiveDate>,
    pub delivered_date: Option<NaiveDate>,
    pub status: Option<String>,
}

impl SupplyOrder {
    pub fn order_status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(OrderStatus::parse)
    }

    /// Days from order to delivery, when delivered.
    pub fn lead_time_days(&self) -> Option<i64> {
        self.delivered_date
            .map(|d| (d - self.order_date).num_days())
    }

    fn date_order_violation(&self) -> Option<(&'static str, String)> {
        let chain = [
            ("order_date", Some(self.order_date)),
            ("shipped_date", self.shipped_date),
            ("delivered_date", self.delivered_date),
        ];
        // Every pair of present bounds must be ordered, not only neighbours:
        // a missing shipped_date must not hide delivered < ordered.
        for (i, (early_name, early)) in chain.iter().enumerate() {
            for (late_name, late) in chain.iter().skip(i + 1) {
                if let (Some(e), Some(l)) = (early, late)
                    && e > l
                {
                    return Some((*late_name, format!("{} {} > {} {}", early_name, e, late_name, l)));
                }
            }
        }
        None
    }
}

impl Entity for SupplyOrder {
    const KIND: EntityKind = EntityKind::SupplyOrder;

    fn from_row(row: &CoercedRow) -> Result<Self, MissingField> {
        Ok(Self {
            supply_order_id: row.require_int("supply_order_id")?,
            product_id: row.require_int("product_id")?,
            warehouse_id: row.require_int("warehouse_id")?,
            retail_store_id: row.require_int("retail_store_id")?,
            quantity: row.require_int("quantity")?,
            price: row.require_decimal("price")?,
            total_invoice: row.require_decimal("total_invoice")?,
            order_date: row.require_date("order_date")?,
            shipped_date: row.date("shipped_date"),
            delivered_date: row.date("delivered_date"),
            status: normalized(row.text("status")),
        })
    }

    fn primary_key(&self) -> i64 {
        self.supply_order_id
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        vec![
            (EntityKind::Product, self.product_id),
            (EntityKind::Warehouse, self.warehouse_id),
            (EntityKind::RetailStore, self.retail_store_id),
        ]
    }

    fn check_rules(&self) -> Option<RuleViolation> {
        if self.quantity < 0 {
            return Some(RuleViolation::new(
                "negative_quantity",
                "quantity",
                format!("quantity {} < 0", self.quantity),
            ));
        }
        if let Some(v) = quantity_out_of_range("quantity", self.quantity) {
            return Some(v);
        }
        if self.price < Decimal::ZERO {
            return Some(RuleViolation::new(
                "negative_price",
                "price",
                format!("price {} < 0", self.price),
            ));
        }
        if self.total_invoice < Decimal::ZERO {
            return Some(RuleViolation::new(
                "negative_invoice",
                "total_invoice",
                format!("total_invoice {} < 0", self.total_invoice),
            ));
        }
        if let Some(v) = amount_out_of_range(&[("price", self.price), ("total_invoice", self.total_invoice)]) {
            return Some(v);
        }
        let expected = self.price.checked_mul(Decimal::from(self.quantity));
        if expected != Some(self.total_invoice) {
            return Some(RuleViolation::new(
                "invoice_mismatch",
                "total_invoice",
                match expected {
                    Some(e) => format!(
                        "total_invoice {} != price {} x quantity {} = {}",
                        self.total_invoice, self.price, self.quantity, e
                    ),
                    None => "price x quantity overflows".to_string(),
                },
            ));
        }
        self.date_order_violation()
            .map(|(field, detail)| RuleViolation::new("date_order_violation", field, detail))
    }

    fn soft_rule_failures(&self, _ctx: &RuleContext) -> Vec<&'static str> {
        let mut failed = Vec::new();
        let status = self.order_status();
        if status.is_none() {
            failed.push("unknown_status");
        }
        if status == Some(OrderStatus::Delivered) && self.delivered_date.is_none() {
            failed.push("delivered_without_date");
        }
        failed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn order() -> SupplyOrder {
        SupplyOrder {
            supply_order_id: 7,
            product_id: 1,
            warehouse_id: 2,
            retail_store_id: 3,
            quantity: 4,
            price: Decimal::from_str("2.50").unwrap(),
            total_invoice: Decimal::from_str("10.00").unwrap(),
            order_date: date("2024-01-10"),
            shipped_date: Some(date("2024-01-11")),
            delivered_date: Some(date("2024-01-15")),
            status: Some("delivered".into()),
        }
    }

    #[test]
    fn test_valid_order_passes() {
        let o = order();
        assert_eq!(o.check_rules(), None);
        assert_eq!(o.lead_time_days(), Some(5));
    }

    #[test]
    fn test_invoice_must_match_exactly() {
        let mut o = order();
        o.total_invoice = Decimal::from_str("10.01").unwrap();
        assert_eq!(o.check_rules().map(|v| v.code), Some("invoice_mismatch"));
    }

    #[test]
    fn test_delivered_before_order_without_ship_date() {
        let mut o = order();
        o.shipped_date = None;
        o.delivered_date = Some(date("2024-01-01"));
        assert_eq!(o.check_rules().map(|v| v.code), Some("date_order_violation"));
    }

    #[test]
    fn test_delivered_status_without_date() {
        let mut o = order();
        o.delivered_date = None;
        let ctx = RuleContext {
            as_of: date("2024-02-01"),
        };
        assert_eq!(o.soft_rule_failures(&ctx), vec!["delivered_without_date"]);
    }
}
