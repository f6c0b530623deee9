// medallion-core/src/domain/record/entities/product.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Entity, RuleContext, RuleViolation, amount_out_of_range, normalized};
use crate::domain::record::coercion::{CoercedRow, MissingField};
use crate::domain::schema::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub product_name: Option<String>,
    pub unit_cost: Decimal,
    pub selling_price: Decimal,
    pub supplier_id: i64,
    pub product_category: Option<String>,
    pub status: Option<String>,
}

impl Product {
    pub fn margin(&self) -> Decimal {
        self.selling_price - self.unit_cost
    }
}

impl Entity for Product {
    const KIND: EntityKind = EntityKind::Product;

    fn from_row(row: &CoercedRow) -> Result<Self, MissingField> {
        Ok(Self {
            product_id: row.require_int("product_id")?,
            product_name: row.text("product_name"),
            unit_cost: row.require_decimal("unit_cost")?,
            selling_price: row.require_decimal("selling_price")?,
            supplier_id: row.require_int("supplier_id")?,
            product_category: row.text("product_category"),
            status: normalized(row.text("status")),
        })
    }

    fn primary_key(&self) -> i64 {
        self.product_id
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        vec![(EntityKind::Supplier, self.supplier_id)]
    }

    fn check_rules(&self) -> Option<RuleViolation> {
        if self.unit_cost < Decimal::ZERO {
            return Some(RuleViolation::new(
                "negative_cost",
                "unit_cost",
                format!("unit_cost {} < 0", self.unit_cost),
            ));
        }
        if self.selling_price < Decimal::ZERO {
            return Some(RuleViolation::new(
                "negative_price",
                "selling_price",
                format!("selling_price {} < 0", self.selling_price),
            ));
        }
        if let Some(v) = amount_out_of_range(&[
            ("unit_cost", self.unit_cost),
            ("selling_price", self.selling_price),
        ]) {
            return Some(v);
        }
        if self.selling_price < self.unit_cost {
            return Some(RuleViolation::new(
                "selling_below_cost",
                "selling_price",
                format!(
                    "selling_price {} < unit_cost {}",
                    self.selling_price, self.unit_cost
                ),
            ));
        }
        None
    }

    fn soft_rule_failures(&self, _ctx: &RuleContext) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if self.product_category.is_none() {
            failed.push("missing_category");
        }
        if self.status.as_deref() != Some("active") {
            failed.push("inactive_status");
        }
        failed
    }
}
