// medallion-core/src/domain/record/entities/inventory.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Entity, RuleContext, RuleViolation, quantity_out_of_range};
use crate::domain::record::coercion::{CoercedRow, MissingField};
use crate::domain::schema::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub inventory_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity_on_hand: i64,
    pub last_stocked_date: Option<NaiveDate>,
}

impl Entity for Inventory {
    const KIND: EntityKind = EntityKind::Inventory;

    fn from_row(row: &CoercedRow) -> Result<Self, MissingField> {
        Ok(Self {
            inventory_id: row.require_int("inventory_id")?,
            product_id: row.require_int("product_id")?,
            warehouse_id: row.require_int("warehouse_id")?,
            quantity_on_hand: row.require_int("quantity_on_hand")?,
            last_stocked_date: row.date("last_stocked_date"),
        })
    }

    fn primary_key(&self) -> i64 {
        self.inventory_id
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        vec![
            (EntityKind::Product, self.product_id),
            (EntityKind::Warehouse, self.warehouse_id),
        ]
    }

    /// One stock line per (product, warehouse), plus the surrogate id.
    fn natural_keys(&self) -> Vec<String> {
        vec![
            format!("product_warehouse={}/{}", self.product_id, self.warehouse_id),
            format!("inventory_id={}", self.inventory_id),
        ]
    }

    fn check_rules(&self) -> Option<RuleViolation> {
        if self.quantity_on_hand < 0 {
            return Some(RuleViolation::new(
                "negative_quantity",
                "quantity_on_hand",
                format!("quantity_on_hand {} < 0", self.quantity_on_hand),
            ));
        }
        quantity_out_of_range("quantity_on_hand", self.quantity_on_hand)
    }

    fn soft_rule_failures(&self, ctx: &RuleContext) -> Vec<&'static str> {
        match self.last_stocked_date {
            None => vec!["missing_stock_date"],
            Some(d) if d > ctx.as_of => vec!["future_stock_date"],
            Some(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_date_relative_to_as_of() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut line = Inventory {
            inventory_id: 1,
            product_id: 2,
            warehouse_id: 3,
            quantity_on_hand: 0,
            last_stocked_date: NaiveDate::from_ymd_opt(2024, 6, 2),
        };
        let ctx = RuleContext { as_of };
        assert_eq!(line.soft_rule_failures(&ctx), vec!["future_stock_date"]);
        line.last_stocked_date = Some(as_of);
        assert!(line.soft_rule_failures(&ctx).is_empty());
        assert_eq!(line.check_rules(), None);
    }
}
