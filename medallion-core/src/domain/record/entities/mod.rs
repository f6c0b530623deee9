// medallion-core/src/domain/record/entities/mod.rs

pub mod inventory;
pub mod product;
pub mod retail_store;
pub mod supplier;
pub mod supply_order;
pub mod warehouse;

pub use inventory::Inventory;
pub use product::Product;
pub use retail_store::RetailStore;
pub use supplier::Supplier;
pub use supply_order::{OrderStatus, SupplyOrder};
pub use warehouse::Warehouse;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::coercion::{CoercedRow, MissingField};
use crate::domain::schema::EntityKind;

/// A hard-rule failure (validation stage 3). Its kind (range vs business) is
/// resolved through the rejection taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    pub code: &'static str,
    pub field: &'static str,
    pub detail: String,
}

impl RuleViolation {
    pub fn new(code: &'static str, field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            code,
            field,
            detail: detail.into(),
        }
    }
}

/// Largest accepted unit or line quantity.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest accepted monetary amount (cost, price or invoice). With
/// `MAX_QUANTITY`, a line value stays below 1e21, so gold sums over tens of
/// millions of rows stay inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0); // 10^12

pub(crate) fn quantity_out_of_range(field: &'static str, value: i64) -> Option<RuleViolation> {
    (value > MAX_QUANTITY).then(|| {
        RuleViolation::new(
            "quantity_out_of_range",
            field,
            format!("{} {} > {}", field, value, MAX_QUANTITY),
        )
    })
}

/// First of `amounts` above `MAX_AMOUNT`, if any.
pub(crate) fn amount_out_of_range(amounts: &[(&'static str, Decimal)]) -> Option<RuleViolation> {
    amounts.iter().find(|(_, v)| v.abs() > MAX_AMOUNT).map(|(field, v)| {
        RuleViolation::new(
            "amount_out_of_range",
            field,
            format!("{} {} > {}", field, v, MAX_AMOUNT),
        )
    })
}

/// Inputs soft rules may depend on besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub as_of: NaiveDate,
}

/// Typed silver record of one entity.
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    const KIND: EntityKind;

    fn from_row(row: &CoercedRow) -> Result<Self, MissingField>;

    fn primary_key(&self) -> i64;

    /// Foreign keys, in declared field order.
    fn references(&self) -> Vec<(EntityKind, i64)>;

    /// Every natural key the record claims. Two records sharing any key are
    /// duplicates; the later arrival wins.
    fn natural_keys(&self) -> Vec<String> {
        vec![format!(
            "{}={}",
            Self::KIND.schema().primary_key,
            self.primary_key()
        )]
    }

    /// First hard rule violated, in declared rule order.
    fn check_rules(&self) -> Option<RuleViolation> {
        None
    }

    /// Names of the soft rules this record fails.
    fn soft_rule_failures(&self, ctx: &RuleContext) -> Vec<&'static str>;
}

/// Lowercased, trimmed status-like text.
pub(crate) fn normalized(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_lowercase())
}
