// medallion-core/src/domain/record/coercion.rs
//
// Raw string -> typed value. Each declared field either coerces or yields a
// typed error; absent cells stay absent (required-ness is checked later).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::raw::{RawField, RawRecord};
use crate::domain::schema::{EntitySchema, FieldType};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    pub field: &'static str,
    /// One of `invalid_integer`, `invalid_decimal`, `invalid_date`.
    pub code: &'static str,
    pub detail: String,
}

/// A non-nullable field was absent when building the typed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn coerce_integer(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    // "12.0" as exported by spreadsheets
    let d = Decimal::from_str(s).ok()?;
    if d.fract().is_zero() {
        d.trunc().to_i64()
    } else {
        None
    }
}

pub fn coerce_decimal(raw: &str, scale: u32) -> Option<Decimal> {
    let mut d = Decimal::from_str(raw.trim()).ok()?;
    d = d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    d.rescale(scale);
    Some(d)
}

pub fn coerce_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

fn coerce_field(ty: FieldType, raw: &str) -> Result<Value, &'static str> {
    match ty {
        FieldType::Integer => coerce_integer(raw)
            .map(Value::Integer)
            .ok_or("invalid_integer"),
        FieldType::Decimal { scale } => coerce_decimal(raw, scale)
            .map(Value::Decimal)
            .ok_or("invalid_decimal"),
        FieldType::Date => coerce_date(raw).map(Value::Date).ok_or("invalid_date"),
        FieldType::Text => Ok(Value::Text(raw.trim().to_string())),
    }
}

/// A raw row after structural coercion. Keys are the declared field names.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedRow {
    values: BTreeMap<&'static str, Value>,
}

impl CoercedRow {
    /// Coerces every declared field in declaration order. The first field that
    /// fails decides the error.
    pub fn coerce(schema: &EntitySchema, raw: &RawRecord) -> Result<Self, CoercionError> {
        let mut values = BTreeMap::new();
        for field in schema.fields {
            let RawField::Present(text) = raw.get(field.name) else {
                continue;
            };
            match coerce_field(field.ty, text) {
                Ok(v) => {
                    values.insert(field.name, v);
                }
                Err(code) => {
                    return Err(CoercionError {
                        field: field.name,
                        code,
                        detail: format!("'{}' is not a valid {:?}", text.trim(), field.ty),
                    });
                }
            }
        }
        Ok(Self { values })
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(Value::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn decimal(&self, name: &str) -> Option<Decimal> {
        match self.values.get(name) {
            Some(Value::Decimal(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(Value::Date(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(Value::Text(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn require_int(&self, name: &'static str) -> Result<i64, MissingField> {
        self.int(name).ok_or(MissingField(name))
    }

    pub fn require_decimal(&self, name: &'static str) -> Result<Decimal, MissingField> {
        self.decimal(name).ok_or(MissingField(name))
    }

    pub fn require_date(&self, name: &'static str) -> Result<NaiveDate, MissingField> {
        self.date(name).ok_or(MissingField(name))
    }

    pub fn require_text(&self, name: &'static str) -> Result<String, MissingField> {
        self.text(name).ok_or(MissingField(name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::schema::EntityKind;

    #[test]
    fn test_integer_coercion() {
        assert_eq!(coerce_integer(" -5 "), Some(-5));
        assert_eq!(coerce_integer("+12"), Some(12));
        assert_eq!(coerce_integer("12.0"), Some(12));
        assert_eq!(coerce_integer("12.5"), None);
        assert_eq!(coerce_integer("twelve"), None);
    }

    #[test]
    fn test_decimal_rounds_half_away_from_zero() {
        assert_eq!(coerce_decimal("2.345", 2).unwrap().to_string(), "2.35");
        assert_eq!(coerce_decimal("-2.345", 2).unwrap().to_string(), "-2.35");
        assert_eq!(coerce_decimal("7", 2).unwrap().to_string(), "7.00");
        assert_eq!(coerce_decimal(" 7.1 ", 2).unwrap().to_string(), "7.10");
        assert_eq!(coerce_decimal("1,5", 2), None);
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        for raw in ["2024-03-09", "2024/03/09", "03/09/2024", "2024-03-09T10:15:00", "2024-03-09 10:15:00.123"] {
            assert_eq!(coerce_date(raw), Some(expected), "{}", raw);
        }
        assert_eq!(coerce_date("2024-02-30"), None);
    }

    #[test]
    fn test_first_failing_field_wins() {
        let raw = RawRecord::new(
            0,
            [
                ("inventory_id", Some("1")),
                ("product_id", Some("abc")),
                ("warehouse_id", Some("2")),
                ("quantity_on_hand", Some("x")),
            ],
        );
        let err = CoercedRow::coerce(EntityKind::Inventory.schema(), &raw).unwrap_err();
        assert_eq!(err.field, "product_id");
        assert_eq!(err.code, "invalid_integer");
    }

    #[test]
    fn test_absent_fields_are_skipped() {
        let raw = RawRecord::new(0, [("warehouse_id", Some("4")), ("region", Some(""))]);
        let row = CoercedRow::coerce(EntityKind::Warehouse.schema(), &raw).unwrap();
        assert_eq!(row.int("warehouse_id"), Some(4));
        assert!(!row.is_present("region"));
        assert_eq!(row.require_int("storage_capacity"), Err(MissingField("storage_capacity")));
    }
}
