// medallion-core/src/domain/record/mod.rs

pub mod coercion;
pub mod entities;
pub mod raw;

pub use coercion::{CoercedRow, CoercionError, MissingField, Value};
pub use entities::{Entity, RuleContext, RuleViolation};
pub use raw::{RawBatch, RawField, RawRecord, RawStore};
