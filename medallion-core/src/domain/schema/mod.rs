// medallion-core/src/domain/schema/mod.rs

pub mod declared;
pub mod entity;

pub use declared::{EntitySchema, FieldSpec, FieldType};
pub use entity::EntityKind;
