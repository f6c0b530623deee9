// medallion-core/src/domain/schema/entity.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// Declaration order doubles as the tie-breaker inside a planning layer,
// so the derived Ord gives a stable processing order for free.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Supplier,
    Product,
    Warehouse,
    Inventory,
    RetailStore,
    SupplyOrder,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        Self::Supplier,
        Self::Product,
        Self::Warehouse,
        Self::Inventory,
        Self::RetailStore,
        Self::SupplyOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supplier => "supplier",
            Self::Product => "product",
            Self::Warehouse => "warehouse",
            Self::Inventory => "inventory",
            Self::RetailStore => "retail_store",
            Self::SupplyOrder => "supply_order",
        }
    }

    /// Name of the table the entity lives in, in every layer.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Supplier => "suppliers",
            Self::Product => "products",
            Self::Warehouse => "warehouses",
            Self::Inventory => "inventory",
            Self::RetailStore => "retail_stores",
            Self::SupplyOrder => "supply_orders",
        }
    }

    /// Reason code emitted when a child row points at a missing row of this entity.
    pub fn missing_reference_code(&self) -> &'static str {
        match self {
            Self::Supplier => "unknown_supplier",
            Self::Product => "unknown_product",
            Self::Warehouse => "unknown_warehouse",
            Self::Inventory => "unknown_inventory",
            Self::RetailStore => "unknown_retail_store",
            Self::SupplyOrder => "unknown_supply_order",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    /// Accepts both the entity name ("supplier") and its table ("suppliers").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == needle || k.table_name() == needle)
            .ok_or_else(|| format!("Unknown entity: {}", s))
    }
}
