// medallion-core/src/domain/schema/declared.rs
//
// The declared schema of the six supply-chain entities. Everything downstream
// (coercion, required fields, FK graph, soft-rule names) reads from here.

use super::entity::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    /// Fixed-point decimal, always rescaled to `scale` fractional digits.
    Decimal {
        scale: u32,
    },
    Date,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// The typed model cannot exist without this field.
    pub non_nullable: bool,
    pub references: Option<EntityKind>,
}

impl FieldSpec {
    const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            non_nullable: false,
            references: None,
        }
    }

    const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            non_nullable: true,
            references: None,
        }
    }

    const fn foreign(name: &'static str, parent: EntityKind) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
            non_nullable: true,
            references: Some(parent),
        }
    }
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub primary_key: &'static str,
    pub fields: &'static [FieldSpec],
    /// Names of the soft rules scored for this entity (see the scoring table).
    pub soft_rules: &'static [&'static str],
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.references.is_some())
    }

    pub fn parents(&self) -> Vec<EntityKind> {
        let mut parents: Vec<EntityKind> = self.foreign_keys().filter_map(|f| f.references).collect();
        parents.sort();
        parents.dedup();
        parents
    }

    pub fn non_nullable_fields(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().filter(|f| f.non_nullable).map(|f| f.name)
    }
}

const MONEY: FieldType = FieldType::Decimal { scale: 2 };

static SUPPLIER: EntitySchema = EntitySchema {
    kind: EntityKind::Supplier,
    primary_key: "supplier_id",
    fields: &[
        FieldSpec::required("supplier_id", FieldType::Integer),
        FieldSpec::optional("supplier_name", FieldType::Text),
        FieldSpec::required("contact_email", FieldType::Text),
        FieldSpec::optional("phone_number", FieldType::Text),
    ],
    soft_rules: &["email_format", "phone_format", "name_casing"],
};

static PRODUCT: EntitySchema = EntitySchema {
    kind: EntityKind::Product,
    primary_key: "product_id",
    fields: &[
        FieldSpec::required("product_id", FieldType::Integer),
        FieldSpec::optional("product_name", FieldType::Text),
        FieldSpec::required("unit_cost", MONEY),
        FieldSpec::required("selling_price", MONEY),
        FieldSpec::foreign("supplier_id", EntityKind::Supplier),
        FieldSpec::optional("product_category", FieldType::Text),
        FieldSpec::optional("status", FieldType::Text),
    ],
    soft_rules: &["missing_category", "inactive_status"],
};

static WAREHOUSE: EntitySchema = EntitySchema {
    kind: EntityKind::Warehouse,
    primary_key: "warehouse_id",
    fields: &[
        FieldSpec::required("warehouse_id", FieldType::Integer),
        FieldSpec::optional("warehouse_name", FieldType::Text),
        FieldSpec::optional("city", FieldType::Text),
        FieldSpec::optional("region", FieldType::Text),
        FieldSpec::required("storage_capacity", FieldType::Integer),
    ],
    soft_rules: &["missing_region", "capacity_outlier"],
};

static INVENTORY: EntitySchema = EntitySchema {
    kind: EntityKind::Inventory,
    primary_key: "inventory_id",
    fields: &[
        FieldSpec::required("inventory_id", FieldType::Integer),
        FieldSpec::foreign("product_id", EntityKind::Product),
        FieldSpec::foreign("warehouse_id", EntityKind::Warehouse),
        FieldSpec::required("quantity_on_hand", FieldType::Integer),
        FieldSpec::optional("last_stocked_date", FieldType::Date),
    ],
    soft_rules: &["future_stock_date", "missing_stock_date"],
};

static RETAIL_STORE: EntitySchema = EntitySchema {
    kind: EntityKind::RetailStore,
    primary_key: "retail_store_id",
    fields: &[
        FieldSpec::required("retail_store_id", FieldType::Integer),
        FieldSpec::optional("store_name", FieldType::Text),
        FieldSpec::optional("city", FieldType::Text),
        FieldSpec::optional("region", FieldType::Text),
        FieldSpec::optional("store_type", FieldType::Text),
        FieldSpec::optional("store_status", FieldType::Text),
    ],
    soft_rules: &["missing_region", "unknown_store_status"],
};

static SUPPLY_ORDER: EntitySchema = EntitySchema {
    kind: EntityKind::SupplyOrder,
    primary_key: "supply_order_id",
    fields: &[
        FieldSpec::required("supply_order_id", FieldType::Integer),
        FieldSpec::foreign("product_id", EntityKind::Product),
        FieldSpec::foreign("warehouse_id", EntityKind::Warehouse),
        FieldSpec::foreign("retail_store_id", EntityKind::RetailStore),
        FieldSpec::required("quantity", FieldType::Integer),
        FieldSpec::required("price", MONEY),
        FieldSpec::required("total_invoice", MONEY),
        FieldSpec::required("order_date", FieldType::Date),
        FieldSpec::optional("shipped_date", FieldType::Date),
        FieldSpec::optional("delivered_date", FieldType::Date),
        FieldSpec::optional("status", FieldType::Text),
    ],
    soft_rules: &["unknown_status", "delivered_without_date"],
};

impl EntityKind {
    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            Self::Supplier => &SUPPLIER,
            Self::Product => &PRODUCT,
            Self::Warehouse => &WAREHOUSE,
            Self::Inventory => &INVENTORY,
            Self::RetailStore => &RETAIL_STORE,
            Self::SupplyOrder => &SUPPLY_ORDER,
        }
    }
}
