// medallion-core/src/domain/validation/engine.rs

use std::collections::BTreeMap;

use super::dedup::resolve_duplicates;
use super::rejection::{Classifier, RejectedRow, Rejection};
use super::scoring::ScoringTable;
use super::silver::{EntityOutcome, KeyIndex, Validated};
use crate::domain::config::ProjectConfig;
use crate::domain::error::DomainError;
use crate::domain::record::{CoercedRow, Entity, RawBatch, RawRecord, RuleContext};
use crate::domain::run::RunContext;
use crate::domain::schema::EntityKind;

/// Per-row outcome of stages 1-4, before duplicate resolution.
pub type RowCheck<E> = Result<E, Rejection>;

/// Row validation with a fixed stage priority; the first failure wins:
/// coercion, required fields, hard rules, referential integrity, then
/// duplicate resolution across the whole batch.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    classifier: Classifier,
    scoring: ScoringTable,
    required: BTreeMap<EntityKind, Vec<&'static str>>,
}

impl ValidationEngine {
    pub fn from_config(config: &ProjectConfig) -> Result<Self, DomainError> {
        let classifier = Classifier::new(&config.rejection_taxonomy)?;
        let scoring = ScoringTable::from_config(config)?;

        let mut required = BTreeMap::new();
        for kind in EntityKind::ALL {
            let rules = config.entity_rules(kind)?;
            // Declared order, so "first missing field" is stable.
            let fields: Vec<&'static str> = kind
                .schema()
                .fields
                .iter()
                .filter(|f| rules.required.iter().any(|r| r == f.name))
                .map(|f| f.name)
                .collect();
            required.insert(kind, fields);
        }

        Ok(Self {
            classifier,
            scoring,
            required,
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn scoring(&self) -> &ScoringTable {
        &self.scoring
    }

    /// Stages 1-4 for a single row. Pure; safe to run rows in parallel.
    pub fn check_row<E: Entity>(&self, raw: &RawRecord, parents: &KeyIndex) -> RowCheck<E> {
        let schema = E::KIND.schema();

        // 1. Structural coercion
        let row = CoercedRow::coerce(schema, raw)
            .map_err(|e| Rejection::new(e.code, Some(e.field), e.detail))?;

        // 2. Required fields
        let required = self.required.get(&E::KIND).map(Vec::as_slice).unwrap_or(&[]);
        if let Some(missing) = required.iter().find(|f| !row.is_present(f)) {
            return Err(missing_field(*missing));
        }
        let record = E::from_row(&row).map_err(|m| missing_field(m.0))?;

        // 3. Range and business rules
        if let Some(v) = record.check_rules() {
            return Err(Rejection::new(v.code, Some(v.field), v.detail));
        }

        // 4. Referential integrity against validated parents
        for (parent, key) in record.references() {
            if !parents.contains(parent, key) {
                let field = schema
                    .foreign_keys()
                    .find(|f| f.references == Some(parent))
                    .map(|f| f.name);
                return Err(Rejection::new(
                    parent.missing_reference_code(),
                    field,
                    format!("no validated {} with id {}", parent, key),
                ));
            }
        }

        Ok(record)
    }

    /// Stage 5 plus scoring and classification. `checks` must be aligned
    /// with `batch.rows`.
    pub fn finish<E: Entity>(
        &self,
        ctx: &RunContext,
        batch: &RawBatch,
        checks: Vec<RowCheck<E>>,
    ) -> EntityOutcome<E> {
        let mut candidates = Vec::new();
        let mut failures: Vec<(u64, Rejection)> = Vec::new();
        for (raw, check) in batch.rows.iter().zip(checks) {
            match check {
                Ok(record) => candidates.push((raw.seq, record)),
                Err(rejection) => failures.push((raw.seq, rejection)),
            }
        }

        let (survivors, superseded) = resolve_duplicates(candidates);
        failures.extend(superseded);
        failures.sort_by_key(|(seq, _)| *seq);

        let rule_ctx = RuleContext { as_of: ctx.as_of };
        let validated = survivors
            .into_iter()
            .map(|(seq, record)| {
                let soft_failures = record.soft_rule_failures(&rule_ctx);
                Validated {
                    seq,
                    quality_score: self.scoring.score(E::KIND, &soft_failures),
                    soft_failures,
                    record,
                }
            })
            .collect();

        let by_seq: BTreeMap<u64, &RawRecord> = batch.rows.iter().map(|r| (r.seq, r)).collect();
        let rejected = failures
            .into_iter()
            .filter_map(|(seq, rejection)| {
                by_seq.get(&seq).map(|raw| {
                    RejectedRow::from_raw(
                        ctx.run_id,
                        E::KIND.table_name(),
                        &batch.batch_id,
                        raw,
                        rejection,
                        &self.classifier,
                    )
                })
            })
            .collect();

        EntityOutcome {
            kind: E::KIND,
            raw_count: batch.rows.len(),
            validated,
            rejected,
        }
    }

    /// Sequential rendition of the whole entity pipeline.
    pub fn validate<E: Entity>(
        &self,
        ctx: &RunContext,
        batch: &RawBatch,
        parents: &KeyIndex,
    ) -> EntityOutcome<E> {
        let checks = batch
            .rows
            .iter()
            .map(|raw| self.check_row::<E>(raw, parents))
            .collect();
        self.finish(ctx, batch, checks)
    }
}

fn missing_field(name: &'static str) -> Rejection {
    Rejection::new(
        "missing_required_field",
        Some(name),
        format!("{} is required", name),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::config::RejectionKind;
    use crate::domain::record::entities::{
        Inventory, Product, RetailStore, Supplier, SupplyOrder, Warehouse,
    };
    use crate::test_support::{self, raw_batch};

    fn engine() -> ValidationEngine {
        ValidationEngine::from_config(&test_support::project_config()).unwrap()
    }

    fn parents_with(kind: EntityKind, ids: &[i64], index: &mut KeyIndex) {
        match kind {
            EntityKind::Product => {
                let v: Vec<Validated<Product>> = ids
                    .iter()
                    .map(|id| test_support::validated(test_support::product(*id, 1)))
                    .collect();
                index.register(&v);
            }
            EntityKind::Warehouse => {
                let v: Vec<_> = ids
                    .iter()
                    .map(|id| test_support::validated(test_support::warehouse(*id)))
                    .collect();
                index.register(&v);
            }
            EntityKind::RetailStore => {
                let v: Vec<_> = ids
                    .iter()
                    .map(|id| {
                        test_support::validated(RetailStore {
                            retail_store_id: *id,
                            store_name: None,
                            city: None,
                            region: None,
                            store_type: None,
                            store_status: None,
                        })
                    })
                    .collect();
                index.register(&v);
            }
            _ => {}
        }
    }

    const ORDER_COLUMNS: &[&str] = &[
        "supply_order_id", "product_id", "warehouse_id", "retail_store_id", "quantity",
        "price", "total_invoice", "order_date", "shipped_date", "delivered_date", "status",
    ];

    /// Product 1, warehouse 2 and store 3 are known.
    fn order_parents() -> KeyIndex {
        let mut parents = KeyIndex::default();
        parents_with(EntityKind::Product, &[1], &mut parents);
        parents_with(EntityKind::Warehouse, &[2], &mut parents);
        parents_with(EntityKind::RetailStore, &[3], &mut parents);
        parents
    }

    fn single_rejection<E: Entity>(batch: &RawBatch, parents: &KeyIndex) -> (String, RejectionKind) {
        let outcome = engine().validate::<E>(&test_support::ctx(), batch, parents);
        assert!(outcome.validated.is_empty(), "row should be rejected");
        assert_eq!(outcome.rejected.len(), 1);
        (outcome.rejected[0].reason.clone(), outcome.rejected[0].kind)
    }

    #[test]
    fn test_negative_quantity_is_a_range_violation() {
        let mut parents = KeyIndex::default();
        parents_with(EntityKind::Product, &[1], &mut parents);
        parents_with(EntityKind::Warehouse, &[2], &mut parents);

        let batch = raw_batch(
            "inventory",
            &["inventory_id", "product_id", "warehouse_id", "quantity_on_hand", "last_stocked_date"],
            &[&["1", "1", "2", "-5", "2024-01-01"]],
        );
        let outcome = engine().validate::<Inventory>(&test_support::ctx(), &batch, &parents);

        assert!(outcome.validated.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].reason, "negative_quantity");
        assert_eq!(outcome.rejected[0].kind, RejectionKind::RangeViolation);
        assert_eq!(outcome.rejected[0].payload["quantity_on_hand"], "-5");
    }

    #[test]
    fn test_zero_capacity_warehouse() {
        let batch = raw_batch(
            "warehouses",
            &["warehouse_id", "warehouse_name", "city", "region", "storage_capacity"],
            &[&["100", "North Hub", "Oslo", "North", "0"]],
        );
        assert_eq!(
            single_rejection::<Warehouse>(&batch, &KeyIndex::default()),
            ("non_positive_capacity".to_string(), RejectionKind::RangeViolation)
        );
    }

    #[test]
    fn test_negative_invoice() {
        let batch = raw_batch(
            "supply_orders",
            ORDER_COLUMNS,
            &[&["9000", "1", "2", "3", "0", "4.00", "-1", "2024-06-01", "", "", "pending"]],
        );
        assert_eq!(
            single_rejection::<SupplyOrder>(&batch, &order_parents()),
            ("negative_invoice".to_string(), RejectionKind::RangeViolation)
        );
    }

    #[test]
    fn test_unparseable_date_and_decimal_are_structural() {
        let batch = raw_batch(
            "inventory",
            &["inventory_id", "product_id", "warehouse_id", "quantity_on_hand", "last_stocked_date"],
            &[&["1", "1", "2", "5", "31-31-2024"]],
        );
        let mut parents = KeyIndex::default();
        parents_with(EntityKind::Product, &[1], &mut parents);
        parents_with(EntityKind::Warehouse, &[2], &mut parents);
        assert_eq!(
            single_rejection::<Inventory>(&batch, &parents),
            ("invalid_date".to_string(), RejectionKind::StructuralError)
        );

        let batch = raw_batch(
            "products",
            &["product_id", "product_name", "unit_cost", "selling_price", "supplier_id"],
            &[&["10", "Widget", "cheap", "2.00", "1"]],
        );
        assert_eq!(
            single_rejection::<Product>(&batch, &KeyIndex::default()),
            ("invalid_decimal".to_string(), RejectionKind::StructuralError)
        );
    }

    #[test]
    fn test_unknown_warehouse_is_referential() {
        let mut parents = KeyIndex::default();
        parents_with(EntityKind::Product, &[1], &mut parents);
        parents_with(EntityKind::Warehouse, &[2], &mut parents);
        let batch = raw_batch(
            "inventory",
            &["inventory_id", "product_id", "warehouse_id", "quantity_on_hand", "last_stocked_date"],
            &[&["1", "1", "404", "5", "2024-01-01"]],
        );
        assert_eq!(
            single_rejection::<Inventory>(&batch, &parents),
            ("unknown_warehouse".to_string(), RejectionKind::ReferentialIntegrityError)
        );
    }

    #[test]
    fn test_unknown_retail_store_is_referential() {
        let batch = raw_batch(
            "supply_orders",
            ORDER_COLUMNS,
            &[&["9000", "1", "2", "404", "2", "4.00", "8.00", "2024-06-01", "", "", "pending"]],
        );
        assert_eq!(
            single_rejection::<SupplyOrder>(&batch, &order_parents()),
            ("unknown_retail_store".to_string(), RejectionKind::ReferentialIntegrityError)
        );
    }

    #[test]
    fn test_oversized_amounts_and_quantities_are_range_violations() {
        let batch = raw_batch(
            "supply_orders",
            ORDER_COLUMNS,
            &[&[
                "9000", "1", "2", "3", "1", "40000000000000000000000000000",
                "40000000000000000000000000000", "2024-06-01", "", "", "pending",
            ]],
        );
        assert_eq!(
            single_rejection::<SupplyOrder>(&batch, &order_parents()),
            ("amount_out_of_range".to_string(), RejectionKind::RangeViolation)
        );

        let mut parents = KeyIndex::default();
        parents_with(EntityKind::Product, &[1], &mut parents);
        parents_with(EntityKind::Warehouse, &[2], &mut parents);
        let batch = raw_batch(
            "inventory",
            &["inventory_id", "product_id", "warehouse_id", "quantity_on_hand", "last_stocked_date"],
            &[&["1", "1", "2", "2000000000", "2024-01-01"]],
        );
        assert_eq!(
            single_rejection::<Inventory>(&batch, &parents),
            ("quantity_out_of_range".to_string(), RejectionKind::RangeViolation)
        );
    }

    #[test]
    fn test_duplicate_email_keeps_latest() {
        let batch = raw_batch(
            "suppliers",
            &["supplier_id", "supplier_name", "contact_email", "phone_number"],
            &[
                &["1", "Alpha Parts", "Shared@Example.com", "+1 555 0100"],
                &["2", "Beta Parts", "shared@example.com ", "+1 555 0101"],
            ],
        );
        let outcome =
            engine().validate::<Supplier>(&test_support::ctx(), &batch, &KeyIndex::default());

        assert_eq!(outcome.validated.len(), 1);
        assert_eq!(outcome.validated[0].record.supplier_id, 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].seq, 0);
        assert_eq!(outcome.rejected[0].reason, "superseded");
        assert_eq!(outcome.rejected[0].kind, RejectionKind::DuplicateKeyError);
        assert!(outcome.is_balanced());
    }

    #[test]
    fn test_unknown_supplier_is_referential() {
        let batch = raw_batch(
            "products",
            &["product_id", "product_name", "unit_cost", "selling_price", "supplier_id", "product_category", "status"],
            &[&["10", "Widget", "1.00", "2.00", "99", "Hardware", "active"]],
        );
        let outcome =
            engine().validate::<Product>(&test_support::ctx(), &batch, &KeyIndex::default());

        assert_eq!(outcome.rejected[0].reason, "unknown_supplier");
        assert_eq!(outcome.rejected[0].field.as_deref(), Some("supplier_id"));
        assert_eq!(outcome.rejected[0].kind, RejectionKind::ReferentialIntegrityError);
    }

    #[test]
    fn test_stage_priority_structural_before_required() {
        // Bad integer AND missing required field: coercion runs first.
        let batch = raw_batch(
            "inventory",
            &["inventory_id", "product_id", "warehouse_id", "quantity_on_hand"],
            &[&["x", "", "2", "3"]],
        );
        let outcome =
            engine().validate::<Inventory>(&test_support::ctx(), &batch, &KeyIndex::default());
        assert_eq!(outcome.rejected[0].reason, "invalid_integer");
        assert_eq!(outcome.rejected[0].kind, RejectionKind::StructuralError);

        let batch = raw_batch(
            "inventory",
            &["inventory_id", "product_id", "warehouse_id", "quantity_on_hand"],
            &[&["1", "", "2", "-3"]],
        );
        let outcome =
            engine().validate::<Inventory>(&test_support::ctx(), &batch, &KeyIndex::default());
        assert_eq!(outcome.rejected[0].reason, "missing_required_field");
        assert_eq!(outcome.rejected[0].field.as_deref(), Some("product_id"));
    }

    #[test]
    fn test_soft_rules_lower_the_score() {
        let batch = raw_batch(
            "suppliers",
            &["supplier_id", "supplier_name", "contact_email"],
            &[&["1", "lowercase name", "not-an-email"]],
        );
        let e = engine();
        let outcome = e.validate::<Supplier>(&test_support::ctx(), &batch, &KeyIndex::default());
        let v = &outcome.validated[0];
        assert_eq!(v.soft_failures, vec!["email_format", "name_casing"]);
        assert_eq!(
            v.quality_score,
            e.scoring()
                .score(EntityKind::Supplier, &["email_format", "name_casing"])
        );
        assert!(v.quality_score < 100);
    }
}
