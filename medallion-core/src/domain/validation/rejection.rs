// medallion-core/src/domain/validation/rejection.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::config::{RejectionKind, RejectionTaxonomy};
use crate::domain::error::DomainError;
use crate::domain::record::RawRecord;
use crate::domain::run::RunId;

/// Where in the per-row pipeline a reason code can be raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Coercion,
    Required,
    Rules,
    Referential,
    Duplicate,
    ForecastSanity,
}

pub struct ReasonEntry {
    pub code: &'static str,
    pub stage: ValidationStage,
    pub allowed: &'static [RejectionKind],
}

const STRUCTURAL: &[RejectionKind] = &[RejectionKind::StructuralError];
const REQUIRED: &[RejectionKind] = &[RejectionKind::RequiredFieldError];
const RULE: &[RejectionKind] = &[
    RejectionKind::RangeViolation,
    RejectionKind::BusinessRuleViolation,
];
const RANGE: &[RejectionKind] = &[RejectionKind::RangeViolation];
const REFERENTIAL: &[RejectionKind] = &[RejectionKind::ReferentialIntegrityError];
const DUPLICATE: &[RejectionKind] = &[RejectionKind::DuplicateKeyError];

macro_rules! reason {
    ($code:literal, $stage:ident, $allowed:ident) => {
        ReasonEntry {
            code: $code,
            stage: ValidationStage::$stage,
            allowed: $allowed,
        }
    };
}

/// Every reason code the engine can emit. The configured taxonomy must map
/// each of them, and only them.
pub const REASON_CATALOGUE: &[ReasonEntry] = &[
    reason!("invalid_integer", Coercion, STRUCTURAL),
    reason!("invalid_decimal", Coercion, STRUCTURAL),
    reason!("invalid_date", Coercion, STRUCTURAL),
    reason!("missing_required_field", Required, REQUIRED),
    reason!("negative_cost", Rules, RULE),
    reason!("negative_price", Rules, RULE),
    reason!("non_positive_capacity", Rules, RULE),
    reason!("negative_quantity", Rules, RULE),
    reason!("negative_invoice", Rules, RULE),
    reason!("quantity_out_of_range", Rules, RANGE),
    reason!("amount_out_of_range", Rules, RANGE),
    reason!("selling_below_cost", Rules, RULE),
    reason!("invoice_mismatch", Rules, RULE),
    reason!("date_order_violation", Rules, RULE),
    reason!("unknown_supplier", Referential, REFERENTIAL),
    reason!("unknown_product", Referential, REFERENTIAL),
    reason!("unknown_warehouse", Referential, REFERENTIAL),
    reason!("unknown_retail_store", Referential, REFERENTIAL),
    reason!("superseded", Duplicate, DUPLICATE),
    reason!("forecast_missing_value", ForecastSanity, REQUIRED),
    reason!("forecast_bounds_inverted", ForecastSanity, RANGE),
    reason!("forecast_unknown_granularity", ForecastSanity, STRUCTURAL),
];

/// Resolves reason codes to their configured kind.
#[derive(Debug, Clone)]
pub struct Classifier {
    version: String,
    kinds: HashMap<&'static str, RejectionKind>,
}

impl Classifier {
    pub fn new(taxonomy: &RejectionTaxonomy) -> Result<Self, DomainError> {
        if let Some(unknown) = taxonomy
            .reasons
            .keys()
            .find(|code| !REASON_CATALOGUE.iter().any(|e| e.code == code.as_str()))
        {
            return Err(DomainError::TaxonomyError(format!(
                "'{}' is not a reason code the engine emits",
                unknown
            )));
        }

        let mut kinds = HashMap::with_capacity(REASON_CATALOGUE.len());
        for entry in REASON_CATALOGUE {
            let reason = taxonomy.reasons.get(entry.code).ok_or_else(|| {
                DomainError::TaxonomyError(format!(
                    "Reason code '{}' is missing from taxonomy {}",
                    entry.code, taxonomy.version
                ))
            })?;
            if !entry.allowed.contains(&reason.kind) {
                return Err(DomainError::TaxonomyError(format!(
                    "Reason code '{}' ({:?} stage) cannot be classified as {}",
                    entry.code, entry.stage, reason.kind
                )));
            }
            kinds.insert(entry.code, reason.kind);
        }

        Ok(Self {
            version: taxonomy.version.clone(),
            kinds,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind_of(&self, code: &str) -> RejectionKind {
        if let Some(kind) = self.kinds.get(code) {
            return *kind;
        }
        // Only reachable for codes outside the catalogue.
        REASON_CATALOGUE
            .iter()
            .find(|e| e.code == code)
            .and_then(|e| e.allowed.first().copied())
            .unwrap_or(RejectionKind::StructuralError)
    }
}

/// Why a row was rejected. One per row: the first failing stage wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: &'static str,
    pub field: Option<&'static str>,
    pub detail: String,
}

impl Rejection {
    pub fn new(code: &'static str, field: Option<&'static str>, detail: impl Into<String>) -> Self {
        Self {
            code,
            field,
            detail: detail.into(),
        }
    }
}

/// A rejected row as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub run_id: RunId,
    pub table: String,
    pub batch_id: String,
    pub seq: u64,
    pub payload: serde_json::Value,
    pub reason: String,
    pub kind: RejectionKind,
    pub field: Option<String>,
    pub detail: String,
}

impl RejectedRow {
    pub fn from_raw(
        run_id: RunId,
        table: &str,
        batch_id: &str,
        raw: &RawRecord,
        rejection: Rejection,
        classifier: &Classifier,
    ) -> Self {
        Self {
            run_id,
            table: table.to_string(),
            batch_id: batch_id.to_string(),
            seq: raw.seq,
            payload: raw.payload(),
            kind: classifier.kind_of(rejection.code),
            reason: rejection.code.to_string(),
            field: rejection.field.map(str::to_string),
            detail: rejection.detail,
        }
    }
}
