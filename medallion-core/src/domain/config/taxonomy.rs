// medallion-core/src/domain/config/taxonomy.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::Validate;

/// Row-level rejection classes. Names match the configured taxonomy verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectionKind {
    StructuralError,
    RequiredFieldError,
    RangeViolation,
    ReferentialIntegrityError,
    BusinessRuleViolation,
    DuplicateKeyError,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuralError => "StructuralError",
            Self::RequiredFieldError => "RequiredFieldError",
            Self::RangeViolation => "RangeViolation",
            Self::ReferentialIntegrityError => "ReferentialIntegrityError",
            Self::BusinessRuleViolation => "BusinessRuleViolation",
            Self::DuplicateKeyError => "DuplicateKeyError",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RejectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::StructuralError,
            Self::RequiredFieldError,
            Self::RangeViolation,
            Self::ReferentialIntegrityError,
            Self::BusinessRuleViolation,
            Self::DuplicateKeyError,
        ]
        .into_iter()
        .find(|k| k.as_str() == s)
        .ok_or_else(|| format!("Unknown rejection kind: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonSpec {
    pub kind: RejectionKind,
    #[serde(default)]
    pub description: String,
}

/// Versioned mapping from reason code to rejection kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RejectionTaxonomy {
    #[validate(length(min = 1, message = "Taxonomy version cannot be empty"))]
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub reasons: BTreeMap<String, ReasonSpec>,
}
