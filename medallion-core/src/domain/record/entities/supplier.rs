// medallion-core/src/domain/record/entities/supplier.rs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{Entity, RuleContext};
use crate::domain::record::coercion::{CoercedRow, MissingField};
use crate::domain::schema::EntityKind;

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$")
            .unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

fn re_phone() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\+?[0-9 ().\-]{7,20}$")
            .unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: i64,
    pub supplier_name: Option<String>,
    /// Stored lowercased; also the supplier's natural key.
    pub contact_email: String,
    pub phone_number: Option<String>,
}

fn is_title_cased(name: &str) -> bool {
    name.split_whitespace()
        .all(|word| word.chars().next().is_some_and(|c| !c.is_lowercase()))
}

impl Entity for Supplier {
    const KIND: EntityKind = EntityKind::Supplier;

    fn from_row(row: &CoercedRow) -> Result<Self, MissingField> {
        Ok(Self {
            supplier_id: row.require_int("supplier_id")?,
            supplier_name: row.text("supplier_name"),
            contact_email: row.require_text("contact_email")?.to_lowercase(),
            phone_number: row.text("phone_number"),
        })
    }

    fn primary_key(&self) -> i64 {
        self.supplier_id
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        Vec::new()
    }

    fn natural_keys(&self) -> Vec<String> {
        vec![
            format!("contact_email={}", self.contact_email),
            format!("supplier_id={}", self.supplier_id),
        ]
    }

    fn soft_rule_failures(&self, _ctx: &RuleContext) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !re_email().is_match(&self.contact_email) {
            failed.push("email_format");
        }
        if let Some(phone) = &self.phone_number
            && !re_phone().is_match(phone)
        {
            failed.push("phone_format");
        }
        if !self.supplier_name.as_deref().is_some_and(is_title_cased) {
            failed.push("name_casing");
        }
        failed
    }
}
