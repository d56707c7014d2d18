//! Validation gate
//!
//! Inspects a response store and contact string before submission. All
//! deficiencies are collected in catalog order so the page can report every
//! problem at once; the gate never stops at the first failure.

use crate::catalog::Catalog;
use crate::store::ResponseStore;
use serde::Serialize;

/// A specific, addressable reason a submission cannot proceed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Deficiency {
    /// Contact field is blank
    MissingContact,
    /// Contact field fails the syntactic address check
    MalformedContact,
    /// A required answer slot is unanswered
    MissingAnswer {
        section_id: String,
        item_index: usize,
        dimension: String,
    },
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid { deficiencies: Vec<Deficiency> },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn deficiencies(&self) -> &[Deficiency] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid { deficiencies } => deficiencies,
        }
    }
}

/// Syntactic contact check
///
/// Requires an `@` followed somewhere by a `.`. This is a weak approximation
/// of an address, not RFC 5322 validation.
pub fn check_contact(contact: &str) -> Option<Deficiency> {
    let contact = contact.trim();
    if contact.is_empty() {
        return Some(Deficiency::MissingContact);
    }
    match contact.split_once('@') {
        Some((_, domain)) if domain.contains('.') => None,
        _ => Some(Deficiency::MalformedContact),
    }
}

/// Check contact and answer completeness in one pass over the catalog
pub fn validate(store: &ResponseStore, catalog: &Catalog, contact: &str) -> ValidationResult {
    let mut deficiencies: Vec<Deficiency> = check_contact(contact).into_iter().collect();

    for section in catalog.sections() {
        let slots = store.section_responses(&section.id).map(|r| &r.slots);
        for item_index in 0..section.items.len() {
            for (dim_index, dim) in section.dimensions.iter().enumerate() {
                let answered = slots
                    .and_then(|s| s.get(item_index))
                    .and_then(|dims| dims.get(dim_index))
                    .is_some_and(Option::is_some);
                if !answered {
                    deficiencies.push(Deficiency::MissingAnswer {
                        section_id: section.id.clone(),
                        item_index,
                        dimension: dim.name.clone(),
                    });
                }
            }
        }
    }

    if deficiencies.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid { deficiencies }
    }
}
