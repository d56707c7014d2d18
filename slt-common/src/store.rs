//! Per-session response store
//!
//! One slot per (section, item, dimension). Slots are allocated from the
//! catalog up front and are never added or removed afterwards; they only move
//! between unanswered (`None`) and a legal [`Answer`].

use crate::answer::Answer;
use crate::catalog::Catalog;
use crate::{Error, Result};
use serde::Serialize;

/// Slots for one section, indexed `[item][dimension]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionResponses {
    pub section_id: String,
    pub slots: Vec<Vec<Option<Answer>>>,
}

/// Answer slots for every item of a catalog, in catalog order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseStore {
    sections: Vec<SectionResponses>,
}

impl ResponseStore {
    /// Allocate one unanswered slot per item per dimension
    pub fn init(catalog: &Catalog) -> Self {
        let sections = catalog
            .sections()
            .iter()
            .map(|section| SectionResponses {
                section_id: section.id.clone(),
                slots: vec![vec![None; section.dimensions.len()]; section.items.len()],
            })
            .collect();
        Self { sections }
    }

    /// Record an answer, rejecting values outside the dimension's domain
    ///
    /// `dimension = None` addresses the section's first dimension.
    pub fn set(
        &mut self,
        catalog: &Catalog,
        section_id: &str,
        item_index: usize,
        dimension: Option<&str>,
        answer: Answer,
    ) -> Result<()> {
        let section = catalog.require_section(section_id)?;
        section.check_item(item_index)?;
        let dim_index = section.dimension_index(dimension)?;
        let dim = &section.dimensions[dim_index];

        if !dim.kind.accepts(&answer) {
            return Err(Error::InvalidValue {
                section_id: section.id.clone(),
                dimension: dim.name.clone(),
                value: answer.to_string(),
                reason: dim.kind.describe_domain(),
            });
        }

        let slot = self.slot_mut(section_id, item_index, dim_index)?;
        *slot = Some(answer);
        Ok(())
    }

    /// Parse a raw control value and record it
    pub fn set_raw(
        &mut self,
        catalog: &Catalog,
        section_id: &str,
        item_index: usize,
        dimension: Option<&str>,
        raw: &str,
    ) -> Result<()> {
        let section = catalog.require_section(section_id)?;
        let dim = &section.dimensions[section.dimension_index(dimension)?];
        let answer = dim.kind.parse(raw).ok_or_else(|| Error::InvalidValue {
            section_id: section.id.clone(),
            dimension: dim.name.clone(),
            value: raw.to_string(),
            reason: dim.kind.describe_domain(),
        })?;
        self.set(catalog, section_id, item_index, dimension, answer)
    }

    /// Read a slot; `Ok(None)` means unanswered
    pub fn get(
        &self,
        catalog: &Catalog,
        section_id: &str,
        item_index: usize,
        dimension: Option<&str>,
    ) -> Result<Option<&Answer>> {
        let section = catalog.require_section(section_id)?;
        section.check_item(item_index)?;
        let dim_index = section.dimension_index(dimension)?;
        let responses = self
            .section_responses(section_id)
            .ok_or_else(|| Error::UnknownSection(section_id.to_string()))?;
        responses
            .slots
            .get(item_index)
            .and_then(|dims| dims.get(dim_index))
            .map(Option::as_ref)
            .ok_or_else(|| Error::ItemOutOfRange {
                section_id: section_id.to_string(),
                index: item_index,
                len: responses.slots.len(),
            })
    }

    /// Wipe every slot back to unanswered
    pub fn reset(&mut self, catalog: &Catalog) {
        *self = Self::init(catalog);
    }

    /// Slots for a section, in item order
    pub fn section_responses(&self, section_id: &str) -> Option<&SectionResponses> {
        self.sections.iter().find(|s| s.section_id == section_id)
    }

    pub fn sections(&self) -> &[SectionResponses] {
        &self.sections
    }

    pub fn slot_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.slots.iter())
            .map(Vec::len)
            .sum()
    }

    pub fn answered_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.slots.iter().flatten())
            .filter(|slot| slot.is_some())
            .count()
    }

    fn slot_mut(
        &mut self,
        section_id: &str,
        item_index: usize,
        dim_index: usize,
    ) -> Result<&mut Option<Answer>> {
        let responses = self
            .sections
            .iter_mut()
            .find(|s| s.section_id == section_id)
            .ok_or_else(|| Error::UnknownSection(section_id.to_string()))?;
        let len = responses.slots.len();
        responses
            .slots
            .get_mut(item_index)
            .and_then(|dims| dims.get_mut(dim_index))
            .ok_or_else(|| Error::ItemOutOfRange {
                section_id: section_id.to_string(),
                index: item_index,
                len,
            })
    }
}
