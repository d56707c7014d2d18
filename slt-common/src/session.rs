//! Session state
//!
//! Everything one participant's session owns: the contact field and the
//! response store. The caller owns the value and passes it into every core
//! operation; nothing in this crate keeps session state globally.

use crate::answer::Answer;
use crate::catalog::Catalog;
use crate::store::ResponseStore;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Mutable state of one survey session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    contact: String,
    store: ResponseStore,
}

impl SessionState {
    /// Fresh session with every slot unanswered and an empty contact
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            contact: String::new(),
            store: ResponseStore::init(catalog),
        }
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn set_contact(&mut self, contact: impl Into<String>) {
        self.contact = contact.into();
    }

    pub fn store(&self) -> &ResponseStore {
        &self.store
    }

    /// Record a typed answer
    pub fn set_answer(
        &mut self,
        catalog: &Catalog,
        section_id: &str,
        item_index: usize,
        dimension: Option<&str>,
        answer: Answer,
    ) -> Result<()> {
        self.store
            .set(catalog, section_id, item_index, dimension, answer)
    }

    /// Record a raw control value
    pub fn set_raw_answer(
        &mut self,
        catalog: &Catalog,
        section_id: &str,
        item_index: usize,
        dimension: Option<&str>,
        raw: &str,
    ) -> Result<()> {
        self.store
            .set_raw(catalog, section_id, item_index, dimension, raw)
    }

    /// Wipe answers and contact after a confirmed submission
    pub(crate) fn reset(&mut self, catalog: &Catalog) {
        self.store.reset(catalog);
        self.contact.clear();
    }
}
