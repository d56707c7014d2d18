//! Submission coordinator
//!
//! Validate, project rows, append the whole batch, and reset the session only
//! after the sink confirms. A rejected or failed submission leaves the session
//! exactly as it was.

use crate::catalog::Catalog;
use crate::session::SessionState;
use crate::sink::{Row, RowSink};
use crate::store::ResponseStore;
use crate::validation::{validate, Deficiency, ValidationResult};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    /// Rows persisted; session has been reset
    Accepted { rows_written: usize },
    /// Validation failed; nothing was written or changed
    Rejected { deficiencies: Vec<Deficiency> },
    /// Sink failed; answers are preserved and resubmission is safe
    PersistenceFailed { cause: String },
}

/// One row per item carrying every dimension, in catalog order
pub fn project_rows(store: &ResponseStore, catalog: &Catalog, contact: &str) -> Vec<Row> {
    let contact = contact.trim();
    let mut rows = Vec::with_capacity(catalog.item_count());

    for section in catalog.sections() {
        let Some(responses) = store.section_responses(&section.id) else {
            continue;
        };
        for (index, (item, slots)) in section.items.iter().zip(&responses.slots).enumerate() {
            let answers = section
                .dimensions
                .iter()
                .zip(slots)
                .map(|(dim, slot)| {
                    let value = slot.as_ref().map(ToString::to_string).unwrap_or_default();
                    (dim.name.clone(), value)
                })
                .collect();
            rows.push(Row {
                contact: contact.to_string(),
                section_id: section.id.clone(),
                item_number: index + 1,
                media: item.media.iter().map(|r| r.as_str().to_string()).collect(),
                answers,
            });
        }
    }
    rows
}

/// Attempt to submit a session
///
/// The sink call is awaited to completion before any reset happens; there is
/// no retry.
pub async fn submit(
    session: &mut SessionState,
    catalog: &Catalog,
    sink: &dyn RowSink,
) -> SubmissionResult {
    if let ValidationResult::Invalid { deficiencies } =
        validate(session.store(), catalog, session.contact())
    {
        info!(
            session_id = %session.id,
            deficiencies = deficiencies.len(),
            "Submission rejected"
        );
        return SubmissionResult::Rejected { deficiencies };
    }

    let rows = project_rows(session.store(), catalog, session.contact());

    match sink.append_rows(&rows).await {
        Ok(ack) => {
            info!(
                session_id = %session.id,
                sink = sink.name(),
                rows = ack.rows_written,
                "Submission persisted"
            );
            session.reset(catalog);
            SubmissionResult::Accepted {
                rows_written: ack.rows_written,
            }
        }
        Err(e) => {
            warn!(
                session_id = %session.id,
                sink = sink.name(),
                error = %e,
                "Submission failed; answers preserved"
            );
            SubmissionResult::PersistenceFailed {
                cause: e.to_string(),
            }
        }
    }
}
