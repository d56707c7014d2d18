//! # SLT Common Library
//!
//! Core of the subjective listening test service:
//! - Item catalog (sections, items, answer dimensions)
//! - Answer domains and the per-session response store
//! - Validation gate and submission coordinator
//! - Ports for the persistence sink and media retrieval
//! - Configuration loading

pub mod answer;
pub mod catalog;
pub mod config;
pub mod error;
pub mod media;
pub mod session;
pub mod sink;
pub mod store;
pub mod submission;
pub mod validation;

pub use answer::{Answer, AnswerKind};
pub use catalog::{Catalog, ContentRef, Dimension, Item, Section};
pub use error::{Error, Result};
pub use session::SessionState;
pub use store::ResponseStore;
pub use submission::{submit, SubmissionResult};
pub use validation::{validate, Deficiency, ValidationResult};
