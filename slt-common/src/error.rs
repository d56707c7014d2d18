//! Common error types for SLT

use thiserror::Error;

/// Common result type for SLT operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the catalog, response store and configuration layers
///
/// User-facing submission problems are not errors; they are reported as
/// [`crate::validation::Deficiency`] values.
#[derive(Error, Debug)]
pub enum Error {
    /// Value is outside the legal domain of the addressed answer dimension
    #[error("Invalid value {value:?} for {section_id}/{dimension}: {reason}")]
    InvalidValue {
        section_id: String,
        dimension: String,
        value: String,
        reason: String,
    },

    /// No section with this id in the catalog
    #[error("Unknown section: {0}")]
    UnknownSection(String),

    /// Item index past the end of the section
    #[error("Item index {index} out of range for section {section_id} ({len} items)")]
    ItemOutOfRange {
        section_id: String,
        index: usize,
        len: usize,
    },

    /// Section does not declare this answer dimension
    #[error("Unknown dimension {dimension:?} in section {section_id}")]
    UnknownDimension {
        section_id: String,
        dimension: String,
    },

    /// Catalog is structurally malformed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidValue { .. } => "INVALID_VALUE",
            Error::UnknownSection(_) => "UNKNOWN_SECTION",
            Error::ItemOutOfRange { .. } => "ITEM_OUT_OF_RANGE",
            Error::UnknownDimension { .. } => "UNKNOWN_DIMENSION",
            Error::Catalog(_) => "CATALOG_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }
}
