//! Error types for catalog decoding.
//!
//! Both kinds are fatal: a failed read or a malformed document ends the run
//! without a report.

use thiserror::Error;

/// Errors raised while streaming records out of a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The underlying byte stream could not be read.
    #[error("failed to read catalog stream: {0}")]
    Stream(#[from] std::io::Error),

    /// The document is not well-formed XML, or ended inside an element.
    #[error("malformed catalog at byte {position}: {reason}")]
    Malformed { position: u64, reason: String },
}

impl CatalogError {
    /// Build a malformed-document error at the given byte offset.
    pub fn malformed(position: u64, reason: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            reason: reason.into(),
        }
    }

    /// Convert a tokenizer error, keeping I/O failures distinct from markup errors.
    pub fn from_xml(position: u64, err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => Self::Stream(std::io::Error::new(io.kind(), io.to_string())),
            other => Self::malformed(position, other.to_string()),
        }
    }
}

/// Result alias for decoder operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
