//! Error types for docmark

use thiserror::Error;

use crate::path::PathParseError;
use crate::values::ValueKind;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, MarkingError>;

/// Marking error type
#[derive(Debug, Error)]
pub enum MarkingError {
    /// Marking attached to the document root, a foreign document or an
    /// annotation block
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Removal found no exact-match entry
    #[error("Marking not found: {0}")]
    NotFound(String),

    /// Controlled structure outside the supported grammar
    #[error("Unsupported path expression '{path}': {reason}")]
    UnsupportedPath { path: String, reason: String },

    /// Position no longer live in its document
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Duplicate marking: {0}")]
    Duplicate(String),

    #[error("Marking path must be empty, found '{0}'")]
    PathNotEmpty(String),

    #[error("Cannot read '{value}' as {kind}")]
    Coercion { value: String, kind: ValueKind },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("XML parsing error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl MarkingError {
    /// Wrap a grammar error together with the offending expression
    pub fn unsupported(path: &str, err: PathParseError) -> Self {
        MarkingError::UnsupportedPath {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }

    /// True for conditions the extract pass skips over instead of failing
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MarkingError::UnsupportedPath { .. } | MarkingError::Duplicate(_)
        )
    }
}
