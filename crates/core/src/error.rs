//! Error types for the marginalia placement engine.

use thiserror::Error;

/// Primary error type for anchoring and placement operations.
///
/// Per-annotation failures (`QuoteNotFound`, `MalformedAnnotation`) are
/// surfaced to callers as diagnostics by the page driver; only the
/// remaining variants abort a whole layout run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("quote not found on page: {quote:?}")]
    QuoteNotFound { quote: String },

    #[error("malformed annotation: {reason}")]
    MalformedAnnotation { reason: String },

    #[error("invalid layout parameters: {0}")]
    InvalidParams(String),

    #[error("layout run cancelled")]
    Cancelled,

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

/// Convenience Result type alias for LayoutError.
pub type Result<T> = std::result::Result<T, LayoutError>;
