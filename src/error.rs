//! Custom error types for pubmed-papers.
//!
//! All fallible library functions return `Result<T, PapersError>`.
//! Callers in the pipeline decide which of these are recoverable
//! (a skipped page or batch) and which are fatal (configuration).

use thiserror::Error;

/// Main error type for pubmed-papers operations.
#[derive(Debug, Error)]
pub enum PapersError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed XML document from E-utilities
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from API
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error (missing credential, bad URL, bad pattern)
    #[error("Config error: {0}")]
    Config(String),

    /// A record failed shape validation
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `PapersError`
pub type Result<T> = std::result::Result<T, PapersError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a validation error message
    fn ok_or_invalid(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| PapersError::Validation(msg.to_string()))
    }
}
