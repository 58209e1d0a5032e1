//! Error types for the dose_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dose_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed, empty, or unknown unit string
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    /// The unit catalog could not be loaded or failed validation
    #[error("Unit catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// No conversion path exists between the two (normalized) units
    #[error("Cannot convert from '{from}' to '{to}'")]
    ConversionImpossible { from: String, to: String },

    /// A request or payload field failed a structural precondition
    #[error("Validation failed on '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Calculation type tag not recognized by the calculator
    #[error("Unsupported calculation type: {0}")]
    UnsupportedCalculationType(String),
}

impl Error {
    /// Shorthand for a validation failure on a named field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
