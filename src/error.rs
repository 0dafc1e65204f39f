// src/error.rs

use crate::rule::ParseRuleError;
use thiserror::Error;

/// Core error types for pactest
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A section marker was found but its body is missing
    #[error("Malformed section %{section}% in {file}: unexpected end of file")]
    MalformedSection { file: String, section: String },

    /// An integer-typed section did not hold an integer
    #[error("Invalid integer in %{section}% of {file}: {value:?}")]
    InvalidInteger {
        file: String,
        section: String,
        value: String,
    },

    /// Rule string did not match the rule grammar
    #[error("Invalid rule: {0}")]
    Rule(#[from] ParseRuleError),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Package or database archive could not be built
    #[error("Archive error: {0}")]
    Archive(String),

    /// Persisted baseline could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using pactest's Error type
pub type Result<T> = std::result::Result<T, Error>;
