// src/error.rs

//! Unified error handling for the mailer application.

use std::fmt;

use thiserror::Error;

/// Result type alias for mailer operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Blob storage backend error (S3 and friends)
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// An index row could not be turned into an item record
    #[error("Extraction failed for row {row}: {message}")]
    Extract { row: String, message: String },

    /// Persisted state exists but cannot be trusted
    #[error("Corrupt state in '{key}': {message}")]
    CorruptState { key: String, message: String },

    /// Building or sending the digest email failed
    #[error("Mail error: {0}")]
    Mail(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error for the given row.
    pub fn extract(row: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extract {
            row: row.into(),
            message: message.to_string(),
        }
    }

    /// Create a corrupt-state error for a blob key.
    pub fn corrupt(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::CorruptState {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a mail transport error.
    pub fn mail(message: impl fmt::Display) -> Self {
        Self::Mail(message.to_string())
    }

    /// Create a storage backend error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }
}
