//! Error types for the memnet core library.

use thiserror::Error;

/// A record was rejected before any store mutation took place.
///
/// The shape variants (`InvalidContentType`, `InvalidContextType`,
/// `InvalidTagType`, `InvalidAssociationsType`, `NegativeRetrievalCount`,
/// `InvalidRetrievalCount`, `InvalidTimestamp`, `MissingField`) can only
/// arise from the untyped import path,
/// [`Record::from_json_value`](crate::record::Record::from_json_value).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Content must be a non-empty string.
    #[error("Content must be a non-empty string")]
    EmptyContent,

    /// Importance must lie in `[0, 1]`.
    #[error("Importance must be between 0 and 1 (got {0})")]
    ImportanceOutOfRange(f32),

    /// Emotional valence must lie in `[-1, 1]`.
    #[error("Emotional valence must be between -1 and 1 (got {0})")]
    ValenceOutOfRange(f32),

    /// Content was present but not a string.
    #[error("Content must be a string: {0}")]
    InvalidContentType(String),

    /// Context was not a mapping of string keys to string values.
    #[error("Context must be a mapping of strings to strings: {0}")]
    InvalidContextType(String),

    /// Tags were not a collection of strings.
    #[error("Tags must be a set of strings: {0}")]
    InvalidTagType(String),

    /// Associations were not a collection of record identifiers.
    #[error("Associations must be a list of record identifiers: {0}")]
    InvalidAssociationsType(String),

    /// Retrieval count cannot be negative.
    #[error("Retrieval count cannot be negative (got {0})")]
    NegativeRetrievalCount(i64),

    /// Retrieval count was not an integer.
    #[error("Retrieval count must be an integer: {0}")]
    InvalidRetrievalCount(String),

    /// A timestamp field was not RFC 3339 text.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A required field was absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Top-level error type for all memnet operations.
#[derive(Error, Debug)]
pub enum MemnetError {
    /// A record failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, MemnetError>;
