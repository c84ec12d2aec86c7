//! Error types for sqlmapper.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for mapping-layer operations.
#[derive(Error, Debug)]
pub enum MapperError {
    /// Parameter binding errors (duplicate or malformed names, missing
    /// referenced parameters). Detected before any driver call.
    #[error("Binding error: {0}")]
    Binding(String),

    /// Driver execution errors (connectivity loss, statement failures).
    /// Surfaced to the caller unmodified; never retried.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A result column's value cannot be converted to the requested shape.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Connection establishment errors (bad path, unreachable database).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid URL, malformed profile file).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MapperError {
    /// Creates a binding error with the given message.
    pub fn binding(msg: impl Into<String>) -> Self {
        Self::Binding(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a type-mismatch error with the given message.
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::TypeMismatch(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Binding(_) => "Binding Error",
            Self::Execution(_) => "Execution Error",
            Self::TypeMismatch(_) => "Type Mismatch",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// Result type alias using MapperError.
pub type Result<T> = std::result::Result<T, MapperError>;
