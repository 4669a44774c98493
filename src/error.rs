//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Tabletalk.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! Executor failures are deliberately NOT represented here: the query
//! executor never fails at the type level: a failed statement surfaces as
//! the error marker inside [`crate::engine::ResultSet`], which the pipeline
//! recovers from with one correction attempt.
//!
//! # Error Categories
//! - `ModelFailed`: Language model invocation errors (transport, HTTP, parse)
//! - `SchemaFailed`: Schema introspection errors
//! - `CapabilityConflict`: Capability registration rejected (duplicate/reserved name)
//! - `InvalidInput`: Malformed input or missing required parameters
//! - `Serialization`: JSON encoding/decoding failures inside the pipeline
//! - `ConfigError`: Configuration file or environment resolution errors

use thiserror::Error;

/// Main error type for Tabletalk operations
#[derive(Error, Debug)]
pub enum TabletalkError {
    /// Language model invocation failed
    #[error("Model invocation failed: {0}")]
    ModelFailed(String),

    /// Schema introspection failed
    #[error("Schema introspection failed: {0}")]
    SchemaFailed(String),

    /// Capability registration rejected
    #[error("Capability conflict: {0}")]
    CapabilityConflict(String),

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization failure inside the pipeline
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error (file not found, invalid JSON, missing env var)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TabletalkError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ModelFailed(_) => "MODEL_FAILED",
            Self::SchemaFailed(_) => "SCHEMA_FAILED",
            Self::CapabilityConflict(_) => "CAPABILITY_CONFLICT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Serialization(_) => "SERIALIZATION_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Get human-readable error message (safe for logs, no credentials)
    #[must_use]
    pub fn message(&self) -> String {
        // Use Display implementation from thiserror
        self.to_string()
    }

    /// Create a model invocation error
    pub fn model_failed(message: impl Into<String>) -> Self {
        Self::ModelFailed(message.into())
    }

    /// Create a schema introspection error
    pub fn schema_failed(message: impl Into<String>) -> Self {
        Self::SchemaFailed(message.into())
    }

    /// Create a capability conflict error
    pub fn capability_conflict(message: impl Into<String>) -> Self {
        Self::CapabilityConflict(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for Tabletalk operations
pub type Result<T> = std::result::Result<T, TabletalkError>;
