//! Error types for the session tracker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole session tracker stack.
///
/// Every layer (backend, wire codec, service) reports failures through this
/// enum so callers can branch on the condition kind with the `is_*` helpers
/// without caring which layer produced it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackerError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A write that required an absent key found one already present
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Malformed stored data, unknown resource version or invalid request
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// Operation not permitted by the licensed capabilities
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Compare-and-swap precondition did not hold (stale pre-image)
    #[error("Compare failed: {0}")]
    CompareFailed(String),

    /// The compare-and-swap loop used up its attempts without publishing
    #[error("CompareAndSwap reached retry limit after {attempts} attempts")]
    RetryLimitExceeded { attempts: u32 },

    /// The caller's cancellation signal fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "JSON", "TOML", etc.
        message: String,
    },

    /// Any other failure reported by the key-value backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an AlreadyExists error
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists(message.into())
    }

    /// Creates a BadParameter error
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter(message.into())
    }

    /// Creates an AccessDenied error
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    /// Creates a CompareFailed error
    pub fn compare_failed(message: impl Into<String>) -> Self {
        Self::CompareFailed(message.into())
    }

    /// Creates a Backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_bad_parameter(&self) -> bool {
        matches!(self, Self::BadParameter(_))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }

    /// Check if this is a stale compare-and-swap pre-image.
    ///
    /// This is the only condition the mutation loop recovers from locally.
    pub fn is_compare_failed(&self) -> bool {
        matches!(self, Self::CompareFailed(_))
    }

    /// Check if the compare-and-swap retry budget was exhausted
    pub fn is_retry_limit_exceeded(&self) -> bool {
        matches!(self, Self::RetryLimitExceeded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for TrackerError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A type alias for `Result<T, TrackerError>`.
pub type Result<T> = std::result::Result<T, TrackerError>;
