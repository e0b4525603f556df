//! Error types for the import pipeline.
//!
//! This module provides structured error handling with:
//! - `ImportError`: the pipeline's error taxonomy (transient, record-level, fatal)
//! - `StorageResultExt`: lifts repository `anyhow` errors into `ImportError::Storage`
//! - `Result<T>`: Type alias for Results using ImportError

use thiserror::Error;

use crate::domain::models::EntityType;

// ============================================================================
// DOMAIN ERROR TYPE
// ============================================================================

/// Errors raised while importing data from the external source.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Connection-level failure talking to the source
    #[error("Network error: {0}")]
    Network(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Source answered with a non-success status
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Page does not exist on the source
    #[error("Page not found: {0}")]
    NotFound(String),

    /// Invalid or malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Page was fetched but could not be mapped into a raw entity
    #[error("Failed to parse {entity}: {message}")]
    Parse { entity: EntityType, message: String },

    /// Raw entity failed field/constraint validation
    #[error("Invalid {entity}: {message}")]
    Validation { entity: EntityType, message: String },

    /// Persistent storage failed
    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),

    /// The page session can no longer be used (blocked, closed, unrecoverable)
    #[error("Session lost: {0}")]
    SessionLost(String),

    /// Another import run holds the run slot
    #[error("An import is already running")]
    AlreadyRunning,

    /// Run was cancelled
    #[error("Import cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a parse error for an entity family
    pub fn parse(entity: EntityType, msg: impl Into<String>) -> Self {
        Self::Parse {
            entity,
            message: msg.into(),
        }
    }

    /// Create a validation error for an entity family
    pub fn validation(entity: EntityType, msg: impl Into<String>) -> Self {
        Self::Validation {
            entity,
            message: msg.into(),
        }
    }

    /// Errors worth retrying: the connection failed, not the data.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Errors that abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionLost(_) | Self::Storage(_))
    }
}

impl From<sqlx::Error> for ImportError {
    fn from(error: sqlx::Error) -> Self {
        Self::Storage(error.into())
    }
}

impl From<url::ParseError> for ImportError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

/// Result type alias using ImportError.
pub type Result<T> = std::result::Result<T, ImportError>;

/// Repository calls return `anyhow::Result`; anything failing there is a storage fault.
pub trait StorageResultExt<T> {
    fn storage(self) -> Result<T>;
}

impl<T> StorageResultExt<T> for anyhow::Result<T> {
    fn storage(self) -> Result<T> {
        self.map_err(ImportError::Storage)
    }
}
