//! Core error types for resonance-core.
//!
//! Each concern (audio, storage, recording, configuration, validation) has
//! its own thiserror enum. [`CoreError`] aggregates them for callers that
//! only need to report a failure.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for resonance-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Audio output errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Key-value store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Session recording errors
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Audio device errors.
///
/// None of these are fatal to a session: the clock keeps running silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The host has no audio output capability
    #[error("Audio output is not supported on this host: {0}")]
    Unsupported(String),

    /// Device or permission problem while starting playback
    #[error("Audio playback failed to start: {0}")]
    StartFailed(String),

    /// The tone generator was torn down and can no longer play
    #[error("Audio device has been closed")]
    Closed,
}

/// Key-value store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the write because it is out of space
    #[error("Storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    /// The store is locked by another writer
    #[error("Storage is locked")]
    Locked,

    /// Any other backend failure
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Session recorder errors.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// A write failed, including after the trim-and-retry fallback
    #[error("Failed to write '{key}': {source}")]
    StorageWriteFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// A persisted document could not be parsed
    #[error("Stored document '{key}' is corrupt: {message}")]
    StorageReadCorrupt { key: String, message: String },

    /// The import payload was rejected; nothing was written
    #[error("Import rejected: {0}")]
    ImportMalformed(String),

    /// A document could not be serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// No protocol with this id in the catalog
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => match code.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    StoreError::Locked
                }
                rusqlite::ErrorCode::DiskFull => StoreError::QuotaExceeded { key: String::new() },
                _ => StoreError::Backend(err.to_string()),
            },
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl StoreError {
    /// Attach the key being written, for errors raised without one.
    pub fn for_key(self, key: &str) -> Self {
        match self {
            StoreError::QuotaExceeded { key: k } if k.is_empty() => StoreError::QuotaExceeded {
                key: key.to_string(),
            },
            other => other,
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
