//! # Modhost Storage System Errors
//!
//! [`StorageSystemError`] covers file I/O, (de)serialization of snapshots and
//! configuration files, and record-level failures of the record store such as
//! missing rows and unique-constraint violations.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization to '{format}' failed: {source}")]
    SerializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization from '{format}' failed: {source}")]
    DeserializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedConfigFormat(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    #[error("Storage operation '{operation}' failed for path '{}': {message}", .path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<unknown>".into()))]
    OperationFailed {
        operation: String,
        path: Option<PathBuf>,
        message: String,
    },

    #[error("No {table} record with key {key}")]
    RecordNotFound { table: &'static str, key: String },

    #[error("Unique constraint on {table} violated by key {key}")]
    ConstraintViolation { table: &'static str, key: String },
}

impl StorageSystemError {
    pub fn not_found(table: &'static str, key: impl ToString) -> Self {
        StorageSystemError::RecordNotFound {
            table,
            key: key.to_string(),
        }
    }

    pub fn constraint(table: &'static str, key: impl ToString) -> Self {
        StorageSystemError::ConstraintViolation {
            table,
            key: key.to_string(),
        }
    }
}
