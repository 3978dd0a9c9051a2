//! # Modhost Kernel Errors
//!
//! Defines the aggregate [`Error`] every public operation returns.
//!
//! Each subsystem owns a typed error enum ([`PluginSystemError`],
//! [`StorageSystemError`], [`BlockSystemError`], [`CourseSystemError`]) which
//! converts into [`Error`] through `#[from]`, so `?` works across subsystem
//! boundaries. Storage failures raised anywhere (including inside plugin
//! hooks) surface as [`Error::StorageSystem`] without being rewrapped.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::blocks::error::BlockSystemError;
use crate::course::error::CourseSystemError;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;

/// Error type for the modhost runtime
#[derive(Debug, ThisError)]
pub enum Error {
    /// Plugin discovery, loading and lifecycle errors
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Record store, file and configuration errors
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Block placement errors
    #[error("Block system error: {0}")]
    BlockSystem(#[from] BlockSystemError),

    /// Course module and completion errors
    #[error("Course system error: {0}")]
    CourseSystem(#[from] CourseSystemError),

    /// Generic error with message, mostly raised by plugin hooks
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl Error {
    /// Wraps an I/O error with the operation and path it happened on.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        })
    }

    /// True for the recoverable "descriptor or record absent" family.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::PluginSystem(PluginSystemError::NotFound { .. }) => true,
            Error::StorageSystem(StorageSystemError::RecordNotFound { .. }) => true,
            Error::BlockSystem(BlockSystemError::InstanceNotFound(_)) => true,
            Error::BlockSystem(BlockSystemError::PositionNotFound { .. }) => true,
            Error::CourseSystem(CourseSystemError::ModuleNotFound(_)) => true,
            Error::CourseSystem(CourseSystemError::SectionNotFound(_)) => true,
            _ => false,
        }
    }

    /// The plugin system error inside, if any.
    pub fn as_plugin_error(&self) -> Option<&PluginSystemError> {
        match self {
            Error::PluginSystem(e) => Some(e),
            _ => None,
        }
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
