//! # Modhost Plugin System Errors
//!
//! [`PluginSystemError`] is the taxonomy surfaced by descriptor reading,
//! discovery, loading and lifecycle transitions.
//!
//! - `NotFound`: no manifest at the conventional path. Recoverable.
//! - `InvalidDescriptor` / `InterfaceMismatch`: the plugin is malformed.
//!   Discovery logs and skips these instead of failing.
//! - `IncompatibleVersion` / `UnsatisfiedDependency`: block one lifecycle
//!   transition and are returned verbatim.
//! - `InitializationFailed`: nothing was cached, the next load retries.
use std::path::PathBuf;

use crate::kernel::error::Error;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin '{component}' not found")]
    NotFound { component: String },

    #[error("Invalid plugin descriptor '{path}': {message}")]
    InvalidDescriptor { path: PathBuf, message: String },

    #[error("Plugin '{component}' does not satisfy its interface: {message}")]
    InterfaceMismatch { component: String, message: String },

    #[error("Plugin '{component}' requires host version {required}, host is {host}")]
    IncompatibleVersion {
        component: String,
        required: i64,
        host: i64,
    },

    #[error("Plugin '{component}' has an unsatisfied dependency on '{dependency}': {}", describe_unsatisfied(.required, .installed, .enabled))]
    UnsatisfiedDependency {
        component: String,
        dependency: String,
        required: Option<i64>,
        installed: Option<i64>,
        enabled: bool,
    },

    #[error("Plugin '{component}' failed to initialize: {message}")]
    InitializationFailed {
        component: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Plugin '{component}' is not installed")]
    NotInstalled { component: String },

    #[error("Plugin '{component}' is required by enabled plugins: {}", .dependents.join(", "))]
    DependencyInUse {
        component: String,
        dependents: Vec<String>,
    },

    #[error("Plugin '{component}' is in use: {message}")]
    PluginInUse { component: String, message: String },

    #[error("'{0}' is not a valid component name")]
    InvalidComponent(String),
}

fn describe_unsatisfied(required: &Option<i64>, installed: &Option<i64>, enabled: &bool) -> String {
    match (*installed, *required) {
        (None, _) => "not installed".to_string(),
        (Some(installed), Some(required)) if installed < required => {
            format!("version {} installed, {} required", installed, required)
        }
        _ if !*enabled => "not enabled".to_string(),
        _ => "unknown".to_string(),
    }
}

impl PluginSystemError {
    pub fn not_found(component: impl Into<String>) -> Self {
        PluginSystemError::NotFound {
            component: component.into(),
        }
    }

    pub fn mismatch(component: impl Into<String>, message: impl Into<String>) -> Self {
        PluginSystemError::InterfaceMismatch {
            component: component.into(),
            message: message.into(),
        }
    }

    /// The component the error is about, when it names one.
    pub fn component(&self) -> Option<&str> {
        match self {
            PluginSystemError::NotFound { component }
            | PluginSystemError::InterfaceMismatch { component, .. }
            | PluginSystemError::IncompatibleVersion { component, .. }
            | PluginSystemError::UnsatisfiedDependency { component, .. }
            | PluginSystemError::InitializationFailed { component, .. }
            | PluginSystemError::NotInstalled { component }
            | PluginSystemError::DependencyInUse { component, .. }
            | PluginSystemError::PluginInUse { component, .. } => Some(component),
            PluginSystemError::InvalidDescriptor { .. } | PluginSystemError::InvalidComponent(_) => None,
        }
    }
}
