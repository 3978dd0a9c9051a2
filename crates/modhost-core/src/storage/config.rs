//! # Modhost Host Configuration
//!
//! [`ConfigData`] is a format-agnostic key/value view over a configuration
//! file; [`HostConfig`] is the typed configuration the runtime is built from.
//! JSON is always available, YAML and TOML behind the `yaml-config` and
//! `toml-config` features.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Formats in the order a host configuration file is searched for
    pub fn search_order() -> Vec<ConfigFormat> {
        vec![
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml,
            ConfigFormat::Json,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml,
        ]
    }

    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of configuration data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigData {
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Get a configuration value, failing when present but of the wrong shape
    pub fn try_get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                StorageSystemError::InvalidConfigValue {
                    key: key.to_string(),
                    message: e.to_string(),
                }
                .into()
            }),
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let parsed = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| de_error(format, e))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| de_error(format, e))?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| de_error(format, e))?,
        };
        Ok(parsed)
    }
}

fn de_error<E: std::error::Error + Send + Sync + 'static>(format: ConfigFormat, source: E) -> StorageSystemError {
    StorageSystemError::DeserializationError {
        format: format.extension().to_string(),
        source: Box::new(source),
    }
}

/// Typed host configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Directory holding `<type>/<name>/manifest.json` plugin entries
    pub plugin_root: PathBuf,
    /// Directory of the record store snapshot
    pub data_dir: PathBuf,
    /// Version plugins' `requires` field is compared against
    pub host_version: i64,
    /// Time-to-live of loaded plugin instances
    pub cache_ttl: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugin_root: PathBuf::from(constants::DEFAULT_PLUGIN_ROOT),
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
            host_version: constants::HOST_VERSION,
            cache_ttl: Duration::from_secs(constants::DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl HostConfig {
    /// Build from parsed configuration data; absent keys keep their defaults.
    pub fn from_data(data: &ConfigData) -> Result<Self> {
        let defaults = Self::default();
        let host_version = data.try_get::<i64>("host_version")?.unwrap_or(defaults.host_version);
        if host_version <= 0 {
            return Err(StorageSystemError::InvalidConfigValue {
                key: "host_version".to_string(),
                message: format!("must be positive, got {}", host_version),
            }
            .into());
        }
        Ok(Self {
            plugin_root: data.try_get::<PathBuf>("plugin_root")?.unwrap_or(defaults.plugin_root),
            data_dir: data.try_get::<PathBuf>("data_dir")?.unwrap_or(defaults.data_dir),
            host_version,
            cache_ttl: data
                .try_get::<u64>("cache_ttl_secs")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
        })
    }

    /// Load a configuration file, choosing the format by extension.
    pub fn from_file(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let text = provider.read_to_string(path)?;
        Self::from_data(&ConfigData::deserialize(&text, format)?)
    }

    /// Look for `modhost.<ext>` in the provider's base directory.
    ///
    /// Falls back to defaults when no configuration file exists.
    pub fn discover(provider: &dyn StorageProvider) -> Result<Self> {
        for format in ConfigFormat::search_order() {
            let candidate = PathBuf::from(format!("{}.{}", constants::CONFIG_FILE_STEM, format.extension()));
            if provider.is_file(&candidate) {
                log::debug!("Reading host configuration from {}", candidate.display());
                return Self::from_file(provider, &candidate);
            }
        }
        Ok(Self::default())
    }
}
