//! # Modhost Plugin Descriptors
//!
//! A plugin is identified by its [`PluginType`] and name and described by the
//! `manifest.json` found at `<root>/<type>/<name>/manifest.json`.
//! [`DescriptorReader`] parses it into a [`PluginDescriptor`] on every call;
//! descriptors are never persisted.
//!
//! The `version` field drives upgrade decisions, so a missing or malformed
//! version is rejected with `InvalidDescriptor` instead of being defaulted.
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::kernel::constants::{CORE_COMPONENT, MANIFEST_FILE};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;

/// The three plugin namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluginType {
    #[serde(rename = "mod")]
    Module,
    #[serde(rename = "block")]
    Block,
    #[serde(rename = "theme")]
    Theme,
}

impl PluginType {
    pub const ALL: [PluginType; 3] = [PluginType::Module, PluginType::Block, PluginType::Theme];

    /// Directory under the plugin root, also the component prefix.
    pub fn dir_name(&self) -> &'static str {
        match self {
            PluginType::Module => "mod",
            PluginType::Block => "block",
            PluginType::Theme => "theme",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for PluginType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mod" | "module" => Ok(PluginType::Module),
            "block" => Ok(PluginType::Block),
            "theme" => Ok(PluginType::Theme),
            other => Err(PluginSystemError::InvalidComponent(other.to_string()).into()),
        }
    }
}

/// `[a-z][a-z0-9_]*`
pub fn is_valid_plugin_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// `(type, name)` identity of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginKey {
    pub plugin_type: PluginType,
    pub name: String,
}

impl PluginKey {
    pub fn new(plugin_type: PluginType, name: impl Into<String>) -> Self {
        Self {
            plugin_type,
            name: name.into(),
        }
    }

    /// Fully-qualified component name, `<type>_<name>`.
    pub fn component(&self) -> String {
        format!("{}_{}", self.plugin_type.dir_name(), self.name)
    }

    /// Parse `mod_assign`, `block_html`, ...
    pub fn parse_component(component: &str) -> Result<Self> {
        let invalid = || -> Error { PluginSystemError::InvalidComponent(component.to_string()).into() };
        let (prefix, name) = component.split_once('_').ok_or_else(invalid)?;
        let plugin_type = prefix.parse::<PluginType>().map_err(|_| invalid())?;
        if prefix == "module" || !is_valid_plugin_name(name) {
            return Err(invalid());
        }
        Ok(Self::new(plugin_type, name))
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.plugin_type.dir_name(), self.name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maturity {
    Alpha,
    Beta,
    Rc,
    #[default]
    Stable,
}

impl FromStr for Maturity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "alpha" => Ok(Maturity::Alpha),
            "beta" => Ok(Maturity::Beta),
            "rc" => Ok(Maturity::Rc),
            "stable" => Ok(Maturity::Stable),
            other => Err(format!("unknown maturity '{}'", other)),
        }
    }
}

/// One declared dependency. `min_version` is `None` for `"any"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequirement {
    pub component: String,
    pub min_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub plugin_type: PluginType,
    pub name: String,
    pub version: i64,
    pub release: String,
    pub maturity: Maturity,
    pub requires_host_version: Option<i64>,
    /// In declaration order
    pub dependencies: Vec<DependencyRequirement>,
    /// Plugin directory
    pub path: PathBuf,
}

impl PluginDescriptor {
    pub fn key(&self) -> PluginKey {
        PluginKey::new(self.plugin_type, self.name.clone())
    }

    pub fn component(&self) -> String {
        self.key().component()
    }

    pub fn is_compatible_with(&self, host_version: i64) -> bool {
        self.requires_host_version.map_or(true, |required| host_version >= required)
    }

    pub fn depends_on(&self, component: &str) -> bool {
        self.dependencies.iter().any(|d| d.component == component)
    }
}

#[derive(Deserialize, Debug)]
struct RawManifest {
    #[serde(default)]
    component: Option<String>,
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    release: Option<String>,
    #[serde(default)]
    maturity: Option<String>,
    #[serde(default)]
    requires: Option<Value>,
    #[serde(default)]
    dependencies: serde_json::Map<String, Value>,
}

/// Reads plugin manifests below a plugin root.
#[derive(Debug, Clone)]
pub struct DescriptorReader {
    root: PathBuf,
}

impl DescriptorReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plugin_dir(&self, plugin_type: PluginType, name: &str) -> PathBuf {
        self.root.join(plugin_type.dir_name()).join(name)
    }

    pub fn manifest_path(&self, plugin_type: PluginType, name: &str) -> PathBuf {
        self.plugin_dir(plugin_type, name).join(MANIFEST_FILE)
    }

    /// Read and parse the descriptor of `(plugin_type, name)`.
    pub async fn read(&self, plugin_type: PluginType, name: &str) -> Result<PluginDescriptor> {
        let key = PluginKey::new(plugin_type, name);
        if !is_valid_plugin_name(name) {
            return Err(PluginSystemError::InvalidComponent(key.component()).into());
        }
        let path = self.manifest_path(plugin_type, name);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PluginSystemError::not_found(key.component()).into());
            }
            Err(e) => return Err(Error::io(e, "read_manifest", path)),
        };
        Self::parse(plugin_type, name, &text, &path)
    }

    /// Names of every plugin directory of one type, sorted.
    ///
    /// A missing type directory yields an empty list; entries whose name is
    /// not a valid plugin name are ignored.
    pub async fn list_names(&self, plugin_type: PluginType) -> Result<Vec<String>> {
        let dir = self.root.join(plugin_type.dir_name());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(e, "read_dir", dir)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(e, "next_entry", dir.clone()))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if is_valid_plugin_name(name) => names.push(name.to_string()),
                _ => debug!("Ignoring {} entry {:?}", plugin_type, entry.file_name()),
            }
        }
        names.sort();
        Ok(names)
    }

    /// Parse manifest text. `path` is the manifest location, used in errors
    /// and to record the plugin directory.
    pub fn parse(plugin_type: PluginType, name: &str, text: &str, path: &Path) -> Result<PluginDescriptor> {
        let invalid = |message: String| -> Error {
            PluginSystemError::InvalidDescriptor {
                path: path.to_path_buf(),
                message,
            }
            .into()
        };
        let key = PluginKey::new(plugin_type, name);
        let raw: RawManifest =
            serde_json::from_str(text).map_err(|e| invalid(format!("Failed to parse manifest JSON: {}", e)))?;

        if let Some(component) = &raw.component {
            if *component != key.component() {
                return Err(invalid(format!(
                    "component '{}' does not match location '{}'",
                    component,
                    key.component()
                )));
            }
        }

        let version = match &raw.version {
            Some(value) => parse_version(value).map_err(|m| invalid(format!("version: {}", m)))?,
            None => return Err(invalid("version is missing".to_string())),
        };
        let requires_host_version = match &raw.requires {
            Some(value) => Some(parse_version(value).map_err(|m| invalid(format!("requires: {}", m)))?),
            None => None,
        };
        let maturity = match &raw.maturity {
            Some(m) => m.parse::<Maturity>().map_err(invalid)?,
            None => Maturity::default(),
        };

        let mut dependencies = Vec::with_capacity(raw.dependencies.len());
        for (component, value) in &raw.dependencies {
            if component != CORE_COMPONENT {
                PluginKey::parse_component(component)
                    .map_err(|_| invalid(format!("dependency '{}' is not a component name", component)))?;
            }
            let min_version = match value {
                Value::String(s) if s == "any" => None,
                other => Some(
                    parse_version(other).map_err(|m| invalid(format!("dependency '{}': {}", component, m)))?,
                ),
            };
            dependencies.push(DependencyRequirement {
                component: component.clone(),
                min_version,
            });
        }

        let plugin_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(PluginDescriptor {
            plugin_type,
            name: name.to_string(),
            version,
            release: raw.release.unwrap_or_default(),
            maturity,
            requires_host_version,
            dependencies,
            path: plugin_dir,
        })
    }
}

/// A positive integer, given as a JSON integer or a string of digits.
fn parse_version(value: &Value) -> std::result::Result<i64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v > 0 => Ok(v),
        _ => Err(format!("expected a positive integer, got {}", value)),
    }
}
