//! # Modhost Plugin Registry
//!
//! Discovery over the three type directories of the plugin root, joined
//! with the persisted enable state and the loader cache.
//!
//! Discovery is resilient: a plugin whose manifest cannot be read, or whose
//! implementation is missing or of the wrong kind, is logged, reported in
//! [`Discovery::skipped`] and left out, and the rest are still returned.
//! `enable`/`disable` are idempotent and write the durable record before
//! returning.
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::kernel::error::Result;
use crate::plugin_system::descriptor::{PluginDescriptor, PluginKey, PluginType};
use crate::plugin_system::loader::PluginLoader;
use crate::storage::RecordStore;

#[derive(Debug, Clone)]
pub struct AvailablePlugin {
    pub descriptor: PluginDescriptor,
    pub enabled: bool,
    pub loaded: bool,
}

/// A plugin left out of discovery, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPlugin {
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub plugins: Vec<AvailablePlugin>,
    pub skipped: Vec<SkippedPlugin>,
}

/// Flat, serializable view of one available plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub name: String,
    pub version: i64,
    pub enabled: bool,
    pub loaded: bool,
}

impl From<&AvailablePlugin> for PluginSummary {
    fn from(plugin: &AvailablePlugin) -> Self {
        Self {
            plugin_type: plugin.descriptor.plugin_type,
            name: plugin.descriptor.name.clone(),
            version: plugin.descriptor.version,
            enabled: plugin.enabled,
            loaded: plugin.loaded,
        }
    }
}

#[derive(Debug)]
pub struct PluginRegistry {
    loader: Arc<PluginLoader>,
    store: Arc<RecordStore>,
}

impl PluginRegistry {
    pub fn new(loader: Arc<PluginLoader>, store: Arc<RecordStore>) -> Self {
        Self { loader, store }
    }

    /// Walk every type directory. Ordered by type, then name.
    pub async fn discover(&self) -> Result<Discovery> {
        let mut discovery = Discovery::default();
        for plugin_type in PluginType::ALL {
            self.discover_type(plugin_type, &mut discovery).await?;
        }
        Ok(discovery)
    }

    async fn discover_type(&self, plugin_type: PluginType, discovery: &mut Discovery) -> Result<()> {
        let reader = self.loader.reader();
        for name in reader.list_names(plugin_type).await? {
            let checked = reader
                .read(plugin_type, &name)
                .await
                .and_then(|descriptor| self.loader.resolve(&descriptor).map(|_| descriptor));
            match checked {
                Ok(descriptor) => {
                    let component = descriptor.component();
                    let enabled = self.store.read(|r| r.is_enabled(&component)).await;
                    let loaded = self.loader.is_loaded(plugin_type, &name).await;
                    discovery.plugins.push(AvailablePlugin {
                        descriptor,
                        enabled,
                        loaded,
                    });
                }
                Err(e) => {
                    warn!("Skipping plugin {}_{}: {}", plugin_type, name, e);
                    discovery.skipped.push(SkippedPlugin {
                        plugin_type,
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub async fn list_available(&self) -> Result<Vec<AvailablePlugin>> {
        Ok(self.discover().await?.plugins)
    }

    pub async fn summaries(&self) -> Result<Vec<PluginSummary>> {
        let plugins = self.list_available().await?;
        Ok(plugins.iter().map(PluginSummary::from).collect())
    }

    pub async fn plugins_of_type(&self, plugin_type: PluginType) -> Result<Vec<AvailablePlugin>> {
        let mut discovery = Discovery::default();
        self.discover_type(plugin_type, &mut discovery).await?;
        Ok(discovery.plugins)
    }

    pub async fn enabled_plugins(&self, plugin_type: PluginType) -> Result<Vec<AvailablePlugin>> {
        let plugins = self.plugins_of_type(plugin_type).await?;
        Ok(plugins.into_iter().filter(|p| p.enabled).collect())
    }

    pub async fn is_enabled(&self, plugin_type: PluginType, name: &str) -> bool {
        let component = PluginKey::new(plugin_type, name).component();
        self.store.read(|r| r.is_enabled(&component)).await
    }

    /// Fails with `NotFound` when no descriptor exists and with
    /// `InterfaceMismatch` when no matching implementation is registered.
    pub async fn enable(&self, plugin_type: PluginType, name: &str) -> Result<()> {
        let descriptor = self.loader.reader().read(plugin_type, name).await?;
        self.loader.resolve(&descriptor)?;
        let component = descriptor.component();
        let changed = self
            .store
            .transaction(|tx| Ok(tx.set_enabled(&component, true)))
            .await?;
        if changed {
            info!("Enabled plugin {}", component);
        }
        Ok(())
    }

    pub async fn disable(&self, plugin_type: PluginType, name: &str) -> Result<()> {
        let component = PluginKey::new(plugin_type, name).component();
        let changed = self
            .store
            .transaction(|tx| Ok(tx.set_enabled(&component, false)))
            .await?;
        self.loader.evict(plugin_type, name).await;
        if changed {
            info!("Disabled plugin {}", component);
        }
        Ok(())
    }
}
