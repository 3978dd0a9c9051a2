//! # Modhost Plugin Loader
//!
//! Resolves a descriptor to its implementation, checks it, initializes it
//! and caches it.
//!
//! ## Load sequence
//!
//! 1. Return the cached entry when a live one exists.
//! 2. Read the descriptor (`NotFound` when absent).
//! 3. Check `requires` against the host version (`IncompatibleVersion`).
//! 4. Build the implementation from the factory table and check it matches
//!    the descriptor's type and name (`InterfaceMismatch`).
//! 5. In one store transaction, upsert the declared capabilities and run the
//!    `init` hook (`InitializationFailed`, nothing cached).
//! 6. Cache and return.
//!
//! Steps 1 to 6 run under the per-key slot lock of [`PluginCache`].
use std::sync::Arc;

use log::{debug, info};

use crate::kernel::error::{Error, Result};
use crate::plugin_system::cache::{CachedPlugin, PluginCache};
use crate::plugin_system::descriptor::{DescriptorReader, PluginDescriptor, PluginKey, PluginType};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::factory::PluginFactories;
use crate::plugin_system::traits::{BlockPlugin, ModulePlugin, PluginImplementation};
use crate::storage::RecordStore;

/// A loaded plugin: its descriptor and implementation.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub descriptor: Arc<PluginDescriptor>,
    pub implementation: PluginImplementation,
}

impl LoadedPlugin {
    pub fn key(&self) -> PluginKey {
        self.descriptor.key()
    }

    pub fn as_module(&self) -> Option<Arc<dyn ModulePlugin>> {
        match &self.implementation {
            PluginImplementation::Module(m) => Some(Arc::clone(m)),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<Arc<dyn BlockPlugin>> {
        match &self.implementation {
            PluginImplementation::Block(b) => Some(Arc::clone(b)),
            _ => None,
        }
    }

    /// Same instance, not just an equal one.
    pub fn ptr_eq(&self, other: &LoadedPlugin) -> bool {
        match (&self.implementation, &other.implementation) {
            (PluginImplementation::Module(a), PluginImplementation::Module(b)) => Arc::ptr_eq(a, b),
            (PluginImplementation::Block(a), PluginImplementation::Block(b)) => Arc::ptr_eq(a, b),
            (PluginImplementation::Theme, PluginImplementation::Theme) => {
                Arc::ptr_eq(&self.descriptor, &other.descriptor)
            }
            _ => false,
        }
    }
}

/// Fails with `IncompatibleVersion` when the host is older than `requires`.
pub fn check_host_compatibility(descriptor: &PluginDescriptor, host_version: i64) -> Result<()> {
    match descriptor.requires_host_version {
        Some(required) if host_version < required => Err(PluginSystemError::IncompatibleVersion {
            component: descriptor.component(),
            required,
            host: host_version,
        }
        .into()),
        _ => Ok(()),
    }
}

#[derive(Debug)]
pub struct PluginLoader {
    reader: DescriptorReader,
    factories: PluginFactories,
    cache: Arc<PluginCache>,
    store: Arc<RecordStore>,
    host_version: i64,
}

impl PluginLoader {
    pub fn new(
        reader: DescriptorReader,
        factories: PluginFactories,
        cache: Arc<PluginCache>,
        store: Arc<RecordStore>,
        host_version: i64,
    ) -> Self {
        Self {
            reader,
            factories,
            cache,
            store,
            host_version,
        }
    }

    pub fn reader(&self) -> &DescriptorReader {
        &self.reader
    }

    pub fn cache(&self) -> &Arc<PluginCache> {
        &self.cache
    }

    pub fn host_version(&self) -> i64 {
        self.host_version
    }

    /// Load `(plugin_type, name)`, reusing the cached instance when live.
    pub async fn load(&self, plugin_type: PluginType, name: &str) -> Result<LoadedPlugin> {
        let key = PluginKey::new(plugin_type, name);
        let generation = self.cache.generation();
        let slot = self.cache.slot(&key).await;
        let mut entry = slot.lock().await;

        if let Some(loaded) = self.cache.live_entry(&entry, generation) {
            debug!("Plugin cache hit for {}", key);
            return Ok(loaded);
        }
        *entry = None;

        let loaded = self.load_uncached(&key).await?;
        *entry = Some(CachedPlugin::new(loaded.clone(), generation));
        info!("Loaded plugin {} version {}", key, loaded.descriptor.version);
        Ok(loaded)
    }

    pub async fn load_module(&self, name: &str) -> Result<Arc<dyn ModulePlugin>> {
        let loaded = self.load(PluginType::Module, name).await?;
        loaded
            .as_module()
            .ok_or_else(|| PluginSystemError::mismatch(loaded.key().component(), "not a module").into())
    }

    pub async fn load_block(&self, name: &str) -> Result<Arc<dyn BlockPlugin>> {
        let loaded = self.load(PluginType::Block, name).await?;
        loaded
            .as_block()
            .ok_or_else(|| PluginSystemError::mismatch(loaded.key().component(), "not a block").into())
    }

    pub async fn is_loaded(&self, plugin_type: PluginType, name: &str) -> bool {
        self.cache.is_loaded(&PluginKey::new(plugin_type, name)).await
    }

    pub async fn evict(&self, plugin_type: PluginType, name: &str) -> bool {
        self.cache.evict(&PluginKey::new(plugin_type, name)).await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await
    }

    /// Build the implementation for a descriptor without caching or
    /// initializing it.
    pub fn resolve(&self, descriptor: &PluginDescriptor) -> Result<PluginImplementation> {
        let key = descriptor.key();
        let component = key.component();
        let implementation = match self.factories.create(&key) {
            Some(implementation) => implementation,
            None if descriptor.plugin_type == PluginType::Theme => PluginImplementation::Theme,
            None => {
                return Err(PluginSystemError::mismatch(component, "no implementation registered").into());
            }
        };
        if implementation.plugin_type() != descriptor.plugin_type {
            return Err(PluginSystemError::mismatch(
                component,
                format!("implementation is a {} plugin", implementation.plugin_type()),
            )
            .into());
        }
        if let Some(name) = implementation.name() {
            if name != descriptor.name {
                return Err(PluginSystemError::mismatch(
                    component,
                    format!("implementation reports name '{}'", name),
                )
                .into());
            }
        }
        Ok(implementation)
    }

    async fn load_uncached(&self, key: &PluginKey) -> Result<LoadedPlugin> {
        let descriptor = self.reader.read(key.plugin_type, &key.name).await?;
        check_host_compatibility(&descriptor, self.host_version)?;
        let implementation = self.resolve(&descriptor)?;
        self.initialize(&descriptor, &implementation).await?;
        Ok(LoadedPlugin {
            descriptor: Arc::new(descriptor),
            implementation,
        })
    }

    async fn initialize(&self, descriptor: &PluginDescriptor, implementation: &PluginImplementation) -> Result<()> {
        let component = descriptor.component();
        let prefix = format!("{}/{}:", descriptor.plugin_type.dir_name(), descriptor.name);
        let result = self
            .store
            .transaction(|tx| {
                for capability in implementation.capabilities() {
                    if !capability.name.starts_with(&prefix) || capability.name.len() == prefix.len() {
                        return Err(Error::from(format!(
                            "capability '{}' must be named '{}<action>'",
                            capability.name, prefix
                        )));
                    }
                    if tx.upsert_capability(capability.into_record(&component)) {
                        debug!("Registered capability for {}", component);
                    }
                }
                implementation.init(tx)
            })
            .await;
        result.map_err(|e| {
            PluginSystemError::InitializationFailed {
                component: component.clone(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            }
            .into()
        })
    }
}
