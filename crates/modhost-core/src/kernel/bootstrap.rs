use std::sync::Arc;

use log::info;

use crate::blocks::BlockManager;
use crate::course::{CourseModuleManager, EnrollmentCheck, GradingLedger, RecordGradingLedger, StaticEnrollments};
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::plugin_system::{
    DescriptorReader, LifecycleManager, PluginCache, PluginFactories, PluginLoader, PluginRegistry,
};
use crate::storage::{HostConfig, LocalStorageProvider, RecordStore, StorageProvider};

/// External collaborators of the course module manager.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn GradingLedger>,
    pub enrollments: Arc<dyn EnrollmentCheck>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            ledger: Arc::new(RecordGradingLedger),
            enrollments: Arc::new(StaticEnrollments::new()),
        }
    }
}

/// Every runtime component, wired from one [`HostConfig`].
///
/// The record store, plugin cache and loader are shared; each manager holds
/// `Arc`s to the pieces it needs.
#[derive(Debug)]
pub struct Application {
    config: HostConfig,
    store: Arc<RecordStore>,
    cache: Arc<PluginCache>,
    loader: Arc<PluginLoader>,
    registry: Arc<PluginRegistry>,
    lifecycle: Arc<LifecycleManager>,
    blocks: Arc<BlockManager>,
    modules: Arc<CourseModuleManager>,
}

impl Application {
    /// Application persisting its records under `config.data_dir`.
    pub fn new(config: HostConfig, factories: PluginFactories) -> Result<Self> {
        let provider = LocalStorageProvider::new(config.data_dir.clone());
        provider.create_dir_all(std::path::Path::new(""))?;
        let store = RecordStore::open(Arc::new(provider), constants::RECORDS_FILE)?;
        Ok(Self::with_store(config, factories, Arc::new(store), Collaborators::default()))
    }

    /// Application whose records vanish with the process.
    pub fn in_memory(config: HostConfig, factories: PluginFactories) -> Self {
        Self::with_store(config, factories, Arc::new(RecordStore::in_memory()), Collaborators::default())
    }

    pub fn with_store(
        config: HostConfig,
        factories: PluginFactories,
        store: Arc<RecordStore>,
        collaborators: Collaborators,
    ) -> Self {
        info!(
            "Initializing {} v{} (host version {})",
            constants::APP_NAME,
            constants::APP_VERSION,
            config.host_version
        );
        info!("Plugin root: {}", config.plugin_root.display());

        let cache = Arc::new(PluginCache::new(config.cache_ttl));
        let loader = Arc::new(PluginLoader::new(
            DescriptorReader::new(config.plugin_root.clone()),
            factories,
            Arc::clone(&cache),
            Arc::clone(&store),
            config.host_version,
        ));
        let registry = Arc::new(PluginRegistry::new(Arc::clone(&loader), Arc::clone(&store)));
        let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&loader), Arc::clone(&store)));
        let blocks = Arc::new(BlockManager::new(Arc::clone(&loader), Arc::clone(&store)));
        let modules = Arc::new(CourseModuleManager::new(
            Arc::clone(&loader),
            Arc::clone(&store),
            collaborators.ledger,
            collaborators.enrollments,
        ));

        Self {
            config,
            store,
            cache,
            loader,
            registry,
            lifecycle,
            blocks,
            modules,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<PluginCache> {
        &self.cache
    }

    pub fn loader(&self) -> &Arc<PluginLoader> {
        &self.loader
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn blocks(&self) -> &Arc<BlockManager> {
        &self.blocks
    }

    pub fn modules(&self) -> &Arc<CourseModuleManager> {
        &self.modules
    }
}
