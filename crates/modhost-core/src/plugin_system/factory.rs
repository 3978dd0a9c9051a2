//! Static implementation table.
//!
//! Plugin code is linked into the host; [`PluginFactories`] maps each
//! `(type, name)` to a constructor. Themes need no entry.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::plugin_system::descriptor::{PluginKey, PluginType};
use crate::plugin_system::traits::{BlockPlugin, ModulePlugin, PluginImplementation};

pub type PluginFactory = Arc<dyn Fn() -> PluginImplementation + Send + Sync>;

#[derive(Clone, Default)]
pub struct PluginFactories {
    factories: HashMap<PluginKey, PluginFactory>,
}

impl PluginFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw factory. A later registration for the same key wins.
    pub fn register<F>(&mut self, key: PluginKey, factory: F) -> &mut Self
    where
        F: Fn() -> PluginImplementation + Send + Sync + 'static,
    {
        self.factories.insert(key, Arc::new(factory));
        self
    }

    pub fn register_module<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn ModulePlugin> + Send + Sync + 'static,
    {
        self.register(PluginKey::new(PluginType::Module, name), move || {
            PluginImplementation::Module(factory())
        })
    }

    pub fn register_block<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn BlockPlugin> + Send + Sync + 'static,
    {
        self.register(PluginKey::new(PluginType::Block, name), move || {
            PluginImplementation::Block(factory())
        })
    }

    pub fn contains(&self, key: &PluginKey) -> bool {
        self.factories.contains_key(key)
    }

    /// Construct a fresh implementation for `key`.
    pub fn create(&self, key: &PluginKey) -> Option<PluginImplementation> {
        self.factories.get(key).map(|factory| factory())
    }

    pub fn keys(&self) -> Vec<PluginKey> {
        let mut keys: Vec<PluginKey> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for PluginFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys().iter().map(|k| k.component())).finish()
    }
}
