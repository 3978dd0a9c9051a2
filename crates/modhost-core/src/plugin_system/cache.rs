//! # Modhost Plugin Cache
//!
//! Process-scoped cache of loaded plugins with a time-to-live.
//!
//! Each key owns a slot guarded by its own async mutex. A loader holds the
//! slot lock for the whole check, load and store sequence, so concurrent
//! loads of one key are coalesced and initialization side effects run once.
//! Loads of different keys never wait on each other.
//!
//! [`PluginCache::clear`] starts a new generation. Entries stored by a load
//! that began before the clear are never served.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::plugin_system::descriptor::PluginKey;
use crate::plugin_system::loader::LoadedPlugin;

#[derive(Debug)]
pub struct CachedPlugin {
    pub(crate) loaded: LoadedPlugin,
    loaded_at: Instant,
    generation: u64,
}

impl CachedPlugin {
    pub(crate) fn new(loaded: LoadedPlugin, generation: u64) -> Self {
        Self {
            loaded,
            loaded_at: Instant::now(),
            generation,
        }
    }

    fn is_live(&self, ttl: Duration, generation: u64) -> bool {
        self.generation == generation && self.loaded_at.elapsed() < ttl
    }
}

pub(crate) type CacheSlot = Arc<Mutex<Option<CachedPlugin>>>;

#[derive(Debug)]
pub struct PluginCache {
    ttl: Duration,
    generation: AtomicU64,
    slots: Mutex<HashMap<PluginKey, CacheSlot>>,
}

impl PluginCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The slot of `key`, created on first use.
    pub(crate) async fn slot(&self, key: &PluginKey) -> CacheSlot {
        let mut slots = self.slots.lock().await;
        slots.entry(key.clone()).or_default().clone()
    }

    /// The live entry stored in a locked slot, if any.
    pub(crate) fn live_entry(&self, entry: &Option<CachedPlugin>, generation: u64) -> Option<LoadedPlugin> {
        entry
            .as_ref()
            .filter(|cached| cached.is_live(self.ttl, generation))
            .map(|cached| cached.loaded.clone())
    }

    /// Live entry for `key`, waiting for an in-flight load to finish.
    pub async fn get(&self, key: &PluginKey) -> Option<LoadedPlugin> {
        let generation = self.generation();
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(key).cloned()
        }?;
        let entry = slot.lock().await;
        self.live_entry(&entry, generation)
    }

    /// True when a live entry exists. Never waits; a load still in flight
    /// counts as not loaded.
    pub async fn is_loaded(&self, key: &PluginKey) -> bool {
        let generation = self.generation();
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(key).cloned()
        };
        match slot {
            Some(slot) => match slot.try_lock() {
                Ok(entry) => self.live_entry(&entry, generation).is_some(),
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Drop the entry for `key`. Returns true when one was present.
    pub async fn evict(&self, key: &PluginKey) -> bool {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(key).cloned()
        };
        let Some(slot) = slot else {
            return false;
        };
        let removed = slot.lock().await.take().is_some();
        if removed {
            debug!("Evicted {} from plugin cache", key);
        }
        removed
    }

    /// Drop every entry and start a new generation.
    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        slots.clear();
        debug!("Plugin cache cleared, generation {}", generation);
    }
}
