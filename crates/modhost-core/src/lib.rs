//! # Modhost Core
//!
//! Extension runtime of the modhost learning platform host. Plugins of three
//! kinds (activity modules, page blocks and themes) are discovered from a
//! plugin root, enabled, installed and upgraded, loaded behind a per-type
//! contract, and composed into pages and courses.
//!
//! [`Application`] wires every component from a
//! [`HostConfig`](storage::HostConfig).
pub mod blocks;
pub mod course;
pub mod kernel;
pub mod plugin_system;
pub mod storage;

pub use kernel::error::Error as KernelError;
pub use kernel::error::Result;
pub use kernel::{Application, Collaborators};
pub use plugin_system::{BlockPlugin, ModulePlugin, Plugin, PluginFactories, PluginKey, PluginType};
pub use storage::{HostConfig, RecordStore, StoreTransaction};

#[cfg(test)]
mod tests;
