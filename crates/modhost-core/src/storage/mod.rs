//! # Modhost Storage
//!
//! File access, host configuration and the transactional record store.
//!
//! - [`StorageProvider`] / [`LocalStorageProvider`]: file operations rooted at
//!   a base directory, with atomic writes.
//! - [`config`]: configuration formats and the [`HostConfig`] read at startup.
//! - [`records`]: the persisted record shapes (enable state, installed
//!   versions, capabilities, block placements, course modules, completions).
//! - [`store`]: [`RecordStore`], which applies multi-row writes atomically.
pub mod config;
pub mod error;
pub mod local;
pub mod provider;
pub mod records;
pub mod store;

pub use config::{ConfigData, ConfigFormat, HostConfig};
pub use local::LocalStorageProvider;
pub use provider::StorageProvider;
pub use records::{Records, StoreTransaction};
pub use store::RecordStore;
