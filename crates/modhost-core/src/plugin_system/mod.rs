//! # Modhost Plugin System
//!
//! The extension runtime: finding plugins on disk, deciding whether they are
//! active, turning them into live implementations and moving them through
//! their install state.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`descriptor`]**: plugin identity ([`PluginType`], [`PluginKey`]) and
//!   the manifest reader ([`DescriptorReader`]).
//! - **[`registry`]**: discovery joined with the persisted enable state
//!   ([`PluginRegistry`]).
//! - **[`loader`]** / **[`cache`]** / **[`factory`]**: implementation lookup,
//!   checks, one-time initialization and the single-flight TTL cache
//!   ([`PluginLoader`], [`PluginCache`], [`PluginFactories`]).
//! - **[`lifecycle`]**: install, upgrade and uninstall ([`LifecycleManager`]).
//! - **[`traits`]**: the contract each plugin type implements.
//! - **[`capability`]**: capability declarations registered at load time.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
pub mod cache;
pub mod capability;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod loader;
pub mod registry;
pub mod traits;

pub use cache::PluginCache;
pub use capability::{AccessType, CapabilityDefinition};
pub use descriptor::{DescriptorReader, PluginDescriptor, PluginKey, PluginType};
pub use factory::PluginFactories;
pub use lifecycle::{InstallStatus, LifecycleManager, UpgradeOutcome};
pub use loader::{LoadedPlugin, PluginLoader};
pub use registry::{AvailablePlugin, PluginRegistry, PluginSummary};
pub use traits::{BlockPlugin, ModulePlugin, Plugin, PluginImplementation};
