//! # Modhost Kernel
//!
//! The `kernel` module ties the extension runtime together.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application)
//!   builds the record store, loader cache, registry, loader, lifecycle
//!   manager, block positioning engine and course module tracker from a
//!   [`HostConfig`](crate::storage::config::HostConfig).
//! - **Core Constants**: host version, directory and file names in `constants`.
//! - **Error Handling**: the aggregate [`Error`](error::Error) and the
//!   `Result` alias used by every subsystem.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::{Application, Collaborators};
pub use error::{Error, Result};
