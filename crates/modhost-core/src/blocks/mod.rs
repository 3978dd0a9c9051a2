//! # Modhost Blocks
//!
//! Placement of block instances at `(region, page type, context)`
//! coordinates and resolution of what renders on a page.
//!
//! - [`pattern`]: page-type pattern matching.
//! - [`manager`]: [`BlockManager`], create/move/toggle/delete and
//!   `resolve_for_page`.
pub mod error;
pub mod manager;
pub mod pattern;

pub use manager::{BlockManager, RenderedBlock};
pub use pattern::PageTypePattern;
