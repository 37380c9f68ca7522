//! Report renderers for resolved modules.
//!
//! - [`terminal`]: one table per ecosystem, optional dependency tree; respects `--quiet`.
//!
//! JSON output needs no renderer: [`crate::models::Resolution`] serializes directly.

pub mod terminal;
