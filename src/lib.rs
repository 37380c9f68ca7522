//! Multi-ecosystem module resolution for SBOM generation.
//!
//! Given a project directory, each ecosystem [`plugin`] decides whether it
//! applies, checks that dependencies are installed, reads the lock artifact and
//! hands raw records to the [`graph`] builder, which produces canonical
//! [`models::Module`]s enriched with checksum, license and supplier data.
//!
//! ```no_run
//! use std::path::Path;
//! use sbom_modules::plugin::{plugin_for, PluginOptions};
//! use sbom_modules::models::Ecosystem;
//!
//! let plugin = plugin_for(Ecosystem::Npm, PluginOptions::default());
//! let modules = plugin.list_used_modules(Path::new("."))?;
//! # Ok::<(), sbom_modules::error::ResolveError>(())
//! ```

pub mod checksum;
pub mod config;
pub mod detector;
pub mod error;
pub mod graph;
pub mod license;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod plugin;
pub mod report;

pub use error::ResolveError;
pub use models::{Ecosystem, Module};
pub use plugin::{plugin_for, Plugin, PluginOptions};
