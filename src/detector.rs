use std::path::Path;

use tracing::debug;

use crate::models::Ecosystem;
use crate::plugin::{plugin_for, PluginOptions};

/// Auto-detect supported ecosystems by probing each plugin for its manifest.
///
/// Ecosystems listed in `exclude` are never checked. Order follows [`Ecosystem::ALL`].
pub fn detect_ecosystems(path: &Path, exclude: &[Ecosystem]) -> Vec<Ecosystem> {
    Ecosystem::ALL
        .into_iter()
        .filter(|ecosystem| !exclude.contains(ecosystem))
        .filter(|ecosystem| {
            let valid = plugin_for(*ecosystem, PluginOptions::without_license_scan()).is_valid(path);
            debug!(ecosystem = %ecosystem, valid, "checked manifest");
            valid
        })
        .collect()
}
