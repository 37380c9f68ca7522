//! Error taxonomy for module resolution.
//!
//! "Not applicable" is not represented here: a plugin whose marker file is absent
//! simply answers `false` from `is_valid`. License enrichment misses are not
//! errors either; the collaborator returns an `Option`.

use std::path::PathBuf;

use crate::models::Ecosystem;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Manifest present but the install directory is missing or empty.
    #[error("{ecosystem} dependencies are not installed in {}: run `{hint}` first", path.display())]
    NotInstalled {
        ecosystem: Ecosystem,
        path: PathBuf,
        /// Command the user should run to install dependencies.
        hint: &'static str,
    },

    /// Lock artifact or manifest does not exist.
    #[error("missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("io error: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Structured data failed to decode. Resolution aborts without partial results.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// `true` when the caller should ask the user to install dependencies.
    pub fn is_not_installed(&self) -> bool {
        matches!(self, ResolveError::NotInstalled { .. })
    }
}
