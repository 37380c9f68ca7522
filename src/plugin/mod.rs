//! Ecosystem plugins.
//!
//! Every supported package manager implements [`Plugin`]. The set is closed:
//! [`plugin_for`] maps each [`Ecosystem`] to its implementation, and callers pick
//! one by probing [`Plugin::is_valid`].

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ResolveError;
use crate::graph::CancelFlag;
use crate::license::{DisabledScanner, LicenseFileScanner, LicenseScanner};
use crate::models::{Ecosystem, Module, PluginMetadata, Supplier};

pub mod composer;
pub mod npm;

pub trait Plugin {
    fn metadata(&self) -> &PluginMetadata;

    /// `true` iff `path` holds this ecosystem's manifest. Never fails.
    fn is_valid(&self, path: &Path) -> bool;

    /// `Ok` iff the install directory exists and is non-empty.
    fn has_modules_installed(&self, path: &Path) -> Result<(), ResolveError>;

    /// The project's own module, with `root` set.
    fn get_root_module(&self, path: &Path) -> Result<Module, ResolveError>;

    /// Root followed by every direct production and development dependency.
    fn list_used_modules(&self, path: &Path) -> Result<Vec<Module>, ResolveError>;

    /// Same list as [`Plugin::list_used_modules`], with every module's
    /// dependency tree populated to full depth.
    fn list_modules_with_deps(&self, path: &Path) -> Result<Vec<Module>, ResolveError>;

    /// Direct, non-optional dependencies the manifest declares but the lock
    /// artifact has no record for. The list operations leave these out.
    fn unresolved_dependencies(&self, _path: &Path) -> Result<Vec<String>, ResolveError> {
        Ok(Vec::new())
    }
}

/// Collaborators shared by all plugins.
#[derive(Clone)]
pub struct PluginOptions {
    pub scanner: Arc<dyn LicenseScanner>,
    pub cancel: CancelFlag,
}

impl PluginOptions {
    /// Options with license scanning turned off.
    pub fn without_license_scan() -> Self {
        Self {
            scanner: Arc::new(DisabledScanner),
            cancel: CancelFlag::new(),
        }
    }
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            scanner: Arc::new(LicenseFileScanner::new()),
            cancel: CancelFlag::new(),
        }
    }
}

pub fn plugin_for(ecosystem: Ecosystem, options: PluginOptions) -> Box<dyn Plugin> {
    match ecosystem {
        Ecosystem::Composer => Box::new(composer::ComposerPlugin::new(options)),
        Ecosystem::Npm => Box::new(npm::NpmPlugin::new(options)),
    }
}

/// Read and decode a JSON document, failing without partial results.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ResolveError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ResolveError::MissingArtifact {
                path: path.to_path_buf(),
            }
        } else {
            ResolveError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&content).map_err(|source| ResolveError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// `Ok` iff `<project>/<module_path>` is a directory with at least one entry.
pub(crate) fn ensure_installed(
    ecosystem: Ecosystem,
    project: &Path,
    metadata: &PluginMetadata,
    hint: &'static str,
) -> Result<(), ResolveError> {
    let dir = project.join(metadata.module_path);
    let has_entries = std::fs::read_dir(&dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if has_entries {
        Ok(())
    } else {
        Err(ResolveError::NotInstalled {
            ecosystem,
            path: project.to_path_buf(),
            hint,
        })
    }
}

/// Directory name of the project, used when the manifest has no `name`.
pub(crate) fn project_dir_name(project: &Path) -> String {
    project
        .canonicalize()
        .unwrap_or_else(|_| project.to_path_buf())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// String or array-of-strings field (`"MIT"` / `["MIT", "GPL-2.0"]`).
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(obj)) => obj
            .get("type")
            .and_then(|v| v.as_str())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Keys of an object field; anything else (including PHP's `[]`) is empty.
pub(crate) fn object_keys(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_object())
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

/// First author from a list of `{ "name": ..., "email": ... }` objects.
pub(crate) fn supplier_from_object(value: &Value) -> Option<Supplier> {
    let obj = value.as_object()?;
    let field = |key: &str| {
        obj.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let supplier = Supplier {
        name: field("name"),
        email: field("email"),
    };
    (!supplier.is_empty()).then_some(supplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_json_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_json::<Value>(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ResolveError::MissingArtifact { .. }));
    }

    #[test]
    fn test_read_json_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ \"packages\": [").unwrap();
        let err = read_json::<Value>(&path).unwrap_err();
        assert!(matches!(err, ResolveError::Decode { .. }));
    }

    #[test]
    fn test_ensure_installed() {
        let dir = TempDir::new().unwrap();
        let metadata = PluginMetadata {
            name: "Test",
            slug: "test",
            manifests: &["test.json"],
            module_path: "deps",
        };
        let missing = ensure_installed(Ecosystem::Npm, dir.path(), &metadata, "install");
        assert!(missing.unwrap_err().is_not_installed());

        std::fs::create_dir(dir.path().join("deps")).unwrap();
        let empty = ensure_installed(Ecosystem::Npm, dir.path(), &metadata, "install");
        assert!(empty.is_err());

        std::fs::create_dir(dir.path().join("deps").join("a")).unwrap();
        assert!(ensure_installed(Ecosystem::Npm, dir.path(), &metadata, "install").is_ok());
    }

    #[test]
    fn test_string_list() {
        assert_eq!(string_list(Some(&json!("MIT"))), vec!["MIT"]);
        assert_eq!(string_list(Some(&json!(["MIT", "GPL-2.0"]))), vec!["MIT", "GPL-2.0"]);
        assert_eq!(string_list(Some(&json!({"type": "ISC"}))), vec!["ISC"]);
        assert!(string_list(None).is_empty());
    }

    #[test]
    fn test_object_keys_accepts_php_empty_array() {
        assert!(object_keys(Some(&json!([]))).is_empty());
        assert_eq!(object_keys(Some(&json!({"b": "1", "a": "2"}))), vec!["b", "a"]);
    }

    #[test]
    fn test_supplier_from_object() {
        let s = supplier_from_object(&json!({"name": "Jane", "email": "jane@example.com"})).unwrap();
        assert_eq!(s.name, "Jane");
        assert_eq!(s.email, "jane@example.com");
        assert!(supplier_from_object(&json!({})).is_none());
        assert!(supplier_from_object(&json!("Jane")).is_none());
    }
}
