use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Canonical unit of dependency information handed to SBOM emitters.
///
/// Built fresh by every resolution call and never mutated once it leaves the
/// [`ModuleBuilder`](crate::graph::ModuleBuilder).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Short package name (`vendor/name` → `name`).
    pub name: String,
    /// Version with a single leading `v` stripped.
    pub version: String,
    /// `true` only for the project's own package.
    pub root: bool,
    pub package_url: String,
    pub download_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub checksum: CheckSum,
    pub supplier: Supplier,
    /// Expected install location, relative to the project directory.
    pub local_path: PathBuf,
    pub license_declared: String,
    pub license_concluded: String,
    pub copyright: String,
    pub comments_license: String,
    /// Dependency name → resolved sub-module. Only populated by the tree view.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<String, Module>,
}

impl Module {
    /// Number of nodes below this module in the dependency tree.
    pub fn tree_size(&self) -> usize {
        self.modules.values().map(|m| 1 + m.tree_size()).sum()
    }
}

/// Digest identifying a package.
///
/// `value` is hex for Composer `shasum` and for URL-derived fallbacks, base64 for
/// NPM `integrity` digests. An empty `value` means no digest could be determined.
///
/// A digest derived from the package URL only identifies the URL string, not
/// the package bytes. Consumers should treat it as a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSum {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA224")]
    Sha224,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA384")]
    Sha384,
    #[serde(rename = "SHA512")]
    Sha512,
    #[serde(rename = "MD5")]
    Md5,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Md5 => 16,
        }
    }

    /// Parse the lowercase algorithm prefix used by subresource-integrity strings.
    pub fn from_sri_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha1" => Some(HashAlgorithm::Sha1),
            "sha224" => Some(HashAlgorithm::Sha224),
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            "md5" => Some(HashAlgorithm::Md5),
            _ => None,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha1 => write!(f, "SHA1"),
            HashAlgorithm::Sha224 => write!(f, "SHA224"),
            HashAlgorithm::Sha256 => write!(f, "SHA256"),
            HashAlgorithm::Sha384 => write!(f, "SHA384"),
            HashAlgorithm::Sha512 => write!(f, "SHA512"),
            HashAlgorithm::Md5 => write!(f, "MD5"),
        }
    }
}

/// First listed author of a package. Both fields are empty when none is declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub name: String,
    pub email: String,
}

impl Supplier {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Composer,
    Npm,
}

impl Ecosystem {
    /// Probe order used by the detector.
    pub const ALL: [Ecosystem; 2] = [Ecosystem::Composer, Ecosystem::Npm];

    pub fn slug(&self) -> &'static str {
        match self {
            Ecosystem::Composer => "composer",
            Ecosystem::Npm => "npm",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ecosystem::Composer => write!(f, "Composer"),
            Ecosystem::Npm => write!(f, "NPM"),
        }
    }
}

/// Static description of an ecosystem plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: &'static str,
    pub slug: &'static str,
    /// Marker files whose presence makes the plugin applicable.
    pub manifests: &'static [&'static str],
    /// Install directory, relative to the project directory.
    pub module_path: &'static str,
}

/// Modules resolved for one ecosystem of a project.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub ecosystem: Ecosystem,
    pub modules: Vec<Module>,
    /// Declared direct dependencies absent from the lock, and so from `modules`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> Module {
        Module {
            name: name.to_string(),
            ..Module::default()
        }
    }

    #[test]
    fn test_tree_size_counts_nested_nodes() {
        let mut child = leaf("b");
        child.modules.insert("c".to_string(), leaf("c"));
        let mut root = leaf("a");
        root.modules.insert("b".to_string(), child);
        root.modules.insert("d".to_string(), leaf("d"));
        assert_eq!(root.tree_size(), 3);
        assert_eq!(leaf("x").tree_size(), 0);
    }

    #[test]
    fn test_hash_algorithm_serializes_as_spdx_name() {
        let checksum = CheckSum {
            algorithm: HashAlgorithm::Sha512,
            value: "abc".to_string(),
        };
        let json = serde_json::to_string(&checksum).unwrap();
        assert_eq!(json, r#"{"algorithm":"SHA512","value":"abc"}"#);
        assert_eq!(HashAlgorithm::Sha1.to_string(), "SHA1");
    }

    #[test]
    fn test_sri_prefix() {
        assert_eq!(HashAlgorithm::from_sri_prefix("sha512"), Some(HashAlgorithm::Sha512));
        assert_eq!(HashAlgorithm::from_sri_prefix("sha1"), Some(HashAlgorithm::Sha1));
        assert_eq!(HashAlgorithm::from_sri_prefix("crc32"), None);
    }

    #[test]
    fn test_empty_tree_is_not_serialized() {
        let json = serde_json::to_value(leaf("a")).unwrap();
        assert!(json.get("modules").is_none());
        assert!(json.get("homepage").is_none());
    }

    #[test]
    fn test_ecosystem_deserializes_from_slug() {
        let eco: Ecosystem = serde_json::from_str(r#""npm""#).unwrap();
        assert_eq!(eco, Ecosystem::Npm);
        assert_eq!(Ecosystem::Composer.slug(), "composer");
        assert_eq!(Ecosystem::Npm.to_string(), "NPM");
    }
}
