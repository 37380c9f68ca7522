use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::checksum;
use crate::error::ResolveError;
use crate::graph::{Conventions, DependencySource, ModuleBuilder, NodeKey, PackageRecord, TreeAssembler};
use crate::models::{Ecosystem, HashAlgorithm, Module, PluginMetadata};

use super::{
    ensure_installed, object_keys, project_dir_name, read_json, string_list, supplier_from_object,
    Plugin, PluginOptions,
};

const COMPOSER_JSON: &str = "composer.json";
const COMPOSER_LOCK: &str = "composer.lock";
const GITHUB: &str = "https://github.com";

static METADATA: PluginMetadata = PluginMetadata {
    name: "Composer Package Manager",
    slug: "composer",
    manifests: &[COMPOSER_JSON],
    module_path: "vendor",
};

#[derive(Debug, Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<LockPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<LockPackage>,
}

#[derive(Debug, Deserialize)]
struct LockPackage {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(rename = "type")]
    package_type: Option<String>,
    dist: Option<Location>,
    source: Option<Location>,
    license: Option<Value>,
    description: Option<String>,
    #[serde(default)]
    authors: Vec<Value>,
    homepage: Option<String>,
    /// Object of name → constraint, or `[]` when empty.
    require: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Location {
    url: Option<String>,
    shasum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComposerJson {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    homepage: Option<String>,
    #[serde(default)]
    authors: Vec<Value>,
    license: Option<Value>,
    require: Option<Value>,
    #[serde(rename = "require-dev")]
    require_dev: Option<Value>,
}

impl LockPackage {
    fn to_record(&self) -> PackageRecord {
        let dist = self.dist.as_ref();
        PackageRecord {
            name: self.name.clone(),
            version: self.version.clone(),
            dist_url: dist.and_then(|d| d.url.clone()),
            declared_checksum: dist
                .and_then(|d| d.shasum.as_deref())
                .and_then(|sha| checksum::declared_hex(HashAlgorithm::Sha1, sha, &self.name)),
            source_url: self.source.as_ref().and_then(|s| s.url.clone()),
            licenses: string_list(self.license.as_ref()),
            authors: self.authors.iter().filter_map(supplier_from_object).collect(),
            package_type: self.package_type.clone(),
            homepage: self.homepage.clone(),
            description: self.description.clone(),
            install_dir: None,
        }
    }
}

impl ComposerJson {
    fn to_record(&self, project: &Path) -> PackageRecord {
        let name = self
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| project_dir_name(project));
        PackageRecord {
            name,
            version: self.version.clone().unwrap_or_default(),
            licenses: string_list(self.license.as_ref()),
            authors: self.authors.iter().filter_map(supplier_from_object).collect(),
            homepage: self.homepage.clone(),
            description: self.description.clone(),
            ..PackageRecord::default()
        }
    }
}

struct ComposerConventions;

impl Conventions for ComposerConventions {
    fn install_root(&self) -> &'static str {
        METADATA.module_path
    }

    fn synthesize_url(&self, name: &str, _version: &str) -> String {
        format!("{}/{}.git", GITHUB, name)
    }

    fn download_location(&self, record: &PackageRecord, package_url: &str) -> String {
        record
            .source_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| package_url.to_string())
    }
}

/// Real packages are always `vendor/name`; bare names (`php`, `ext-json`,
/// `composer-plugin-api`) are platform requirements.
fn is_platform_requirement(name: &str) -> bool {
    !name.contains('/')
}

/// `composer.lock` viewed as a dependency graph. Names are case-insensitive.
struct ComposerSource<'a> {
    packages: HashMap<String, &'a LockPackage>,
    root_requires: Vec<String>,
}

impl<'a> ComposerSource<'a> {
    fn new(lock: &'a ComposerLock, manifest: &ComposerJson) -> Self {
        let packages = lock
            .packages
            .iter()
            .chain(&lock.packages_dev)
            .map(|p| (p.name.to_lowercase(), p))
            .collect();
        let mut root_requires = object_keys(manifest.require.as_ref());
        root_requires.extend(object_keys(manifest.require_dev.as_ref()));
        Self {
            packages,
            root_requires,
        }
    }

    fn key(name: &str) -> NodeKey {
        NodeKey::new(name, format!("{}/{}", METADATA.module_path, name))
    }
}

impl DependencySource for ComposerSource<'_> {
    fn record(&self, node: &NodeKey) -> Option<PackageRecord> {
        self.packages
            .get(&node.name.to_lowercase())
            .map(|p| p.to_record())
    }

    fn dependencies(&self, node: &NodeKey) -> Vec<(String, NodeKey)> {
        let required = if node.is_root() {
            self.root_requires.clone()
        } else {
            self.packages
                .get(&node.name.to_lowercase())
                .map(|p| object_keys(p.require.as_ref()))
                .unwrap_or_default()
        };

        required
            .into_iter()
            .filter(|name| !is_platform_requirement(name))
            .filter_map(|name| match self.packages.get(&name.to_lowercase()) {
                Some(package) => Some((package.name.clone(), Self::key(&package.name))),
                None => {
                    // provided/replaced virtual packages have no lock entry
                    debug!(package = %node.name, requires = %name, "requirement not in composer.lock");
                    None
                }
            })
            .collect()
    }
}

pub struct ComposerPlugin {
    options: PluginOptions,
}

impl ComposerPlugin {
    pub fn new(options: PluginOptions) -> Self {
        Self { options }
    }

    fn builder<'a>(&'a self, path: &'a Path) -> ModuleBuilder<'a> {
        ModuleBuilder::new(
            path,
            &ComposerConventions,
            self.options.scanner.as_ref(),
            &self.options.cancel,
        )
    }

    fn read_manifest(&self, path: &Path) -> Result<ComposerJson, ResolveError> {
        read_json(&path.join(COMPOSER_JSON))
    }

    fn read_lock(&self, path: &Path) -> Result<ComposerLock, ResolveError> {
        read_json(&path.join(COMPOSER_LOCK))
    }
}

impl Plugin for ComposerPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &METADATA
    }

    fn is_valid(&self, path: &Path) -> bool {
        METADATA.manifests.iter().any(|m| path.join(m).is_file())
    }

    fn has_modules_installed(&self, path: &Path) -> Result<(), ResolveError> {
        ensure_installed(Ecosystem::Composer, path, &METADATA, "composer install")
    }

    fn get_root_module(&self, path: &Path) -> Result<Module, ResolveError> {
        let manifest = self.read_manifest(path)?;
        self.builder(path).build_root(&manifest.to_record(path))
    }

    fn list_used_modules(&self, path: &Path) -> Result<Vec<Module>, ResolveError> {
        self.has_modules_installed(path)?;
        let lock = self.read_lock(path)?;
        let builder = self.builder(path);

        let mut modules = Vec::with_capacity(1 + lock.packages.len() + lock.packages_dev.len());
        modules.push(self.get_root_module(path)?);
        for package in lock.packages.iter().chain(&lock.packages_dev) {
            modules.push(builder.build(&package.to_record())?);
        }

        info!(
            packages = lock.packages.len(),
            dev_packages = lock.packages_dev.len(),
            "resolved composer modules"
        );
        Ok(modules)
    }

    fn list_modules_with_deps(&self, path: &Path) -> Result<Vec<Module>, ResolveError> {
        self.has_modules_installed(path)?;
        let lock = self.read_lock(path)?;
        let manifest = self.read_manifest(path)?;
        let builder = self.builder(path);
        let source = ComposerSource::new(&lock, &manifest);
        let mut assembler = TreeAssembler::new(&builder, &source);

        let mut root = builder.build_root(&manifest.to_record(path))?;
        root.modules.extend(assembler.expand_root()?);

        let mut modules = vec![root];
        for package in lock.packages.iter().chain(&lock.packages_dev) {
            if let Some(module) = assembler.expand(&ComposerSource::key(&package.name))? {
                modules.push(module);
            }
        }

        info!(modules = modules.len(), "resolved composer dependency tree");
        Ok(modules)
    }

    fn unresolved_dependencies(&self, path: &Path) -> Result<Vec<String>, ResolveError> {
        let lock = self.read_lock(path)?;
        let manifest = self.read_manifest(path)?;
        let source = ComposerSource::new(&lock, &manifest);
        Ok(source
            .root_requires
            .iter()
            .filter(|name| {
                !is_platform_requirement(name) && !source.packages.contains_key(&name.to_lowercase())
            })
            .cloned()
            .collect())
    }
}
