use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::checksum;
use crate::error::ResolveError;
use crate::graph::{Conventions, DependencySource, ModuleBuilder, NodeKey, PackageRecord, TreeAssembler};
use crate::license::spdx::NOASSERTION;
use crate::models::{Ecosystem, Module, PluginMetadata, Supplier};
use crate::normalize::short_name;

use super::{
    ensure_installed, project_dir_name, read_json, string_list, supplier_from_object, Plugin,
    PluginOptions,
};

const PACKAGE_JSON: &str = "package.json";
const PACKAGE_LOCK: &str = "package-lock.json";
const SHRINKWRAP: &str = "npm-shrinkwrap.json";
const NODE_MODULES: &str = "node_modules";
const REGISTRY: &str = "https://registry.npmjs.org";

static METADATA: PluginMetadata = PluginMetadata {
    name: "Node Package Manager",
    slug: "npm",
    manifests: &[PACKAGE_JSON],
    module_path: NODE_MODULES,
};

/// `"Name <email> (url)"`
static PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^<(]*?)\s*(?:<([^>]*)>)?\s*(?:\(([^)]*)\))?\s*$").expect("person pattern")
});

/// Specs npm can fetch from directly.
static FETCHABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(((git|hg|svn|bzr)\+)?(https?|git|ssh|file)|(npm|file|github|gitlab|bitbucket|gist)):.*")
        .expect("fetchable spec pattern")
});

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    homepage: Option<String>,
    author: Option<Value>,
    license: Option<Value>,
    repository: Option<Value>,
    #[serde(default)]
    dependencies: Map<String, Value>,
    #[serde(default)]
    optional_dependencies: Map<String, Value>,
    #[serde(default)]
    dev_dependencies: Map<String, Value>,
}

/// `package-lock.json` / `npm-shrinkwrap.json`, any lockfileVersion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageLock {
    lockfile_version: Option<u32>,
    /// v2/v3: install path → entry.
    #[serde(default)]
    packages: BTreeMap<String, LockEntry>,
    /// v1: nested tree.
    #[serde(default)]
    dependencies: BTreeMap<String, LegacyEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockEntry {
    version: Option<String>,
    resolved: Option<String>,
    integrity: Option<String>,
    license: Option<Value>,
    #[serde(default)]
    link: bool,
    #[serde(default)]
    dependencies: Map<String, Value>,
    #[serde(default)]
    optional_dependencies: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    version: Option<String>,
    resolved: Option<String>,
    integrity: Option<String>,
    #[serde(default)]
    requires: Map<String, Value>,
    #[serde(default)]
    dependencies: BTreeMap<String, LegacyEntry>,
}

impl PackageJson {
    fn supplier(&self) -> Option<Supplier> {
        match self.author.as_ref()? {
            Value::String(s) => parse_person(s),
            other => supplier_from_object(other),
        }
    }

    fn repository_url(&self) -> Option<String> {
        let raw = match self.repository.as_ref()? {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => obj.get("url")?.as_str()?,
            _ => return None,
        };
        expand_repository(raw)
    }

    /// `dependencies`, `optionalDependencies`, then `devDependencies`, each in
    /// document order. A name listed twice is kept at its first position.
    fn direct_dependencies(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .dependencies
            .keys()
            .chain(self.optional_dependencies.keys())
            .chain(self.dev_dependencies.keys())
        {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Optional dependencies may legitimately be absent (other platforms).
    fn is_optional(&self, name: &str) -> bool {
        self.optional_dependencies.contains_key(name)
    }

    /// Required direct dependencies with no installed instance in the lock.
    fn missing_from(&self, tree: &InstallTree) -> Vec<String> {
        self.direct_dependencies()
            .into_iter()
            .filter(|name| !self.is_optional(name) && tree.resolve("", name).is_none())
            .collect()
    }

    fn to_record(&self, project: &Path) -> PackageRecord {
        let name = self
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| project_dir_name(project));
        PackageRecord {
            name,
            version: self.version.clone().unwrap_or_default(),
            dist_url: self.repository_url(),
            licenses: string_list(self.license.as_ref()),
            authors: self.supplier().into_iter().collect(),
            homepage: self.homepage.clone(),
            description: self.description.clone(),
            ..PackageRecord::default()
        }
    }
}

/// Parse `"Name <email> (url)"`; every part is optional.
fn parse_person(raw: &str) -> Option<Supplier> {
    let caps = PERSON.captures(raw)?;
    let supplier = Supplier {
        name: caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
        email: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
    };
    (!supplier.is_empty()).then_some(supplier)
}

/// Expand npm repository shorthands into clonable URLs.
fn expand_repository(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let hosted = [
        ("github:", "https://github.com"),
        ("gitlab:", "https://gitlab.com"),
        ("bitbucket:", "https://bitbucket.org"),
    ];
    for (prefix, host) in hosted {
        if let Some(slug) = raw.strip_prefix(prefix) {
            return Some(format!("{}/{}.git", host, slug));
        }
    }
    if !raw.contains(':') && raw.matches('/').count() == 1 {
        return Some(format!("https://github.com/{}.git", raw));
    }
    Some(raw.strip_prefix("git+").unwrap_or(raw).to_string())
}

fn install_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        format!("{}/{}", NODE_MODULES, name)
    } else {
        format!("{}/{}/{}", base, NODE_MODULES, name)
    }
}

/// Installed package instances keyed by install path, as in lockfileVersion 2+.
#[derive(Debug, Default)]
struct InstallTree {
    packages: BTreeMap<String, LockEntry>,
}

impl InstallTree {
    fn from_lock(lock: PackageLock) -> Self {
        debug!(lockfile_version = ?lock.lockfile_version, "reading npm lock");
        if !lock.packages.is_empty() {
            return Self {
                packages: lock.packages,
            };
        }
        let mut packages = BTreeMap::new();
        flatten_legacy("", &lock.dependencies, &mut packages);
        Self { packages }
    }

    /// Resolve `dep` the way node does from the instance at `from`: the nearest
    /// `node_modules/<dep>` walking up to the project root. Workspace links are
    /// followed to their target.
    fn resolve(&self, from: &str, dep: &str) -> Option<String> {
        let mut base = from;
        loop {
            let candidate = install_path(base, dep);
            if let Some(entry) = self.packages.get(&candidate) {
                return Some(self.follow_link(candidate, entry));
            }
            if base.is_empty() {
                return None;
            }
            base = match base.rfind("/node_modules/") {
                Some(idx) => &base[..idx],
                None => "",
            };
        }
    }

    fn follow_link(&self, path: String, entry: &LockEntry) -> String {
        match entry.resolved.as_deref() {
            Some(target) if entry.link && self.packages.contains_key(target) => target.to_string(),
            _ => path,
        }
    }

    fn get(&self, path: &str) -> Option<&LockEntry> {
        self.packages.get(path)
    }
}

/// Convert a v1 nested `dependencies` tree into install-path keyed entries.
fn flatten_legacy(
    base: &str,
    dependencies: &BTreeMap<String, LegacyEntry>,
    out: &mut BTreeMap<String, LockEntry>,
) {
    for (name, legacy) in dependencies {
        let path = install_path(base, name);
        out.insert(
            path.clone(),
            LockEntry {
                version: legacy.version.clone(),
                resolved: legacy.resolved.clone(),
                integrity: legacy.integrity.clone(),
                dependencies: legacy.requires.clone(),
                ..LockEntry::default()
            },
        );
        flatten_legacy(&path, &legacy.dependencies, out);
    }
}

/// Manifest of an installed package, when it is on disk and readable.
fn installed_manifest(project: &Path, install_dir: &str) -> Option<PackageJson> {
    let path = project.join(install_dir).join(PACKAGE_JSON);
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable installed package.json");
            None
        }
    }
}

fn package_record(project: &Path, name: &str, install_dir: &str, entry: &LockEntry) -> PackageRecord {
    let manifest = installed_manifest(project, install_dir).unwrap_or_default();
    let license = entry.license.as_ref().or(manifest.license.as_ref());
    PackageRecord {
        name: name.to_string(),
        version: entry.version.clone().unwrap_or_default(),
        dist_url: entry.resolved.clone(),
        declared_checksum: entry
            .integrity
            .as_deref()
            .and_then(|sri| checksum::parse_integrity(sri, name)),
        source_url: manifest.repository_url(),
        licenses: string_list(license),
        authors: manifest.supplier().into_iter().collect(),
        package_type: None,
        homepage: manifest.homepage.clone(),
        description: manifest.description.clone(),
        install_dir: Some(PathBuf::from(install_dir)),
    }
}

struct NpmConventions;

impl Conventions for NpmConventions {
    fn install_root(&self) -> &'static str {
        NODE_MODULES
    }

    fn synthesize_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/{}/-/{}-{}.tgz",
            REGISTRY,
            name,
            short_name(name, self.namespace_separator()),
            version
        )
    }

    fn download_location(&self, _record: &PackageRecord, package_url: &str) -> String {
        if package_url.ends_with(".tgz") {
            if let Some((base, _)) = package_url.split_once("/-/") {
                return base.trim_end_matches('/').to_string();
            }
        }
        if FETCHABLE.is_match(package_url) {
            return package_url.to_string();
        }
        NOASSERTION.to_string()
    }
}

struct NpmSource<'a> {
    project: &'a Path,
    tree: &'a InstallTree,
    root_dependencies: Vec<String>,
}

impl DependencySource for NpmSource<'_> {
    fn record(&self, node: &NodeKey) -> Option<PackageRecord> {
        let entry = self.tree.get(&node.path)?;
        Some(package_record(self.project, &node.name, &node.path, entry))
    }

    fn dependencies(&self, node: &NodeKey) -> Vec<(String, NodeKey)> {
        let names: Vec<String> = if node.is_root() {
            self.root_dependencies.clone()
        } else {
            self.tree
                .get(&node.path)
                .map(|entry| {
                    entry
                        .dependencies
                        .keys()
                        .chain(entry.optional_dependencies.keys())
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        names
            .into_iter()
            .filter_map(|name| match self.tree.resolve(&node.path, &name) {
                Some(path) => Some((name.clone(), NodeKey::new(name, path))),
                None => {
                    // optional platform-specific packages are legitimately absent
                    debug!(package = %node.name, requires = %name, "dependency not installed");
                    None
                }
            })
            .collect()
    }
}

pub struct NpmPlugin {
    options: PluginOptions,
}

impl NpmPlugin {
    pub fn new(options: PluginOptions) -> Self {
        Self { options }
    }

    fn builder<'a>(&'a self, path: &'a Path) -> ModuleBuilder<'a> {
        ModuleBuilder::new(
            path,
            &NpmConventions,
            self.options.scanner.as_ref(),
            &self.options.cancel,
        )
    }

    fn read_manifest(&self, path: &Path) -> Result<PackageJson, ResolveError> {
        read_json(&path.join(PACKAGE_JSON))
    }

    /// `npm-shrinkwrap.json` takes precedence over `package-lock.json`, as in npm.
    fn read_tree(&self, path: &Path) -> Result<InstallTree, ResolveError> {
        let shrinkwrap = path.join(SHRINKWRAP);
        let lock_path = if shrinkwrap.is_file() {
            shrinkwrap
        } else {
            path.join(PACKAGE_LOCK)
        };
        let lock: PackageLock = read_json(&lock_path)?;
        Ok(InstallTree::from_lock(lock))
    }
}

impl Plugin for NpmPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &METADATA
    }

    fn is_valid(&self, path: &Path) -> bool {
        METADATA.manifests.iter().any(|m| path.join(m).is_file())
    }

    fn has_modules_installed(&self, path: &Path) -> Result<(), ResolveError> {
        ensure_installed(Ecosystem::Npm, path, &METADATA, "npm install")
    }

    fn get_root_module(&self, path: &Path) -> Result<Module, ResolveError> {
        let manifest = self.read_manifest(path)?;
        self.builder(path).build_root(&manifest.to_record(path))
    }

    fn list_used_modules(&self, path: &Path) -> Result<Vec<Module>, ResolveError> {
        self.has_modules_installed(path)?;
        let tree = self.read_tree(path)?;
        let manifest = self.read_manifest(path)?;
        let builder = self.builder(path);

        let mut modules = vec![builder.build_root(&manifest.to_record(path))?];
        for name in manifest.direct_dependencies() {
            let resolved = tree
                .resolve("", &name)
                .and_then(|install| tree.get(&install).map(|entry| (install.clone(), entry)));
            match resolved {
                Some((install, entry)) => {
                    modules.push(builder.build(&package_record(path, &name, &install, entry))?);
                }
                None if manifest.is_optional(&name) => {
                    debug!(package = %name, "optional dependency not installed")
                }
                None => warn!(package = %name, "declared dependency missing from lock, skipping"),
            }
        }

        info!(modules = modules.len(), "resolved npm modules");
        Ok(modules)
    }

    fn list_modules_with_deps(&self, path: &Path) -> Result<Vec<Module>, ResolveError> {
        self.has_modules_installed(path)?;
        let tree = self.read_tree(path)?;
        let manifest = self.read_manifest(path)?;
        let builder = self.builder(path);
        let source = NpmSource {
            project: path,
            tree: &tree,
            root_dependencies: manifest.direct_dependencies(),
        };
        let mut assembler = TreeAssembler::new(&builder, &source);

        let mut root = builder.build_root(&manifest.to_record(path))?;
        let direct = assembler.expand_root()?;
        root.modules.extend(direct.iter().cloned());

        let mut modules = vec![root];
        modules.extend(direct.into_iter().map(|(_, module)| module));

        info!(modules = modules.len(), "resolved npm dependency tree");
        Ok(modules)
    }

    fn unresolved_dependencies(&self, path: &Path) -> Result<Vec<String>, ResolveError> {
        let tree = self.read_tree(path)?;
        let manifest = self.read_manifest(path)?;
        Ok(manifest.missing_from(&tree))
    }
}
