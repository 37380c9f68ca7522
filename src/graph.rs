//! Module Graph Builder.
//!
//! Converts raw lock records into [`Module`]s and assembles nested dependency
//! trees. Each plugin supplies its ecosystem [`Conventions`] and, for the tree
//! view, a [`DependencySource`] describing its install tree.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::checksum;
use crate::error::ResolveError;
use crate::license::spdx::{concluded_license, declared_license};
use crate::license::{scanner::extract_copyright, LicenseScanner};
use crate::models::{CheckSum, Module, Supplier};
use crate::normalize::{normalize_version, short_name};

/// Package kind that only aggregates requirements and installs nothing.
pub const METAPACKAGE: &str = "metapackage";

/// Package data as read from a lock artifact, before normalization.
#[derive(Debug, Clone, Default)]
pub struct PackageRecord {
    /// Fully qualified name (`vendor/name`, `@scope/name`).
    pub name: String,
    /// Version as written in the lock.
    pub version: String,
    pub dist_url: Option<String>,
    pub declared_checksum: Option<CheckSum>,
    pub source_url: Option<String>,
    pub licenses: Vec<String>,
    pub authors: Vec<Supplier>,
    /// Ecosystem package kind (`library`, `metapackage`, ...).
    pub package_type: Option<String>,
    pub homepage: Option<String>,
    pub description: Option<String>,
    /// Where this particular instance is installed, when it differs from the
    /// conventional `<install-root>/<name>` (nested NPM installs).
    pub install_dir: Option<PathBuf>,
}

/// Per-ecosystem naming and layout rules.
pub trait Conventions {
    /// Directory packages are installed into, relative to the project.
    fn install_root(&self) -> &'static str;

    fn namespace_separator(&self) -> char {
        '/'
    }

    /// Package URL used when the lock has no distribution URL.
    fn synthesize_url(&self, name: &str, version: &str) -> String;

    /// Where the package bytes can be fetched from.
    fn download_location(&self, record: &PackageRecord, package_url: &str) -> String;
}

/// Shared flag that aborts a resolution between record conversions.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ResolveError> {
        if self.is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct ModuleBuilder<'a> {
    project_dir: &'a Path,
    conventions: &'a dyn Conventions,
    scanner: &'a dyn LicenseScanner,
    cancel: &'a CancelFlag,
}

impl<'a> ModuleBuilder<'a> {
    pub fn new(
        project_dir: &'a Path,
        conventions: &'a dyn Conventions,
        scanner: &'a dyn LicenseScanner,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            project_dir,
            conventions,
            scanner,
            cancel,
        }
    }

    /// Convert a dependency record into a [`Module`].
    pub fn build(&self, record: &PackageRecord) -> Result<Module, ResolveError> {
        self.cancel.check()?;

        let local_path = PathBuf::from(self.conventions.install_root()).join(&record.name);
        let scan_dir = record.install_dir.as_deref().unwrap_or(local_path.as_path());
        let scan_dir = self.project_dir.join(scan_dir);
        Ok(self.convert(record, local_path, &scan_dir, false))
    }

    /// Convert the project's own manifest record into the root [`Module`].
    pub fn build_root(&self, record: &PackageRecord) -> Result<Module, ResolveError> {
        self.cancel.check()?;
        Ok(self.convert(record, PathBuf::from("."), self.project_dir, true))
    }

    fn convert(
        &self,
        record: &PackageRecord,
        local_path: PathBuf,
        scan_dir: &Path,
        root: bool,
    ) -> Module {
        let package_url = record
            .dist_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.conventions.synthesize_url(&record.name, &record.version));
        let checksum = checksum::resolve(record.declared_checksum.clone(), &package_url);
        let download_location = self.conventions.download_location(record, &package_url);

        let mut module = Module {
            name: short_name(&record.name, self.conventions.namespace_separator()),
            version: normalize_version(&record.version),
            root,
            package_url,
            download_location,
            homepage: record.homepage.clone(),
            description: record.description.clone(),
            checksum,
            supplier: record.authors.first().cloned().unwrap_or_default(),
            local_path,
            ..Module::default()
        };
        if record.package_type.as_deref() == Some(METAPACKAGE) {
            debug!(module = %module.name, "metapackage has no installed files, skipping license scan");
        } else {
            self.enrich(&mut module, scan_dir, &record.licenses);
        }
        module
    }

    /// Attach license fields. A miss leaves them empty.
    ///
    /// When the license file is found but its text is not recognised, the
    /// first license named by the lock record identifies it instead.
    fn enrich(&self, module: &mut Module, scan_dir: &Path, lock_licenses: &[String]) {
        match self.scanner.scan(scan_dir) {
            Some(info) => {
                let id = if info.id.is_empty() {
                    lock_licenses.first().map(String::as_str).unwrap_or_default()
                } else {
                    info.id.as_str()
                };
                module.license_declared = declared_license(id);
                module.license_concluded = concluded_license(id);
                module.copyright = extract_copyright(&info.extracted_text);
                module.comments_license = info.comments;
            }
            None => {
                debug!(module = %module.name, dir = %scan_dir.display(), "no license information found");
            }
        }
    }
}

/// Identity of one installed package instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub name: String,
    /// Resolved install location; distinguishes instances of the same name.
    pub path: String,
}

impl NodeKey {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// The project itself.
    pub fn root() -> Self {
        Self::new("", "")
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty() && self.path.is_empty()
    }
}

/// An ecosystem's installed package tree.
pub trait DependencySource {
    fn record(&self, node: &NodeKey) -> Option<PackageRecord>;

    /// Dependency name → resolved installed instance, for `node`'s declared
    /// dependencies. Unresolvable names are left out.
    fn dependencies(&self, node: &NodeKey) -> Vec<(String, NodeKey)>;
}

/// Expands [`NodeKey`]s into fully nested modules.
///
/// Converted modules are memoized for the lifetime of one assembler, so a
/// package reached through many paths is converted (and license-scanned) once.
pub struct TreeAssembler<'a, 'b, S: DependencySource> {
    builder: &'b ModuleBuilder<'a>,
    source: &'b S,
    converted: HashMap<NodeKey, Module>,
    branch: HashSet<NodeKey>,
}

impl<'a, 'b, S: DependencySource> TreeAssembler<'a, 'b, S> {
    pub fn new(builder: &'b ModuleBuilder<'a>, source: &'b S) -> Self {
        Self {
            builder,
            source,
            converted: HashMap::new(),
            branch: HashSet::new(),
        }
    }

    /// Direct dependencies of the project, each expanded to full depth.
    pub fn expand_root(&mut self) -> Result<Vec<(String, Module)>, ResolveError> {
        self.expand_children(&NodeKey::root())
    }

    /// Expand `node` and everything below it.
    ///
    /// A node already on the current branch is emitted as a leaf so mutually
    /// dependent packages terminate.
    pub fn expand(&mut self, node: &NodeKey) -> Result<Option<Module>, ResolveError> {
        let Some(mut module) = self.convert(node)? else {
            return Ok(None);
        };

        if !self.branch.insert(node.clone()) {
            debug!(name = %node.name, path = %node.path, "dependency cycle, not descending");
            return Ok(Some(module));
        }

        let children = self.expand_children(node);
        self.branch.remove(node);
        module.modules.extend(children?);
        Ok(Some(module))
    }

    fn expand_children(&mut self, node: &NodeKey) -> Result<Vec<(String, Module)>, ResolveError> {
        let mut children = Vec::new();
        for (dep_name, child) in self.source.dependencies(node) {
            if let Some(module) = self.expand(&child)? {
                children.push((dep_name, module));
            }
        }
        Ok(children)
    }

    fn convert(&mut self, node: &NodeKey) -> Result<Option<Module>, ResolveError> {
        if let Some(module) = self.converted.get(node) {
            return Ok(Some(module.clone()));
        }
        let Some(record) = self.source.record(node) else {
            warn!(name = %node.name, path = %node.path, "installed package has no lock record");
            return Ok(None);
        };
        let module = self.builder.build(&record)?;
        self.converted.insert(node.clone(), module.clone());
        Ok(Some(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::spdx::NOASSERTION;
    use crate::license::{DisabledScanner, LicenseInfo};
    use crate::models::HashAlgorithm;
    use std::collections::BTreeMap;

    struct TestConventions;

    impl Conventions for TestConventions {
        fn install_root(&self) -> &'static str {
            "vendor"
        }

        fn synthesize_url(&self, name: &str, _version: &str) -> String {
            format!("https://github.com/{}.git", name)
        }

        fn download_location(&self, record: &PackageRecord, package_url: &str) -> String {
            record
                .source_url
                .clone()
                .unwrap_or_else(|| package_url.to_string())
        }
    }

    struct FixedScanner;

    impl LicenseScanner for FixedScanner {
        fn scan(&self, dir: &Path) -> Option<LicenseInfo> {
            if dir.ends_with("vendor/acme/custom") {
                return Some(LicenseInfo {
                    comments: "unrecognised".to_string(),
                    ..LicenseInfo::default()
                });
            }
            dir.ends_with("vendor/acme/licensed").then(|| LicenseInfo {
                id: "MIT".to_string(),
                extracted_text: "Copyright (c) 2020 Acme\n\nPermission is hereby granted".to_string(),
                comments: "from test".to_string(),
            })
        }
    }

    /// name → dependency names; every node lives at `vendor/<name>`.
    struct MapSource(BTreeMap<&'static str, Vec<&'static str>>);

    impl DependencySource for MapSource {
        fn record(&self, node: &NodeKey) -> Option<PackageRecord> {
            self.0.contains_key(node.name.as_str()).then(|| PackageRecord {
                name: node.name.clone(),
                version: "v1.0.0".to_string(),
                ..PackageRecord::default()
            })
        }

        fn dependencies(&self, node: &NodeKey) -> Vec<(String, NodeKey)> {
            let deps = if node.is_root() {
                vec!["acme/a"]
            } else {
                self.0.get(node.name.as_str()).cloned().unwrap_or_default()
            };
            deps.into_iter()
                .map(|d| (d.to_string(), NodeKey::new(d, format!("vendor/{}", d))))
                .collect()
        }
    }

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            version: version.to_string(),
            ..PackageRecord::default()
        }
    }

    #[test]
    fn test_build_with_fallbacks() {
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &DisabledScanner, &cancel);
        let module = builder.build(&record("vendor/foo", "v2.1.0")).unwrap();

        assert_eq!(module.name, "foo");
        assert_eq!(module.version, "2.1.0");
        assert!(!module.root);
        assert_eq!(module.package_url, "https://github.com/vendor/foo.git");
        assert_eq!(module.checksum.algorithm, HashAlgorithm::Sha1);
        assert_eq!(module.checksum.value, checksum::digest_url(&module.package_url));
        assert_eq!(module.local_path, PathBuf::from("vendor/vendor/foo"));
        assert!(module.supplier.is_empty());
        assert!(module.license_declared.is_empty());
        assert!(module.modules.is_empty());
    }

    #[test]
    fn test_build_prefers_explicit_values() {
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &DisabledScanner, &cancel);
        let declared = CheckSum {
            algorithm: HashAlgorithm::Sha512,
            value: "abc".to_string(),
        };
        let rec = PackageRecord {
            dist_url: Some("https://example.com/foo.zip".to_string()),
            declared_checksum: Some(declared.clone()),
            authors: vec![
                Supplier { name: "First".to_string(), email: "first@example.com".to_string() },
                Supplier { name: "Second".to_string(), email: String::new() },
            ],
            ..record("vendor/foo", "1.0.0")
        };
        let module = builder.build(&rec).unwrap();
        assert_eq!(module.package_url, "https://example.com/foo.zip");
        assert_eq!(module.checksum, declared);
        assert_eq!(module.supplier.name, "First");
    }

    #[test]
    fn test_license_enrichment() {
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &FixedScanner, &cancel);
        let module = builder.build(&record("acme/licensed", "1.0.0")).unwrap();
        assert_eq!(module.license_declared, "MIT");
        assert_eq!(module.license_concluded, "MIT");
        assert_eq!(module.copyright, "Copyright (c) 2020 Acme");
        assert_eq!(module.comments_license, "from test");

        let missing = builder.build(&record("acme/other", "1.0.0")).unwrap();
        assert_eq!(missing.license_declared, "");
        assert_eq!(missing.copyright, "");
    }

    #[test]
    fn test_unrecognised_license_text_uses_lock_license() {
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &FixedScanner, &cancel);
        let rec = PackageRecord {
            licenses: vec!["BSD-3-Clause".to_string(), "GPL-2.0".to_string()],
            ..record("acme/custom", "1.0.0")
        };
        let module = builder.build(&rec).unwrap();
        assert_eq!(module.license_declared, "BSD-3-Clause");
        assert_eq!(module.license_concluded, "BSD-3-Clause");

        let bare = builder.build(&record("acme/custom", "1.0.0")).unwrap();
        assert_eq!(bare.license_declared, NOASSERTION);
        assert_eq!(bare.license_concluded, NOASSERTION);
    }

    #[test]
    fn test_metapackage_skips_license_scan() {
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &FixedScanner, &cancel);
        let rec = PackageRecord {
            package_type: Some(METAPACKAGE.to_string()),
            ..record("acme/licensed", "1.0.0")
        };
        let module = builder.build(&rec).unwrap();
        assert_eq!(module.license_declared, "");
        assert_eq!(module.copyright, "");

        let library = PackageRecord {
            package_type: Some("library".to_string()),
            ..record("acme/licensed", "1.0.0")
        };
        assert_eq!(builder.build(&library).unwrap().license_declared, "MIT");
    }

    #[test]
    fn test_build_root() {
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &DisabledScanner, &cancel);
        let root = builder.build_root(&record("acme/app", "1.0.0")).unwrap();
        assert!(root.root);
        assert_eq!(root.name, "app");
        assert_eq!(root.local_path, PathBuf::from("."));
    }

    #[test]
    fn test_cancelled_build() {
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &DisabledScanner, &cancel);
        cancel.clone().cancel();
        assert!(matches!(
            builder.build(&record("a/b", "1")),
            Err(ResolveError::Cancelled)
        ));
    }

    #[test]
    fn test_mutual_dependencies_terminate() {
        let source = MapSource(BTreeMap::from([
            ("acme/a", vec!["acme/b"]),
            ("acme/b", vec!["acme/a", "acme/c"]),
            ("acme/c", vec![]),
        ]));
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &DisabledScanner, &cancel);
        let mut assembler = TreeAssembler::new(&builder, &source);
        let direct = assembler.expand_root().unwrap();

        assert_eq!(direct.len(), 1);
        let (name, a) = &direct[0];
        assert_eq!(name, "acme/a");
        let b = &a.modules["acme/b"];
        let a_again = &b.modules["acme/a"];
        assert!(a_again.modules.is_empty());
        assert!(b.modules.contains_key("acme/c"));
        assert_eq!(a.tree_size(), 3);
    }

    #[test]
    fn test_self_dependency_is_a_leaf() {
        let source = MapSource(BTreeMap::from([("acme/a", vec!["acme/a"])]));
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &DisabledScanner, &cancel);
        let mut assembler = TreeAssembler::new(&builder, &source);
        let direct = assembler.expand_root().unwrap();
        let a = &direct[0].1;
        assert_eq!(a.tree_size(), 1);
        assert!(a.modules["acme/a"].modules.is_empty());
    }

    #[test]
    fn test_unknown_dependency_is_skipped() {
        let source = MapSource(BTreeMap::from([("acme/a", vec!["acme/ghost"])]));
        let cancel = CancelFlag::new();
        let builder = ModuleBuilder::new(Path::new("/p"), &TestConventions, &DisabledScanner, &cancel);
        let mut assembler = TreeAssembler::new(&builder, &source);
        let direct = assembler.expand_root().unwrap();
        assert!(direct[0].1.modules.is_empty());
    }
}
