//! Canonical forms for version strings and package identifiers.

/// Strip a single leading `v` from a version string.
///
/// `"v1.2.3"` → `"1.2.3"`, `"1.2.3"` → `"1.2.3"`, `"v"` → `""`.
/// Anything without a leading `v` (e.g. `"dev-master"`) passes through.
pub fn normalize_version(version: &str) -> String {
    version.strip_prefix('v').unwrap_or(version).to_string()
}

/// Last segment of a namespaced package name.
///
/// `"vendor/name"` → `"name"`, `"@scope/name"` → `"name"`, `"name"` → `"name"`.
pub fn short_name(name: &str, separator: char) -> String {
    name.rsplit(separator).next().unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("v1.2.3"), "1.2.3");
        assert_eq!(normalize_version("1.2.3"), "1.2.3");
        assert_eq!(normalize_version("dev-master"), "dev-master");
        assert_eq!(normalize_version(""), "");
    }

    #[test]
    fn test_normalize_bare_v() {
        assert_eq!(normalize_version("v"), "");
    }

    #[test]
    fn test_normalize_version_is_idempotent_on_normalized_input() {
        for v in ["1.2.3", "2.1.0-beta.1", "dev-main", "10.11.0"] {
            let once = normalize_version(v);
            assert_eq!(normalize_version(&once), once);
        }
    }

    #[test]
    fn test_only_one_prefix_is_stripped() {
        assert_eq!(normalize_version("vv1"), "v1");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("vendor/name", '/'), "name");
        assert_eq!(short_name("name", '/'), "name");
        assert_eq!(short_name("@types/node", '/'), "node");
    }
}
