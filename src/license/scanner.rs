use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Result of scanning a package directory for license information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseInfo {
    /// SPDX identifier, empty when the text matched no known license.
    pub id: String,
    pub extracted_text: String,
    pub comments: String,
}

/// Given a package directory, find its license.
///
/// `None` means "not found or not scannable" and is never an error for the caller.
pub trait LicenseScanner: Send + Sync {
    fn scan(&self, dir: &Path) -> Option<LicenseInfo>;
}

/// Scanner used when license scanning is turned off.
pub struct DisabledScanner;

impl LicenseScanner for DisabledScanner {
    fn scan(&self, _dir: &Path) -> Option<LicenseInfo> {
        None
    }
}

/// File names checked, in order.
const LICENSE_FILES: &[&str] = &[
    "LICENSE",
    "LICENSE.md",
    "LICENSE.txt",
    "LICENCE",
    "LICENCE.md",
    "COPYING",
    "license",
    "license.md",
];

/// Ordered text markers. More specific licenses come before the ones whose
/// text they quote (LGPL/AGPL before GPL, BSD-3 before BSD-2).
static MARKERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("AGPL-3.0", r"(?is)GNU\s+AFFERO\s+GENERAL\s+PUBLIC\s+LICENSE"),
        ("LGPL-3.0", r"(?is)GNU\s+LESSER\s+GENERAL\s+PUBLIC\s+LICENSE\s+Version\s+3"),
        ("LGPL-2.1", r"(?is)GNU\s+LESSER\s+GENERAL\s+PUBLIC\s+LICENSE\s+Version\s+2\.1"),
        ("GPL-3.0", r"(?is)GNU\s+GENERAL\s+PUBLIC\s+LICENSE\s+Version\s+3"),
        ("GPL-2.0", r"(?is)GNU\s+GENERAL\s+PUBLIC\s+LICENSE\s+Version\s+2"),
        ("MPL-2.0", r"(?is)Mozilla\s+Public\s+License,?\s+(?:Version\s+|v\.\s*)2\.0"),
        ("Apache-2.0", r"(?is)Apache\s+License,?\s+Version\s+2\.0"),
        ("MITNFA", r"(?is)free\s+of\s+charge.*Distributions\s+of\s+all\s+or\s+part\s+of\s+the\s+Software\s+intended\s+to\s+be\s+used\s+by\s+the\s+recipients"),
        ("MIT", r"(?is)Permission\s+is\s+hereby\s+granted,\s+free\s+of\s+charge"),
        ("ISC", r"(?is)Permission\s+to\s+use,\s+copy,\s+modify,\s+and/?or\s+distribute\s+this\s+software\s+for\s+any\s+purpose"),
        ("BSD-3-Clause", r"(?is)Redistribution\s+and\s+use\s+in\s+source\s+and\s+binary\s+forms.*Neither\s+the\s+name"),
        ("BSD-2-Clause", r"(?is)Redistribution\s+and\s+use\s+in\s+source\s+and\s+binary\s+forms"),
        ("Unlicense", r"(?is)This\s+is\s+free\s+and\s+unencumbered\s+software\s+released\s+into\s+the\s+public\s+domain"),
    ]
    .into_iter()
    .map(|(id, pattern)| (id, Regex::new(pattern).expect("license marker pattern")))
    .collect()
});

static COPYRIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(copyright\s+(?:\(c\)|©|\d{4}).*?)\s*$").expect("copyright pattern")
});

/// Reads the first license file found in a package directory.
#[derive(Debug, Default)]
pub struct LicenseFileScanner;

impl LicenseFileScanner {
    pub fn new() -> Self {
        Self
    }
}

impl LicenseScanner for LicenseFileScanner {
    fn scan(&self, dir: &Path) -> Option<LicenseInfo> {
        let (file_name, text) = LICENSE_FILES.iter().find_map(|name| {
            let candidate = dir.join(name);
            std::fs::read_to_string(&candidate)
                .ok()
                .map(|text| (*name, text))
        })?;

        let info = match identify(&text) {
            Some(id) => LicenseInfo {
                id: id.to_string(),
                comments: format!("license detected from {}", file_name),
                extracted_text: text,
            },
            None => LicenseInfo {
                id: String::new(),
                comments: format!(
                    "{} does not match a known SPDX license text",
                    file_name
                ),
                extracted_text: text,
            },
        };
        debug!(dir = %dir.display(), id = %info.id, "scanned license file");
        Some(info)
    }
}

/// Match license text against known markers.
pub fn identify(text: &str) -> Option<&'static str> {
    MARKERS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(id, _)| *id)
}

/// First `Copyright (c) …` / `Copyright 2020 …` line of a license text.
pub fn extract_copyright(text: &str) -> String {
    COPYRIGHT
        .captures(text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}
