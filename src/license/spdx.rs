/// Sentinel used when no license information can be asserted.
pub const NOASSERTION: &str = "NOASSERTION";

/// `true` for canonical SPDX identifiers this crate recognises.
pub fn is_spdx_id(id: &str) -> bool {
    matches!(
        id.trim(),
        "MIT"
            | "MIT-0"
            | "MITNFA"
            | "Apache-2.0"
            | "BSD-2-Clause"
            | "BSD-3-Clause"
            | "BSD-4-Clause"
            | "ISC"
            | "0BSD"
            | "Unlicense"
            | "Zlib"
            | "CC0-1.0"
            | "WTFPL"
            | "CC-BY-3.0"
            | "CC-BY-4.0"
            | "PSF-2.0"
            | "Python-2.0"
            | "BlueOak-1.0.0"
            | "Artistic-2.0"
            | "LGPL-2.0"
            | "LGPL-2.0-only"
            | "LGPL-2.0-or-later"
            | "LGPL-2.1"
            | "LGPL-2.1-only"
            | "LGPL-2.1-or-later"
            | "LGPL-3.0"
            | "LGPL-3.0-only"
            | "LGPL-3.0-or-later"
            | "MPL-2.0"
            | "EUPL-1.1"
            | "EUPL-1.2"
            | "CDDL-1.0"
            | "EPL-1.0"
            | "EPL-2.0"
            | "OSL-3.0"
            | "GPL-2.0"
            | "GPL-2.0-only"
            | "GPL-2.0-or-later"
            | "GPL-3.0"
            | "GPL-3.0-only"
            | "GPL-3.0-or-later"
            | "AGPL-3.0"
            | "AGPL-3.0-only"
            | "AGPL-3.0-or-later"
    )
}

/// Normalize common non-SPDX strings to their SPDX equivalents.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed {
        "Apache 2.0" | "Apache License 2.0" | "Apache License, Version 2.0" => {
            "Apache-2.0".to_string()
        }
        "MIT License" | "The MIT License" => "MIT".to_string(),
        "BSD" | "BSD License" => "BSD-3-Clause".to_string(),
        "BSD 2-Clause" | "Simplified BSD" => "BSD-2-Clause".to_string(),
        "BSD 3-Clause" | "New BSD" | "Modified BSD" => "BSD-3-Clause".to_string(),
        "GNU GPL v2" | "GNU General Public License v2" | "GPL v2" | "GPLv2" => {
            "GPL-2.0".to_string()
        }
        "GNU GPL v3" | "GNU General Public License v3" | "GPL v3" | "GPLv3" => {
            "GPL-3.0".to_string()
        }
        "GNU LGPL v2.1" | "LGPL v2.1" | "LGPLv2.1" => "LGPL-2.1".to_string(),
        "GNU LGPL v3" | "LGPL v3" | "LGPLv3" => "LGPL-3.0".to_string(),
        "Mozilla Public License 2.0" | "MPL 2.0" | "MPLv2" => "MPL-2.0".to_string(),
        "ISC License" => "ISC".to_string(),
        "CC0" | "Public Domain" => "CC0-1.0".to_string(),
        "AGPL v3" | "AGPLv3" | "GNU AGPL v3" => "AGPL-3.0".to_string(),
        other => other.to_string(),
    }
}

/// License the package declares: a known SPDX id or expression, a `LicenseRef-` for
/// anything else, or `NOASSERTION` when nothing was identified.
pub fn declared_license(id: &str) -> String {
    let id = normalize(id);
    if id.is_empty() {
        NOASSERTION.to_string()
    } else if is_spdx_id(&id) || is_spdx_expression(&id) {
        id
    } else {
        license_ref(&id)
    }
}

/// License concluded for the package. Unrecognised licenses cannot be concluded.
pub fn concluded_license(id: &str) -> String {
    let id = normalize(id);
    if is_spdx_id(&id) || is_spdx_expression(&id) {
        id
    } else {
        NOASSERTION.to_string()
    }
}

/// `true` for a license expression (`MIT OR Apache-2.0`,
/// `(GPL-2.0 WITH Classpath-exception-2.0) AND BSD-3-Clause`) built only from
/// known identifiers.
pub fn is_spdx_expression(expr: &str) -> bool {
    let spaced = expr.replace('(', " ( ").replace(')', " ) ");
    let mut depth = 0usize;
    let mut operands = 0usize;
    let mut expect_operand = true;
    let mut after_with = false;

    for token in spaced.split_whitespace() {
        match token {
            "(" if expect_operand && !after_with => depth += 1,
            ")" if !expect_operand && depth > 0 => depth -= 1,
            "AND" | "OR" if !expect_operand => expect_operand = true,
            "WITH" if !expect_operand => {
                expect_operand = true;
                after_with = true;
            }
            id if expect_operand => {
                let known = if after_with {
                    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
                } else {
                    is_spdx_id(id)
                };
                if !known {
                    return false;
                }
                expect_operand = false;
                after_with = false;
                operands += 1;
            }
            _ => return false,
        }
    }
    operands > 0 && depth == 0 && !expect_operand
}

/// `LicenseRef-` identifiers may only contain letters, digits, `.` and `-`.
fn license_ref(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
        .collect();
    format!("LicenseRef-{}", sanitized)
}
