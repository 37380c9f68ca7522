//! Checksum resolution.
//!
//! Policy, in order:
//! 1. a digest declared by the lock record, with its own algorithm;
//! 2. otherwise SHA-1 of the resolved package URL string.
//!
//! The fallback is deterministic but only fingerprints the URL. It says nothing
//! about the bytes behind it.

use base64::{engine::general_purpose, Engine as _};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::models::{CheckSum, HashAlgorithm};

/// Pick the declared digest when present, otherwise fingerprint `package_url`.
pub fn resolve(declared: Option<CheckSum>, package_url: &str) -> CheckSum {
    match declared {
        Some(checksum) => checksum,
        None => {
            debug!(package_url, "no declared digest, hashing package url");
            CheckSum {
                algorithm: HashAlgorithm::Sha1,
                value: digest_url(package_url),
            }
        }
    }
}

/// Hex SHA-1 of a URL string. Empty input yields an empty value.
pub fn digest_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accept a hex digest declared by a lock record if it has the right length.
///
/// Only hex is accepted; case is folded after decoding, so the digest bytes
/// are exactly the declared ones.
pub fn declared_hex(algorithm: HashAlgorithm, value: &str, package: &str) -> Option<CheckSum> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match hex::decode(value) {
        Ok(bytes) if bytes.len() == algorithm.digest_len() => Some(CheckSum {
            algorithm,
            value: hex::encode(bytes),
        }),
        _ => {
            warn!(package, value, "ignoring malformed {} digest", algorithm);
            None
        }
    }
}

/// Parse a subresource-integrity string (`"sha512-<base64>"`).
///
/// Several space-separated digests may be listed; the first one with a known
/// algorithm and a well-formed value wins.
pub fn parse_integrity(integrity: &str, package: &str) -> Option<CheckSum> {
    for entry in integrity.split_whitespace() {
        let Some((prefix, value)) = entry.split_once('-') else {
            continue;
        };
        let Some(algorithm) = HashAlgorithm::from_sri_prefix(prefix) else {
            debug!(package, prefix, "skipping unknown integrity algorithm");
            continue;
        };
        let checksum = CheckSum {
            algorithm,
            value: value.to_string(),
        };
        if checksum.is_well_formed() {
            return Some(checksum);
        }
        warn!(package, entry, "ignoring malformed integrity digest");
    }
    None
}

impl CheckSum {
    /// `true` if `value` is hex or base64 for exactly the algorithm's digest length.
    pub fn is_well_formed(&self) -> bool {
        let len = self.algorithm.digest_len();
        if let Ok(bytes) = hex::decode(&self.value) {
            if bytes.len() == len {
                return true;
            }
        }
        general_purpose::STANDARD
            .decode(&self.value)
            .map(|bytes| bytes.len() == len)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/foo.git";

    #[test]
    fn test_fallback_hashes_url() {
        let checksum = resolve(None, URL);
        assert_eq!(checksum.algorithm, HashAlgorithm::Sha1);
        assert_eq!(checksum.value, digest_url(URL));
        assert_eq!(checksum.value.len(), 40);
        assert!(checksum.is_well_formed());
    }

    #[test]
    fn test_fallback_is_stable() {
        assert_eq!(resolve(None, URL), resolve(None, URL));
    }

    #[test]
    fn test_known_sha1_vector() {
        assert_eq!(digest_url("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(digest_url(""), "");
    }

    #[test]
    fn test_declared_digest_wins() {
        let declared = CheckSum {
            algorithm: HashAlgorithm::Sha512,
            value: "declared".to_string(),
        };
        assert_eq!(resolve(Some(declared.clone()), URL), declared);
    }

    #[test]
    fn test_declared_hex() {
        let sha = "A9993E364706816ABA3E25717850C26C9CD0D89D";
        let checksum = declared_hex(HashAlgorithm::Sha1, sha, "vendor/foo").unwrap();
        assert_eq!(checksum.value, sha.to_ascii_lowercase());
        assert!(declared_hex(HashAlgorithm::Sha1, "", "vendor/foo").is_none());
        assert!(declared_hex(HashAlgorithm::Sha1, "abc123", "vendor/foo").is_none());
    }

    #[test]
    fn test_declared_hex_rejects_base64() {
        // a base64 SHA1 of the right byte length is still not a hex shasum
        assert!(declared_hex(HashAlgorithm::Sha1, "mrVie5PmBiH/fNrF2pczAn3x0Ms=", "x").is_none());
        assert!(declared_hex(HashAlgorithm::Sha256, "a9993e364706816aba3e25717850c26c9cd0d89d", "x").is_none());
    }

    #[test]
    fn test_parse_integrity_sha512() {
        let value = "X/p3UZerAIsbBfN/IwahhYaBbY68EN/UQBWHtsbXGT5bfrH/p4NQzUCG1kF/rtKaNpnJ7jAu6NGTdSNtyNIXMw==";
        let checksum = parse_integrity(&format!("sha512-{value}"), "validator").unwrap();
        assert_eq!(checksum.algorithm, HashAlgorithm::Sha512);
        assert_eq!(checksum.value, value);
    }

    #[test]
    fn test_parse_integrity_sha1() {
        let checksum = parse_integrity("sha1-mrVie5PmBiH/fNrF2pczAn3x0Ms=", "bcryptjs").unwrap();
        assert_eq!(checksum.algorithm, HashAlgorithm::Sha1);
        assert_eq!(checksum.value, "mrVie5PmBiH/fNrF2pczAn3x0Ms=");
    }

    #[test]
    fn test_parse_integrity_skips_unknown_and_malformed() {
        let sri = "crc32-AAAA sha512-tooshort sha1-mrVie5PmBiH/fNrF2pczAn3x0Ms=";
        let checksum = parse_integrity(sri, "pkg").unwrap();
        assert_eq!(checksum.algorithm, HashAlgorithm::Sha1);
        assert!(parse_integrity("sha512-tooshort", "pkg").is_none());
        assert!(parse_integrity("garbage", "pkg").is_none());
    }
}
