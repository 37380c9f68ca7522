//! License/copyright enrichment.
//!
//! - [`scanner`]: the [`LicenseScanner`] contract and the default
//!   [`LicenseFileScanner`] that reads `LICENSE`-style files from a package directory.
//! - [`spdx`]: normalization of non-SPDX spellings and declared/concluded values.

pub mod scanner;
pub mod spdx;

pub use scanner::{DisabledScanner, LicenseFileScanner, LicenseInfo, LicenseScanner};
