use std::path::PathBuf;

use clap::Parser;

use sbom_modules::config::{Config, LogFormat};
use sbom_modules::models::Ecosystem;

#[derive(Parser, Debug)]
#[command(
    name = "sbom-modules",
    about = "Resolve Composer and NPM dependencies into a canonical module graph",
    version
)]
pub struct Cli {
    /// Project path to resolve
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file [default: ./.sbom-modules/config.toml, fallback ~/.config/sbom-modules/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Resolve full dependency trees instead of the direct module list
    #[arg(long)]
    pub tree: bool,

    /// Skip reading license files from installed packages
    #[arg(long)]
    pub no_license_scan: bool,

    /// Exclude an ecosystem from resolution (repeatable)
    #[arg(long = "exclude-lang", value_name = "LANG")]
    pub exclude_lang: Vec<EcosystemArg>,

    /// Log format (overrides config)
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line, warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum EcosystemArg {
    Composer,
    Npm,
}

impl From<&EcosystemArg> for Ecosystem {
    fn from(arg: &EcosystemArg) -> Self {
        match arg {
            EcosystemArg::Composer => Ecosystem::Composer,
            EcosystemArg::Npm => Ecosystem::Npm,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of file configuration.
    pub fn apply(&self, config: &mut Config) {
        if self.tree {
            config.resolve.dependency_tree = true;
        }
        if self.no_license_scan {
            config.resolve.scan_licenses = false;
        }
        for arg in &self.exclude_lang {
            let ecosystem = Ecosystem::from(arg);
            if !config.resolve.exclude.contains(&ecosystem) {
                config.resolve.exclude.push(ecosystem);
            }
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
    }
}
