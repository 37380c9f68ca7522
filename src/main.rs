//! `sbom-modules`: resolve installed dependencies into a canonical module graph.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and load config ([`load_config`]).
//! 2. Install the tracing subscriber ([`init_tracing`]).
//! 3. Auto-detect ecosystems ([`detect_ecosystems`]).
//! 4. Resolve each ecosystem through its plugin ([`plugin_for`]).
//! 5. Render the requested report ([`report`]) or JSON.
//! 6. Exit `0` (all ecosystems resolved) or `1` (at least one failed).

mod cli;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use cli::{Cli, OutputFormat};
use sbom_modules::config::load_config;
use sbom_modules::detector::detect_ecosystems;
use sbom_modules::logging::{effective_level, init_tracing};
use sbom_modules::models::Resolution;
use sbom_modules::plugin::{plugin_for, PluginOptions};
use sbom_modules::report;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let mut config = load_config(&path, cli.config.as_deref())?;
    cli.apply(&mut config);

    init_tracing(
        &effective_level(&config.log.level, cli.verbose, cli.quiet),
        config.log.format,
    )?;

    let ecosystems = detect_ecosystems(&path, &config.resolve.exclude);
    if ecosystems.is_empty() {
        eprintln!(
            "No supported project manifests found in {}",
            path.display()
        );
        std::process::exit(1);
    }

    let options = if config.resolve.scan_licenses {
        PluginOptions::default()
    } else {
        PluginOptions::without_license_scan()
    };
    let interactive = !cli.quiet && cli.format == OutputFormat::Terminal;

    let mut resolutions = Vec::new();
    let mut failed = false;

    for ecosystem in ecosystems {
        let plugin = plugin_for(ecosystem, options.clone());
        let spinner = if interactive {
            Some(spinner(plugin.metadata().name)?)
        } else {
            None
        };

        let result = if config.resolve.dependency_tree {
            plugin.list_modules_with_deps(&path)
        } else {
            plugin.list_used_modules(&path)
        };

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match result {
            Ok(modules) => {
                if interactive {
                    eprintln!("  {} {} {} modules", "→".cyan(), ecosystem, modules.len());
                }
                let unresolved = plugin.unresolved_dependencies(&path).unwrap_or_else(|e| {
                    warn!(ecosystem = %ecosystem, error = %e, "could not check for unresolved dependencies");
                    Vec::new()
                });
                if interactive && !unresolved.is_empty() {
                    eprintln!(
                        "  {} {} declared {} dependencies missing from the lock: {}",
                        "⚠".yellow(),
                        unresolved.len(),
                        ecosystem,
                        unresolved.join(", ")
                    );
                }
                resolutions.push(Resolution {
                    ecosystem,
                    modules,
                    unresolved,
                });
            }
            Err(e) if e.is_not_installed() => {
                eprintln!("  {} {}", "✗".yellow(), e);
                failed = true;
            }
            Err(e) => {
                error!(ecosystem = %ecosystem, error = %e, "resolution failed");
                eprintln!("  {} {}: {}", "✗".red(), ecosystem, e);
                failed = true;
            }
        }
    }

    match cli.format {
        OutputFormat::Terminal => {
            report::terminal::render(
                &resolutions,
                &path,
                config.resolve.dependency_tree,
                cli.quiet,
            )?;
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&resolutions)?);
        }
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}

fn spinner(plugin_name: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Resolving {}…", plugin_name));
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
