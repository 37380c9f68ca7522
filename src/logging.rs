//! Tracing subscriber setup for the binary.
//!
//! Logs always go to stderr so `--format json` output on stdout stays parseable.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Must be called at most once.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry.with(fmt.json()).try_init(),
        LogFormat::Pretty => registry.with(fmt.pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt.compact()).try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize {:?} tracing subscriber: {}", format, e))
}

/// Level after applying `-v` / `-q`. `quiet` wins when both are set.
pub fn effective_level(configured: &str, verbose: bool, quiet: bool) -> String {
    if quiet {
        "warn".to_string()
    } else if verbose {
        "debug".to_string()
    } else {
        configured.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level("info", false, false), "info");
        assert_eq!(effective_level("info", true, false), "debug");
        assert_eq!(effective_level("info", false, true), "warn");
        assert_eq!(effective_level("trace", true, true), "warn");
    }
}
