//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── storage: LocalStorageConfig  # Graph and media directory
//! ├── engine: EngineArgs           # Batch concurrency, generation timeout
//! ├── mock: MockConfig             # Mock generation backend
//! ├── telemetry: TelemetryConfig   # Log output format
//! └── command: Command             # validate | run | batch
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.

mod engine;
mod telemetry;

use std::process;

use atelier_service::{LocalStorageConfig, MockConfig};
use clap::Parser;
pub use engine::EngineArgs;
pub use telemetry::{LogFormat, TelemetryConfig};

use crate::command::Command;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "atelier")]
#[command(about = "Validate and run Atelier media graphs")]
#[command(version)]
pub struct Cli {
    /// Directory holding stored graphs and generated media.
    #[clap(flatten)]
    pub storage: LocalStorageConfig,

    /// Execution engine configuration.
    #[clap(flatten)]
    pub engine: EngineArgs,

    /// Mock generation backend configuration.
    #[clap(flatten)]
    pub mock: MockConfig,

    /// Log output configuration.
    #[clap(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Logs configuration and build information.
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            storage_path = %self.storage.storage_path.display(),
            max_concurrent_graphs = self.engine.max_concurrent_graphs,
            generation_timeout_secs = self.engine.generation_timeout,
            mock_latency_ms = self.mock.latency_ms,
            mock_fail_on = ?self.mock.fail_on,
            "Configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let cli = Cli::try_parse_from(["atelier", "validate", "graph.json"]).unwrap();
        assert_eq!(cli.engine.max_concurrent_graphs, 1);
        assert_eq!(cli.telemetry.log_format, LogFormat::Text);
        assert!(matches!(cli.command, Command::Validate(_)));

        let config = cli.engine.to_engine_config().unwrap();
        assert_eq!(config.generation_timeout, Duration::from_secs(300));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "atelier",
            "--max-concurrent-graphs",
            "3",
            "--generation-timeout",
            "10",
            "--log-format",
            "json",
            "--mock-fail-on",
            "explode,crash",
            "batch",
            "a.json",
            "b.json",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.telemetry.log_format, LogFormat::Json);
        assert_eq!(cli.mock.fail_on, ["explode", "crash"]);
        let config = cli.engine.to_engine_config().unwrap();
        assert_eq!(config.max_concurrent_graphs, 3);
        assert_eq!(config.generation_timeout, Duration::from_secs(10));
        let Command::Batch(args) = cli.command else {
            panic!("expected the batch command");
        };
        assert_eq!(args.files.len(), 2);
        assert!(args.force);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cli = Cli::try_parse_from([
            "atelier",
            "--max-concurrent-graphs",
            "0",
            "validate",
            "graph.json",
        ])
        .unwrap();
        assert!(cli.engine.to_engine_config().is_err());
    }
}
