//! Command line interface.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::{bench, observability};

/// Sustained write benchmark for an embedded LSM key-value engine.
///
/// Writes epochs of synthetic records into the engine at <path> and prints the engine's internal
/// metrics after every epoch. Throughput counters are served for Prometheus on port 4321.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// directory of the engine's data files
    #[argh(positional)]
    path: PathBuf,

    /// compaction mode, either "compact" (after each epoch) or "nocompact"
    #[argh(positional)]
    mode: Option<Mode>,
}

/// The compaction mode given on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// The first writer compacts the full key range after each of its epochs.
    Compact,
    /// Nothing compacts explicitly.
    NoCompact,
}

impl Mode {
    /// Whether this mode enables compaction.
    pub fn compacts(self) -> bool {
        self == Mode::Compact
    }
}

/// The error for an unknown mode token.
#[derive(Clone, Debug)]
pub struct ModeParseError(String);

impl fmt::Display for ModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"unknown mode "{}": expected "compact" or "nocompact""#,
            self.0
        )
    }
}

impl std::error::Error for ModeParseError {}

impl FromStr for Mode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compact" => Ok(Mode::Compact),
            "nocompact" => Ok(Mode::NoCompact),
            other => Err(ModeParseError(other.to_owned())),
        }
    }
}

/// Bootstrap the runtime and run the benchmark.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let mut config = Config::load(args.config.as_deref())?;
    config.storage.path = args.path;
    if let Some(mode) = args.mode {
        config.workload.compaction = mode.compacts();
    }
    config.validate()?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting lsmbench");
    tracing::debug!(?config);

    runtime.block_on(bench::bench(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, argh::EarlyExit> {
        Args::from_args(&["lsmbench"], args)
    }

    #[test]
    fn parses_path_and_mode() {
        let args = parse(&["/tmp/bench", "compact"]).unwrap();
        assert_eq!(args.path, PathBuf::from("/tmp/bench"));
        assert_eq!(args.mode, Some(Mode::Compact));

        let args = parse(&["-c", "bench.yml", "/tmp/bench", "nocompact"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("bench.yml")));
        assert_eq!(args.mode, Some(Mode::NoCompact));
        assert!(!args.mode.unwrap().compacts());
    }

    #[test]
    fn mode_is_optional() {
        let args = parse(&["/tmp/bench"]).unwrap();
        assert_eq!(args.mode, None);
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = parse(&["/tmp/bench", "sometimes"]).unwrap_err();
        assert!(err.output.contains("sometimes"));
        assert!(err.status.is_err());
    }

    #[test]
    fn requires_path() {
        let err = parse(&[]).unwrap_err();
        assert!(err.output.contains("path"));
        assert!(err.status.is_err());

        let err = parse(&["-c", "bench.yml"]).unwrap_err();
        assert!(err.status.is_err());
    }
}
