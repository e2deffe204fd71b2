//! Configuration for the benchmark.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line arguments (storage path and compaction mode)
//! 2. Environment variables (prefixed with `LSMBENCH__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `LSMBENCH__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `LSMBENCH__WORKLOAD__WRITERS=4` runs four concurrent writers
//! - `LSMBENCH__EXPORTER__ADDR=127.0.0.1:9100` moves the metrics endpoint
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! workload:
//!   writers: 4
//!
//! exporter:
//!   addr: 127.0.0.1:9100
//! ```
//!
//! Presets for common runs:
//!
//! ```yaml
//! # Several writers, every record written and synced on its own, compacting after each epoch.
//! workload:
//!   writers: 8
//!   batch_size: 1000
//!   submission: individual
//!   values: constant
//!   compaction: true
//! ```
//!
//! ```yaml
//! # A single writer printing epoch durations with every report.
//! workload:
//!   epoch_timings: true
//! ```

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use lsmbench_workload::WorkloadSettings;
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "LSMBENCH__";

/// Newtype around `String` that may protect against accidental
/// logging of secrets in our configuration struct. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Location of the engine's data.
///
/// Used in: [`Config::storage`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Storage {
    /// Directory of the engine's data files.
    ///
    /// The directory is created if it does not exist. Usually given as the first positional
    /// argument.
    ///
    /// # Environment Variable
    ///
    /// `LSMBENCH__STORAGE__PATH`
    pub path: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
        }
    }
}

/// HTTP endpoint serving the benchmark metrics.
///
/// Used in: [`Config::exporter`]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Exporter {
    /// Address the exporter listens on.
    ///
    /// # Default
    ///
    /// `0.0.0.0:4321`
    ///
    /// # Environment Variable
    ///
    /// `LSMBENCH__EXPORTER__ADDR`
    pub addr: SocketAddr,

    /// Path of the metrics endpoint. Must start with `/`.
    ///
    /// # Default
    ///
    /// `/metrics`
    pub path: String,

    /// Maximum time to receive the headers of a request.
    ///
    /// # Default
    ///
    /// `2s`
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Maximum time to produce a response.
    ///
    /// # Default
    ///
    /// `15s`
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Maximum time a kept-alive connection may wait for its next request.
    ///
    /// # Default
    ///
    /// `2s`
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for Exporter {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 4321)),
            path: "/metrics".to_owned(),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(2),
        }
    }
}

/// Runtime configuration for the Tokio async runtime.
///
/// The runtime only serves the exporter and signal handling. Writers run on dedicated threads.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the async runtime.
    ///
    /// # Default
    ///
    /// `2`
    ///
    /// # Environment Variable
    ///
    /// `LSMBENCH__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}

/// [Sentry](https://sentry.io/) error reporting configuration.
///
/// Sentry is disabled by default and only enabled when a DSN is provided.
///
/// Used in: [`Config::sentry`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// Sentry DSN (Data Source Name).
    ///
    /// # Environment Variable
    ///
    /// `LSMBENCH__SENTRY__DSN`
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name attached to events, such as `"staging"`.
    ///
    /// # Environment Variable
    ///
    /// `LSMBENCH__SENTRY__ENVIRONMENT`
    pub environment: Option<Cow<'static, str>>,

    /// Error event sampling rate.
    ///
    /// # Default
    ///
    /// `1.0` (send all errors)
    pub sample_rate: f32,

    /// Performance trace sampling rate.
    ///
    /// # Default
    ///
    /// `0.01` (send 1% of traces)
    pub traces_sample_rate: f32,
}

impl Sentry {
    /// Returns whether Sentry integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.01,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO  lsmbench_workload::run > starting writers
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2020-12-04T12:10:32Z [lsmbench_workload::run] INFO: starting writers
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr. Stdout carries the per-epoch engine reports.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable overrides this and allows per-module filters.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `LSMBENCH__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`] for available options.
    ///
    /// # Environment Variable
    ///
    /// `LSMBENCH__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the benchmark.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Where the engine stores its data.
    pub storage: Storage,

    /// The write workload. See [`WorkloadSettings`] for all fields.
    ///
    /// # Environment Variables
    ///
    /// - `LSMBENCH__WORKLOAD__WRITERS=4`
    /// - `LSMBENCH__WORKLOAD__BATCH_SIZE=1000`
    /// - `LSMBENCH__WORKLOAD__SUBMISSION=individual`
    /// - `LSMBENCH__WORKLOAD__DURABILITY=nosync`
    /// - `LSMBENCH__WORKLOAD__VALUES=secure`
    /// - `LSMBENCH__WORKLOAD__PREFIXES=counter`
    /// - `LSMBENCH__WORKLOAD__COMPACTION=true`
    /// - `LSMBENCH__WORKLOAD__EPOCHS=100`
    /// - `LSMBENCH__WORKLOAD__EPOCH_TIMINGS=true`
    pub workload: WorkloadSettings,

    /// The metrics endpoint.
    pub exporter: Exporter,

    /// The async runtime serving the exporter.
    pub runtime: Runtime,

    /// Log level and format.
    pub logging: Logging,

    /// Optional error reporting.
    pub sentry: Sentry,
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Checks that the configuration describes a runnable benchmark.
    pub fn validate(&self) -> Result<()> {
        self.workload
            .validate()
            .context("invalid workload configuration")?;

        if !self.exporter.path.starts_with('/') {
            anyhow::bail!(
                "exporter path must start with `/`, got `{}`",
                self.exporter.path
            );
        }
        if self.exporter.path == "/health" {
            anyhow::bail!("exporter path `/health` is reserved for health checks");
        }

        Ok(())
    }
}
