//! Command-line arguments for the supervisor.

use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};
use torvisor_config::{
    DEFAULT_BOOTSTRAP_TIMEOUT_SECS, DEFAULT_DAEMON_BINARY, DEFAULT_LOG_FILTER, DaemonConfig,
    LogFormat, PortMode, default_data_directory, default_log_format,
};

/// Runs the anonymity daemon in the foreground until a termination signal.
#[derive(Parser, Debug)]
#[command(name = "torvisord", version)]
pub(crate) struct Cli {
    /// Daemon executable to launch.
    #[arg(long, env = "TORVISOR_TOR_BINARY", default_value = DEFAULT_DAEMON_BINARY)]
    pub(crate) tor_binary: PathBuf,
    /// Directory for the daemon's state. Wiped on every start.
    #[arg(long, env = "TORVISOR_DATA_DIR")]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// SOCKS listener port, or `auto` to let the daemon choose.
    #[arg(long, env = "TORVISOR_SOCKS_PORT", default_value_t = PortMode::Auto)]
    pub(crate) socks_port: PortMode,
    /// Bridge line; repeat for several bridges.
    #[arg(long = "bridge", value_name = "LINE")]
    pub(crate) bridges: Vec<String>,
    /// Run without relay functionality.
    #[arg(
        long,
        env = "TORVISOR_CLIENT_ONLY",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub(crate) client_only: bool,
    /// Ask the daemon to minimise disk writes.
    #[arg(long, env = "TORVISOR_AVOID_DISK_WRITES")]
    pub(crate) avoid_disk_writes: bool,
    /// IPv4 GeoIP database.
    #[arg(long, env = "TORVISOR_GEOIP_FILE")]
    pub(crate) geoip_file: Option<Utf8PathBuf>,
    /// IPv6 GeoIP database.
    #[arg(long, env = "TORVISOR_GEOIP6_FILE")]
    pub(crate) geoip6_file: Option<Utf8PathBuf>,
    /// Seconds to wait for bootstrap before giving up.
    #[arg(
        long,
        env = "TORVISOR_BOOTSTRAP_TIMEOUT_SECS",
        default_value_t = DEFAULT_BOOTSTRAP_TIMEOUT_SECS
    )]
    pub(crate) bootstrap_timeout_secs: u64,
    /// Tracing filter expression, for example `torvisor=debug`.
    #[arg(long, env = "TORVISOR_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub(crate) log_filter: String,
    /// Log output format: `json` or `compact`.
    #[arg(long, env = "TORVISOR_LOG_FORMAT", default_value_t = default_log_format())]
    pub(crate) log_format: LogFormat,
}

impl Cli {
    /// Resolves parsed arguments into runtime settings.
    pub(crate) fn into_settings(self) -> Settings {
        let data_directory = self.data_dir.unwrap_or_else(default_data_directory);
        let daemon = DaemonConfig::new(data_directory)
            .with_socks_port(self.socks_port)
            .with_bridges(self.bridges)
            .with_client_only(self.client_only)
            .with_avoid_disk_writes(self.avoid_disk_writes)
            .with_geoip_files(self.geoip_file, self.geoip6_file);
        Settings {
            daemon,
            tor_binary: self.tor_binary,
            bootstrap_timeout: Duration::from_secs(self.bootstrap_timeout_secs),
            log_filter: self.log_filter,
            log_format: self.log_format,
        }
    }
}

/// Everything the supervisor needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    daemon: DaemonConfig,
    tor_binary: PathBuf,
    bootstrap_timeout: Duration,
    log_filter: String,
    log_format: LogFormat,
}

impl Settings {
    /// Builds settings for `daemon` with default binary, timeout and logging.
    #[must_use]
    pub fn new(daemon: DaemonConfig) -> Self {
        Self {
            daemon,
            tor_binary: PathBuf::from(DEFAULT_DAEMON_BINARY),
            bootstrap_timeout: Duration::from_secs(DEFAULT_BOOTSTRAP_TIMEOUT_SECS),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
        }
    }

    /// Overrides the bootstrap timeout.
    #[must_use]
    pub const fn with_bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = timeout;
        self
    }

    /// Configuration handed to the controller.
    #[must_use]
    pub const fn daemon(&self) -> &DaemonConfig {
        &self.daemon
    }

    /// Daemon executable.
    #[must_use]
    pub fn tor_binary(&self) -> &std::path::Path {
        &self.tor_binary
    }

    /// How long to wait for bootstrap.
    #[must_use]
    pub const fn bootstrap_timeout(&self) -> Duration {
        self.bootstrap_timeout
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
