//! Configuration types shared by the torvisor controller and its binary.
//!
//! A [`DaemonConfig`] is the immutable snapshot handed to the lifecycle
//! controller: where the supervised daemon keeps its state, how its SOCKS
//! listener port is chosen, which bridges to use and a handful of behaviour
//! switches. Logging settings for the binaries live alongside it so that the
//! CLI and any embedding application agree on their string forms.

mod daemon;
mod defaults;
mod logging;
mod port;

pub use daemon::DaemonConfig;
pub use defaults::{
    DEFAULT_BOOTSTRAP_TIMEOUT_SECS, DEFAULT_DAEMON_BINARY, DEFAULT_LOG_FILTER,
    default_data_directory, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use port::{PortMode, PortModeParseError};
