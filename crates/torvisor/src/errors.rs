//! Error taxonomy for the lifecycle controller.

use std::fmt;
use std::io;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::adapter::AdapterError;

/// Errors surfaced by [`DaemonController`](crate::DaemonController) operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Preparing the data directory failed.
    #[error("failed to prepare data directory '{path}': {source}")]
    ConfigurationFailed {
        /// Directory that could not be recreated.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },
    /// `start` was called before any configuration was stored.
    #[error("no configuration has been supplied")]
    NotConfigured,
    /// The daemon did not reach a usable state.
    #[error("daemon failed to start: {reason}")]
    StartFailed {
        /// Why the attempt was abandoned.
        reason: StartFailure,
    },
    /// The operation requires the daemon to be stopped.
    #[error("daemon is already running")]
    AlreadyRunning,
    /// The operation requires a running daemon.
    #[error("daemon is not running")]
    NotRunning,
    /// Bootstrap did not complete within the caller's budget.
    #[error("bootstrap did not complete within {}ms", .timeout.as_millis())]
    BootstrapTimeout {
        /// Budget that elapsed.
        timeout: Duration,
    },
    /// The daemon lost its network connection.
    #[error("daemon connection failed")]
    ConnectionFailed,
    /// The daemon could not be shut down.
    #[error("daemon shutdown failed")]
    ShutdownFailed,
    /// Reserved: the control channel is permanently disabled.
    #[error("control socket unavailable")]
    ControlSocketFailed,
    /// The adapter cannot run the daemon again in this process.
    #[error("daemon cannot be restarted in this process")]
    Terminated,
}

impl ControllerError {
    /// Returns the copyable discriminant used in [`Status::Error`](crate::Status::Error).
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::ConfigurationFailed { .. } | Self::NotConfigured => {
                FailureKind::ConfigurationFailed
            }
            Self::StartFailed { .. } => FailureKind::StartFailed,
            Self::AlreadyRunning => FailureKind::AlreadyRunning,
            Self::NotRunning => FailureKind::NotRunning,
            Self::BootstrapTimeout { .. } => FailureKind::BootstrapTimeout,
            Self::ConnectionFailed => FailureKind::ConnectionFailed,
            Self::ShutdownFailed => FailureKind::ShutdownFailed,
            Self::ControlSocketFailed => FailureKind::ControlSocketFailed,
            Self::Terminated => FailureKind::Terminated,
        }
    }

    pub(crate) fn start_failed(reason: StartFailure) -> Self {
        Self::StartFailed { reason }
    }
}

/// Reasons a start or bootstrap wait gave up.
#[derive(Debug, Error)]
pub enum StartFailure {
    /// The daemon logged a fatal line.
    #[error("daemon reported an error: {message}")]
    ErrorLogged {
        /// First fatal line captured during the run.
        message: String,
    },
    /// The run thread returned before the daemon became usable.
    #[error("daemon exited early with code {code}")]
    ExitedEarly {
        /// Exit code returned by the adapter.
        code: i32,
    },
    /// The adapter failed to launch the daemon at all.
    #[error("adapter failed: {source}")]
    Adapter {
        /// Underlying adapter error.
        #[source]
        source: AdapterError,
    },
    /// The run thread ended without reporting an outcome.
    #[error("daemon run thread terminated abnormally")]
    RunThreadLost,
    /// No listener port appeared in the log within the polling budget.
    #[error("no SOCKS listener reported after {attempts} polls")]
    PortNotDiscovered {
        /// Number of polls performed.
        attempts: u32,
    },
    /// The run thread could not be spawned.
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        /// Name of the thread that failed to spawn.
        thread: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Copyable summary of a [`ControllerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// See [`ControllerError::ConfigurationFailed`].
    ConfigurationFailed,
    /// See [`ControllerError::StartFailed`].
    StartFailed,
    /// See [`ControllerError::AlreadyRunning`].
    AlreadyRunning,
    /// See [`ControllerError::NotRunning`].
    NotRunning,
    /// See [`ControllerError::BootstrapTimeout`].
    BootstrapTimeout,
    /// See [`ControllerError::ConnectionFailed`].
    ConnectionFailed,
    /// See [`ControllerError::ShutdownFailed`].
    ShutdownFailed,
    /// See [`ControllerError::ControlSocketFailed`].
    ControlSocketFailed,
    /// See [`ControllerError::Terminated`].
    Terminated,
}

impl FailureKind {
    /// Stable snake-case name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationFailed => "configuration_failed",
            Self::StartFailed => "start_failed",
            Self::AlreadyRunning => "already_running",
            Self::NotRunning => "not_running",
            Self::BootstrapTimeout => "bootstrap_timeout",
            Self::ConnectionFailed => "connection_failed",
            Self::ShutdownFailed => "shutdown_failed",
            Self::ControlSocketFailed => "control_socket_failed",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
