//! Boundary to the supervised daemon.
//!
//! The daemon itself is opaque: a blocking call that takes an argument
//! vector, writes log lines to two redirected streams and eventually returns
//! an exit code. [`DaemonAdapter`] captures that contract so the controller
//! can drive an embedded library, a child process or a test double the same
//! way.
//!
//! - [`Invocation`]: everything one run receives
//! - [`LogSink`] / [`LogSource`]: the redirected streams
//! - [`CancellationToken`]: cooperative stop request
//! - [`ProcessAdapter`]: runs the daemon binary as a child process

mod cancel;
mod error;
mod pipe;
mod process;

pub use cancel::CancellationToken;
pub use error::AdapterError;
pub use pipe::{LogSink, LogSource, log_pipe};
pub use process::ProcessAdapter;

/// Inputs for one blocking run of the daemon.
#[derive(Debug)]
pub struct Invocation {
    /// Argument vector, without the program name.
    pub arguments: Vec<String>,
    /// Destination of the daemon's log target.
    pub stdout: LogSink,
    /// Destination of the daemon's error output.
    pub stderr: LogSink,
    /// Set when the controller wants the run to end.
    pub cancel: CancellationToken,
}

/// Blocking execution primitive for the supervised daemon.
pub trait DaemonAdapter: Send + Sync + 'static {
    /// Runs the daemon until it exits or honours cancellation.
    ///
    /// Returns the daemon's exit code. The controller calls this from a
    /// dedicated thread, so blocking for the lifetime of the daemon is
    /// expected.
    fn run(&self, invocation: Invocation) -> Result<i32, AdapterError>;

    /// Whether the daemon can be run again after a previous run ended.
    ///
    /// Embedded daemons that keep global state across invocations must
    /// return `false`; the controller then refuses a second start.
    fn supports_restart(&self) -> bool {
        false
    }
}

impl<T> DaemonAdapter for std::sync::Arc<T>
where
    T: DaemonAdapter,
{
    fn run(&self, invocation: Invocation) -> Result<i32, AdapterError> {
        (**self).run(invocation)
    }

    fn supports_restart(&self) -> bool {
        (**self).supports_restart()
    }
}
