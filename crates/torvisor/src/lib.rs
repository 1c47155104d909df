//! Lifecycle and status controller for a supervised anonymity daemon.
//!
//! The daemon is an opaque, blocking collaborator: it is launched with an
//! argument vector, writes log lines and eventually returns an exit code. It
//! picks its SOCKS port at runtime and reports bootstrap progress only in its
//! logs, so this crate discovers both by scanning the log output.
//!
//! The pieces, leaves first:
//!
//! - [`SharedParserState`]: the one record shared across threads
//! - [`StreamParser`]: reassembles chunked log bytes into lines and applies
//!   the line grammar
//! - [`build_arguments`]: pure mapping from [`DaemonConfig`] to arguments
//! - [`DaemonController`]: serialised configure/start/stop, bounded polling
//!   and [`Status`] transitions
//! - [`DaemonAdapter`]: the blocking collaborator, with [`ProcessAdapter`]
//!   as the child-process implementation
//!
//! A controller supervises at most one run at a time. Adapters that cannot
//! be re-invoked in the same process report it through
//! [`DaemonAdapter::supports_restart`]; the controller then ends in
//! [`Status::Terminated`] and refuses further starts.
//!
//! [`DaemonConfig`]: torvisor_config::DaemonConfig

mod adapter;
mod args;
mod controller;
mod errors;
mod parser;
mod state;
mod status;

pub use adapter::{
    AdapterError, CancellationToken, DaemonAdapter, Invocation, LogSink, LogSource,
    ProcessAdapter, log_pipe,
};
pub use args::{CIRCUIT_TIMING, LOG_TARGET, build_arguments};
pub use controller::{DaemonController, PollSettings};
pub use errors::{ControllerError, FailureKind, StartFailure};
pub use parser::{LineAssembler, LineEvent, StreamKind, StreamParser, classify_line};
pub use state::{BOOTSTRAP_COMPLETE, SharedParserState};
pub use status::{Status, StatusBroadcaster, StatusStream};

#[cfg(test)]
mod tests;
