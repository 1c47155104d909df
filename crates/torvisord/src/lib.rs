//! Foreground supervisor for the torvisor lifecycle controller.
//!
//! The binary parses its arguments, installs telemetry and signal handlers,
//! then drives one [`DaemonController`] through configure, start and
//! bootstrap. Once the daemon is ready it blocks until SIGTERM, SIGINT,
//! SIGQUIT or SIGHUP arrives and stops the daemon before exiting. Status
//! transitions are reported as health events on a background thread.

mod cli;
mod observer;
mod shutdown;
mod telemetry;

use std::ffi::OsString;
use std::fmt;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error, info};

use torvisor::{ControllerError, DaemonAdapter, DaemonController, ProcessAdapter};

pub use cli::Settings;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

use cli::Cli;
use observer::StatusObserver;

pub(crate) const SUPERVISOR_TARGET: &str = "torvisord::supervisor";

/// Errors that end a supervisor run with a failure exit code.
#[derive(Debug, Error)]
pub enum RunError {
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// Signal handling failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// The controller rejected an operation or the daemon failed.
    #[error("daemon supervision failed: {0}")]
    Controller(#[from] ControllerError),
    /// The status observer thread could not be started.
    #[error("failed to spawn status observer: {source}")]
    Observer {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Runs the supervisor with the provided arguments.
///
/// Usage errors, help output and run failures are written to `stderr`; run
/// failures are also logged.
#[must_use]
pub fn run<I, E>(args: I, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            emit(stderr, format_args!("{}", error.render()));
            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1));
        }
    };
    let settings = cli.into_settings();
    match launch(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(target: SUPERVISOR_TARGET, error = %failure, "supervisor failed");
            emit(stderr, format_args!("torvisord: {failure}\n"));
            ExitCode::FAILURE
        }
    }
}

fn emit<E: Write>(stderr: &mut E, message: fmt::Arguments<'_>) {
    if let Err(error) = stderr.write_fmt(message).and_then(|()| stderr.flush()) {
        debug!(target: SUPERVISOR_TARGET, error = %error, "failed to write to stderr");
    }
}

fn launch(settings: &Settings) -> Result<(), RunError> {
    initialise_telemetry(settings)?;
    let shutdown = SystemShutdownSignal::install()?;
    let controller = DaemonController::new(ProcessAdapter::new(settings.tor_binary()));
    supervise(controller, settings, &shutdown)
}

/// Supervises one daemon run until `shutdown` fires.
///
/// The controller is consumed so that its status stream closes and the
/// observer thread can be joined before returning.
///
/// # Errors
///
/// Returns [`RunError::Controller`] when configure, start or bootstrap fail
/// (the run is stopped first) and [`RunError::Shutdown`] when waiting for
/// the signal fails.
pub fn supervise<A, S>(
    controller: DaemonController<A>,
    settings: &Settings,
    shutdown: &S,
) -> Result<(), RunError>
where
    A: DaemonAdapter,
    S: ShutdownSignal + ?Sized,
{
    let observer = StatusObserver::spawn(controller.subscribe())
        .map_err(|source| RunError::Observer { source })?;
    let result = drive(&controller, settings, shutdown);
    drop(controller);
    let transitions = observer.join();
    debug!(target: SUPERVISOR_TARGET, transitions, "status observer finished");
    result
}

fn drive<A, S>(
    controller: &DaemonController<A>,
    settings: &Settings,
    shutdown: &S,
) -> Result<(), RunError>
where
    A: DaemonAdapter,
    S: ShutdownSignal + ?Sized,
{
    controller.configure(settings.daemon().clone())?;
    let started = controller
        .start()
        .and_then(|()| controller.wait_for_bootstrap(settings.bootstrap_timeout()));
    if let Err(failure) = started {
        controller.stop();
        return Err(failure.into());
    }

    info!(
        target: SUPERVISOR_TARGET,
        socks_port = controller.socks_port().unwrap_or_default(),
        "daemon ready; waiting for a shutdown signal"
    );
    let waited = shutdown.wait();
    controller.stop();
    waited.map_err(RunError::from)
}

#[cfg(test)]
mod tests;
