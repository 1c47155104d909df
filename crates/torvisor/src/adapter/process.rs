//! Adapter that runs the daemon binary as a child process.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use torvisor_config::DEFAULT_DAEMON_BINARY;

use super::{AdapterError, DaemonAdapter, Invocation, LogSink};

/// Log target for adapter operations.
const ADAPTER_TARGET: &str = "torvisor::adapter";

/// Interval between exit and cancellation checks.
const WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// Time the child gets to exit after a termination request before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Runs the daemon as a child process and pumps its output into the sinks.
///
/// Each run spawns a fresh process, so unlike an in-process embedding this
/// adapter can be started again after a stop.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    command: PathBuf,
    working_dir: Option<PathBuf>,
}

impl Default for ProcessAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_DAEMON_BINARY)
    }
}

impl ProcessAdapter {
    /// Creates an adapter that launches `command`.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
        }
    }

    /// Sets the working directory of the spawned process.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn spawn(&self, arguments: &[String]) -> Result<Child, AdapterError> {
        debug!(
            target: ADAPTER_TARGET,
            command = %self.command.display(),
            args = ?arguments,
            "spawning daemon process"
        );

        let mut command = Command::new(&self.command);
        command
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                AdapterError::BinaryNotFound {
                    command: self.command.display().to_string(),
                    source,
                }
            } else {
                AdapterError::SpawnFailed {
                    message: format!("failed to start {}", self.command.display()),
                    source,
                }
            }
        })
    }
}

impl DaemonAdapter for ProcessAdapter {
    fn run(&self, invocation: Invocation) -> Result<i32, AdapterError> {
        let Invocation {
            arguments,
            stdout,
            stderr,
            cancel,
        } = invocation;

        let mut child = self.spawn(&arguments)?;
        debug!(
            target: ADAPTER_TARGET,
            pid = child.id(),
            "daemon process spawned"
        );

        let pumps = [
            child.stdout.take().map(|pipe| spawn_pump("stdout", pipe, stdout)),
            child.stderr.take().map(|pipe| spawn_pump("stderr", pipe, stderr)),
        ];

        let code = loop {
            if let Some(status) = child.try_wait()? {
                debug!(target: ADAPTER_TARGET, ?status, "daemon process exited");
                break exit_code(status);
            }
            if cancel.is_cancelled() {
                break terminate_child(&mut child)?;
            }
            thread::sleep(WAIT_INTERVAL);
        };

        for pump in pumps.into_iter().flatten() {
            if pump.join().is_err() {
                warn!(target: ADAPTER_TARGET, "output pump panicked");
            }
        }
        Ok(code)
    }

    fn supports_restart(&self) -> bool {
        true
    }
}

fn spawn_pump<R>(name: &'static str, mut pipe: R, mut sink: LogSink) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        // BrokenPipe means the controller closed the sink; the child's
        // remaining output is no longer wanted.
        if let Err(error) = io::copy(&mut pipe, &mut sink)
            && error.kind() != io::ErrorKind::BrokenPipe
        {
            warn!(
                target: ADAPTER_TARGET,
                stream = name,
                error = %error,
                "failed to forward daemon output"
            );
        }
    })
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Asks the child to exit, then kills it once the grace period lapses.
fn terminate_child(child: &mut Child) -> Result<i32, AdapterError> {
    request_termination(child);
    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            debug!(
                target: ADAPTER_TARGET,
                ?status,
                "daemon exited during grace period"
            );
            return Ok(exit_code(status));
        }
        thread::sleep(WAIT_INTERVAL);
    }
    warn!(
        target: ADAPTER_TARGET,
        pid = child.id(),
        "daemon did not exit gracefully, killing"
    );
    if let Err(error) = child.kill() {
        warn!(target: ADAPTER_TARGET, error = %error, "failed to kill daemon process");
    }
    Ok(exit_code(child.wait()?))
}

#[cfg(unix)]
fn request_termination(child: &Child) {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: `pid` names a child we spawned and have not yet reaped.
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        warn!(
            target: ADAPTER_TARGET,
            pid,
            error = %io::Error::last_os_error(),
            "failed to signal daemon process"
        );
    }
}

#[cfg(not(unix))]
fn request_termination(_child: &Child) {}
