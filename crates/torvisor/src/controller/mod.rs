//! Lifecycle controller for the supervised daemon.
//!
//! [`DaemonController`] serialises `configure`, `start` and `stop` behind one
//! mutex so they never interleave. The wait loops poll at fixed intervals
//! instead of spinning, and the read accessors (`status`, `socks_port`,
//! `bootstrap_progress`) never touch that mutex, so observers stay responsive
//! while a start or stop is in flight.
//!
//! The daemon's facts reach the controller only through
//! [`SharedParserState`]: stream readers write it, the controller reads it.

mod run;
mod settings;

use std::fs::{self, DirBuilder};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use tracing::{debug, info, warn};

use torvisor_config::DaemonConfig;

pub use settings::PollSettings;

use crate::adapter::DaemonAdapter;
use crate::args::build_arguments;
use crate::errors::{ControllerError, StartFailure};
use crate::state::{BOOTSTRAP_COMPLETE, SharedParserState};
use crate::status::{Status, StatusBroadcaster, StatusStream};

use run::{RunHandle, RunMonitor};

/// Log target for controller operations.
pub(crate) const CONTROLLER_TARGET: &str = "torvisor::controller";

#[derive(Debug, Default)]
struct ControllerInner {
    config: Option<DaemonConfig>,
    run: Option<RunHandle>,
    adapter_invoked: bool,
}

/// Supervises one daemon through configure, start, bootstrap and stop.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use torvisor::{DaemonController, ProcessAdapter};
/// use torvisor_config::DaemonConfig;
///
/// let controller = DaemonController::new(ProcessAdapter::default());
/// controller.configure(DaemonConfig::new("/var/lib/torvisor"))?;
/// controller.start()?;
/// controller.wait_for_bootstrap(Duration::from_secs(120))?;
/// println!("SOCKS proxy on port {:?}", controller.socks_port());
/// controller.stop();
/// ```
pub struct DaemonController<A: DaemonAdapter> {
    adapter: Arc<A>,
    settings: PollSettings,
    inner: Mutex<ControllerInner>,
    parser_state: SharedParserState,
    status: StatusBroadcaster,
    running: AtomicBool,
}

impl<A: DaemonAdapter> DaemonController<A> {
    /// Creates a controller with the default poll settings.
    #[must_use]
    pub fn new(adapter: A) -> Self {
        Self::with_settings(adapter, PollSettings::default())
    }

    /// Creates a controller with custom poll settings.
    #[must_use]
    pub fn with_settings(adapter: A, settings: PollSettings) -> Self {
        Self {
            adapter: Arc::new(adapter),
            settings,
            inner: Mutex::new(ControllerInner::default()),
            parser_state: SharedParserState::new(),
            status: StatusBroadcaster::new(),
            running: AtomicBool::new(false),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, ControllerInner> {
        // Recover from poisoning so a panicked caller cannot wedge stop().
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Stores a new configuration after recreating its data directory.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::AlreadyRunning`] while a run is active and
    /// [`ControllerError::ConfigurationFailed`] when the directory cannot be
    /// recreated.
    pub fn configure(&self, config: DaemonConfig) -> Result<(), ControllerError> {
        let mut inner = self.lock_inner();
        if inner.run.is_some() {
            return Err(ControllerError::AlreadyRunning);
        }
        prepare_data_directory(config.data_directory())?;
        info!(
            target: CONTROLLER_TARGET,
            data_directory = %config.data_directory(),
            socks_port = %config.socks_port,
            bridges = config.bridges.len(),
            "configuration stored"
        );
        inner.config = Some(config);
        Ok(())
    }

    /// Ensures the daemon is running and its SOCKS listener is bound.
    ///
    /// Returns immediately when a run is already active. Otherwise launches
    /// a fresh run and polls until the listener port appears, the daemon logs
    /// a fatal line, the run thread exits, or the attempt budget runs out.
    /// A failed attempt is torn down before the error is returned.
    ///
    /// # Errors
    ///
    /// [`ControllerError::NotConfigured`] without a prior `configure`,
    /// [`ControllerError::Terminated`] when the adapter cannot run twice and
    /// already has, and [`ControllerError::StartFailed`] otherwise.
    pub fn start(&self) -> Result<(), ControllerError> {
        let mut inner = self.lock_inner();
        if inner.run.is_some() {
            debug!(target: CONTROLLER_TARGET, "start requested while running");
            return Ok(());
        }
        if inner.adapter_invoked && !self.adapter.supports_restart() {
            return Err(ControllerError::Terminated);
        }
        let config = inner
            .config
            .clone()
            .ok_or(ControllerError::NotConfigured)?;

        self.parser_state.reset();
        self.status.publish(Status::Starting);
        let arguments = build_arguments(&config);
        info!(
            target: CONTROLLER_TARGET,
            args = ?arguments,
            budget_ms = u64::try_from(self.settings.start_budget().as_millis()).unwrap_or(u64::MAX),
            "launching daemon"
        );

        let run = match RunHandle::launch(Arc::clone(&self.adapter), arguments, &self.parser_state)
        {
            Ok(run) => run,
            Err(reason) => return Err(self.fail(ControllerError::start_failed(reason))),
        };
        let monitor = Arc::clone(run.monitor());
        inner.run = Some(run);
        inner.adapter_invoked = true;
        self.running.store(true, Ordering::SeqCst);

        match self.await_listener(&monitor) {
            Ok(port) => {
                info!(target: CONTROLLER_TARGET, port, "daemon listener ready");
                self.status.publish(Status::Connecting);
                Ok(())
            }
            Err(reason) => {
                self.teardown(&mut inner);
                let error = self.fail(ControllerError::start_failed(reason));
                if !self.adapter.supports_restart() {
                    self.status.publish(Status::Terminated);
                }
                Err(error)
            }
        }
    }

    fn await_listener(&self, monitor: &RunMonitor) -> Result<u16, StartFailure> {
        let attempts = self.settings.start_attempts;
        for _ in 0..attempts {
            if let Some(message) = self.parser_state.error_message() {
                return Err(StartFailure::ErrorLogged { message });
            }
            if monitor.is_finished() {
                return Err(monitor.take_failure());
            }
            let port = self.parser_state.socks_port();
            if port != 0 {
                return Ok(port);
            }
            thread::sleep(self.settings.start_interval);
        }
        Err(StartFailure::PortNotDiscovered { attempts })
    }

    /// Stops the active run, if any.
    ///
    /// Closes both log streams, requests cancellation and waits up to the
    /// configured bound. A run thread that ignores cancellation is abandoned
    /// and the controller reports itself stopped anyway. Calling this while
    /// stopped does nothing.
    pub fn stop(&self) {
        let mut inner = self.lock_inner();
        if inner.run.is_none() {
            debug!(target: CONTROLLER_TARGET, "stop requested while stopped");
            return;
        }
        self.status.publish(Status::Stopping);
        self.teardown(&mut inner);
        let next = if self.adapter.supports_restart() {
            Status::Idle
        } else {
            Status::Terminated
        };
        self.status.publish(next);
    }

    fn teardown(&self, inner: &mut ControllerInner) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(run) = inner.run.take() {
            let exited = run.shutdown(self.settings.stop_timeout, self.settings.start_interval);
            info!(target: CONTROLLER_TARGET, exited, "daemon run torn down");
        }
    }

    /// Waits until bootstrap reaches 100%.
    ///
    /// Emits [`Status::Bootstrapping`] whenever progress advances and
    /// [`Status::Ready`] on completion. The run is left in place on failure;
    /// call [`stop`](Self::stop) to discard it.
    ///
    /// A `timeout` too large to add to the current instant, such as
    /// [`Duration::MAX`], waits without a deadline. A concurrent `stop`
    /// ends the wait with [`ControllerError::NotRunning`].
    ///
    /// # Errors
    ///
    /// [`ControllerError::NotRunning`] when no run is active,
    /// [`ControllerError::StartFailed`] when the daemon logs a fatal line or
    /// exits, and [`ControllerError::BootstrapTimeout`] when `timeout`
    /// elapses first.
    pub fn wait_for_bootstrap(&self, timeout: Duration) -> Result<(), ControllerError> {
        let monitor = self
            .lock_inner()
            .run
            .as_ref()
            .map(|run| Arc::clone(run.monitor()))
            .ok_or(ControllerError::NotRunning)?;
        // `None` when the timeout is too large to represent: wait indefinitely.
        let deadline = Instant::now().checked_add(timeout);
        let mut reported = 0;

        loop {
            if !self.is_running() {
                return Err(ControllerError::NotRunning);
            }
            let progress = self.parser_state.bootstrap_progress();
            if self.parser_state.is_ready() || progress >= BOOTSTRAP_COMPLETE {
                if self.status.current() != Status::Ready {
                    self.status.publish(Status::Ready);
                }
                return Ok(());
            }
            if let Some(message) = self.parser_state.error_message() {
                let reason = StartFailure::ErrorLogged { message };
                return Err(self.fail(ControllerError::start_failed(reason)));
            }
            if monitor.is_finished() {
                // A concurrent stop cancels the run after clearing `running`.
                if !self.is_running() {
                    return Err(ControllerError::NotRunning);
                }
                let reason = monitor.take_failure();
                return Err(self.fail(ControllerError::start_failed(reason)));
            }
            if progress > reported {
                reported = progress;
                self.status.publish(Status::Bootstrapping(progress));
            }
            let pause = match deadline {
                Some(limit) => {
                    let now = Instant::now();
                    if now >= limit {
                        return Err(self.fail(ControllerError::BootstrapTimeout { timeout }));
                    }
                    self.settings.bootstrap_interval.min(limit - now)
                }
                None => self.settings.bootstrap_interval,
            };
            thread::sleep(pause);
        }
    }

    fn fail(&self, error: ControllerError) -> ControllerError {
        warn!(
            target: CONTROLLER_TARGET,
            error = %error,
            kind = %error.kind(),
            "daemon operation failed"
        );
        self.status.publish(Status::Error(error.kind()));
        error
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status.current()
    }

    /// Subscribes to every later status transition.
    #[must_use]
    pub fn subscribe(&self) -> StatusStream {
        self.status.subscribe()
    }

    /// Whether a run is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Discovered SOCKS port of the active run.
    #[must_use]
    pub fn socks_port(&self) -> Option<u16> {
        if !self.is_running() {
            return None;
        }
        Some(self.parser_state.socks_port()).filter(|port| *port != 0)
    }

    /// Bootstrap percentage of the active run, `None` when stopped.
    #[must_use]
    pub fn bootstrap_progress(&self) -> Option<u8> {
        self.is_running()
            .then(|| self.parser_state.bootstrap_progress())
    }

    /// First fatal log line captured during the current or last run.
    #[must_use]
    pub fn last_error_message(&self) -> Option<String> {
        self.parser_state.error_message()
    }

    /// Configuration that the next start will use.
    #[must_use]
    pub fn configuration(&self) -> Option<DaemonConfig> {
        self.lock_inner().config.clone()
    }
}

impl<A: DaemonAdapter> Drop for DaemonController<A> {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poison| poison.into_inner());
        if let Some(run) = inner.run.take() {
            warn!(
                target: CONTROLLER_TARGET,
                "controller dropped with an active run; cancelling without waiting"
            );
            run.request_stop();
        }
    }
}

impl<A: DaemonAdapter> std::fmt::Debug for DaemonController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonController")
            .field("status", &self.status.current())
            .field("running", &self.is_running())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Deletes and recreates `path` with owner-only permissions.
fn prepare_data_directory(path: &Utf8Path) -> Result<(), ControllerError> {
    let failed = |source: io::Error| ControllerError::ConfigurationFailed {
        path: path.to_path_buf(),
        source,
    };
    if path.parent().is_none() || path.as_str().is_empty() {
        return Err(failed(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to recreate a filesystem root",
        )));
    }

    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(target: CONTROLLER_TARGET, path = %path, "removed previous data directory");
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(failed(error)),
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path.as_std_path()).map_err(failed)
}
