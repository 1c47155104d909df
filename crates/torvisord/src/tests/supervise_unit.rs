//! Supervision flow driven by an in-process adapter.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use torvisor::{
    AdapterError, ControllerError, DaemonAdapter, DaemonController, Invocation, PollSettings,
    StartFailure,
};
use torvisor_config::DaemonConfig;

use crate::{RunError, Settings, ShutdownError, ShutdownSignal, supervise};

const READY_OUTPUT: &str = "[notice] Opened Socks listener connection (ready) on 127.0.0.1:9050\n\
     [notice] Bootstrapped 100% (done): Done\n";

#[derive(Clone)]
struct FakeDaemon {
    output: &'static str,
    exit_immediately: bool,
    cancelled: Arc<AtomicBool>,
}

impl DaemonAdapter for FakeDaemon {
    fn run(&self, invocation: Invocation) -> Result<i32, AdapterError> {
        let Invocation {
            mut stdout, cancel, ..
        } = invocation;
        stdout.write_all(self.output.as_bytes())?;
        if self.exit_immediately {
            return Ok(1);
        }
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(2));
        }
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(0)
    }

    fn supports_restart(&self) -> bool {
        true
    }
}

struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}

struct BrokenShutdown;

impl ShutdownSignal for BrokenShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Err(ShutdownError::Closed)
    }
}

struct Workspace {
    _temp: TempDir,
    settings: Settings,
}

#[fixture]
fn workspace() -> Workspace {
    let temp = TempDir::new().expect("temporary directory");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("UTF-8 path");
    let settings = Settings::new(DaemonConfig::new(root.join("data")))
        .with_bootstrap_timeout(Duration::from_secs(5));
    Workspace {
        _temp: temp,
        settings,
    }
}

fn controller(daemon: &FakeDaemon) -> DaemonController<FakeDaemon> {
    let settings = PollSettings {
        start_interval: Duration::from_millis(5),
        start_attempts: 400,
        bootstrap_interval: Duration::from_millis(5),
        stop_timeout: Duration::from_secs(1),
    };
    DaemonController::with_settings(daemon.clone(), settings)
}

fn daemon(output: &'static str, exit_immediately: bool) -> FakeDaemon {
    FakeDaemon {
        output,
        exit_immediately,
        cancelled: Arc::new(AtomicBool::new(false)),
    }
}

#[rstest]
fn ready_daemon_is_stopped_on_shutdown(workspace: Workspace) {
    let fake = daemon(READY_OUTPUT, false);

    supervise(controller(&fake), &workspace.settings, &ImmediateShutdown)
        .expect("supervision should succeed");

    assert!(fake.cancelled.load(Ordering::SeqCst));
}

#[rstest]
fn early_exit_is_reported(workspace: Workspace) {
    let fake = daemon("", true);

    let error = supervise(controller(&fake), &workspace.settings, &ImmediateShutdown)
        .expect_err("supervision must fail");

    assert!(matches!(
        error,
        RunError::Controller(ControllerError::StartFailed {
            reason: StartFailure::ExitedEarly { code: 1 }
        })
    ));
}

#[rstest]
fn bootstrap_timeout_stops_the_daemon(workspace: Workspace) {
    let fake = daemon(
        "[notice] Opened Socks listener connection (ready) on 127.0.0.1:9050\n",
        false,
    );
    let settings = workspace
        .settings
        .clone()
        .with_bootstrap_timeout(Duration::from_millis(20));

    let error = supervise(controller(&fake), &settings, &ImmediateShutdown)
        .expect_err("supervision must fail");

    assert!(matches!(
        error,
        RunError::Controller(ControllerError::BootstrapTimeout { .. })
    ));
    assert!(fake.cancelled.load(Ordering::SeqCst));
}

#[rstest]
fn shutdown_failure_still_stops_the_daemon(workspace: Workspace) {
    let fake = daemon(READY_OUTPUT, false);

    let error = supervise(controller(&fake), &workspace.settings, &BrokenShutdown)
        .expect_err("supervision must fail");

    assert!(matches!(error, RunError::Shutdown(ShutdownError::Closed)));
    assert!(fake.cancelled.load(Ordering::SeqCst));
}
