//! Behaviour-driven tests for the daemon lifecycle.

use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::tests::support::{DataDir, ScriptedAdapter, fast_settings, listener_line};
use crate::{ControllerError, DaemonController, StartFailure, StatusStream};

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

struct LifecycleWorld {
    data_dir: DataDir,
    controller: Option<DaemonController<ScriptedAdapter>>,
    events: Option<StatusStream>,
    start_result: Option<Result<(), ControllerError>>,
    bootstrap_result: Option<Result<(), ControllerError>>,
    configure_result: Option<Result<(), ControllerError>>,
}

#[fixture]
fn world() -> LifecycleWorld {
    LifecycleWorld {
        data_dir: DataDir::new(),
        controller: None,
        events: None,
        start_result: None,
        bootstrap_result: None,
        configure_result: None,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl LifecycleWorld {
    fn install(&mut self, adapter: ScriptedAdapter) {
        let controller = DaemonController::with_settings(adapter, fast_settings());
        controller
            .configure(self.data_dir.config())
            .expect("configure should succeed");
        self.events = Some(controller.subscribe());
        self.controller = Some(controller);
    }

    fn controller(&self) -> &DaemonController<ScriptedAdapter> {
        self.controller.as_ref().expect("controller not installed")
    }

    fn published(&self) -> Vec<String> {
        self.events
            .as_ref()
            .expect("no subscription")
            .drain()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("a configured controller whose daemon listens on port {port}")]
fn given_listening_daemon(world: &mut LifecycleWorld, port: u16) {
    world.install(ScriptedAdapter::new().stdout(&listener_line(port)));
}

#[given("a configured controller whose embedded daemon listens on port {port}")]
fn given_embedded_daemon(world: &mut LifecycleWorld, port: u16) {
    world.install(
        ScriptedAdapter::new()
            .stdout(&listener_line(port))
            .embedded(),
    );
}

#[given("a configured controller whose daemon completes bootstrap")]
fn given_bootstrapping_daemon(world: &mut LifecycleWorld) {
    world.install(
        ScriptedAdapter::new()
            .stdout(&listener_line(9050))
            .pause(150)
            .stdout("[notice] Bootstrapped 50% (loading_descriptors): Loading relay descriptors\n")
            .pause(150)
            .stdout("[notice] Bootstrapped 100% (done): Done\n"),
    );
}

#[given("a configured controller whose daemon logs a fatal error")]
fn given_failing_daemon(world: &mut LifecycleWorld) {
    world.install(ScriptedAdapter::new().stdout("[err] Could not open data directory\n"));
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the controller is started")]
fn when_started(world: &mut LifecycleWorld) {
    world.start_result = Some(world.controller().start());
}

#[when("bootstrap is awaited")]
fn when_bootstrap_awaited(world: &mut LifecycleWorld) {
    world.bootstrap_result = Some(world.controller().wait_for_bootstrap(Duration::from_secs(5)));
}

#[when("the controller is reconfigured")]
fn when_reconfigured(world: &mut LifecycleWorld) {
    let config = world.data_dir.config().with_avoid_disk_writes(true);
    world.configure_result = Some(world.controller().configure(config));
}

#[when("the controller is stopped")]
fn when_stopped(world: &mut LifecycleWorld) {
    world.controller().stop();
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the start succeeds")]
fn then_start_succeeds(world: &mut LifecycleWorld) {
    let result = world.start_result.as_ref().expect("start not attempted");
    assert!(result.is_ok(), "start failed: {result:?}");
}

#[then("the discovered SOCKS port is {port}")]
fn then_socks_port(world: &mut LifecycleWorld, port: u16) {
    assert_eq!(world.controller().socks_port(), Some(port));
}

#[then("the status is {status}")]
fn then_status(world: &mut LifecycleWorld, status: String) {
    assert_eq!(world.controller().status().to_string(), status);
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &mut LifecycleWorld) {
    let result = world
        .bootstrap_result
        .as_ref()
        .expect("bootstrap not awaited");
    assert!(result.is_ok(), "bootstrap failed: {result:?}");
}

#[then("the published statuses were {statuses}")]
fn then_published(world: &mut LifecycleWorld, statuses: String) {
    let expected: Vec<_> = statuses.split(", ").map(str::to_owned).collect();
    assert_eq!(world.published(), expected);
}

#[then("the start fails with the logged error")]
fn then_start_fails_with_logged_error(world: &mut LifecycleWorld) {
    let result = world.start_result.take().expect("start not attempted");
    match result {
        Err(ControllerError::StartFailed {
            reason: StartFailure::ErrorLogged { message },
        }) => assert!(message.contains("Could not open data directory")),
        other => panic!("expected a logged error, got {other:?}"),
    }
}

#[then("the controller is not running")]
fn then_not_running(world: &mut LifecycleWorld) {
    assert!(!world.controller().is_running());
    assert_eq!(world.controller().socks_port(), None);
}

#[then("reconfiguration is rejected as already running")]
fn then_reconfigure_rejected(world: &mut LifecycleWorld) {
    let result = world.configure_result.take().expect("configure not attempted");
    assert!(matches!(result, Err(ControllerError::AlreadyRunning)));
}

#[then("no status transitions were published")]
fn then_no_transitions(world: &mut LifecycleWorld) {
    assert!(world.published().is_empty());
}

#[then("a further start is refused as terminated")]
fn then_restart_refused(world: &mut LifecycleWorld) {
    let result = world.controller().start();
    assert!(matches!(result, Err(ControllerError::Terminated)));
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/controller_lifecycle.feature",
    name = "Starting discovers the SOCKS listener port"
)]
fn port_discovery(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/controller_lifecycle.feature",
    name = "Bootstrap completes and the controller becomes ready"
)]
fn bootstrap_completion(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/controller_lifecycle.feature",
    name = "A fatal log line fails the start"
)]
fn fatal_line_fails_start(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/controller_lifecycle.feature",
    name = "Reconfiguring a running daemon is rejected"
)]
fn reconfigure_rejected(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/controller_lifecycle.feature",
    name = "Stopping an idle controller does nothing"
)]
fn idle_stop(world: LifecycleWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/controller_lifecycle.feature",
    name = "An embedded daemon cannot be started twice"
)]
fn embedded_terminated(world: LifecycleWorld) {
    let _ = world;
}
