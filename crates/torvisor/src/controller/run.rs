//! One attempt at running the daemon: its thread, readers and stream ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::adapter::{
    AdapterError, CancellationToken, DaemonAdapter, Invocation, LogSink, LogSource, log_pipe,
};
use crate::errors::StartFailure;
use crate::parser::{StreamKind, StreamParser};
use crate::state::SharedParserState;

use super::CONTROLLER_TARGET;

#[derive(Debug)]
enum RunOutcome {
    Exited(i32),
    AdapterFailed(AdapterError),
    Lost,
}

/// Records when and how the run thread ended.
#[derive(Debug, Default)]
pub(crate) struct RunMonitor {
    finished: AtomicBool,
    outcome: Mutex<Option<RunOutcome>>,
}

impl RunMonitor {
    fn finish(&self, outcome: RunOutcome) {
        *self
            .outcome
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(outcome);
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Whether the run thread has returned or unwound.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Converts the recorded outcome into a start failure.
    ///
    /// The outcome can be taken once; later calls report a lost run thread.
    pub(crate) fn take_failure(&self) -> StartFailure {
        let outcome = self
            .outcome
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        match outcome {
            Some(RunOutcome::Exited(code)) => StartFailure::ExitedEarly { code },
            Some(RunOutcome::AdapterFailed(source)) => StartFailure::Adapter { source },
            Some(RunOutcome::Lost) | None => StartFailure::RunThreadLost,
        }
    }
}

/// Marks the run finished even when the adapter panics.
struct CompletionGuard {
    monitor: Arc<RunMonitor>,
    completed: bool,
}

impl CompletionGuard {
    fn complete(mut self, result: Result<i32, AdapterError>) {
        let outcome = match result {
            Ok(code) => RunOutcome::Exited(code),
            Err(error) => RunOutcome::AdapterFailed(error),
        };
        self.monitor.finish(outcome);
        self.completed = true;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.monitor.finish(RunOutcome::Lost);
        }
    }
}

/// Live resources of one run. Never reused after [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub(crate) struct RunHandle {
    run_thread: JoinHandle<()>,
    readers: Vec<JoinHandle<()>>,
    sinks: [LogSink; 2],
    cancel: CancellationToken,
    monitor: Arc<RunMonitor>,
}

impl RunHandle {
    /// Starts both stream readers, then the run thread.
    ///
    /// The caller must have reset `state` already; readers are the only
    /// writers once this returns.
    pub(crate) fn launch<A>(
        adapter: Arc<A>,
        arguments: Vec<String>,
        state: &SharedParserState,
    ) -> Result<Self, StartFailure>
    where
        A: DaemonAdapter,
    {
        let (stdout, stdout_source) = log_pipe();
        let (stderr, stderr_source) = log_pipe();
        let sinks = [stdout.clone(), stderr.clone()];
        let close_sinks = |sinks: &[LogSink; 2]| sinks.iter().for_each(LogSink::close);

        let mut readers = Vec::with_capacity(2);
        for (kind, source) in [
            (StreamKind::Primary, stdout_source),
            (StreamKind::Secondary, stderr_source),
        ] {
            match spawn_reader(kind, source, state.clone()) {
                Ok(reader) => readers.push(reader),
                Err(failure) => {
                    close_sinks(&sinks);
                    return Err(failure);
                }
            }
        }

        let cancel = CancellationToken::new();
        let monitor = Arc::new(RunMonitor::default());
        let invocation = Invocation {
            arguments,
            stdout,
            stderr,
            cancel: cancel.clone(),
        };
        let guard = CompletionGuard {
            monitor: Arc::clone(&monitor),
            completed: false,
        };
        let run_thread = thread::Builder::new()
            .name("torvisor-run".to_owned())
            .spawn(move || {
                let result = adapter.run(invocation);
                debug!(target: CONTROLLER_TARGET, ?result, "daemon run returned");
                guard.complete(result);
            })
            .map_err(|source| {
                close_sinks(&sinks);
                StartFailure::Spawn {
                    thread: "run",
                    source,
                }
            })?;

        Ok(Self {
            run_thread,
            readers,
            sinks,
            cancel,
            monitor,
        })
    }

    pub(crate) fn monitor(&self) -> &Arc<RunMonitor> {
        &self.monitor
    }

    /// Forces EOF on both readers and asks the run to end, without waiting.
    pub(crate) fn request_stop(&self) {
        for sink in &self.sinks {
            sink.close();
        }
        self.cancel.cancel();
    }

    /// Requests a stop and waits up to `bound` for the run thread.
    ///
    /// Returns `false` when the run thread was abandoned still running.
    pub(crate) fn shutdown(self, bound: Duration, interval: Duration) -> bool {
        self.request_stop();
        let deadline = Instant::now().checked_add(bound);
        while !self.monitor.is_finished() {
            let pause = match deadline {
                Some(limit) => {
                    let now = Instant::now();
                    if now >= limit {
                        break;
                    }
                    interval.min(limit - now)
                }
                None => interval,
            };
            thread::sleep(pause);
        }

        let Self {
            run_thread,
            readers,
            monitor,
            ..
        } = self;

        for reader in readers {
            if reader.join().is_err() {
                warn!(target: CONTROLLER_TARGET, "log reader panicked");
            }
        }

        if !monitor.is_finished() {
            warn!(
                target: CONTROLLER_TARGET,
                bound_ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
                "daemon did not honour cancellation; abandoning run thread"
            );
            return false;
        }
        if run_thread.join().is_err() {
            warn!(target: CONTROLLER_TARGET, "daemon run thread panicked");
        }
        true
    }
}

fn spawn_reader(
    kind: StreamKind,
    source: LogSource,
    state: SharedParserState,
) -> Result<JoinHandle<()>, StartFailure> {
    thread::Builder::new()
        .name(format!("torvisor-{}", kind.as_str()))
        .spawn(move || StreamParser::new(kind, state).consume(source))
        .map_err(|source| StartFailure::Spawn {
            thread: "log reader",
            source,
        })
}
