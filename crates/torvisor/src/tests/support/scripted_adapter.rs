//! In-process daemon double that replays scripted log output.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::{AdapterError, CancellationToken, DaemonAdapter, Invocation, LogSink};

const CANCEL_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone)]
enum Step {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Pause(Duration),
}

/// What the scripted run does once its output is exhausted.
#[derive(Debug, Clone)]
pub enum Ending {
    /// Block until cancelled, then return exit code 0.
    AwaitCancel,
    /// Return the exit code immediately.
    Exit(i32),
    /// Return an adapter error immediately.
    Fail(&'static str),
    /// Sleep for the duration regardless of cancellation.
    IgnoreCancel(Duration),
}

/// Adapter double whose clones share call records.
#[derive(Debug, Clone)]
pub struct ScriptedAdapter {
    steps: Vec<Step>,
    ending: Ending,
    restartable: bool,
    invocations: Arc<AtomicUsize>,
    returned: Arc<AtomicBool>,
    arguments: Arc<Mutex<Option<Vec<String>>>>,
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAdapter {
    /// Restartable adapter that prints nothing and waits for cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            ending: Ending::AwaitCancel,
            restartable: true,
            invocations: Arc::new(AtomicUsize::new(0)),
            returned: Arc::new(AtomicBool::new(false)),
            arguments: Arc::new(Mutex::new(None)),
        }
    }

    /// Writes `text` to the primary stream as one chunk.
    #[must_use]
    pub fn stdout(mut self, text: &str) -> Self {
        self.steps.push(Step::Stdout(text.as_bytes().to_vec()));
        self
    }

    /// Writes `text` to the secondary stream as one chunk.
    #[must_use]
    pub fn stderr(mut self, text: &str) -> Self {
        self.steps.push(Step::Stderr(text.as_bytes().to_vec()));
        self
    }

    /// Sleeps between steps.
    #[must_use]
    pub fn pause(mut self, millis: u64) -> Self {
        self.steps.push(Step::Pause(Duration::from_millis(millis)));
        self
    }

    /// Sets what happens after the last step.
    #[must_use]
    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    /// Marks the adapter as unable to run twice.
    #[must_use]
    pub fn embedded(mut self) -> Self {
        self.restartable = false;
        self
    }

    /// Number of times `run` has been called.
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Whether the most recent run has returned.
    #[must_use]
    pub fn has_returned(&self) -> bool {
        self.returned.load(Ordering::SeqCst)
    }

    /// Arguments received by the most recent run.
    #[must_use]
    pub fn last_arguments(&self) -> Option<Vec<String>> {
        self.arguments
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    fn play(&self, stdout: &mut LogSink, stderr: &mut LogSink, cancel: &CancellationToken) {
        for step in &self.steps {
            let written = match step {
                Step::Stdout(bytes) => stdout.write_all(bytes),
                Step::Stderr(bytes) => stderr.write_all(bytes),
                Step::Pause(duration) => {
                    sleep_unless_cancelled(*duration, cancel);
                    Ok(())
                }
            };
            if written.is_err() || cancel.is_cancelled() {
                return;
            }
        }
    }
}

impl DaemonAdapter for ScriptedAdapter {
    fn run(&self, invocation: Invocation) -> Result<i32, AdapterError> {
        let Invocation {
            arguments,
            mut stdout,
            mut stderr,
            cancel,
        } = invocation;
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.returned.store(false, Ordering::SeqCst);
        *self
            .arguments
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(arguments);

        self.play(&mut stdout, &mut stderr, &cancel);

        let result = match &self.ending {
            Ending::AwaitCancel => {
                while !cancel.is_cancelled() {
                    thread::sleep(CANCEL_POLL);
                }
                Ok(0)
            }
            Ending::Exit(code) => Ok(*code),
            Ending::Fail(message) => Err(AdapterError::Rejected {
                message: (*message).to_owned(),
            }),
            Ending::IgnoreCancel(duration) => {
                thread::sleep(*duration);
                Ok(0)
            }
        };
        self.returned.store(true, Ordering::SeqCst);
        result
    }

    fn supports_restart(&self) -> bool {
        self.restartable
    }
}

fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline && !cancel.is_cancelled() {
        thread::sleep(CANCEL_POLL);
    }
}
