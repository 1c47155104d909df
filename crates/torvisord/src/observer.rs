//! Background thread reporting controller status as health events.

use std::io;
use std::thread::{self, JoinHandle};

use torvisor::{Status, StatusStream};
use tracing::{info, warn};

const HEALTH_TARGET: &str = "torvisord::health";

/// Logs every status transition until the controller goes away.
#[derive(Debug)]
pub(crate) struct StatusObserver {
    thread: JoinHandle<usize>,
}

impl StatusObserver {
    /// Starts observing `stream` on a named thread.
    pub(crate) fn spawn(stream: StatusStream) -> io::Result<Self> {
        let thread = thread::Builder::new()
            .name("torvisord-status".to_owned())
            .spawn(move || {
                let mut seen = 0;
                for status in stream {
                    report(status);
                    seen += 1;
                }
                seen
            })?;
        Ok(Self { thread })
    }

    /// Waits for the stream to end and returns how many transitions it saw.
    ///
    /// Only returns once every controller owning the stream has been dropped.
    pub(crate) fn join(self) -> usize {
        self.thread.join().unwrap_or_else(|_| {
            warn!(target: HEALTH_TARGET, "status observer panicked");
            0
        })
    }
}

fn report(status: Status) {
    match status {
        Status::Ready => info!(target: HEALTH_TARGET, event = "ready", "daemon bootstrapped"),
        Status::Error(kind) => warn!(
            target: HEALTH_TARGET,
            event = "failed",
            kind = kind.as_str(),
            "daemon operation failed"
        ),
        Status::Terminated => warn!(
            target: HEALTH_TARGET,
            event = "terminated",
            "daemon cannot be restarted in this process"
        ),
        other => info!(target: HEALTH_TARGET, event = "status", status = %other, "daemon status"),
    }
}
