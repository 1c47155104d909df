//! Status values and their multicast to observers.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::info;

use crate::errors::FailureKind;

const STATUS_TARGET: &str = "torvisor::status";

/// Lifecycle position of the supervised daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// No run is active.
    #[default]
    Idle,
    /// A run has been launched and its listener is not yet known.
    Starting,
    /// The SOCKS listener is bound; bootstrap has not made progress yet.
    Connecting,
    /// Bootstrap is under way at the given percentage.
    Bootstrapping(u8),
    /// Bootstrap completed.
    Ready,
    /// A stop is in progress.
    Stopping,
    /// The last operation failed.
    Error(FailureKind),
    /// The daemon cannot be started again in this process.
    Terminated,
}

impl Status {
    /// Whether this status describes an active run.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Connecting | Self::Bootstrapping(_) | Self::Ready
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => formatter.write_str("idle"),
            Self::Starting => formatter.write_str("starting"),
            Self::Connecting => formatter.write_str("connecting"),
            Self::Bootstrapping(progress) => write!(formatter, "bootstrapping ({progress}%)"),
            Self::Ready => formatter.write_str("ready"),
            Self::Stopping => formatter.write_str("stopping"),
            Self::Error(kind) => write!(formatter, "error ({kind})"),
            Self::Terminated => formatter.write_str("terminated"),
        }
    }
}

#[derive(Debug, Default)]
struct BroadcastState {
    current: Status,
    subscribers: Vec<Sender<Status>>,
}

/// Holds the current status and fans every transition out to subscribers.
#[derive(Debug, Default)]
pub struct StatusBroadcaster {
    state: Mutex<BroadcastState>,
}

impl StatusBroadcaster {
    /// Creates a broadcaster in [`Status::Idle`] with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BroadcastState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Latest published status.
    #[must_use]
    pub fn current(&self) -> Status {
        self.state().current
    }

    /// Records `status` and delivers it to every live subscriber.
    ///
    /// Subscribers whose stream has been dropped are forgotten.
    pub fn publish(&self, status: Status) {
        let mut state = self.state();
        let previous = std::mem::replace(&mut state.current, status);
        info!(
            target: STATUS_TARGET,
            from = %previous,
            to = %status,
            "status transition"
        );
        state
            .subscribers
            .retain(|subscriber| subscriber.send(status).is_ok());
    }

    /// Registers a new observer. Earlier transitions are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> StatusStream {
        let (sender, receiver) = mpsc::channel();
        self.state().subscribers.push(sender);
        StatusStream { receiver }
    }

    /// Number of subscribers still attached.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }
}

/// Receiving side of a status subscription.
///
/// Iterating blocks until the next transition and ends when the controller
/// is dropped.
#[derive(Debug)]
pub struct StatusStream {
    receiver: Receiver<Status>,
}

impl StatusStream {
    /// Waits up to `timeout` for the next transition.
    ///
    /// Returns `None` on timeout or once the publisher is gone.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Status> {
        match self.receiver.recv_timeout(timeout) {
            Ok(status) => Some(status),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns the next queued transition without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<Status> {
        match self.receiver.try_recv() {
            Ok(status) => Some(status),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drains every queued transition without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<Status> {
        self.receiver.try_iter().collect()
    }
}

impl Iterator for StatusStream {
    type Item = Status;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}
