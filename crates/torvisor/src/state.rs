//! Facts discovered from the daemon's log streams.
//!
//! Two reader threads and the controller write to the same record, so every
//! access goes through one mutex. Accessors read a single field each; callers
//! that read several fields must tolerate them coming from different moments.

use std::sync::{Arc, Mutex, MutexGuard};

/// Highest bootstrap percentage the daemon reports.
pub const BOOTSTRAP_COMPLETE: u8 = 100;

#[derive(Debug, Default)]
struct ParserFields {
    socks_port: u16,
    bootstrap_progress: u8,
    ready: bool,
    error_message: Option<String>,
}

/// Clonable handle to the record shared by the stream readers and the controller.
#[derive(Debug, Clone, Default)]
pub struct SharedParserState {
    inner: Arc<Mutex<ParserFields>>,
}

impl SharedParserState {
    /// Creates a record holding the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fields(&self) -> MutexGuard<'_, ParserFields> {
        // A panicking reader cannot leave a field half-written, so the data
        // behind a poisoned lock is still consistent.
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Restores every field to its default in one critical section.
    pub fn reset(&self) {
        *self.fields() = ParserFields::default();
    }

    /// Discovered SOCKS port, `0` while unknown.
    #[must_use]
    pub fn socks_port(&self) -> u16 {
        self.fields().socks_port
    }

    /// Records the listener port. Zero is ignored.
    pub fn set_socks_port(&self, port: u16) {
        if port == 0 {
            return;
        }
        self.fields().socks_port = port;
    }

    /// Latest bootstrap percentage.
    #[must_use]
    pub fn bootstrap_progress(&self) -> u8 {
        self.fields().bootstrap_progress
    }

    /// Records a bootstrap percentage.
    ///
    /// Values above 100 are ignored and progress never moves backwards within
    /// a run. Reaching 100 sets the ready flag, which stays set until
    /// [`reset`](Self::reset). Returns `true` when the stored progress changed.
    pub fn record_progress(&self, progress: u8) -> bool {
        if progress > BOOTSTRAP_COMPLETE {
            return false;
        }
        let mut fields = self.fields();
        if progress >= BOOTSTRAP_COMPLETE {
            fields.ready = true;
        }
        if progress <= fields.bootstrap_progress {
            return false;
        }
        fields.bootstrap_progress = progress;
        true
    }

    /// Whether bootstrap has reported completion during this run.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.fields().ready
    }

    /// First fatal log line captured during this run.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.fields().error_message.clone()
    }

    /// Stores `message` unless an earlier error already claimed the slot.
    ///
    /// Returns `true` when this call recorded the message.
    pub fn record_error(&self, message: impl Into<String>) -> bool {
        let mut fields = self.fields();
        if fields.error_message.is_some() {
            return false;
        }
        fields.error_message = Some(message.into());
        true
    }
}
