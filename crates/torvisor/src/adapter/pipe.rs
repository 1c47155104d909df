//! In-memory redirection of the daemon's log streams.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Creates a connected write end and read end.
#[must_use]
pub fn log_pipe() -> (LogSink, LogSource) {
    let (sender, receiver) = mpsc::channel();
    (
        LogSink {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        LogSource { receiver },
    )
}

/// Write end handed to the adapter.
///
/// Clones share one channel. [`close`](Self::close) on any clone ends the
/// stream for the reader and makes further writes fail with `BrokenPipe`,
/// even while the adapter still holds its own clone.
#[derive(Debug, Clone)]
pub struct LogSink {
    sender: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
}

impl LogSink {
    fn sender(&self) -> MutexGuard<'_, Option<Sender<Vec<u8>>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Closes the stream; the reader sees EOF once it drains pending chunks.
    pub fn close(&self) {
        self.sender().take();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let guard = self.sender();
        let Some(sender) = guard.as_ref() else {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        };
        sender
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read end consumed by a stream parser. Yields chunks exactly as written.
#[derive(Debug)]
pub struct LogSource {
    receiver: Receiver<Vec<u8>>,
}

impl Iterator for LogSource {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}
