//! Shared fixtures and a scripted adapter for controller tests.

mod scripted_adapter;

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;
use torvisor_config::DaemonConfig;

use crate::PollSettings;

pub use scripted_adapter::{Ending, ScriptedAdapter};

/// Listener line in the daemon's own phrasing.
pub const LISTENER_LINE: &str =
    "Oct 17 09:14:02.000 [notice] Opened Socks listener connection (ready) on 127.0.0.1:9050\n";

/// Listener line announcing `port`.
#[must_use]
pub fn listener_line(port: u16) -> String {
    format!("Oct 17 09:14:02.000 [notice] Opened Socks listener connection (ready) on 127.0.0.1:{port}\n")
}

/// Poll settings short enough for unit tests.
#[must_use]
pub fn fast_settings() -> PollSettings {
    PollSettings {
        start_interval: Duration::from_millis(5),
        start_attempts: 400,
        bootstrap_interval: Duration::from_millis(10),
        stop_timeout: Duration::from_millis(500),
    }
}

/// Temporary directory holding the daemon's data directory.
pub struct DataDir {
    _temp: TempDir,
    path: Utf8PathBuf,
}

impl DataDir {
    /// Creates a data directory path under a new temporary root.
    #[must_use]
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temporary directory");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .expect("temporary directory should be UTF-8");
        Self {
            _temp: temp,
            path: root.join("daemon-data"),
        }
    }

    /// Configuration pointing at this data directory.
    #[must_use]
    pub fn config(&self) -> DaemonConfig {
        DaemonConfig::new(self.path.clone())
    }

    /// Location of the data directory.
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// Fresh data directory under a temporary root.
#[fixture]
pub fn data_dir() -> DataDir {
    DataDir::new()
}
