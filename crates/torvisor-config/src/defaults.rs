//! Fallback values for daemon and logging settings.

use camino::Utf8PathBuf;

/// Log filter applied when neither the CLI nor `RUST_LOG` provide one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Executable launched by the process adapter when none is configured.
pub const DEFAULT_DAEMON_BINARY: &str = "tor";

/// Seconds the supervisor waits for bootstrap to reach 100%.
pub const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 120;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Directory the daemon uses for its state when none is configured.
///
/// Prefers the platform data directory and falls back to the temporary
/// directory when that is unavailable or not valid UTF-8.
#[must_use]
pub fn default_data_directory() -> Utf8PathBuf {
    let mut base = data_base_directory().unwrap_or_else(fallback_base_directory);
    base.push("torvisor");
    base.push("data");
    base
}

#[cfg(unix)]
fn data_base_directory() -> Option<Utf8PathBuf> {
    dirs::data_local_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn data_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
