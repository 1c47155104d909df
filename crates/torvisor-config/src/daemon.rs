//! The configuration snapshot consumed by the lifecycle controller.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::defaults::default_data_directory;
use crate::port::PortMode;

/// Immutable description of how the supervised daemon should run.
///
/// The controller only accepts a replacement snapshot while no run is active,
/// so a value of this type never changes underneath a running daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding the daemon's state. It is wiped on every configure.
    pub data_directory: Utf8PathBuf,
    /// How the SOCKS listener port is chosen.
    pub socks_port: PortMode,
    /// Bridge lines, one per entry point.
    pub bridges: Vec<String>,
    /// Run as a pure client without relay functionality.
    pub client_only: bool,
    /// Ask the daemon to minimise writes to disk.
    pub avoid_disk_writes: bool,
    /// IPv4 GeoIP database.
    pub geoip_file: Option<Utf8PathBuf>,
    /// IPv6 GeoIP database.
    pub geoip6_file: Option<Utf8PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::new(default_data_directory())
    }
}

impl DaemonConfig {
    /// Builds a client-only configuration with an automatically chosen port.
    #[must_use]
    pub fn new(data_directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
            socks_port: PortMode::Auto,
            bridges: Vec::new(),
            client_only: true,
            avoid_disk_writes: false,
            geoip_file: None,
            geoip6_file: None,
        }
    }

    /// Returns the data directory.
    #[must_use]
    pub fn data_directory(&self) -> &Utf8Path {
        &self.data_directory
    }

    /// Sets the SOCKS port mode.
    #[must_use]
    pub const fn with_socks_port(mut self, mode: PortMode) -> Self {
        self.socks_port = mode;
        self
    }

    /// Replaces the bridge list.
    #[must_use]
    pub fn with_bridges<I, S>(mut self, bridges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bridges = bridges.into_iter().map(Into::into).collect();
        self
    }

    /// Toggles client-only operation.
    #[must_use]
    pub const fn with_client_only(mut self, enabled: bool) -> Self {
        self.client_only = enabled;
        self
    }

    /// Toggles disk-write avoidance.
    #[must_use]
    pub const fn with_avoid_disk_writes(mut self, enabled: bool) -> Self {
        self.avoid_disk_writes = enabled;
        self
    }

    /// Sets the GeoIP database paths.
    #[must_use]
    pub fn with_geoip_files(
        mut self,
        ipv4: Option<Utf8PathBuf>,
        ipv6: Option<Utf8PathBuf>,
    ) -> Self {
        self.geoip_file = ipv4;
        self.geoip6_file = ipv6;
        self
    }
}
