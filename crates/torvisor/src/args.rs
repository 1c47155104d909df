//! Maps a configuration snapshot onto the daemon's argument vector.
//!
//! The mapping is pure and order-stable. Options are emitted as
//! `--Name value` pairs in a fixed order so that identical configurations
//! always produce identical vectors.

use torvisor_config::DaemonConfig;

/// Log target sending notice-level output to the primary stream. Port and
/// progress discovery depend on it.
pub const LOG_TARGET: &str = "notice stdout";

/// Circuit timing applied to every run so idle connections are not torn
/// down early: a longer dirtiness window, slower circuit rotation, no
/// adaptive timeout learning and generous build and stream timeouts.
pub const CIRCUIT_TIMING: [(&str, &str); 5] = [
    ("MaxCircuitDirtiness", "1800"),
    ("NewCircuitPeriod", "120"),
    ("LearnCircuitBuildTimeout", "0"),
    ("CircuitBuildTimeout", "60"),
    ("SocksTimeout", "300"),
];

/// Builds the argument vector for one run of the daemon.
#[must_use]
pub fn build_arguments(config: &DaemonConfig) -> Vec<String> {
    let mut args = ArgumentVector::default();
    args.option("DataDirectory", config.data_directory.as_str());
    args.option("SocksPort", config.socks_port.to_string());
    // The log stream is the only status channel; never open a control port.
    args.option("ControlPort", "0");

    if config.client_only {
        args.option("ClientOnly", "1");
        // The daemon rejects ClientOnly while relay ports remain configured.
        args.option("ORPort", "0");
        args.option("DirPort", "0");
    }

    if config.avoid_disk_writes {
        args.option("AvoidDiskWrites", "1");
    }

    if !config.bridges.is_empty() {
        args.option("UseBridges", "1");
        for bridge in &config.bridges {
            args.option("Bridge", bridge.as_str());
        }
    }

    if let Some(path) = &config.geoip_file {
        args.option("GeoIPFile", path.as_str());
    }
    if let Some(path) = &config.geoip6_file {
        args.option("GeoIPv6File", path.as_str());
    }

    args.option("Log", LOG_TARGET);

    for (name, value) in CIRCUIT_TIMING {
        args.option(name, value);
    }

    args.into_inner()
}

#[derive(Debug, Default)]
struct ArgumentVector(Vec<String>);

impl ArgumentVector {
    fn option(&mut self, name: &str, value: impl Into<String>) {
        self.0.push(format!("--{name}"));
        self.0.push(value.into());
    }

    fn into_inner(self) -> Vec<String> {
        self.0
    }
}
