//! Line grammar for the daemon's log output.
//!
//! This grammar is the only channel through which the controller learns the
//! daemon's state. Changes to the daemon's log phrasing break discovery.

/// Phrase the daemon logs once a SOCKS listener accepts connections.
pub(crate) const LISTENER_MARKER: &str = "Opened Socks listener";
/// Phrase preceding the bootstrap percentage.
pub(crate) const BOOTSTRAP_MARKER: &str = "Bootstrapped ";
/// Severity tag of error lines.
pub(crate) const ERROR_SEVERITY: &str = "[err]";
/// Severity tag of warning lines.
pub(crate) const WARN_SEVERITY: &str = "[warn]";
/// Warning text reported when the listener address is taken.
pub(crate) const ADDRESS_IN_USE: &str = "Address already in use";

const LOOPBACK_PREFIXES: [&str; 2] = ["127.0.0.1:", "[::1]:"];

/// Which redirected stream a line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// The daemon's log target; carries port, progress and errors.
    Primary,
    /// The daemon's error stream; only fatal lines are recognised.
    Secondary,
}

impl StreamKind {
    /// Short name used in thread names and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "stdout",
            Self::Secondary => "stderr",
        }
    }
}

/// Fact extracted from one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// The SOCKS listener is bound to this port.
    SocksPort(u16),
    /// Bootstrap reached this percentage.
    Progress(u8),
    /// The line reports a condition that ends the run.
    Fatal(String),
}

/// Classifies one complete line, without its terminator.
///
/// On the primary stream the listener and bootstrap patterns are tried first
/// and the first match wins. Both streams then check for fatal lines. Lines
/// matching nothing, and lines whose payload is malformed, yield `None`.
#[must_use]
pub fn classify_line(line: &str, stream: StreamKind) -> Option<LineEvent> {
    if stream == StreamKind::Primary {
        if line.contains(LISTENER_MARKER) {
            return parse_listener_port(line).map(LineEvent::SocksPort);
        }
        if line.contains(BOOTSTRAP_MARKER) {
            return parse_bootstrap_progress(line).map(LineEvent::Progress);
        }
    }
    is_fatal(line).then(|| LineEvent::Fatal(line.to_owned()))
}

fn is_fatal(line: &str) -> bool {
    line.contains(ERROR_SEVERITY) || (line.contains(WARN_SEVERITY) && line.contains(ADDRESS_IN_USE))
}

fn parse_listener_port(line: &str) -> Option<u16> {
    let rest = LOOPBACK_PREFIXES.iter().find_map(|prefix| {
        line.find(prefix)
            .and_then(|index| line.get(index + prefix.len()..))
    })?;
    let digits_end = rest
        .find(|character: char| !character.is_ascii_digit())
        .unwrap_or(rest.len());
    let port = rest.get(..digits_end)?.parse::<u16>().ok()?;
    (port != 0).then_some(port)
}

fn parse_bootstrap_progress(line: &str) -> Option<u8> {
    let start = line.find(BOOTSTRAP_MARKER)? + BOOTSTRAP_MARKER.len();
    let rest = line.get(start..)?;
    let percent = rest.find('%')?;
    let value = rest.get(..percent)?.parse::<u32>().ok()?;
    u8::try_from(value).ok().filter(|progress| *progress <= 100)
}
