use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the daemon chooses its SOCKS listener port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortMode {
    /// Let the daemon pick a free port; the controller discovers it from the
    /// daemon's log output.
    #[default]
    Auto,
    /// Bind the given loopback port.
    Fixed(u16),
}

impl PortMode {
    /// Returns the fixed port, if one was requested.
    #[must_use]
    pub const fn fixed_port(self) -> Option<u16> {
        match self {
            Self::Auto => None,
            Self::Fixed(port) => Some(port),
        }
    }
}

impl fmt::Display for PortMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => formatter.write_str("auto"),
            Self::Fixed(port) => write!(formatter, "{port}"),
        }
    }
}

impl FromStr for PortMode {
    type Err = PortModeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let port = trimmed
            .parse::<u16>()
            .map_err(|source| PortModeParseError::InvalidPort {
                input: input.to_owned(),
                source,
            })?;
        if port == 0 {
            return Err(PortModeParseError::ZeroPort);
        }
        Ok(Self::Fixed(port))
    }
}

impl TryFrom<String> for PortMode {
    type Error = PortModeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortMode> for String {
    fn from(mode: PortMode) -> Self {
        mode.to_string()
    }
}

/// Errors encountered while parsing a [`PortMode`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortModeParseError {
    /// The value was neither `auto` nor a port number.
    #[error("invalid SOCKS port '{input}': {source}")]
    InvalidPort {
        /// Text that failed to parse.
        input: String,
        /// Underlying integer parse error.
        #[source]
        source: ParseIntError,
    },
    /// Port zero was requested explicitly.
    #[error("SOCKS port 0 is not a fixed port; use 'auto' instead")]
    ZeroPort,
}
