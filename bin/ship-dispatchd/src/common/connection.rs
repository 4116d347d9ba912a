use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ship_dispatch::{ConnectionEndpoint, Name, NameError};

/// Host handlers connect to when no connection is given for them.
pub const DEFAULT_SHIP_HOST: &str = "127.0.0.1";

/// Port handlers connect to when no connection is given for them.
pub const DEFAULT_SHIP_PORT: &str = "8080";

/// A handler's state-history endpoint.
///
/// Written `NAME=HOST:PORT` on the command line and `{"name", "host", "port"}` in configuration
/// files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// The handler the endpoint is registered for.
    pub name: Name,
    /// The endpoint.
    #[serde(flatten)]
    pub endpoint: ConnectionEndpoint,
}

impl ConnectionConfig {
    /// The endpoint used for `name` when nothing else is configured.
    pub fn default_for(name: Name) -> Self {
        Self { name, endpoint: ConnectionEndpoint::new(DEFAULT_SHIP_HOST, DEFAULT_SHIP_PORT) }
    }
}

/// Errors parsing a `NAME=HOST:PORT` connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionParseError {
    /// The `NAME=` part is missing.
    #[error("expected NAME=HOST:PORT, got {0:?}")]
    MissingName(String),
    /// The `:PORT` part is missing or empty.
    #[error("missing port in {0:?}")]
    MissingPort(String),
    /// The handler name is not a valid name.
    #[error(transparent)]
    InvalidName(#[from] NameError),
}

impl FromStr for ConnectionConfig {
    type Err = ConnectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, address) =
            s.split_once('=').ok_or_else(|| ConnectionParseError::MissingName(s.to_string()))?;
        let (host, port) = address
            .rsplit_once(':')
            .filter(|(host, port)| !host.is_empty() && !port.is_empty())
            .ok_or_else(|| ConnectionParseError::MissingPort(s.to_string()))?;
        Ok(Self { name: name.parse()?, endpoint: ConnectionEndpoint::new(host, port) })
    }
}
