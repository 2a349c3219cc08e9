use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::topology_error::TopologyError;

/// Port assumed when a seed string carries no explicit port.
pub const DEFAULT_PORT: u16 = 27017;

/// The host:port identity of a single cluster member.
///
/// Addresses are the keys of every topology map in this crate and never
/// change for the lifetime of a tracked server.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TopologyError::InvalidAddress(s.to_string()));
        }

        match s.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(TopologyError::InvalidAddress(s.to_string()));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| TopologyError::InvalidAddress(s.to_string()))?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(s, DEFAULT_PORT)),
        }
    }
}
