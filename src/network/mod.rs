pub mod decoder;
pub mod dispatcher;
pub mod listener;
pub mod membership;
pub mod sender;
pub mod transport;
pub mod wire;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reachable peer endpoint: hostname (or IP literal) plus port.
/// Resolution happens at send time; a name that stops resolving is a
/// transient send failure, not a routing-table problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> PeerAddr {
        PeerAddr {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
