use serde::{Deserialize, Serialize};
use std::fmt;

/// Address family of a session endpoint, decided by strict parsing of the
/// extracted address rather than by string shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    Unknown,
}

impl AddressFamily {
    /// Human-readable label used in logs, persisted rows and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "IPv4",
            AddressFamily::Ipv6 => "IPv6",
            AddressFamily::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
