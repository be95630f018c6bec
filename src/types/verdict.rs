use std::fmt;

use serde::{Deserialize, Serialize};

use super::network::Ipv4Net;

/// Per-rule outcome of the liveness cross-reference.
///
/// Stale variants carry the network that has no live address so the
/// remediation can target the right side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LivenessVerdict {
    Confirmed,
    StaleSource { address: Ipv4Net },
    StaleDestination { address: Ipv4Net },
    StaleBoth { source: Ipv4Net, destination: Ipv4Net },
    /// Every constrained side matched an exempt prefix.
    Exempt,
}

impl LivenessVerdict {
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            Self::StaleSource { .. } | Self::StaleDestination { .. } | Self::StaleBoth { .. }
        )
    }

    /// Networks without a live counterpart.
    #[must_use]
    pub fn stale_networks(&self) -> Vec<Ipv4Net> {
        match self {
            Self::StaleSource { address } | Self::StaleDestination { address } => vec![*address],
            Self::StaleBoth {
                source,
                destination,
            } => vec![*source, *destination],
            Self::Confirmed | Self::Exempt => Vec::new(),
        }
    }
}

impl fmt::Display for LivenessVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
            Self::StaleSource { address } => write!(f, "stale source {address}"),
            Self::StaleDestination { address } => write!(f, "stale destination {address}"),
            Self::StaleBoth {
                source,
                destination,
            } => write!(f, "stale source {source} and destination {destination}"),
            Self::Exempt => write!(f, "exempt"),
        }
    }
}
