use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The port constraint on one side (source or destination) of a rule.
///
/// `Set` always holds at least two ports; construct through
/// [`PortSpec::from_ports`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PortSpec {
    /// No constraint: every port matches.
    #[default]
    Any,
    Single(u16),
    Set(BTreeSet<u16>),
}

impl PortSpec {
    /// Normalize a list of ports: none becomes `Any`, one becomes `Single`.
    pub fn from_ports(ports: impl IntoIterator<Item = u16>) -> Self {
        let set: BTreeSet<u16> = ports.into_iter().collect();
        match set.len() {
            0 => Self::Any,
            1 => set.into_iter().next().map_or(Self::Any, Self::Single),
            _ => Self::Set(set),
        }
    }

    /// Inclusive range `start..=end`, expanded to an explicit set.
    #[must_use]
    pub fn range(start: u16, end: u16) -> Self {
        Self::from_ports(start..=end)
    }

    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Whether `port` is accepted by this constraint.
    #[must_use]
    pub fn accepts(&self, port: u16) -> bool {
        match self {
            Self::Any => true,
            Self::Single(p) => *p == port,
            Self::Set(set) => set.contains(&port),
        }
    }

    /// The explicit ports, or `None` for `Any`.
    #[must_use]
    pub fn ports(&self) -> Option<BTreeSet<u16>> {
        match self {
            Self::Any => None,
            Self::Single(p) => Some(BTreeSet::from([*p])),
            Self::Set(set) => Some(set.clone()),
        }
    }

    /// The lowest declared port, or `None` for `Any`.
    #[must_use]
    pub fn first(&self) -> Option<u16> {
        match self {
            Self::Any => None,
            Self::Single(p) => Some(*p),
            Self::Set(set) => set.first().copied(),
        }
    }

    /// Number of declared ports (`0` for `Any`).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Any => 0,
            Self::Single(_) => 1,
            Self::Set(set) => set.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_any()
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Single(p) => write!(f, "{p}"),
            Self::Set(set) => {
                let parts: Vec<String> = set.iter().map(u16::to_string).collect();
                write!(f, "{{{}}}", parts.join(","))
            }
        }
    }
}
