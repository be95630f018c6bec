use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::network::Ipv4Net;
use super::port::PortSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Permit,
    Deny,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => write!(f, "permit"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// Vendor syntax family a rule was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dialect {
    /// NX-OS CIDR style: `permit tcp 10.0.0.0/24 10.0.1.0/24 eq 443`.
    Nxos,
    /// IOS-XE wildcard/host/any style.
    IosXe,
    /// ASA style: `any`, CIDR or bare host addresses.
    Asa,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nxos => write!(f, "NXOS"),
            Self::IosXe => write!(f, "IOSXE"),
            Self::Asa => write!(f, "ASA"),
        }
    }
}

/// A lowercased protocol keyword. `ip` is the wildcard protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Protocol(String);

impl Protocol {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_ascii_lowercase())
    }

    #[must_use]
    pub fn ip() -> Self {
        Self("ip".to_owned())
    }

    #[must_use]
    pub fn is_ip(&self) -> bool {
        self.0 == "ip"
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Protocol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Protocol {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.0
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One canonical ACL entry.
///
/// Rules are immutable once built. Ports are carried per side: a port
/// clause written after the source address constrains the source side,
/// one written after the destination constrains the destination side.
///
/// # Example
///
/// ```
/// use aclrel::{Action, Ipv4Net, PortSpec, Rule};
///
/// let rule = Rule::new(
///     Action::Permit,
///     "tcp",
///     "10.0.0.0/24".parse().unwrap(),
///     "10.0.1.0/24".parse().unwrap(),
/// )
/// .with_destination_ports(PortSpec::Single(443));
///
/// assert_eq!(rule.port(), Some(443));
/// assert!(rule.source().subnet_of(&Ipv4Net::ANY));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    action: Action,
    protocol: Protocol,
    source: Ipv4Net,
    destination: Ipv4Net,
    src_service: PortSpec,
    dst_service: PortSpec,
    dialect: Dialect,
    raw: String,
    unresolved_services: Vec<String>,
}

impl Rule {
    /// A rule with no port constraints, tagged as NX-OS with empty raw text.
    pub fn new(
        action: Action,
        protocol: impl Into<Protocol>,
        source: Ipv4Net,
        destination: Ipv4Net,
    ) -> Self {
        Self {
            action,
            protocol: protocol.into(),
            source,
            destination,
            src_service: PortSpec::Any,
            dst_service: PortSpec::Any,
            dialect: Dialect::Nxos,
            raw: String::new(),
            unresolved_services: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_source_ports(mut self, ports: PortSpec) -> Self {
        self.src_service = ports;
        self
    }

    #[must_use]
    pub fn with_destination_ports(mut self, ports: PortSpec) -> Self {
        self.dst_service = ports;
        self
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    #[must_use]
    pub(crate) fn with_unresolved_services(mut self, names: Vec<String>) -> Self {
        self.unresolved_services = names;
        self
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    #[must_use]
    pub fn source(&self) -> &Ipv4Net {
        &self.source
    }

    #[must_use]
    pub fn destination(&self) -> &Ipv4Net {
        &self.destination
    }

    /// Port constraint on the source side.
    #[must_use]
    pub fn src_service(&self) -> &PortSpec {
        &self.src_service
    }

    /// Port constraint on the destination side.
    #[must_use]
    pub fn dst_service(&self) -> &PortSpec {
        &self.dst_service
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The original line text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Service names dropped during lenient port resolution.
    #[must_use]
    pub fn unresolved_services(&self) -> &[String] {
        &self.unresolved_services
    }

    fn constrained_side(&self) -> &PortSpec {
        if self.dst_service.is_any() {
            &self.src_service
        } else {
            &self.dst_service
        }
    }

    /// The single (or lowest) declared port, destination side first.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.constrained_side().first()
    }

    /// All declared ports of the constrained side when more than one was listed.
    #[must_use]
    pub fn ports(&self) -> Option<BTreeSet<u16>> {
        match self.constrained_side() {
            PortSpec::Set(set) => Some(set.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn src_port(&self) -> Option<u16> {
        self.src_service.first()
    }

    #[must_use]
    pub fn dst_port(&self) -> Option<u16> {
        self.dst_service.first()
    }

    /// The same rule with source and destination (addresses and ports) swapped.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            source: self.destination,
            destination: self.source,
            src_service: self.dst_service.clone(),
            dst_service: self.src_service.clone(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action, self.protocol, self.source)?;
        if !self.src_service.is_any() {
            write!(f, " ports {}", self.src_service)?;
        }
        write!(f, " {}", self.destination)?;
        if !self.dst_service.is_any() {
            write!(f, " ports {}", self.dst_service)?;
        }
        Ok(())
    }
}

impl FromStr for Rule {
    type Err = crate::parse::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parse::parse_line(s)
    }
}
