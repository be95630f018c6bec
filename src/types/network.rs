use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::NetError;

/// An IPv4 network in CIDR form with host bits cleared.
///
/// `any` in ACL text normalizes to `0.0.0.0/0` and `host X` to `X/32`.
/// Ordering is by network address, then prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Net {
    addr: u32,
    prefix: u8,
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl Ipv4Net {
    /// The universal network `0.0.0.0/0`.
    pub const ANY: Self = Self { addr: 0, prefix: 0 };

    /// Build a network, clearing any host bits of `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidPrefix`] if `prefix > 32`.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, NetError> {
        if prefix > 32 {
            return Err(NetError::InvalidPrefix {
                prefix: u32::from(prefix),
            });
        }
        Ok(Self {
            addr: u32::from(addr) & mask(prefix),
            prefix,
        })
    }

    /// A single-address `/32` network.
    #[must_use]
    pub fn host(addr: Ipv4Addr) -> Self {
        Self {
            addr: u32::from(addr),
            prefix: 32,
        }
    }

    /// Build a network from an IOS-style `address wildcard` pair.
    ///
    /// The wildcard must be contiguous low bits (`0.0.0.255`, `0.0.3.255`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidMask`] for a discontiguous wildcard.
    pub fn from_wildcard(addr: Ipv4Addr, wildcard: Ipv4Addr) -> Result<Self, NetError> {
        let wc = u32::from(wildcard);
        // low bits only: wc + 1 is a power of two (or wraps to zero for all ones)
        if wc.wrapping_add(1) & wc != 0 {
            return Err(NetError::InvalidMask {
                mask: wildcard.to_string(),
            });
        }
        #[allow(clippy::cast_possible_truncation)] // count_ones() <= 32
        let prefix = (32 - wc.count_ones()) as u8;
        Ok(Self {
            addr: u32::from(addr) & !wc,
            prefix,
        })
    }

    /// Build a network from an ASA-style `address netmask` pair.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidMask`] for a discontiguous netmask.
    pub fn from_netmask(addr: Ipv4Addr, netmask: Ipv4Addr) -> Result<Self, NetError> {
        Self::from_wildcard(addr, Ipv4Addr::from(!u32::from(netmask)))
    }

    /// Interpret `addr second` as a wildcard pair, falling back to a netmask.
    ///
    /// `0.0.0.0` and `255.255.255.255` are read as wildcards (`/32` and `/0`).
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidMask`] if `second` is neither.
    pub fn from_mask_pair(addr: Ipv4Addr, second: Ipv4Addr) -> Result<Self, NetError> {
        Self::from_wildcard(addr, second).or_else(|_| Self::from_netmask(addr, second))
    }

    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.addr)
    }

    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.prefix
    }

    #[must_use]
    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask(self.prefix))
    }

    /// Highest address inside the network.
    #[must_use]
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.addr | !mask(self.prefix))
    }

    #[must_use]
    pub fn is_any(&self) -> bool {
        self.prefix == 0
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.prefix == 32
    }

    #[must_use]
    pub fn contains_addr(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask(self.prefix) == self.addr
    }

    /// `self ⊆ other`.
    #[must_use]
    pub fn subnet_of(&self, other: &Ipv4Net) -> bool {
        self.prefix >= other.prefix && self.addr & mask(other.prefix) == other.addr
    }

    /// Whether the two networks share at least one address.
    ///
    /// For CIDR blocks this is the same as "one contains the other".
    #[must_use]
    pub fn overlaps(&self, other: &Ipv4Net) -> bool {
        let m = mask(self.prefix.min(other.prefix));
        self.addr & m == other.addr & m
    }

    /// Whether the network overlaps any member of `space`.
    #[must_use]
    pub fn within_any(&self, space: &[Ipv4Net]) -> bool {
        space.iter().any(|n| self.overlaps(n))
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

impl FromStr for Ipv4Net {
    type Err = NetError;

    /// Accepts `A.B.C.D/N`, a bare `A.B.C.D` (read as `/32`) or `any`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("any") {
            return Ok(Self::ANY);
        }
        let Some((addr, len)) = s.split_once('/') else {
            let addr: Ipv4Addr = s.parse().map_err(|_| NetError::InvalidAddress {
                text: s.to_owned(),
            })?;
            return Ok(Self::host(addr));
        };
        let addr: Ipv4Addr = addr.parse().map_err(|_| NetError::InvalidAddress {
            text: addr.to_owned(),
        })?;
        let prefix: u32 = len.parse().map_err(|_| NetError::InvalidNetwork {
            text: s.to_owned(),
        })?;
        let prefix = u8::try_from(prefix).map_err(|_| NetError::InvalidPrefix { prefix })?;
        Self::new(addr, prefix)
    }
}

impl TryFrom<String> for Ipv4Net {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Net> for String {
    fn from(net: Ipv4Net) -> Self {
        net.to_string()
    }
}
