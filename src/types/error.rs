use thiserror::Error;

/// Errors produced when building an [`Ipv4Net`](super::Ipv4Net) from text or parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("invalid IPv4 address '{text}'")]
    InvalidAddress { text: String },

    #[error("invalid prefix length {prefix} (must be 0..=32)")]
    InvalidPrefix { prefix: u32 },

    #[error("invalid network '{text}': expected A.B.C.D/N")]
    InvalidNetwork { text: String },

    #[error("mask {mask} is neither a contiguous wildcard nor a netmask")]
    InvalidMask { mask: String },
}
