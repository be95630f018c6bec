use thiserror::Error;

use crate::{ConfigError, NetError, ParseError};

/// Unified error type covering parsing, configuration, snapshots and I/O.
///
/// Components return their own error types; this one lets a pipeline that
/// chains several of them use `?` throughout.
#[derive(Debug, Error)]
pub enum AclError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Restore(#[from] crate::snapshot::RestoreError),
}
