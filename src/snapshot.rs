//! Binary snapshots of parsed rules and their classification labels.
//!
//! Parsing a large configuration export dominates a run, so parsed entries
//! can be cached to disk and restored without the source text. The format is
//! a 32-byte fixed header followed by a bincode-encoded payload.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"ACLR"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! The format version must match exactly; the engine version is
//! informational.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LabelMap, Rule, RuleId};

// -- Constants ----------------------------------------------------------------

const MAGIC: &[u8; 4] = b"ACLR";
pub const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// -- Errors -------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("snapshot payload of {0} bytes exceeds the 4 GiB format limit")]
    TooLarge(usize),

    #[error("I/O error while writing snapshot: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("not an aclrel snapshot: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: snapshot is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("I/O error while reading snapshot: {0}")]
    Io(#[from] std::io::Error),
}

// -- Payload ------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    entry_count: usize,
    label_count: usize,
    source_digest: Option<[u8; 32]>,
    entries: Vec<(RuleId, Rule)>,
    labels: LabelMap,
}

/// Parsed entries, optionally with labels from a classification run.
///
/// ```
/// use aclrel::{parse_line, DeviceRole, RuleId, Snapshot};
///
/// let entries = vec![(
///     RuleId::new("east", DeviceRole::Core, 1, 4),
///     parse_line("permit tcp 10.1.0.0/16 any eq 443").unwrap(),
/// )];
/// let bytes = Snapshot::new(entries).to_bytes().unwrap();
/// let restored = Snapshot::from_bytes(&bytes).unwrap();
/// assert_eq!(restored.entries().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(RuleId, Rule)>,
    labels: LabelMap,
    source_digest: Option<[u8; 32]>,
}

impl Snapshot {
    #[must_use]
    pub fn new(entries: Vec<(RuleId, Rule)>) -> Self {
        Self {
            entries,
            labels: LabelMap::new(),
            source_digest: None,
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    /// Record a digest of the text the entries were parsed from, so a cache
    /// can be checked against its source with [`matches_source`](Self::matches_source).
    #[must_use]
    pub fn with_source(mut self, text: &str) -> Self {
        self.source_digest = Some(*blake3::hash(text.as_bytes()).as_bytes());
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[(RuleId, Rule)] {
        &self.entries
    }

    #[must_use]
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<(RuleId, Rule)>, LabelMap) {
        (self.entries, self.labels)
    }

    /// `false` when no digest was recorded.
    #[must_use]
    pub fn matches_source(&self, text: &str) -> bool {
        self.source_digest
            .is_some_and(|digest| digest == *blake3::hash(text.as_bytes()).as_bytes())
    }

    /// # Errors
    ///
    /// Returns [`SnapshotError`] if encoding fails or the payload exceeds
    /// the header's length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = Payload {
            entry_count: self.entries.len(),
            label_count: self.labels.len(),
            source_digest: self.source_digest,
            entries: self.entries.clone(),
            labels: self.labels.clone(),
        };
        let payload = bincode::serde::encode_to_vec(&payload, bincode::config::standard())?;
        let payload_len =
            u32::try_from(payload.len()).map_err(|_| SnapshotError::TooLarge(payload.len()))?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        write_header(&mut buf, &payload, payload_len);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// # Errors
    ///
    /// Returns [`RestoreError`] on a foreign or corrupted blob, a version
    /// mismatch, or a payload that fails validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RestoreError> {
        let (format_version, payload_len, stored_hash) = read_header(bytes)?;
        if format_version != FORMAT_VERSION {
            return Err(RestoreError::IncompatibleVersion {
                blob: format_version,
                supported: FORMAT_VERSION,
            });
        }

        let payload_end = HEADER_SIZE + payload_len as usize;
        if bytes.len() < payload_end {
            return Err(RestoreError::LengthMismatch {
                expected: payload_len,
                actual: bytes.len() - HEADER_SIZE,
            });
        }
        let payload = &bytes[HEADER_SIZE..payload_end];
        if blake3::hash(payload).as_bytes()[..16] != stored_hash {
            return Err(RestoreError::ChecksumMismatch);
        }

        let (payload, _): (Payload, usize) =
            bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
        validate(&payload)?;
        tracing::debug!(
            entries = payload.entry_count,
            labels = payload.label_count,
            "restored snapshot"
        );
        Ok(Self {
            entries: payload.entries,
            labels: payload.labels,
            source_digest: payload.source_digest,
        })
    }

    /// # Errors
    ///
    /// As [`to_bytes`](Self::to_bytes), plus I/O failures.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// # Errors
    ///
    /// As [`from_bytes`](Self::from_bytes), plus I/O failures.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, RestoreError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

fn validate(payload: &Payload) -> Result<(), RestoreError> {
    if payload.entry_count != payload.entries.len() {
        return Err(RestoreError::Validation(format!(
            "metadata says {} entries but payload has {}",
            payload.entry_count,
            payload.entries.len()
        )));
    }
    if payload.label_count != payload.labels.len() {
        return Err(RestoreError::Validation(format!(
            "metadata says {} labels but payload has {}",
            payload.label_count,
            payload.labels.len()
        )));
    }

    let mut ids = BTreeSet::new();
    for (id, _) in &payload.entries {
        if !ids.insert(id) {
            return Err(RestoreError::Validation(format!("duplicate entry {id}")));
        }
    }
    if let Some((id, _)) = payload.labels.iter().find(|(id, _)| !ids.contains(id)) {
        return Err(RestoreError::Validation(format!(
            "label for unknown entry {id}"
        )));
    }
    Ok(())
}

// -- Header -------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8], payload_len: u32) {
    let hash = blake3::hash(payload);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash.as_bytes()[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), RestoreError> {
    if bytes.len() < HEADER_SIZE {
        return Err(RestoreError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }
    if &bytes[0..4] != MAGIC {
        return Err(RestoreError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    // 6..8 engine version, 8..12 flags
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);
    Ok((format_version, payload_len, hash))
}
