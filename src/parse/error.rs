use std::fmt;

use thiserror::Error;

/// Why a line could not be turned into a [`Rule`](crate::Rule).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("empty line")]
    Empty,

    #[error("no ACL dialect grammar matches")]
    NoPatternMatch,

    #[error("unknown service name '{name}'")]
    UnresolvedService { name: String },

    #[error("invalid port range {start}..{end}")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("invalid network: {detail}")]
    InvalidNetwork { detail: String },

    #[error("rule uses 'any' as an endpoint")]
    ContainsAny,
}

/// Errors produced when parsing one line of ACL text.
///
/// Most configuration lines are not ACL entries, so callers usually count
/// and skip these rather than abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    line: String,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, line: impl Into<String>) -> Self {
        Self {
            kind,
            line: line.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// The offending input line.
    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.kind)?;
        if !self.line.is_empty() {
            write!(f, " in '{}'", self.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
