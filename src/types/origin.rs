use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a device in the topology. Supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceRole {
    Core,
    Access,
    OutOfBand,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Access => write!(f, "access"),
            Self::OutOfBand => write!(f, "oob"),
        }
    }
}

/// Identity of one rule line: which site, device role, device column and row
/// it came from. Used for reporting only, never for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId {
    pub site: String,
    pub role: DeviceRole,
    pub column: u32,
    pub row: u32,
}

impl RuleId {
    pub fn new(site: impl Into<String>, role: DeviceRole, column: u32, row: u32) -> Self {
        Self {
            site: site.into(),
            role,
            column,
            row,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/c{}/r{}",
            self.site, self.role, self.column, self.row
        )
    }
}

/// One raw configuration line as handed over by the collection layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    pub id: RuleId,
    pub text: String,
}

impl SourceLine {
    pub fn new(
        site: impl Into<String>,
        role: DeviceRole,
        column: u32,
        row: u32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: RuleId::new(site, role, column, row),
            text: text.into(),
        }
    }
}
