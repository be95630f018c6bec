use std::fmt;

use serde::{Deserialize, Serialize};

/// Label assigned by the cross-platform classifier.
///
/// Variants are listed highest priority first; [`priority`](Self::priority)
/// is the explicit table used when two passes label the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassificationLabel {
    /// Four-way closure of equal core/access pairs across two sites.
    CompleteMatch,
    /// Covering relation (either direction) closed across two sites.
    CoveringMatch,
    /// Match or containment involving the out-of-band tier.
    OutOfBandMatch,
    /// Local source reaching a destination outside every known site.
    PlatformExternalExposure,
    /// Destination inside a special/shared address range.
    SpecialDestination,
    /// Both endpoints inside special ranges.
    SpecialAddressPair,
    /// Special source reaching a destination outside every known site.
    SpecialSourceExternal,
}

impl ClassificationLabel {
    /// Every label, highest priority first.
    pub const ALL: [Self; 7] = [
        Self::CompleteMatch,
        Self::CoveringMatch,
        Self::OutOfBandMatch,
        Self::PlatformExternalExposure,
        Self::SpecialDestination,
        Self::SpecialAddressPair,
        Self::SpecialSourceExternal,
    ];

    /// Larger is stronger.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::CompleteMatch => 70,
            Self::CoveringMatch => 60,
            Self::OutOfBandMatch => 50,
            Self::PlatformExternalExposure => 40,
            Self::SpecialDestination => 30,
            Self::SpecialAddressPair => 20,
            Self::SpecialSourceExternal => 10,
        }
    }

    /// Whether `self` may replace `current`.
    #[must_use]
    pub fn outranks(self, current: Self) -> bool {
        self.priority() > current.priority()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CompleteMatch => "complete-match",
            Self::CoveringMatch => "covering-match",
            Self::OutOfBandMatch => "out-of-band-match",
            Self::PlatformExternalExposure => "platform-external-exposure",
            Self::SpecialDestination => "special-destination",
            Self::SpecialAddressPair => "special-address-pair",
            Self::SpecialSourceExternal => "special-source-external",
        }
    }
}

impl fmt::Display for ClassificationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
