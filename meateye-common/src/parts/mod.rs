//! Canonical meat part table and label resolution
//!
//! The 17 canonical part identifiers are shared by recognition, storage and
//! display. Labels coming from the recognition service may also be legacy
//! names; those are mapped through the versioned alias table in
//! [`legacy_aliases`], which is kept apart from the canonical set.

mod legacy_aliases;

pub use legacy_aliases::{LEGACY_ALIASES, LEGACY_ALIAS_TABLE_VERSION};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Animal a part is cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Beef,
    Pork,
}

/// One of the 17 fixed meat-cut identifiers (10 beef, 7 pork)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalPart {
    #[serde(rename = "Beef_Tenderloin")]
    BeefTenderloin,
    #[serde(rename = "Beef_Ribeye")]
    BeefRibeye,
    #[serde(rename = "Beef_Sirloin")]
    BeefSirloin,
    #[serde(rename = "Beef_Chuck")]
    BeefChuck,
    #[serde(rename = "Beef_Round")]
    BeefRound,
    #[serde(rename = "Beef_BottomRound")]
    BeefBottomRound,
    #[serde(rename = "Beef_Brisket")]
    BeefBrisket,
    #[serde(rename = "Beef_Shank")]
    BeefShank,
    #[serde(rename = "Beef_Rib")]
    BeefRib,
    #[serde(rename = "Beef_Shoulder")]
    BeefShoulder,
    #[serde(rename = "Pork_Tenderloin")]
    PorkTenderloin,
    #[serde(rename = "Pork_Loin")]
    PorkLoin,
    #[serde(rename = "Pork_Neck")]
    PorkNeck,
    #[serde(rename = "Pork_PicnicShoulder")]
    PorkPicnicShoulder,
    #[serde(rename = "Pork_Ham")]
    PorkHam,
    #[serde(rename = "Pork_Belly")]
    PorkBelly,
    #[serde(rename = "Pork_Ribs")]
    PorkRibs,
}

impl CanonicalPart {
    /// Every canonical part, beef first
    pub const ALL: [CanonicalPart; 17] = [
        CanonicalPart::BeefTenderloin,
        CanonicalPart::BeefRibeye,
        CanonicalPart::BeefSirloin,
        CanonicalPart::BeefChuck,
        CanonicalPart::BeefRound,
        CanonicalPart::BeefBottomRound,
        CanonicalPart::BeefBrisket,
        CanonicalPart::BeefShank,
        CanonicalPart::BeefRib,
        CanonicalPart::BeefShoulder,
        CanonicalPart::PorkTenderloin,
        CanonicalPart::PorkLoin,
        CanonicalPart::PorkNeck,
        CanonicalPart::PorkPicnicShoulder,
        CanonicalPart::PorkHam,
        CanonicalPart::PorkBelly,
        CanonicalPart::PorkRibs,
    ];

    /// Canonical identifier as persisted and exchanged with the recognition service
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalPart::BeefTenderloin => "Beef_Tenderloin",
            CanonicalPart::BeefRibeye => "Beef_Ribeye",
            CanonicalPart::BeefSirloin => "Beef_Sirloin",
            CanonicalPart::BeefChuck => "Beef_Chuck",
            CanonicalPart::BeefRound => "Beef_Round",
            CanonicalPart::BeefBottomRound => "Beef_BottomRound",
            CanonicalPart::BeefBrisket => "Beef_Brisket",
            CanonicalPart::BeefShank => "Beef_Shank",
            CanonicalPart::BeefRib => "Beef_Rib",
            CanonicalPart::BeefShoulder => "Beef_Shoulder",
            CanonicalPart::PorkTenderloin => "Pork_Tenderloin",
            CanonicalPart::PorkLoin => "Pork_Loin",
            CanonicalPart::PorkNeck => "Pork_Neck",
            CanonicalPart::PorkPicnicShoulder => "Pork_PicnicShoulder",
            CanonicalPart::PorkHam => "Pork_Ham",
            CanonicalPart::PorkBelly => "Pork_Belly",
            CanonicalPart::PorkRibs => "Pork_Ribs",
        }
    }

    /// Korean market display name (species/cut)
    pub fn display_name(&self) -> &'static str {
        match self {
            CanonicalPart::BeefTenderloin => "소/안심",
            CanonicalPart::BeefRibeye => "소/등심",
            CanonicalPart::BeefSirloin => "소/채끝",
            CanonicalPart::BeefChuck => "소/목심",
            CanonicalPart::BeefRound => "소/우둔",
            CanonicalPart::BeefBottomRound => "소/설도",
            CanonicalPart::BeefBrisket => "소/양지",
            CanonicalPart::BeefShank => "소/사태",
            CanonicalPart::BeefRib => "소/갈비",
            CanonicalPart::BeefShoulder => "소/앞다리",
            CanonicalPart::PorkTenderloin => "돼지/안심",
            CanonicalPart::PorkLoin => "돼지/등심",
            CanonicalPart::PorkNeck => "돼지/목심",
            CanonicalPart::PorkPicnicShoulder => "돼지/앞다리",
            CanonicalPart::PorkHam => "돼지/뒷다리",
            CanonicalPart::PorkBelly => "돼지/삼겹살",
            CanonicalPart::PorkRibs => "돼지/갈비",
        }
    }

    pub fn species(&self) -> Species {
        if self.as_str().starts_with("Beef_") {
            Species::Beef
        } else {
            Species::Pork
        }
    }

    /// Exact canonical identifier match (no alias lookup)
    pub fn from_canonical(s: &str) -> Option<CanonicalPart> {
        CanonicalPart::ALL.iter().copied().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for CanonicalPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a raw part label
///
/// `Unresolved` is not an error: callers store the item without a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartResolution {
    Resolved(CanonicalPart),
    Unresolved,
}

impl PartResolution {
    pub fn part(&self) -> Option<CanonicalPart> {
        match self {
            PartResolution::Resolved(part) => Some(*part),
            PartResolution::Unresolved => None,
        }
    }
}

/// Resolve a recognized or legacy label to a canonical part
///
/// Order: exact canonical match, then the legacy alias table (also tried
/// with spaces replaced by underscores), then unresolved.
pub fn resolve(raw_label: &str) -> PartResolution {
    let label = raw_label.trim();
    if label.is_empty() {
        return PartResolution::Unresolved;
    }

    if let Some(part) = CanonicalPart::from_canonical(label) {
        return PartResolution::Resolved(part);
    }

    let underscored = label.replace(' ', "_");
    if let Some(part) = CanonicalPart::from_canonical(&underscored) {
        return PartResolution::Resolved(part);
    }

    match legacy_aliases::lookup(label).or_else(|| legacy_aliases::lookup(&underscored)) {
        Some(part) => PartResolution::Resolved(part),
        None => {
            tracing::debug!(label = %label, "Part label did not resolve to a canonical part");
            PartResolution::Unresolved
        }
    }
}
