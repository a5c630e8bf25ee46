//! Legacy part labels mapped onto canonical parts
//!
//! Older recognition models emitted English cut names and typos. Adding an
//! alias only touches this table.

use super::CanonicalPart;

/// Bumped whenever an alias is added or retargeted
pub const LEGACY_ALIAS_TABLE_VERSION: u32 = 1;

pub const LEGACY_ALIASES: &[(&str, CanonicalPart)] = &[
    ("Pork_Rib", CanonicalPart::PorkRibs),
    ("Pork_Shoulder", CanonicalPart::PorkPicnicShoulder),
    ("FrontLeg", CanonicalPart::PorkPicnicShoulder),
    ("front_leg", CanonicalPart::PorkPicnicShoulder),
    ("PorkBelly", CanonicalPart::PorkBelly),
    ("pork_belly", CanonicalPart::PorkBelly),
    ("pork_shoulder", CanonicalPart::PorkPicnicShoulder),
    ("Sirloin", CanonicalPart::BeefSirloin),
    ("sirloin", CanonicalPart::BeefSirloin),
    ("Tenderloin", CanonicalPart::BeefTenderloin),
    ("tenderloin", CanonicalPart::BeefTenderloin),
    ("Ribs", CanonicalPart::BeefRib),
    ("ribs", CanonicalPart::BeefRib),
    ("Striploin", CanonicalPart::BeefSirloin),
    ("striploin", CanonicalPart::BeefSirloin),
    ("RearLeg", CanonicalPart::PorkHam),
    ("rear_leg", CanonicalPart::PorkHam),
    ("Brisket", CanonicalPart::BeefBrisket),
    ("brisket", CanonicalPart::BeefBrisket),
    ("Pork_Jowl", CanonicalPart::PorkNeck),
    ("pork_jowl", CanonicalPart::PorkNeck),
];

pub(super) fn lookup(label: &str) -> Option<CanonicalPart> {
    LEGACY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == label)
        .map(|(_, part)| *part)
}
