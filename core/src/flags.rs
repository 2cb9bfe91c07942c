//! Unit and damage-school bitmask decoding.
//!
//! Masks arrive as numeric columns (decimal or `0x` hex) and expand into
//! the set of named bits they contain. The same few dozen masks recur
//! millions of times across a corpus, so each decoder instance memoizes
//! results; the cache is instance-owned, never process-global, which keeps
//! workers fully isolated.

use hashbrown::HashMap;
use serde_json::Value;

use crate::value::parse_int_or_default;

// Single-bit members only; the composite *_MASK values are decode inputs,
// never decode outputs.
const UNIT_FLAGS: &[(u64, &str)] = &[
    (0x0000_0001, "AFFILIATION_MINE"),
    (0x0000_0002, "AFFILIATION_PARTY"),
    (0x0000_0004, "AFFILIATION_RAID"),
    (0x0000_0008, "AFFILIATION_OUTSIDER"),
    (0x0000_0010, "REACTION_FRIENDLY"),
    (0x0000_0020, "REACTION_NEUTRAL"),
    (0x0000_0040, "REACTION_HOSTILE"),
    (0x0000_0100, "CONTROL_PLAYER"),
    (0x0000_0200, "CONTROL_NPC"),
    (0x0000_0400, "TYPE_PLAYER"),
    (0x0000_0800, "TYPE_NPC"),
    (0x0000_1000, "TYPE_PET"),
    (0x0000_2000, "TYPE_GUARDIAN"),
    (0x0000_4000, "TYPE_OBJECT"),
    (0x0001_0000, "TARGET"),
    (0x0002_0000, "FOCUS"),
    (0x0004_0000, "MAINTANK"),
    (0x0008_0000, "MAINASSIST"),
    (0x0080_0000, "NONE"),
];

const SCHOOL_FLAGS: &[(u64, &str)] = &[
    (0x01, "PHYSICAL"),
    (0x02, "HOLY"),
    (0x04, "FIRE"),
    (0x08, "NATURE"),
    (0x10, "FROST"),
    (0x20, "SHADOW"),
    (0x40, "ARCANE"),
];

fn expand(table: &[(u64, &'static str)], mask: u64) -> Box<[&'static str]> {
    table
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

/// Memoized bitmask decoder for both flag enumerations.
#[derive(Default)]
pub struct FlagCache {
    unit: HashMap<u64, Box<[&'static str]>>,
    school: HashMap<u64, Box<[&'static str]>>,
}

impl FlagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a unit-relationship mask column into its bit names.
    pub fn unit_flags(&mut self, token: &str) -> &[&'static str] {
        let mask = parse_int_or_default(token, 0) as u64;
        self.unit
            .entry(mask)
            .or_insert_with(|| expand(UNIT_FLAGS, mask))
    }

    /// Decode a damage-school mask column into its school names.
    pub fn school_flags(&mut self, token: &str) -> &[&'static str] {
        let mask = parse_int_or_default(token, 0) as u64;
        self.school
            .entry(mask)
            .or_insert_with(|| expand(SCHOOL_FLAGS, mask))
    }

    /// Same as [`Self::school_flags`] but for an already-parsed mask.
    pub fn school_flags_of(&mut self, mask: i64) -> &[&'static str] {
        self.school
            .entry(mask as u64)
            .or_insert_with(|| expand(SCHOOL_FLAGS, mask as u64))
    }
}

/// Render a decoded name slice as a JSON array value.
pub fn names_to_json(names: &[&'static str]) -> Value {
    Value::Array(names.iter().map(|n| Value::String((*n).to_string())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mask_is_empty() {
        let mut cache = FlagCache::new();
        assert!(cache.unit_flags("0").is_empty());
        assert!(cache.school_flags("0x0").is_empty());
    }

    #[test]
    fn hex_and_decimal_agree() {
        let mut cache = FlagCache::new();
        let hex: Vec<_> = cache.unit_flags("0x511").to_vec();
        let dec: Vec<_> = cache.unit_flags("1297").to_vec();
        assert_eq!(hex, dec);
        assert_eq!(
            hex,
            vec!["AFFILIATION_MINE", "REACTION_FRIENDLY", "CONTROL_PLAYER", "TYPE_PLAYER"]
        );
    }

    #[test]
    fn school_mask_0x11_is_exactly_two_schools() {
        let mut cache = FlagCache::new();
        assert_eq!(cache.school_flags("0x11"), ["PHYSICAL", "FROST"]);
    }

    #[test]
    fn nil_mask_decodes_as_zero() {
        let mut cache = FlagCache::new();
        assert!(cache.unit_flags("nil").is_empty());
    }

    #[test]
    fn memoized_results_are_stable() {
        let mut cache = FlagCache::new();
        let first: Vec<_> = cache.school_flags("0x7f").to_vec();
        let second: Vec<_> = cache.school_flags("127").to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
    }
}
