//! Field schemas: ordered (name, column index, coercion) triples mapping a
//! flat column tail to named output fields.
//!
//! Amount-bearing suffixes exist in several historical column layouts; the
//! layout is never version-tagged in the format, so selection goes by
//! observed column count alone. A schema's required width is the highest
//! index it references — fewer columns is a handler-level failure, not a
//! silent default.

use serde_json::{Map, Value};

use crate::value::{parse_bool, parse_float, parse_int, resolve_power_type, strip_quotes};

/// Closed set of column coercions. A compile-time-checked rendition of
/// what the format needs, dispatched by `match` rather than callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    /// Keep the raw token (GUIDs).
    Raw,
    /// Strip surrounding double quotes (names).
    Quoted,
    OptInt,
    OptFloat,
    OptBool,
    /// Numeric power-type column resolved to its name.
    PowerType,
}

pub type FieldSpec = (&'static str, usize, Coerce);
pub type Spec = &'static [FieldSpec];

/// Minimum column count a spec needs: one past its highest index.
pub fn required_columns(spec: Spec) -> usize {
    1 + spec.iter().map(|&(_, idx, _)| idx).max().unwrap_or(0)
}

fn coerce(token: &str, how: Coerce) -> Value {
    match how {
        Coerce::Raw => Value::String(token.to_string()),
        Coerce::Quoted => Value::String(strip_quotes(token).to_string()),
        Coerce::OptInt => parse_int(token).map_or(Value::Null, Value::from),
        Coerce::OptFloat => parse_float(token).map_or(Value::Null, Value::from),
        Coerce::OptBool => parse_bool(token).map_or(Value::Null, Value::from),
        Coerce::PowerType => parse_int(token)
            .map_or(Value::Null, |pt| Value::String(resolve_power_type(pt).to_string())),
    }
}

/// Map a column tail through a spec. Indices past the end of `cols` yield
/// `Null`; callers decide whether nulls survive into the record.
pub fn map_columns(cols: &[&str], spec: Spec) -> Map<String, Value> {
    let mut out = Map::with_capacity(spec.len());
    for &(name, idx, how) in spec {
        let value = cols.get(idx).map_or(Value::Null, |token| coerce(token, how));
        out.insert(name.to_string(), value);
    }
    out
}

/// Like [`map_columns`], but nulls are dropped (the shape most suffix
/// handlers emit).
pub fn map_columns_dense(cols: &[&str], spec: Spec) -> Map<String, Value> {
    let mut mapped = map_columns(cols, spec);
    mapped.retain(|_, v| !v.is_null());
    mapped
}

// ─────────────────────────────────────────────────────────────────────────────
// Static spec tables
// ─────────────────────────────────────────────────────────────────────────────

pub const DAMAGE_LONG_SPEC: Spec = &[
    ("target_guid", 0, Coerce::Quoted),
    ("target_name", 1, Coerce::Quoted),
    ("amount", 2, Coerce::OptInt),
    ("overkill", 3, Coerce::OptInt),
    ("school", 4, Coerce::OptInt),
    ("resisted", 5, Coerce::OptInt),
    ("blocked", 6, Coerce::OptInt),
    ("absorbed", 7, Coerce::OptInt),
    ("critical", 8, Coerce::OptBool),
    ("glancing", 9, Coerce::OptBool),
    ("crushing", 10, Coerce::OptBool),
    ("is_off_hand", 11, Coerce::OptBool),
    ("multistrike", 12, Coerce::OptBool),
];

pub const DAMAGE_SHORT_SPEC: Spec = &[
    ("amount", 0, Coerce::OptInt),
    ("overkill", 1, Coerce::OptInt),
    ("school", 2, Coerce::OptInt),
    ("resisted", 3, Coerce::OptInt),
    ("blocked", 4, Coerce::OptInt),
    ("absorbed", 5, Coerce::OptInt),
    ("critical", 6, Coerce::OptBool),
    ("glancing", 7, Coerce::OptBool),
    ("crushing", 8, Coerce::OptBool),
    ("is_off_hand", 9, Coerce::OptBool),
];

pub const HEAL_LONG_SPEC: Spec = &[
    ("target_guid", 0, Coerce::Quoted),
    ("target_name", 1, Coerce::Quoted),
    ("amount", 2, Coerce::OptInt),
    ("overhealing", 3, Coerce::OptInt),
    ("absorbed", 4, Coerce::OptInt),
    ("critical", 5, Coerce::OptBool),
    ("multistrike", 6, Coerce::OptBool),
];

pub const HEAL_SHORT_SPEC: Spec = &[
    ("amount", 0, Coerce::OptInt),
    ("overhealing", 1, Coerce::OptInt),
    ("absorbed", 2, Coerce::OptInt),
    ("critical", 3, Coerce::OptBool),
    ("multistrike", 4, Coerce::OptBool),
];

pub const MISS_SPEC: Spec = &[
    ("missType", 0, Coerce::Quoted),
    ("isOffHand", 1, Coerce::OptBool),
    ("amountMissed", 2, Coerce::OptInt),
    ("amountAbsorbed", 3, Coerce::OptInt),
    ("amountResisted", 4, Coerce::OptInt),
];

pub const ENERGIZE_SPEC: Spec = &[
    ("amount", 0, Coerce::OptFloat),
    ("power_type", 1, Coerce::PowerType),
    ("extra_amount", 2, Coerce::OptFloat),
    ("max_power", 3, Coerce::OptFloat),
];

pub const DRAIN_SPEC: Spec = &[
    ("amount", 0, Coerce::OptInt),
    ("powerType", 1, Coerce::PowerType),
    ("extraAmount", 2, Coerce::OptInt),
];

pub const LEECH_SPEC: Spec = &[
    ("amount", 0, Coerce::OptInt),
    ("extraAmount", 1, Coerce::OptInt),
];

pub const EXTRA_ATTACKS_SPEC: Spec = &[("amount", 0, Coerce::OptInt)];

pub const SPELL_BLOCK_SPEC: Spec = &[
    ("extraSpellId", 0, Coerce::OptInt),
    ("extraSpellName", 1, Coerce::Quoted),
    ("extraSchool", 2, Coerce::OptInt),
];

/// The long damage layout carries a leading target guid/name pair; short
/// logs omit it. 10 trailing columns is the observed boundary.
pub fn choose_damage_spec(cols: &[&str]) -> Spec {
    if cols.len() >= 10 { DAMAGE_LONG_SPEC } else { DAMAGE_SHORT_SPEC }
}

pub fn choose_heal_spec(cols: &[&str]) -> Spec {
    if cols.len() >= 7 { HEAL_LONG_SPEC } else { HEAL_SHORT_SPEC }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_columns_is_max_index_plus_one() {
        assert_eq!(required_columns(DAMAGE_LONG_SPEC), 13);
        assert_eq!(required_columns(EXTRA_ATTACKS_SPEC), 1);
    }

    #[test]
    fn damage_selection_boundaries() {
        let nine = vec!["1"; 9];
        let ten = vec!["1"; 10];
        let thirteen = vec!["1"; 13];
        assert_eq!(choose_damage_spec(&nine), DAMAGE_SHORT_SPEC);
        assert_eq!(choose_damage_spec(&ten), DAMAGE_LONG_SPEC);
        assert_eq!(choose_damage_spec(&thirteen), DAMAGE_LONG_SPEC);
    }

    #[test]
    fn heal_selection_boundaries() {
        let six = vec!["1"; 6];
        let seven = vec!["1"; 7];
        assert_eq!(choose_heal_spec(&six), HEAL_SHORT_SPEC);
        assert_eq!(choose_heal_spec(&seven), HEAL_LONG_SPEC);
    }

    #[test]
    fn map_columns_fills_missing_with_null() {
        let mapped = map_columns(&["5", "0"], DRAIN_SPEC);
        assert_eq!(mapped["amount"], 5);
        assert_eq!(mapped["powerType"], "mana");
        assert!(mapped["extraAmount"].is_null());

        let dense = map_columns_dense(&["5", "0"], DRAIN_SPEC);
        assert!(!dense.contains_key("extraAmount"));
    }

    #[test]
    fn nil_columns_map_to_null() {
        let mapped = map_columns(&["nil", "nil"], LEECH_SPEC);
        assert!(mapped["amount"].is_null());
    }
}
