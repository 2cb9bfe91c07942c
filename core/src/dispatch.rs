//! Event-name dispatch: prefix/suffix composition with schema fallback.
//!
//! Event names compose an action category (`SPELL_PERIODIC`, `SWING`, ...)
//! with an effect category (`_DAMAGE`, `_AURA_APPLIED`, ...). The full
//! prefix×suffix product is precomputed into a hash table at construction,
//! so per-line resolution is a single lookup; only names outside the
//! standalone/special/product sets fall back to a longest-prefix scan.
//!
//! Handlers are closed enums dispatched by `match` — there is no runtime
//! binding of callables anywhere in this path.

use hashbrown::HashMap;
use serde_json::{Map, Value, json};

use crate::error::ParseError;
use crate::flags::{FlagCache, names_to_json};
use crate::schema::{
    self, DRAIN_SPEC, ENERGIZE_SPEC, EXTRA_ATTACKS_SPEC, LEECH_SPEC, MISS_SPEC, SPELL_BLOCK_SPEC,
    Spec,
};
use crate::state::ParserState;
use crate::value::{parse_float, parse_int, parse_int_or_default, strip_quotes};

/// A decoded line: dynamic field set keyed by event-specific names.
pub type Record = Map<String, Value>;

/// Action-category handlers. Each may consume leading columns of the
/// post-actor-block tail before the suffix handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// Consumes nothing (SWING, kill/death events).
    Passthrough,
    /// Consumes spell id/name/school.
    Spell,
    /// Consumes the environmental damage type.
    Environmental,
    /// Consumes enchant name, item id, item name.
    Enchant,
}

/// Effect-category handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    Damage,
    Heal,
    Miss,
    Energize,
    Drain,
    Leech,
    ExtraAttacks,
    SpellBlock,
    Aura,
    AuraDose,
    AuraRefresh,
    AuraBrokenSpell,
    CastFailed,
    Absorbed,
    Empty,
}

// Ordered longest-first so a prefix scan finds SPELL_PERIODIC before SPELL.
const PREFIXES: &[(&str, Prefix)] = &[
    ("SPELL_BUILDING", Prefix::Spell),
    ("SPELL_PERIODIC", Prefix::Spell),
    ("ENVIRONMENTAL", Prefix::Environmental),
    ("SWING", Prefix::Passthrough),
    ("SPELL", Prefix::Spell),
    ("RANGE", Prefix::Spell),
];

const SUFFIXES: &[(&str, Suffix)] = &[
    ("_AURA_APPLIED", Suffix::Aura),
    ("_AURA_REMOVED", Suffix::Aura),
    ("_AURA_APPLIED_DOSE", Suffix::AuraDose),
    ("_AURA_REMOVED_DOSE", Suffix::AuraDose),
    ("_AURA_REFRESH", Suffix::AuraRefresh),
    ("_AURA_BROKEN", Suffix::Aura),
    ("_AURA_BROKEN_SPELL", Suffix::AuraBrokenSpell),
    ("_CAST_START", Suffix::Empty),
    ("_CAST_SUCCESS", Suffix::Empty),
    ("_CAST_FAILED", Suffix::CastFailed),
    ("_INSTAKILL", Suffix::Empty),
    ("_CREATE", Suffix::Empty),
    ("_SUMMON", Suffix::Empty),
    ("_RESURRECT", Suffix::Empty),
    ("_ABSORBED", Suffix::Absorbed),
    ("_DAMAGE", Suffix::Damage),
    ("_DAMAGE_LANDED", Suffix::Damage),
    ("_HEAL", Suffix::Heal),
    ("_MISS", Suffix::Miss),
    ("_MISSED", Suffix::Miss),
    ("_ENERGIZE", Suffix::Energize),
    ("_DRAIN", Suffix::Drain),
    ("_LEECH", Suffix::Leech),
    ("_EXTRA_ATTACKS", Suffix::ExtraAttacks),
    ("_SPELL_BLOCK", Suffix::SpellBlock),
];

// Actor-block events whose names don't follow the regular composition.
const SPECIAL_EVENTS: &[(&str, Prefix, Suffix)] = &[
    ("DAMAGE_SHIELD", Prefix::Spell, Suffix::Damage),
    ("DAMAGE_SPLIT", Prefix::Spell, Suffix::Damage),
    ("DAMAGE_SHIELD_MISSED", Prefix::Spell, Suffix::Miss),
    ("ENCHANT_APPLIED", Prefix::Enchant, Suffix::Empty),
    ("ENCHANT_REMOVED", Prefix::Enchant, Suffix::Empty),
    ("PARTY_KILL", Prefix::Passthrough, Suffix::Empty),
    ("UNIT_DIED", Prefix::Passthrough, Suffix::Empty),
    ("UNIT_DESTROYED", Prefix::Passthrough, Suffix::Empty),
];

fn cols_json(cols: &[&str]) -> Value {
    Value::Array(cols.iter().map(|c| Value::String((*c).to_string())).collect())
}

/// Resolves event names to handlers and decodes the shared actor block.
pub struct EventDispatcher {
    flags: FlagCache,
    table: HashMap<String, (Prefix, Suffix)>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        let mut table =
            HashMap::with_capacity(PREFIXES.len() * SUFFIXES.len() + SPECIAL_EVENTS.len());
        for &(prefix_name, prefix) in PREFIXES {
            for &(suffix_name, suffix) in SUFFIXES {
                table.insert(format!("{prefix_name}{suffix_name}"), (prefix, suffix));
            }
        }
        Self {
            flags: FlagCache::new(),
            table,
        }
    }

    /// Decode one flat column sequence (first column is the event name)
    /// into a record. Line-fatal conditions come back as `Err`; handler-
    /// level shortfalls surface as an `error` field inside the record.
    pub fn dispatch(
        &mut self,
        state: &mut ParserState,
        epoch: f64,
        cols: &[&str],
    ) -> Result<Record, ParseError> {
        let event = *cols.first().ok_or(ParseError::MissingEventType)?;
        if event.is_empty() {
            return Err(ParseError::MissingEventType);
        }

        let mut record = Record::new();
        record.insert("timestamp".into(), json!(epoch));
        record.insert("event".into(), Value::String(event.to_string()));

        if let Some(payload) = self.dispatch_standalone(state, event, &cols[1..])? {
            record.extend(payload);
            return Ok(record);
        }

        if let Some(&(_, prefix, suffix)) =
            SPECIAL_EVENTS.iter().find(|(name, _, _)| *name == event)
        {
            self.compose(state, &mut record, prefix, suffix, cols)?;
            return Ok(record);
        }

        let handlers = match self.table.get(event) {
            Some(&pair) => pair,
            None => resolve_by_prefix(event)
                .ok_or_else(|| ParseError::UnknownEventFormat(event.to_string()))?,
        };
        self.compose(state, &mut record, handlers.0, handlers.1, cols)?;
        Ok(record)
    }

    /// Actor block + prefix + suffix for regular and special events.
    fn compose(
        &mut self,
        state: &mut ParserState,
        record: &mut Record,
        prefix: Prefix,
        suffix: Suffix,
        cols: &[&str],
    ) -> Result<(), ParseError> {
        if cols.len() < 9 {
            return Err(ParseError::InsufficientColumns {
                event: cols[0].to_string(),
            });
        }
        self.parse_actor_block(record, cols);
        let tail = &cols[9..];
        let rest = self.apply_prefix(record, prefix, tail);
        self.apply_suffix(state, record, suffix, rest);
        Ok(())
    }

    /// The 8 mandatory columns present on every actor-block event:
    /// source GUID/name/flags/raid-flags, dest GUID/name/flags/raid-flags.
    fn parse_actor_block(&mut self, record: &mut Record, cols: &[&str]) {
        record.insert("sourceGUID".into(), Value::String(cols[1].to_string()));
        record.insert(
            "sourceName".into(),
            Value::String(strip_quotes(cols[2]).to_string()),
        );
        let source_flags = names_to_json(self.flags.unit_flags(cols[3]));
        record.insert("sourceFlags".into(), source_flags);
        let source_raid = names_to_json(self.flags.unit_flags(cols[4]));
        record.insert("sourceRaidFlags".into(), source_raid);
        record.insert("destGUID".into(), Value::String(cols[5].to_string()));
        record.insert(
            "destName".into(),
            Value::String(strip_quotes(cols[6]).to_string()),
        );
        let dest_flags = names_to_json(self.flags.unit_flags(cols[7]));
        record.insert("destFlags".into(), dest_flags);
        let dest_raid = names_to_json(self.flags.unit_flags(cols[8]));
        record.insert("destRaidFlags".into(), dest_raid);
    }

    /// Apply a prefix handler, returning the columns left for the suffix.
    fn apply_prefix<'a>(
        &mut self,
        record: &mut Record,
        prefix: Prefix,
        tail: &'a [&'a str],
    ) -> &'a [&'a str] {
        match prefix {
            Prefix::Passthrough => tail,
            Prefix::Spell => {
                if tail.len() < 3 {
                    record.insert("error".into(), json!("Spell data incomplete"));
                    record.insert("raw_cols".into(), cols_json(tail));
                    return tail;
                }
                let school = parse_int_or_default(tail[2], 0);
                record.insert("spellId".into(), json!(parse_int_or_default(tail[0], 0)));
                record.insert(
                    "spellName".into(),
                    Value::String(strip_quotes(tail[1]).to_string()),
                );
                record.insert("spellSchool".into(), json!(school));
                let school_names = names_to_json(self.flags.school_flags_of(school));
                record.insert("spellSchoolNames".into(), school_names);
                &tail[3..]
            }
            Prefix::Environmental => {
                let Some(&kind) = tail.first() else {
                    record.insert("error".into(), json!("Environmental data incomplete"));
                    return tail;
                };
                record.insert("environmentalType".into(), Value::String(kind.to_string()));
                &tail[1..]
            }
            Prefix::Enchant => {
                if tail.len() < 3 {
                    return tail;
                }
                record.insert(
                    "enchantName".into(),
                    Value::String(strip_quotes(tail[0]).to_string()),
                );
                record.insert("itemId".into(), json!(parse_int_or_default(tail[1], 0)));
                record.insert(
                    "itemName".into(),
                    Value::String(strip_quotes(tail[2]).to_string()),
                );
                &tail[3..]
            }
        }
    }

    fn apply_suffix(
        &mut self,
        state: &mut ParserState,
        record: &mut Record,
        suffix: Suffix,
        cols: &[&str],
    ) {
        match suffix {
            Suffix::Empty => {}
            Suffix::Damage => {
                let spec = schema::choose_damage_spec(cols);
                let mut mapped = schema::map_columns_dense(cols, spec);
                if let Some(school) = mapped.get("school").and_then(Value::as_i64) {
                    let names = names_to_json(self.flags.school_flags_of(school));
                    mapped.insert("schoolNames".into(), names);
                }
                record.extend(mapped);
            }
            Suffix::Heal => {
                record.extend(schema::map_columns_dense(cols, schema::choose_heal_spec(cols)));
            }
            Suffix::Miss => {
                let mut mapped = schema::map_columns_dense(cols, MISS_SPEC);
                // Older revisions report the missed amount in the resisted
                // slot; a missing or zero amountMissed defers to it. The key
                // is always emitted, null when neither column carries a value.
                let missed = mapped
                    .get("amountMissed")
                    .and_then(Value::as_i64)
                    .filter(|&v| v != 0)
                    .map(Value::from);
                let value = missed
                    .or_else(|| mapped.get("amountResisted").cloned())
                    .unwrap_or(Value::Null);
                mapped.insert("amountMissed".into(), value);
                record.extend(mapped);
            }
            Suffix::Energize => {
                record.extend(schema::map_columns_dense(cols, ENERGIZE_SPEC));
            }
            Suffix::Drain => self.schema_suffix(state, record, "DRAIN", DRAIN_SPEC, cols),
            Suffix::Leech => self.schema_suffix(state, record, "LEECH", LEECH_SPEC, cols),
            Suffix::ExtraAttacks => {
                self.schema_suffix(state, record, "EXTRA_ATTACKS", EXTRA_ATTACKS_SPEC, cols)
            }
            Suffix::SpellBlock => {
                self.schema_suffix(state, record, "SPELL_BLOCK", SPELL_BLOCK_SPEC, cols)
            }
            Suffix::Aura => {
                if cols.is_empty() {
                    state.warn_parse("AURA", cols, "No AURA data", "[auraType[, amount]]");
                    record.insert("error".into(), json!("No AURA data"));
                    return;
                }
                record.insert(
                    "auraType".into(),
                    Value::String(strip_quotes(cols[0]).to_string()),
                );
                if let Some(amount) = cols.get(1).copied().filter(|t| *t != "nil") {
                    record.insert("amount".into(), json!(parse_int_or_default(amount, 0)));
                }
            }
            Suffix::AuraRefresh => {
                if cols.is_empty() {
                    state.warn_parse(
                        "AURA_REFRESH",
                        cols,
                        "No aura refresh data",
                        "[auraType[, amount]]",
                    );
                    record.insert("error".into(), json!("No aura refresh data"));
                    return;
                }
                record.insert(
                    "auraType".into(),
                    Value::String(strip_quotes(cols[0]).to_string()),
                );
                if let Some(amount) = cols.get(1).copied().filter(|t| *t != "nil") {
                    record.insert("amount".into(), json!(parse_int_or_default(amount, 0)));
                }
            }
            Suffix::AuraDose => {
                // Exactly [auraType, newDose]; anything shorter is invalid.
                if cols.len() < 2 {
                    state.warn_parse("AURA_DOSE", cols, "Incomplete AURA_DOSE data", "2 cols");
                    record.insert("error".into(), json!("Incomplete AURA_DOSE data"));
                    record.insert("data".into(), cols_json(cols));
                    return;
                }
                record.insert(
                    "auraType".into(),
                    Value::String(strip_quotes(cols[0]).to_string()),
                );
                record.insert("newDose".into(), json!(parse_int_or_default(cols[1], 0)));
            }
            Suffix::AuraBrokenSpell => {
                if cols.len() < 4 {
                    state.warn_parse("AURA_BROKEN", cols, "No AURA_BROKEN data", ">= 4 cols");
                    record.insert("error".into(), json!("No AURA_BROKEN data"));
                    return;
                }
                record.insert("extraSpellId".into(), json!(parse_int_or_default(cols[0], 0)));
                record.insert(
                    "extraSpellName".into(),
                    Value::String(strip_quotes(cols[1]).to_string()),
                );
                record.insert("extraSchool".into(), json!(parse_int_or_default(cols[2], 0)));
                record.insert(
                    "auraType".into(),
                    Value::String(strip_quotes(cols[3]).to_string()),
                );
            }
            Suffix::CastFailed => {
                let Some(&failed) = cols.first() else {
                    record.insert("error".into(), json!("No cast failed data"));
                    return;
                };
                record.insert(
                    "failedType".into(),
                    Value::String(strip_quotes(failed).to_string()),
                );
            }
            Suffix::Absorbed => {
                if cols.len() < 7 {
                    state.warn_parse("SPELL_ABSORBED", cols, "No spell absorbed data", ">= 7 cols");
                    record.insert("error".into(), json!("No spell absorbed data"));
                    return;
                }
                record.insert("casterGuid".into(), Value::String(cols[0].to_string()));
                record.insert(
                    "casterName".into(),
                    Value::String(strip_quotes(cols[1]).to_string()),
                );
                record.insert("absorbSpellId".into(), json!(parse_int_or_default(cols[2], 0)));
                record.insert(
                    "absorbSpellName".into(),
                    Value::String(strip_quotes(cols[3]).to_string()),
                );
                record.insert("absorbedAmount".into(), json!(parse_int_or_default(cols[4], 0)));
                record.insert("totalAbsorbed".into(), json!(parse_int_or_default(cols[5], 0)));
                record.insert(
                    "isCritical".into(),
                    json!(parse_int_or_default(cols[6], 0) != 0),
                );
            }
        }
    }

    /// Shared shape for the fixed-schema amount suffixes: short input is a
    /// field-level error entry carrying the raw columns, never a line drop.
    fn schema_suffix(
        &mut self,
        state: &mut ParserState,
        record: &mut Record,
        label: &'static str,
        spec: Spec,
        cols: &[&str],
    ) {
        let required = schema::required_columns(spec);
        if cols.len() < required {
            let reason = format!("Insufficient {label} data");
            let expected = format!(">= {required} cols");
            state.warn_parse(label, cols, &reason, &expected);
            record.insert("error".into(), Value::String(reason));
            record.insert("data".into(), cols_json(cols));
            return;
        }
        record.extend(schema::map_columns(cols, spec));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Standalone events (no actor block)
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `Ok(None)` when the event is not a standalone one.
    fn dispatch_standalone(
        &mut self,
        state: &mut ParserState,
        event: &str,
        cols: &[&str],
    ) -> Result<Option<Record>, ParseError> {
        let payload = match event {
            "ENCOUNTER_START" | "ENCOUNTER_END" => parse_encounter(state, cols),
            "ARENA_MATCH_START" => parse_arena_start(cols),
            "ARENA_MATCH_END" => parse_arena_end(cols)?,
            "WORLD_MARKER_PLACED" | "WORLD_MARKER_REMOVED" => parse_world_marker(state, cols),
            "ZONE_CHANGE" => parse_zone_change(cols),
            _ => return Ok(None),
        };
        Ok(Some(payload))
    }
}

/// Longest-prefix fallback for event names outside the precomputed table.
fn resolve_by_prefix(event: &str) -> Option<(Prefix, Suffix)> {
    let &(prefix_name, prefix) = PREFIXES
        .iter()
        .find(|(name, _)| event.starts_with(name))?;
    let suffix_name = &event[prefix_name.len()..];
    let &(_, suffix) = SUFFIXES.iter().find(|(name, _)| *name == suffix_name)?;
    Some((prefix, suffix))
}

fn parse_encounter(state: &mut ParserState, cols: &[&str]) -> Record {
    let mut payload = Record::new();
    if cols.len() < 4 {
        state.warn_parse("ENCOUNTER", cols, "Encounter data incomplete", ">= 4 cols");
        payload.insert("error".into(), json!("Encounter data incomplete"));
        return payload;
    }
    let ids = (
        cols[0].parse::<i64>(),
        cols[2].parse::<i64>(),
        cols[3].parse::<i64>(),
    );
    match ids {
        (Ok(encounter_id), Ok(difficulty_id), Ok(group_size)) => {
            payload.insert("encounterId".into(), json!(encounter_id));
            payload.insert(
                "encounterName".into(),
                Value::String(strip_quotes(cols[1]).to_string()),
            );
            payload.insert("difficultyId".into(), json!(difficulty_id));
            payload.insert("groupSize".into(), json!(group_size));
        }
        _ => {
            state.warn_parse("ENCOUNTER", cols, "non-numeric encounter fields", "4 ints");
            payload.insert("error".into(), json!("Failed to parse ENCOUNTER data"));
        }
    }
    payload
}

/// Integer where the column is numeric, quoted text otherwise (older logs
/// put map names where ids live now).
fn int_or_text(token: &str) -> Value {
    parse_int(token).map_or_else(|| Value::String(strip_quotes(token).to_string()), Value::from)
}

fn parse_arena_start(cols: &[&str]) -> Record {
    let mut payload = Record::new();
    if cols.len() < 4 {
        payload.insert("error".into(), json!("Arena start data incomplete"));
        return payload;
    }
    payload.insert("instanceId".into(), int_or_text(cols[0]));
    payload.insert("mapId".into(), int_or_text(cols[1]));
    // Match types are emitted with embedded spaces; published records use
    // the sanitized underscore form.
    payload.insert(
        "matchType".into(),
        Value::String(strip_quotes(cols[2]).replace(' ', "_")),
    );
    if cols.len() > 3 {
        payload.insert("teamSize".into(), int_or_text(cols[3]));
    }
    if cols.len() > 4 {
        let extra = cols[4..]
            .iter()
            .map(|t| Value::String(strip_quotes(t).to_string()))
            .collect();
        payload.insert("extraFields".into(), Value::Array(extra));
    }
    payload
}

fn parse_arena_end(cols: &[&str]) -> Result<Record, ParseError> {
    let mut payload = Record::new();
    if cols.len() < 4 {
        payload.insert("error".into(), json!("Arena end data incomplete"));
        return Ok(payload);
    }
    let field = |idx: usize, name: &'static str| -> Result<i64, ParseError> {
        cols[idx]
            .parse::<i64>()
            .map_err(|_| ParseError::InvalidField {
                event: "ARENA_MATCH_END",
                field: name,
                token: cols[idx].to_string(),
            })
    };
    payload.insert("winningTeamId".into(), json!(field(0, "winningTeamId")?));
    payload.insert("matchDuration".into(), json!(field(1, "matchDuration")?));
    payload.insert("newRatingTeam1".into(), json!(field(2, "newRatingTeam1")?));
    payload.insert("newRatingTeam2".into(), json!(field(3, "newRatingTeam2")?));
    Ok(payload)
}

fn parse_world_marker(state: &mut ParserState, cols: &[&str]) -> Record {
    let mut payload = Record::new();
    // Removal usually carries only the marker flag.
    if cols.len() == 1 {
        payload.insert("removed".into(), json!(true));
        payload.insert("flag".into(), Value::String(cols[0].to_string()));
        return payload;
    }
    if cols.len() < 4 {
        state.warn_parse(
            "WORLD_MARKER",
            cols,
            "Insufficient data for WORLD_MARKER",
            ">= 4 cols",
        );
        payload.insert("error".into(), json!("Insufficient data for WORLD_MARKER"));
        payload.insert("data".into(), cols_json(cols));
        return payload;
    }
    payload.insert("mapId".into(), json!(parse_int_or_default(cols[0], 0)));
    payload.insert("markerId".into(), json!(parse_int_or_default(cols[1], 0)));
    payload.insert("x".into(), json!(parse_float(cols[2]).unwrap_or(0.0)));
    payload.insert("y".into(), json!(parse_float(cols[3]).unwrap_or(0.0)));
    if cols.len() > 4 {
        payload.insert("z".into(), json!(parse_float(cols[4]).unwrap_or(0.0)));
    }
    payload
}

fn parse_zone_change(cols: &[&str]) -> Record {
    let mut payload = Record::new();
    if cols.len() < 3 {
        payload.insert("error".into(), json!(format!("Invalid format for ZONE_CHANGE: {cols:?}")));
        return payload;
    }
    payload.insert("zoneId".into(), Value::String(cols[1].to_string()));
    payload.insert(
        "zoneName".into(),
        Value::String(cols[2].trim_matches(['\'', '"']).to_string()),
    );
    if cols.len() >= 4 {
        payload.insert("zoneFlag".into(), Value::String(cols[3].to_string()));
    }
    payload
}
