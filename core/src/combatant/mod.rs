//! Combatant snapshot decoder.
//!
//! COMBATANT_INFO is the one event carrying a full character build: a fixed
//! numeric stat block followed by a run of variable-shaped nested literals
//! (talents, an optional expansion power block, equipped items, notable
//! auras) and four closing PvP columns. Blocks consume a contiguous prefix
//! of the column tail in order; there is no version tag anywhere, so block
//! boundaries are detected from literal shape alone.

mod spec_ids;

pub use spec_ids::{SPEC_IDS, resolve_spec};

use serde_json::{Map, Value, json};

use crate::error::ParseError;
use crate::literal::{Literal, parse_literal};

/// The 21 fixed attributes, in column order, followed by the spec id.
const STAT_LABELS: [&str; 21] = [
    "strength",
    "agility",
    "stamina",
    "intellect",
    "dodge",
    "parry",
    "block",
    "crit_melee",
    "crit_ranged",
    "crit_spell",
    "speed",
    "lifesteal",
    "haste_melee",
    "haste_ranged",
    "haste_spell",
    "avoidance",
    "mastery",
    "versatility_damage_done",
    "versatility_healing_done",
    "versatility_damage_taken",
    "armor",
];

/// The expansion-specific power block, as detected by [`sniff_expansion`].
///
/// This block is optional and shape-detected: a flat even-length int list is
/// the legacy artifact-trait form, the 5-element mixed list is the covenant
/// form, a list of tuples is actually the equipment block (so: absent), and
/// anything else is preserved raw rather than rejected.
#[derive(Debug, PartialEq)]
pub enum ExpansionPowers {
    Absent,
    ArtifactTraits,
    Covenant,
    Raw,
}

/// Classify the literal that may or may not be an expansion power block.
/// Kept separate from decoding because this is the most fragile heuristic
/// in the whole format.
pub fn sniff_expansion(lit: &Literal) -> ExpansionPowers {
    let Literal::List(items) = lit else {
        return ExpansionPowers::Raw;
    };
    if let Some(first) = items.first() {
        if first.is_tuple() {
            // A list of tuples is the equipment block, not powers.
            return ExpansionPowers::Absent;
        }
    }
    if is_covenant_block(items) {
        return ExpansionPowers::Covenant;
    }
    if items.iter().all(|item| item.as_int().is_some()) && items.len() % 2 == 0 {
        return ExpansionPowers::ArtifactTraits;
    }
    ExpansionPowers::Raw
}

/// [soulbind id, covenant id, anima powers (3-tuples), soulbind trait ids,
/// conduit (id, ilvl) tuples].
fn is_covenant_block(items: &[Literal]) -> bool {
    if items.len() < 5 {
        return false;
    }
    let ints_lead = items[0].as_int().is_some() && items[1].as_int().is_some();
    let lists_follow = items[2..5].iter().all(|item| matches!(item, Literal::List(_)));
    if !ints_lead || !lists_follow {
        return false;
    }
    let Some(anima) = items[2].items() else {
        return false;
    };
    anima
        .iter()
        .all(|entry| entry.is_tuple() && entry.items().is_some_and(|t| t.len() == 3))
}

/// Decode a full COMBATANT_INFO column tail (everything after the event
/// name) into a snapshot record.
///
/// Stats, talents, equipment, and the closing PvP block are load-bearing:
/// any failure there fails the whole event. The expansion block and the
/// aura list degrade gracefully.
pub fn parse_snapshot(epoch: f64, cols: &[&str]) -> Result<Map<String, Value>, ParseError> {
    let mut record = Map::new();
    record.insert("timestamp".into(), json!(epoch));
    record.insert("event".into(), Value::String("COMBATANT_INFO".to_string()));

    let (player, stats, rest) = parse_identity_and_stats(cols)?;
    let (class_talents, pvp_talents, rest) = parse_talents(rest)?;
    let (expansion, rest) = parse_expansion(rest)?;
    let (equipment, rest) = parse_equipment(rest)?;
    let (auras, pvp) = parse_auras_and_pvp(rest)?;

    record.insert("player".into(), player);
    record.insert("stats".into(), stats);
    record.insert("class_talents".into(), class_talents);
    record.insert("pvp_talents".into(), pvp_talents);
    record.insert("expansion_powers".into(), expansion);
    record.insert("equipment".into(), equipment);
    record.insert("interesting_auras".into(), auras);
    record.insert("pvp_stats".into(), pvp);
    Ok(record)
}

fn stat_int(token: &str, field: &'static str) -> Result<i64, ParseError> {
    token.trim().parse::<i64>().map_err(|_| ParseError::InvalidField {
        event: "COMBATANT_INFO",
        field,
        token: token.to_string(),
    })
}

/// Columns 0-1 are guid and faction; 2..23 the stat block; 23 the spec id.
fn parse_identity_and_stats<'a>(
    cols: &'a [&'a str],
) -> Result<(Value, Value, &'a [&'a str]), ParseError> {
    if cols.len() < 2 {
        return Err(ParseError::IncompleteSnapshot { block: "player identity" });
    }
    let minimum = 2 + STAT_LABELS.len() + 1;
    if cols.len() < minimum {
        return Err(ParseError::IncompleteSnapshot { block: "attributes" });
    }

    let mut stats = Map::with_capacity(STAT_LABELS.len() + 1);
    for (&label, &token) in STAT_LABELS.iter().zip(&cols[2..]) {
        stats.insert(label.to_string(), json!(stat_int(token, label)?));
    }
    let spec_id = stat_int(cols[2 + STAT_LABELS.len()], "spec_id")?;
    stats.insert("spec_id".into(), json!(spec_id));

    let (class_name, spec_name) = resolve_spec(spec_id);
    let mut player = Map::new();
    player.insert("guid".into(), Value::String(cols[0].to_string()));
    player.insert("faction".into(), json!(stat_int(cols[1], "faction")?));
    player.insert("class".into(), Value::String(class_name.to_string()));
    player.insert("spec".into(), Value::String(spec_name.to_string()));

    Ok((Value::Object(player), Value::Object(stats), &cols[minimum..]))
}

/// Class talents come as id/spell/rank triples in current logs and as a
/// flat id list pre-rework; the shape of the literal decides which.
fn parse_talents<'a>(cols: &'a [&'a str]) -> Result<(Value, Value, &'a [&'a str]), ParseError> {
    if cols.len() < 2 {
        return Err(ParseError::IncompleteSnapshot { block: "class/PvP talents" });
    }

    let class_talents = if cols[0].is_empty() {
        Value::Array(vec![])
    } else {
        let lit = parse_literal(cols[0], "class talents")?;
        decode_class_talents(&lit)?
    };

    let pvp_talents = if cols[1].is_empty() {
        Value::Array(vec![])
    } else {
        let lit = parse_literal(cols[1], "PvP talents")?;
        let ids = match lit.items() {
            Some(items) => items.iter().map(Literal::as_int).collect::<Option<Vec<i64>>>(),
            // A bare id shows up when only one talent is picked.
            None => lit.as_int().map(|id| vec![id]),
        }
        .ok_or(ParseError::MalformedLiteral { label: "PvP talents" })?;
        Value::Array(ids.into_iter().map(Value::from).collect())
    };

    Ok((class_talents, pvp_talents, &cols[2..]))
}

fn decode_class_talents(lit: &Literal) -> Result<Value, ParseError> {
    let items = lit
        .items()
        .ok_or(ParseError::MalformedLiteral { label: "class talents" })?;
    if items.is_empty() {
        return Ok(Value::Array(vec![]));
    }
    if items.iter().all(Literal::is_tuple) {
        let mut talents = Vec::with_capacity(items.len());
        for entry in items {
            let parts = entry
                .items()
                .filter(|t| t.len() >= 3)
                .ok_or(ParseError::MalformedLiteral { label: "class talents" })?;
            talents.push(json!({
                "talent_id": parts[0].as_int(),
                "spell_id": parts[1].as_int(),
                "rank": parts[2].as_int(),
            }));
        }
        return Ok(Value::Array(talents));
    }
    if items.iter().all(|item| item.as_int().is_some()) {
        let ids = items.iter().filter_map(Literal::as_int).map(Value::from).collect();
        return Ok(Value::Array(ids));
    }
    Err(ParseError::MalformedLiteral { label: "class talents" })
}

/// Consume the optional expansion power block. When the next literal is
/// the equipment list (or there is no literal at all), nothing is consumed
/// and the block is null.
fn parse_expansion<'a>(cols: &'a [&'a str]) -> Result<(Value, &'a [&'a str]), ParseError> {
    let Some(&token) = cols.first() else {
        return Ok((Value::Null, cols));
    };
    if !token.starts_with('[') {
        return Ok((Value::Null, cols));
    }
    let lit = parse_literal(token, "expansion powers")?;
    match sniff_expansion(&lit) {
        ExpansionPowers::Absent => Ok((Value::Null, cols)),
        ExpansionPowers::Covenant => Ok((decode_covenant(&lit)?, &cols[1..])),
        ExpansionPowers::ArtifactTraits => Ok((decode_artifact_traits(&lit), &cols[1..])),
        ExpansionPowers::Raw => Ok((json!({ "data": lit.to_json() }), &cols[1..])),
    }
}

fn decode_covenant(lit: &Literal) -> Result<Value, ParseError> {
    let items = lit
        .items()
        .ok_or(ParseError::MalformedLiteral { label: "expansion powers" })?;
    let anima: Vec<Value> = items[2]
        .items()
        .unwrap_or(&[])
        .iter()
        .filter_map(Literal::items)
        .map(|t| {
            json!({
                "spell_id": t[0].as_int(),
                "maw_power_id": t[1].as_int(),
                "count": t[2].as_int(),
            })
        })
        .collect();
    let soulbind_traits: Vec<Value> = items[3]
        .items()
        .unwrap_or(&[])
        .iter()
        .filter_map(Literal::as_int)
        .map(Value::from)
        .collect();
    let conduits: Vec<Value> = items[4]
        .items()
        .unwrap_or(&[])
        .iter()
        .filter_map(Literal::items)
        .filter(|t| t.len() >= 2)
        .map(|t| json!({ "id": t[0].as_int(), "item_level": t[1].as_int() }))
        .collect();
    Ok(json!({
        "soulbind_id": items[0].as_int(),
        "covenant_id": items[1].as_int(),
        "anima_powers": anima,
        "soulbind_traits": soulbind_traits,
        "conduits": conduits,
    }))
}

fn decode_artifact_traits(lit: &Literal) -> Value {
    let ints: Vec<i64> = lit
        .items()
        .unwrap_or(&[])
        .iter()
        .filter_map(Literal::as_int)
        .collect();
    let traits: Vec<Value> = ints
        .chunks_exact(2)
        .map(|pair| json!({ "trait_id": pair[0], "rank": pair[1] }))
        .collect();
    json!({ "artifact_traits": traits })
}

/// Equipment entries are (item id, ilvl[, enchants[, bonus ids[, gems]]]).
/// Wrong arity or a non-numeric id/level fails the whole event.
fn parse_equipment<'a>(cols: &'a [&'a str]) -> Result<(Value, &'a [&'a str]), ParseError> {
    let Some(&token) = cols.first() else {
        return Err(ParseError::IncompleteSnapshot { block: "equipment" });
    };
    let lit = parse_literal(token, "equipment")?;
    let entries = lit.items().ok_or(ParseError::MalformedEquipment)?;

    let mut equipment = Vec::with_capacity(entries.len());
    for entry in entries {
        let parts = entry.items().ok_or(ParseError::MalformedEquipment)?;
        if parts.len() < 2 {
            return Err(ParseError::MalformedEquipment);
        }
        let item_id = parts[0].as_int().ok_or(ParseError::MalformedEquipment)?;
        let item_level = parts[1].as_int().ok_or(ParseError::MalformedEquipment)?;
        let enchants = int_group(parts.get(2));
        let bonus_list = int_group(parts.get(3));
        let gem_values = int_group(parts.get(4));
        // Gems interleave id and item level; a trailing unpaired id keeps
        // a null level.
        let gems: Vec<Value> = gem_values
            .chunks(2)
            .map(|pair| json!({ "id": pair[0], "item_level": pair.get(1).copied() }))
            .collect();
        equipment.push(json!({
            "item_id": item_id,
            "item_level": item_level,
            "enchants": enchants,
            "bonus_list": bonus_list,
            "gems": gems,
        }));
    }
    Ok((Value::Array(equipment), &cols[1..]))
}

/// Flatten an optional sub-literal into its integer members; anything that
/// is not cleanly numeric collapses to empty rather than failing.
fn int_group(lit: Option<&Literal>) -> Vec<i64> {
    match lit {
        None => vec![],
        Some(lit) => match lit.items() {
            Some(items) => {
                let ints: Vec<i64> = items.iter().filter_map(Literal::as_int).collect();
                if ints.len() == items.len() { ints } else { vec![] }
            }
            None => lit.as_int().map_or_else(Vec::new, |v| vec![v]),
        },
    }
}

/// The aura list is a flat [caster, spell, caster, spell, ...] bracket
/// group; the four trailing columns are honor level, season, rating, tier.
fn parse_auras_and_pvp(cols: &[&str]) -> Result<(Value, Value), ParseError> {
    if cols.is_empty() {
        let empty_pvp = json!({
            "Honor Level": null,
            "Season": null,
            "Rating": null,
            "Tier": null,
        });
        return Ok((Value::Array(vec![]), empty_pvp));
    }
    if cols.len() < 5 {
        return Err(ParseError::IncompleteSnapshot { block: "PvP stats" });
    }

    let aura_tokens = split_bracket_list(cols[0]);
    let auras: Vec<Value> = aura_tokens
        .chunks_exact(2)
        .map(|pair| {
            let spell: Value = pair[1]
                .trim()
                .parse::<i64>()
                .map_or_else(|_| Value::String(pair[1].to_string()), Value::from);
            json!({ "caster_guid": pair[0], "spell_id": spell })
        })
        .collect();

    let pvp_fields: [&'static str; 4] = ["Honor Level", "Season", "Rating", "Tier"];
    let mut pvp = Map::with_capacity(4);
    for (&name, &token) in pvp_fields.iter().zip(&cols[1..5]) {
        pvp.insert(name.to_string(), json!(stat_int(token, "pvp_stats")?));
    }
    Ok((Value::Array(auras), Value::Object(pvp)))
}

/// Strip one layer of brackets and split flat; the aura group never nests.
fn split_bracket_list(token: &str) -> Vec<&str> {
    let inner = token
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(token.trim());
    if inner.is_empty() {
        return vec![];
    }
    inner.split(',').map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IDENTITY_AND_STATS: [&str; 24] = [
        "Player-1096-0A502AE2",
        "0", // faction
        "10000", "2000", "50000", "30000", "0", "0", "0", "3000", "3000", "3000", "100", "200",
        "1500", "1500", "1500", "400", "8000", "1200", "1200", "600", "45000",
        "257", // spec id: Holy Priest
    ];

    fn full_line(tail: &[&'static str]) -> Vec<&'static str> {
        let mut cols = IDENTITY_AND_STATS.to_vec();
        cols.extend_from_slice(tail);
        cols
    }

    #[test]
    fn full_snapshot_decodes() {
        let cols = full_line(&[
            "[(90328,228990,1),(90329,228991,2)]",
            "(1234,)",
            "[(207199,447,(),(6652,9232),(192985,415)),(158075,100,(),(),())]",
            "[Player-1096-0A502AE2,21562,Player-1096-06DC3D9B,1459]",
            "55",
            "37",
            "1801",
            "3",
        ]);
        let record = parse_snapshot(1_700_000_000.0, &cols).unwrap();

        assert_eq!(record["player"]["guid"], "Player-1096-0A502AE2");
        assert_eq!(record["player"]["class"], "Priest");
        assert_eq!(record["player"]["spec"], "Holy");
        assert_eq!(record["stats"]["strength"], 10000);
        assert_eq!(record["stats"]["armor"], 45000);
        assert_eq!(record["stats"]["spec_id"], 257);
        assert_eq!(
            record["class_talents"][0],
            json!({"talent_id": 90328, "spell_id": 228990, "rank": 1})
        );
        assert_eq!(record["pvp_talents"], json!([1234]));
        assert_eq!(record["expansion_powers"], Value::Null);
        assert_eq!(record["equipment"][0]["item_id"], 207199);
        assert_eq!(record["equipment"][0]["bonus_list"], json!([6652, 9232]));
        assert_eq!(
            record["equipment"][0]["gems"],
            json!([{"id": 192985, "item_level": 415}])
        );
        assert_eq!(record["interesting_auras"][0]["spell_id"], 21562);
        assert_eq!(record["interesting_auras"].as_array().unwrap().len(), 2);
        assert_eq!(record["pvp_stats"]["Honor Level"], 55);
        assert_eq!(record["pvp_stats"]["Rating"], 1801);
    }

    #[test]
    fn legacy_flat_talents_decode() {
        let cols = full_line(&[
            "[12345,23456,34567]",
            "[]",
            "[(158075,100,(),(),())]",
            "[]",
            "0", "0", "0", "0",
        ]);
        let record = parse_snapshot(0.0, &cols).unwrap();
        assert_eq!(record["class_talents"], json!([12345, 23456, 34567]));
        assert_eq!(record["pvp_talents"], json!([]));
    }

    #[test]
    fn non_numeric_pvp_talent_is_fatal() {
        let cols = full_line(&[
            "[]",
            "[abc]",
            "[(158075,100,(),(),())]",
            "[]",
            "0", "0", "0", "0",
        ]);
        assert!(matches!(
            parse_snapshot(0.0, &cols),
            Err(ParseError::MalformedLiteral { label: "PvP talents" })
        ));
    }

    #[test]
    fn empty_aura_literal_is_empty_set() {
        let cols = full_line(&[
            "[]",
            "[]",
            "[(158075,100,(),(),())]",
            "[]",
            "10", "35", "0", "0",
        ]);
        let record = parse_snapshot(0.0, &cols).unwrap();
        assert_eq!(record["interesting_auras"], json!([]));
    }

    #[test]
    fn missing_tail_defaults_auras_and_pvp() {
        let cols = full_line(&["[]", "[]", "[(158075,100,(),(),())]"]);
        let record = parse_snapshot(0.0, &cols).unwrap();
        assert_eq!(record["interesting_auras"], json!([]));
        assert_eq!(record["pvp_stats"]["Rating"], Value::Null);
    }

    #[test]
    fn short_pvp_tail_is_fatal() {
        let cols = full_line(&["[]", "[]", "[(158075,100,(),(),())]", "[]", "10"]);
        assert!(matches!(
            parse_snapshot(0.0, &cols),
            Err(ParseError::IncompleteSnapshot { block: "PvP stats" })
        ));
    }

    #[test]
    fn artifact_traits_detected_and_consumed() {
        let cols = full_line(&[
            "[]",
            "[]",
            "[1001,3,1002,2]",
            "[(158075,100,(),(),())]",
            "[]",
            "0", "0", "0", "0",
        ]);
        let record = parse_snapshot(0.0, &cols).unwrap();
        assert_eq!(
            record["expansion_powers"]["artifact_traits"],
            json!([{"trait_id": 1001, "rank": 3}, {"trait_id": 1002, "rank": 2}])
        );
        assert_eq!(record["equipment"][0]["item_id"], 158075);
    }

    #[test]
    fn covenant_block_detected() {
        let cols = full_line(&[
            "[]",
            "[]",
            "[9,1,[(325728,100,1)],[82,83],[(160,213),(161,213)]]",
            "[(158075,100,(),(),())]",
            "[]",
            "0", "0", "0", "0",
        ]);
        let record = parse_snapshot(0.0, &cols).unwrap();
        let powers = &record["expansion_powers"];
        assert_eq!(powers["soulbind_id"], 9);
        assert_eq!(powers["covenant_id"], 1);
        assert_eq!(powers["anima_powers"][0]["spell_id"], 325728);
        assert_eq!(powers["soulbind_traits"], json!([82, 83]));
        assert_eq!(powers["conduits"][1], json!({"id": 161, "item_level": 213}));
    }

    #[test]
    fn unrecognized_expansion_shape_kept_raw() {
        let cols = full_line(&[
            "[]",
            "[]",
            "[1,2,3]",
            "[(158075,100,(),(),())]",
            "[]",
            "0", "0", "0", "0",
        ]);
        let record = parse_snapshot(0.0, &cols).unwrap();
        assert_eq!(record["expansion_powers"]["data"], json!([1, 2, 3]));
    }

    #[test]
    fn sniff_is_shape_only() {
        let absent = parse_literal("[(1,2),(3,4)]", "t").unwrap();
        assert_eq!(sniff_expansion(&absent), ExpansionPowers::Absent);
        let artifact = parse_literal("[1,2,3,4]", "t").unwrap();
        assert_eq!(sniff_expansion(&artifact), ExpansionPowers::ArtifactTraits);
        let covenant = parse_literal("[9,1,[],[82],[(160,213)]]", "t").unwrap();
        assert_eq!(sniff_expansion(&covenant), ExpansionPowers::Covenant);
        let odd = parse_literal("[1,2,3]", "t").unwrap();
        assert_eq!(sniff_expansion(&odd), ExpansionPowers::Raw);
    }

    #[test]
    fn bad_equipment_arity_is_fatal() {
        let cols = full_line(&[
            "[]",
            "[]",
            "[(158075,)]",
            "[]",
            "0", "0", "0", "0",
        ]);
        assert!(matches!(
            parse_snapshot(0.0, &cols),
            Err(ParseError::MalformedEquipment)
        ));
    }

    #[test]
    fn unknown_spec_id_maps_to_sentinel() {
        assert_eq!(resolve_spec(999_999), ("unknown", "unknown"));
        assert_eq!(resolve_spec(577), ("Demon Hunter", "Havoc"));
    }

    #[test]
    fn non_numeric_stat_is_invalid_field() {
        let mut cols = full_line(&["[]", "[]", "[]", "[]", "0", "0", "0", "0"]);
        cols[2] = "abc";
        assert!(matches!(
            parse_snapshot(0.0, &cols),
            Err(ParseError::InvalidField { field: "strength", .. })
        ));
    }
}
