//! Static specialization id table: class and spec names per numeric id.

use phf::phf_map;

pub static SPEC_IDS: phf::Map<i64, (&'static str, &'static str)> = phf_map! {
    62i64 => ("Mage", "Arcane"),
    63i64 => ("Mage", "Fire"),
    64i64 => ("Mage", "Frost"),
    65i64 => ("Paladin", "Holy"),
    66i64 => ("Paladin", "Protection"),
    70i64 => ("Paladin", "Retribution"),
    71i64 => ("Warrior", "Arms"),
    72i64 => ("Warrior", "Fury"),
    73i64 => ("Warrior", "Protection"),
    102i64 => ("Druid", "Balance"),
    103i64 => ("Druid", "Feral"),
    104i64 => ("Druid", "Guardian"),
    105i64 => ("Druid", "Restoration"),
    250i64 => ("Death Knight", "Blood"),
    251i64 => ("Death Knight", "Frost"),
    252i64 => ("Death Knight", "Unholy"),
    253i64 => ("Hunter", "Beast Mastery"),
    254i64 => ("Hunter", "Marksmanship"),
    255i64 => ("Hunter", "Survival"),
    256i64 => ("Priest", "Discipline"),
    257i64 => ("Priest", "Holy"),
    258i64 => ("Priest", "Shadow"),
    259i64 => ("Rogue", "Assassination"),
    260i64 => ("Rogue", "Outlaw"),
    261i64 => ("Rogue", "Subtlety"),
    262i64 => ("Shaman", "Elemental"),
    263i64 => ("Shaman", "Enhancement"),
    264i64 => ("Shaman", "Restoration"),
    265i64 => ("Warlock", "Affliction"),
    266i64 => ("Warlock", "Demonology"),
    267i64 => ("Warlock", "Destruction"),
    268i64 => ("Monk", "Brewmaster"),
    269i64 => ("Monk", "Windwalker"),
    270i64 => ("Monk", "Mistweaver"),
    577i64 => ("Demon Hunter", "Havoc"),
    581i64 => ("Demon Hunter", "Vengeance"),
    1467i64 => ("Evoker", "Devastation"),
    1468i64 => ("Evoker", "Preservation"),
    1473i64 => ("Evoker", "Augmentation"),
};

/// Resolve a spec id to (class, spec) names. Ids outside the table get the
/// "unknown" sentinel so one unmapped spec never sinks a snapshot.
pub fn resolve_spec(spec_id: i64) -> (&'static str, &'static str) {
    SPEC_IDS.get(&spec_id).copied().unwrap_or(("unknown", "unknown"))
}
