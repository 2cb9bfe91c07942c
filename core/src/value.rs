//! Permissive column coercion.
//!
//! Log columns are loosely typed: numbers may be decimal or `0x` hex, the
//! literal `nil` stands for "absent", and names come double-quoted. Every
//! helper here degrades to `None` instead of failing so that a single odd
//! column never takes down a handler that can survive it.

/// Parse an integer column. Accepts decimal and `0x` hex, tolerates
/// surrounding whitespace, maps `nil` and garbage to `None`.
pub fn parse_int(token: &str) -> Option<i64> {
    let text = token.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nil") {
        return None;
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = text.strip_prefix("-0x").or_else(|| text.strip_prefix("-0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| -v);
    }
    text.parse::<i64>().ok()
}

/// Parse an integer column, falling back to a default on `nil` or garbage.
pub fn parse_int_or_default(token: &str, default: i64) -> i64 {
    parse_int(token).unwrap_or(default)
}

pub fn parse_float(token: &str) -> Option<f64> {
    let text = token.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nil") {
        return None;
    }
    text.parse::<f64>().ok()
}

/// Booleans are written as integers (`0`/`1`); `nil` is `None`.
pub fn parse_bool(token: &str) -> Option<bool> {
    parse_int(token).map(|v| v != 0)
}

/// Remove double quotes at both ends, leaving interior quotes alone.
pub fn strip_quotes(token: &str) -> &str {
    token.trim().trim_matches('"')
}

/// Resolve a numeric power type to its in-game name.
pub fn resolve_power_type(power_type: i64) -> &'static str {
    match power_type {
        -2 => "health",
        0 => "mana",
        1 => "rage",
        2 => "focus",
        3 => "energy",
        4 => "combo points",
        5 => "runes",
        6 => "runic power",
        7 => "soul shards",
        8 => "lunar power",
        9 => "holy power",
        10 => "alternate",
        11 => "maelstrom",
        12 => "chi",
        13 => "insanity",
        16 => "arcane charges",
        17 => "fury",
        18 => "pain",
        19 => "essence",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" -7 "), Some(-7));
        assert_eq!(parse_int("0x11"), Some(17));
        assert_eq!(parse_int("0X10"), Some(16));
    }

    #[test]
    fn nil_and_garbage_are_none() {
        assert_eq!(parse_int("nil"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("Pet-0-1234"), None);
        assert_eq!(parse_int_or_default("nil", 3), 3);
    }

    #[test]
    fn bool_goes_through_int() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nil"), None);
    }

    #[test]
    fn strips_outer_quotes_only() {
        assert_eq!(strip_quotes("\"Flame Shock\""), "Flame Shock");
        assert_eq!(strip_quotes("plain"), "plain");
    }

    #[test]
    fn power_types_resolve() {
        assert_eq!(resolve_power_type(0), "mana");
        assert_eq!(resolve_power_type(19), "essence");
        assert_eq!(resolve_power_type(99), "unknown");
    }
}
