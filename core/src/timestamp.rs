//! Timestamp resolution for the `M/D[/Y] H:M:S.fff` line prefix.
//!
//! The log format carries no year in most revisions, so resolution leans on
//! two crutches: an optional year hint (taken from a four-digit file-name
//! prefix) and a rollover heuristic that pulls "future" dates back one year
//! when a log straddles New Year without a year column.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::ParseError;

/// Fallback year when the line has no year column and no hint was supplied.
const DEFAULT_YEAR: i32 = 2023;

/// Dates more than this far in the future trigger the rollover correction.
const ROLLOVER_DAYS: i64 = 180;

/// Split the leading date/time token off a line and resolve it.
///
/// Returns the resolved instant and the remainder of the line (the CSV
/// portion). Fails with [`ParseError::MalformedTimestamp`] when the line
/// does not have at least three whitespace-separated parts or the date/time
/// cannot be parsed; the caller drops only the current line.
pub fn resolve_timestamp<'a>(
    line: &'a str,
    year_hint: Option<i32>,
    now: NaiveDateTime,
) -> Result<(NaiveDateTime, &'a str), ParseError> {
    let malformed = || ParseError::MalformedTimestamp(line.chars().take(50).collect());

    let mut parts = line.splitn(3, char::is_whitespace);
    let date_str = parts.next().ok_or_else(malformed)?;
    let time_raw = parts.next().ok_or_else(malformed)?;
    let rest = parts.next().ok_or_else(malformed)?.trim_start();

    let time_str = strip_timezone(time_raw);

    let mut date_parts = date_str.split('/');
    let month: u32 = date_parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;
    let day: u32 = date_parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;
    let raw_year: Option<i32> = match date_parts.next() {
        Some(token) => Some(token.parse().map_err(|_| malformed())?),
        None => None,
    };

    let year = match raw_year {
        // Two-digit years window at 70: 69 -> 2069, 70 -> 1970.
        Some(y) if y < 70 => y + 2000,
        Some(y) if y < 100 => y + 1900,
        Some(y) => y,
        None => year_hint.unwrap_or(DEFAULT_YEAR),
    };

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)?;
    let time = chrono::NaiveTime::parse_from_str(time_str, "%H:%M:%S%.f")
        .map_err(|_| malformed())?;
    let mut resolved = NaiveDateTime::new(date, time);

    // Year-boundary logs written without a year column: a December log parsed
    // in January would otherwise land ~11 months in the future.
    if raw_year.is_none()
        && year_hint.is_none()
        && (resolved - now).num_days() > ROLLOVER_DAYS
    {
        let back = NaiveDate::from_ymd_opt(resolved.date().year() - 1, month, day)
            .ok_or_else(malformed)?;
        resolved = NaiveDateTime::new(back, time);
    }

    Ok((resolved, rest))
}

/// Strip a trailing signed timezone offset (`+5`, `-05`, `+05:30`, `-0530`)
/// from a time token, if present.
fn strip_timezone(token: &str) -> &str {
    let bytes = token.as_bytes();
    let Some(sign_pos) = token.rfind(['+', '-']) else {
        return token;
    };
    if sign_pos == 0 {
        return token;
    }
    let suffix = &bytes[sign_pos + 1..];
    let digits = suffix.iter().filter(|b| b.is_ascii_digit()).count();
    let ok = !suffix.is_empty()
        && suffix.iter().all(|b| b.is_ascii_digit() || *b == b':')
        && digits <= 4;
    if ok { &token[..sign_pos] } else { token }
}

/// Convert a resolved instant to fractional epoch seconds for output.
pub fn epoch_seconds(instant: NaiveDateTime) -> f64 {
    instant.and_utc().timestamp_micros() as f64 / 1_000_000.0
}

/// Extract a four-digit year hint from the start of a file stem
/// (`20231117_abcdef.txt` -> 2023). Years before 1970 are ignored.
pub fn extract_year_hint(path: &std::path::Path) -> Option<i32> {
    let stem = path.file_stem()?.to_str()?;
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let year: i32 = digits[..4].parse().ok()?;
    (year >= 1970).then_some(year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn resolves_with_year_hint() {
        let (ts, rest) = resolve_timestamp(
            "11/17 21:13:49.617  ARENA_MATCH_START,572,0",
            Some(2022),
            at(2023, 6, 1),
        )
        .unwrap();
        assert_eq!(ts.to_string(), "2022-11-17 21:13:49.617");
        assert_eq!(rest, "ARENA_MATCH_START,572,0");
    }

    #[test]
    fn explicit_two_digit_year_windows() {
        let (ts, _) =
            resolve_timestamp("5/2/24 08:00:00.000  X,1", None, at(2023, 6, 1)).unwrap();
        assert_eq!(ts.date().year(), 2024);
        let (ts, _) =
            resolve_timestamp("5/2/99 08:00:00.000  X,1", None, at(2023, 6, 1)).unwrap();
        assert_eq!(ts.date().year(), 1999);
    }

    #[test]
    fn rollover_subtracts_a_year_without_hint() {
        // Default year 2023, reference "now" in January 2023: a December
        // date is ~11 months ahead and snaps back to 2022.
        let (ts, _) =
            resolve_timestamp("12/30 23:59:00.000  X,1", None, at(2023, 1, 5)).unwrap();
        assert_eq!(ts.date().year(), 2022);

        // With a hint, the heuristic stays off.
        let (ts, _) =
            resolve_timestamp("12/30 23:59:00.000  X,1", Some(2023), at(2023, 1, 5)).unwrap();
        assert_eq!(ts.date().year(), 2023);
    }

    #[test]
    fn timezone_suffix_is_stripped() {
        let (ts, _) =
            resolve_timestamp("11/17 21:13:49.617-5 X,1", Some(2023), at(2023, 6, 1)).unwrap();
        assert_eq!(ts.to_string(), "2023-11-17 21:13:49.617");
        let (ts, _) =
            resolve_timestamp("11/17 21:13:49.617+05:30 X,1", Some(2023), at(2023, 6, 1))
                .unwrap();
        assert_eq!(ts.to_string(), "2023-11-17 21:13:49.617");
    }

    #[test]
    fn too_few_parts_is_malformed() {
        let err = resolve_timestamp("11/17 21:13:49.617", None, at(2023, 6, 1)).unwrap_err();
        assert!(matches!(err, ParseError::MalformedTimestamp(_)));
    }

    #[test]
    fn bad_date_is_malformed() {
        let err =
            resolve_timestamp("13/40 21:13:49.617  X,1", None, at(2023, 6, 1)).unwrap_err();
        assert!(matches!(err, ParseError::MalformedTimestamp(_)));
    }

    #[test]
    fn year_hint_from_filename() {
        assert_eq!(
            extract_year_hint(Path::new("/logs/20231117_0ab3f.txt")),
            Some(2023)
        );
        assert_eq!(extract_year_hint(Path::new("/logs/0042_x.txt")), None);
        assert_eq!(extract_year_hint(Path::new("/logs/match.txt")), None);
    }
}
