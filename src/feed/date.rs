//! Publication date normalization.
//!
//! Feeds carry dates in RFC 3339 (Atom), RFC 822/2822 (RSS) and a long tail of
//! near-misses of both. Everything is normalized to a UTC instant; anything that
//! can't be read is treated as absent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Naive ISO-like layouts, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// ISO-like layouts with a numeric offset (`+0100` or `+01:00`).
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Zone abbreviations chrono's RFC 2822 parser does not know.
const EXTRA_ZONES: &[(&str, &str)] = &[
    ("UTC", "+0000"),
    ("Z", "+0000"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("BST", "+0100"),
    ("IST", "+0530"),
    ("JST", "+0900"),
    ("AEST", "+1000"),
    ("AEDT", "+1100"),
];

/// Parses a feed date into a UTC instant.
///
/// Tries RFC 3339, then RFC 2822, then common ISO variants, then a repaired
/// RFC 822 form (weekday dropped, month shortened, zone made explicit).
/// Returns `None` instead of erroring when every attempt fails.
pub fn normalize_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_iso_variants(s) {
        return Some(dt);
    }

    let repaired = repair_rfc822(s)?;
    DateTime::parse_from_rfc2822(&repaired)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_iso_variants(s: &str) -> Option<DateTime<Utc>> {
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Rewrites near-RFC-822 dates into something RFC 2822 parsing accepts.
fn repair_rfc822(s: &str) -> Option<String> {
    // "Tuesday, 10 June 2003 04:00:00 UTC" -> "10 June 2003 04:00:00 UTC"
    let without_weekday = match s.split_once(',') {
        Some((head, tail)) if head.trim().chars().all(|c| c.is_ascii_alphabetic()) => tail,
        _ => s,
    };

    let mut tokens: Vec<String> = without_weekday
        .split_whitespace()
        .map(str::to_owned)
        .collect();
    if tokens.len() < 4 {
        return None;
    }

    // Month names: "June" / "JUNE" -> "Jun"
    for token in tokens.iter_mut().take(3) {
        if token.len() > 3 && token.chars().all(|c| c.is_ascii_alphabetic()) {
            let mut short: String = token.chars().take(3).collect();
            short[..1].make_ascii_uppercase();
            short[1..].make_ascii_lowercase();
            *token = short;
        }
    }

    let last = tokens.last()?.clone();
    if last.contains(':') && !last.starts_with(['+', '-']) {
        // No zone at all
        tokens.push("+0000".to_owned());
    } else if let Some(offset) = colon_offset(&last) {
        *tokens.last_mut()? = offset;
    } else if let Some((_, offset)) = EXTRA_ZONES
        .iter()
        .find(|(zone, _)| zone.eq_ignore_ascii_case(&last))
    {
        *tokens.last_mut()? = (*offset).to_owned();
    }

    Some(tokens.join(" "))
}

/// "+05:30" -> "+0530"
fn colon_offset(token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    let well_formed = bytes.len() == 6
        && (bytes[0] == b'+' || bytes[0] == b'-')
        && bytes[3] == b':'
        && [1, 2, 4, 5].iter().all(|&i| bytes[i].is_ascii_digit());
    well_formed.then(|| token.replacen(':', "", 1))
}
