//! HL7 v3 `TS` timestamps.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

/// Parse `YYYY[MM[DD[HH[MM[SS[.fff]]]]]][+/-ZZZZ]` into UTC.
///
/// Missing components default to the start of the period. Values without an
/// offset are read as UTC.
pub fn parse_hl7_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let (body, offset) = split_offset(raw)?;
    let (digits, fraction) = match body.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (body, None),
    };

    if !digits.chars().all(|c| c.is_ascii_digit()) || ![4, 6, 8, 10, 12, 14].contains(&digits.len())
    {
        return None;
    }
    if fraction.is_some() && digits.len() != 14 {
        return None;
    }

    let part = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(text) => text.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, part(4, 2, 1)?, part(6, 2, 1)?)?;

    let nanos = match fraction {
        Some(fraction) if !fraction.is_empty() && fraction.chars().all(|c| c.is_ascii_digit()) => {
            let padded: String = fraction.chars().chain("000000000".chars()).take(9).collect();
            padded.parse().ok()?
        }
        Some(_) => return None,
        None => 0,
    };

    let naive = date.and_hms_nano_opt(part(8, 2, 0)?, part(10, 2, 0)?, part(12, 2, 0)?, nanos)?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

fn split_offset(raw: &str) -> Option<(&str, FixedOffset)> {
    let Some(index) = raw.find(|c: char| c == '+' || c == '-') else {
        return Some((raw, FixedOffset::east_opt(0)?));
    };
    let (body, zone) = raw.split_at(index);
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let digits = &zone[1..];
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    Some((body, FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?))
}
