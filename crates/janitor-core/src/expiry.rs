//! TTL parsing and expiry arithmetic
//!
//! A TTL token can be unix seconds, a lenient duration (`1h`, `3d`, `2w`,
//! `1y`), or an absolute timestamp in one of the accepted formats below.
//! Durations are relative to the reference timestamp of the object under
//! evaluation; everything else is absolute.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::ExpiryError;

/// Outcome of resolving a TTL against a reference timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    /// The instant the object becomes eligible for deletion.
    pub at: DateTime<Utc>,
    /// Whether that instant is already in the past.
    pub expired: bool,
}

/// Accepted timestamp formats, most preferred first.
enum TimeFormat {
    Rfc3339,
    /// `chrono` format string carrying a numeric offset.
    Offset(&'static str),
    /// Naive format followed by a timezone abbreviation. Abbreviations are
    /// ambiguous; the wall-clock value is read as UTC.
    NamedZone(&'static str),
    /// Naive format interpreted in the machine-local timezone.
    LocalNaive(&'static str),
    /// RFC 2822 and its obsolete variants (covers RFC 822/1123 with both
    /// numeric and named zones).
    Rfc2822,
    /// Date only, midnight UTC.
    Date,
}

const TIME_FORMATS: &[TimeFormat] = &[
    // preferred format
    TimeFormat::Rfc3339,
    // human formats
    TimeFormat::Offset("%Y-%m-%d %H:%M:%S %:z"),
    TimeFormat::NamedZone("%Y-%m-%d %H:%M:%S"),
    TimeFormat::LocalNaive("%Y-%m-%d %H:%M:%S"),
    // allowed formats
    TimeFormat::Rfc2822,
    TimeFormat::NamedZone("%A, %d-%b-%y %H:%M:%S"),
    // least preferred format
    TimeFormat::Date,
];

fn try_format(format: &TimeFormat, value: &str) -> Option<DateTime<Utc>> {
    match format {
        TimeFormat::Rfc3339 => DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        TimeFormat::Offset(fmt) => DateTime::parse_from_str(value, fmt)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        TimeFormat::NamedZone(fmt) => {
            let (head, zone) = value.rsplit_once(' ')?;
            if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            NaiveDateTime::parse_from_str(head, fmt)
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        TimeFormat::LocalNaive(fmt) => NaiveDateTime::parse_from_str(value, fmt)
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).single())
            .map(|ts| ts.with_timezone(&Utc)),
        TimeFormat::Rfc2822 => DateTime::parse_from_rfc2822(value)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        TimeFormat::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))),
    }
}

/// Parse a timestamp value from a label, annotation, or JMESPath result.
///
/// Empty strings and `"0"` yield `None`. Positive integers are read as unix
/// seconds; everything else is tried against the accepted format list. Only
/// instants after the unix epoch are accepted.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() || value == "0" {
        return None;
    }

    if let Ok(unix) = value.parse::<i64>() {
        if unix > 0 {
            return Utc.timestamp_opt(unix, 0).single();
        }
    }

    TIME_FORMATS
        .iter()
        .find_map(|format| try_format(format, value).filter(|ts| ts.timestamp() > 0))
}

/// Resolve a TTL token against the reference timestamp of an object.
///
/// Returns `Ok(None)` for empty tokens, `Ok(Some(expiry))` when the token
/// resolves, and an error when it matches none of the accepted forms.
/// A duration only applies when a reference timestamp exists and the
/// duration exceeds one second.
pub fn check_expiry(
    created_at: Option<DateTime<Utc>>,
    ttl: &str,
) -> Result<Option<Expiry>, ExpiryError> {
    let ttl = ttl.trim();
    if ttl.is_empty() || ttl == "0" {
        return Ok(None);
    }

    let mut expires_at: Option<DateTime<Utc>> = None;

    // first: unix seconds
    if let Ok(unix) = ttl.parse::<i64>() {
        if unix > 0 {
            expires_at = Utc.timestamp_opt(unix, 0).single();
        }
    }

    // second: duration relative to the reference timestamp
    if let Some(created_at) = created_at {
        if let Ok(duration) = humantime::parse_duration(ttl) {
            if duration > std::time::Duration::from_secs(1) {
                if let Ok(duration) = chrono::Duration::from_std(duration) {
                    expires_at = Some(created_at + duration);
                }
            }
        }
    }

    // third: absolute timestamp
    if expires_at.is_none() {
        expires_at = TIME_FORMATS
            .iter()
            .find_map(|format| try_format(format, ttl).filter(|ts| ts.timestamp() > 0));
    }

    match expires_at {
        Some(at) => Ok(Some(Expiry {
            at,
            expired: at < Utc::now(),
        })),
        None => Err(ExpiryError {
            raw: ttl.to_string(),
        }),
    }
}
