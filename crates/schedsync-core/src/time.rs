//! Timestamp canonicalization.
//!
//! The scheduling service echoes instants back with a different offset than
//! they were submitted with, so every comparison goes through the canonical
//! UTC form produced here.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::{Result, ScheduleError};

/// Parse an RFC 3339 timestamp and convert it to UTC.
pub fn parse_utc(timestamp: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| ScheduleError::InvalidTimestamp {
            value: timestamp.to_string(),
            source,
        })
}

/// Canonical string for an instant: RFC 3339, UTC, `Z` suffix.
pub fn canonical(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Re-serialize an RFC 3339 timestamp in canonical UTC form.
pub fn normalize(timestamp: &str) -> Result<String> {
    parse_utc(timestamp).map(canonical)
}

/// Canonical form of `now`, truncated to whole seconds.
pub fn now_canonical(now: DateTime<Utc>) -> String {
    canonical(now.trunc_subsecs(0))
}

/// True when both strings denote the same instant, or are textually equal.
pub fn same_instant(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (parse_utc(a), parse_utc(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Optional timestamps compare equal when both are absent or both name the same instant.
pub fn same_optional_instant(a: Option<&str>, b: Option<&str>) -> bool {
    match (non_empty(a), non_empty(b)) {
        (None, None) => true,
        (Some(a), Some(b)) => same_instant(a, b),
        _ => false,
    }
}

/// Layer starts in the past are moved forward by the service, so a declared
/// start that has already passed is not a change when the observed one has too.
pub fn suppress_start_diff(observed: &str, declared: &str, now: DateTime<Utc>) -> bool {
    if same_instant(observed, declared) {
        return true;
    }
    match (parse_utc(observed), parse_utc(declared)) {
        (Ok(observed), Ok(declared)) => observed <= now && declared <= now,
        _ => false,
    }
}

/// Whether an optional end timestamp has been reached at `now`.
pub fn has_ended(end: Option<&str>, now: DateTime<Utc>) -> Result<bool> {
    match non_empty(end) {
        Some(end) => Ok(parse_utc(end)? <= now),
        None => Ok(false),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
