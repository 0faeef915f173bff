//! Checks on a declared schedule that need no remote state.

use std::sync::OnceLock;

use chrono_tz::Tz;
use regex::Regex;

use crate::config::{LayerConfig, RestrictionConfig, ScheduleConfig};
use crate::error::ValidationError;
use crate::model::RestrictionKind;
use crate::time::parse_utc;

pub const MIN_TURN_LENGTH_SECONDS: u64 = 3_600;
pub const MAX_TURN_LENGTH_SECONDS: u64 = 365 * 24 * 3_600;
pub const DAY_SECONDS: u64 = 24 * 3_600;
pub const MAX_RESTRICTION_SECONDS: u64 = 7 * DAY_SECONDS - 1;

fn time_of_day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-1][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]$").expect("valid time-of-day regex")
    })
}

pub fn validate_schedule(config: &ScheduleConfig) -> Result<(), ValidationError> {
    validate_time_zone(&config.time_zone)?;
    if config.layers.is_empty() {
        return Err(ValidationError::NoLayers);
    }
    for (index, layer) in config.layers.iter().enumerate() {
        validate_layer(&format!("layer.{index}"), layer)?;
    }
    Ok(())
}

pub fn validate_time_zone(name: &str) -> Result<(), ValidationError> {
    name.parse::<Tz>()
        .map(|_| ())
        .map_err(|_| ValidationError::UnknownTimeZone(name.to_string()))
}

fn validate_timestamp(field: String, value: &str) -> Result<(), ValidationError> {
    parse_utc(value)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

pub fn validate_layer(field: &str, layer: &LayerConfig) -> Result<(), ValidationError> {
    validate_timestamp(format!("{field}.start"), &layer.start)?;
    if let Some(end) = layer.end.as_deref().filter(|end| !end.trim().is_empty()) {
        validate_timestamp(format!("{field}.end"), end)?;
    }
    validate_timestamp(
        format!("{field}.rotation_virtual_start"),
        &layer.rotation_virtual_start,
    )?;

    let turn = layer.rotation_turn_length_seconds;
    if !(MIN_TURN_LENGTH_SECONDS..=MAX_TURN_LENGTH_SECONDS).contains(&turn) {
        return Err(ValidationError::TurnLengthOutOfRange {
            field: format!("{field}.rotation_turn_length_seconds"),
            value: turn,
        });
    }

    if layer.users.is_empty() {
        return Err(ValidationError::NoUsers {
            field: format!("{field}.users"),
        });
    }

    for (index, restriction) in layer.restrictions.iter().enumerate() {
        validate_restriction(&format!("{field}.restriction.{index}"), restriction)?;
    }
    Ok(())
}

pub fn validate_restriction(
    field: &str,
    restriction: &RestrictionConfig,
) -> Result<(), ValidationError> {
    if !time_of_day_pattern().is_match(&restriction.start_time_of_day) {
        return Err(ValidationError::InvalidTimeOfDay {
            field: format!("{field}.start_time_of_day"),
            value: restriction.start_time_of_day.clone(),
        });
    }

    let day = restriction.start_day_of_week.unwrap_or(0);
    let duration = restriction.duration_seconds;

    if !(1..=MAX_RESTRICTION_SECONDS).contains(&duration) {
        return Err(ValidationError::DurationOutOfRange {
            field: format!("{field}.duration_seconds"),
            value: duration,
        });
    }

    match restriction.kind {
        RestrictionKind::DailyRestriction => {
            if day != 0 {
                return Err(ValidationError::DailyRestrictionDayOfWeek {
                    field: field.to_string(),
                });
            }
            if duration >= DAY_SECONDS {
                return Err(ValidationError::DailyRestrictionTooLong {
                    field: field.to_string(),
                });
            }
        }
        RestrictionKind::WeeklyRestriction => {
            if day != 0 && !(1..=7).contains(&day) {
                return Err(ValidationError::DayOfWeekOutOfRange {
                    field: format!("{field}.start_day_of_week"),
                    value: day,
                });
            }
        }
    }
    Ok(())
}
