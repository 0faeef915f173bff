use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::{LayerConfig, RestrictionConfig, ScheduleConfig};
use crate::state::{LayerState, RestrictionState, ScheduleState};
use crate::time::{same_instant, same_optional_instant, suppress_start_diff};

/// One attribute that differs between the declared and the observed schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: String,
    pub from: String,
    pub to: String,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~ {}: {:?} -> {:?}", self.path, self.from, self.to)
    }
}

const ABSENT: &str = "(absent)";

pub fn plan(config: &ScheduleConfig, current: &ScheduleState) -> Vec<Change> {
    plan_at(config, current, Utc::now())
}

/// Differences between `config` and `current`, ignoring timestamps that name
/// the same instant in another offset.
pub fn plan_at(config: &ScheduleConfig, current: &ScheduleState, now: DateTime<Utc>) -> Vec<Change> {
    let mut changes = Vec::new();
    let mut record = |path: String, from: &str, to: &str| {
        changes.push(Change {
            path,
            from: from.to_string(),
            to: to.to_string(),
        });
    };

    if config.name != current.name {
        record("name".to_string(), &current.name, &config.name);
    }
    if config.time_zone != current.time_zone {
        record("time_zone".to_string(), &current.time_zone, &config.time_zone);
    }
    if config.description != current.description {
        record(
            "description".to_string(),
            &current.description,
            &config.description,
        );
    }
    if config.teams != current.teams {
        record(
            "teams".to_string(),
            &current.teams.join(","),
            &config.teams.join(","),
        );
    }

    let count = config.layers.len().max(current.layers.len());
    for index in 0..count {
        let path = format!("layer.{index}");
        match (current.layers.get(index), config.layers.get(index)) {
            (Some(observed), Some(declared)) => {
                diff_layer(&path, observed, declared, now, &mut record);
            }
            (None, Some(declared)) => record(path, ABSENT, &layer_label(&declared.name)),
            (Some(observed), None) => record(path, &layer_label(&observed.name), ABSENT),
            (None, None) => {}
        }
    }

    changes
}

fn layer_label(name: &str) -> String {
    if name.is_empty() {
        "(layer)".to_string()
    } else {
        name.to_string()
    }
}

fn diff_layer<F>(path: &str, observed: &LayerState, declared: &LayerConfig, now: DateTime<Utc>, record: &mut F)
where
    F: FnMut(String, &str, &str),
{
    if !declared.id.is_empty() && declared.id != observed.id {
        record(format!("{path}.id"), &observed.id, &declared.id);
    }
    if !declared.name.is_empty() && declared.name != observed.name {
        record(format!("{path}.name"), &observed.name, &declared.name);
    }
    if !suppress_start_diff(&observed.start, &declared.start, now) {
        record(format!("{path}.start"), &observed.start, &declared.start);
    }
    if !same_optional_instant(observed.end.as_deref(), declared.end.as_deref()) {
        record(
            format!("{path}.end"),
            observed.end.as_deref().unwrap_or_default(),
            declared.end.as_deref().unwrap_or_default(),
        );
    }
    if !same_instant(&observed.rotation_virtual_start, &declared.rotation_virtual_start) {
        record(
            format!("{path}.rotation_virtual_start"),
            &observed.rotation_virtual_start,
            &declared.rotation_virtual_start,
        );
    }
    if observed.rotation_turn_length_seconds != declared.rotation_turn_length_seconds {
        record(
            format!("{path}.rotation_turn_length_seconds"),
            &observed.rotation_turn_length_seconds.to_string(),
            &declared.rotation_turn_length_seconds.to_string(),
        );
    }
    if observed.users != declared.users {
        record(
            format!("{path}.users"),
            &observed.users.join(","),
            &declared.users.join(","),
        );
    }

    let count = observed.restrictions.len().max(declared.restrictions.len());
    for index in 0..count {
        let observed = observed.restrictions.get(index);
        let declared = declared.restrictions.get(index);
        let same = match (observed, declared) {
            (Some(observed), Some(declared)) => same_restriction(observed, declared),
            _ => false,
        };
        if !same {
            record(
                format!("{path}.restriction.{index}"),
                &observed.map(describe_observed).unwrap_or_else(|| ABSENT.to_string()),
                &declared.map(describe_declared).unwrap_or_else(|| ABSENT.to_string()),
            );
        }
    }
}

fn same_restriction(observed: &RestrictionState, declared: &RestrictionConfig) -> bool {
    observed.kind == declared.kind
        && observed.start_time_of_day == declared.start_time_of_day
        && observed.start_day_of_week.unwrap_or(0) == declared.start_day_of_week.unwrap_or(0)
        && observed.duration_seconds == declared.duration_seconds
}

fn describe_observed(restriction: &RestrictionState) -> String {
    describe(
        restriction.kind.as_str(),
        &restriction.start_time_of_day,
        restriction.start_day_of_week,
        restriction.duration_seconds,
    )
}

fn describe_declared(restriction: &RestrictionConfig) -> String {
    describe(
        restriction.kind.as_str(),
        &restriction.start_time_of_day,
        restriction.start_day_of_week,
        restriction.duration_seconds,
    )
}

fn describe(kind: &str, time_of_day: &str, day: Option<u8>, duration: u64) -> String {
    match day.filter(|day| *day > 0) {
        Some(day) => format!("{kind} day {day} at {time_of_day} for {duration}s"),
        None => format!("{kind} at {time_of_day} for {duration}s"),
    }
}
