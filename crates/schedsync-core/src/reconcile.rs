//! Layer reconciliation.
//!
//! The service never deletes a layer; a layer leaves a schedule only by being
//! given an end timestamp. Writes therefore send the desired layers plus every
//! previously applied layer that is no longer desired, end-dated to now. Reads
//! apply the inverse filter and hide layers whose end has passed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Schedule, ScheduleLayer};
use crate::state::{FinalScheduleState, LayerState, RestrictionState, ScheduleState};
use crate::time::{has_ended, now_canonical};

/// Full replacement layer list for an update, end-dating removed layers at the current instant.
pub fn reconcile(desired: &[ScheduleLayer], prior: &[ScheduleLayer]) -> Vec<ScheduleLayer> {
    reconcile_at(desired, prior, Utc::now())
}

/// [`reconcile`] with an explicit clock.
pub fn reconcile_at(
    desired: &[ScheduleLayer],
    prior: &[ScheduleLayer],
    now: DateTime<Utc>,
) -> Vec<ScheduleLayer> {
    let kept: HashSet<&str> = desired.iter().map(|layer| layer.id.as_str()).collect();
    let end = now_canonical(now);

    let mut write_set = desired.to_vec();
    for layer in prior {
        if layer.id.is_empty() || kept.contains(layer.id.as_str()) {
            continue;
        }
        let mut closed = layer.clone();
        closed.end = Some(end.clone());
        write_set.push(closed);
    }
    write_set
}

/// Give each declared layer without an id the id of the prior layer at the
/// same position, unless another declared layer already pins that id.
pub fn assign_layer_ids(desired: &mut [ScheduleLayer], prior: &[ScheduleLayer]) {
    let pinned: HashSet<String> = desired
        .iter()
        .filter(|layer| !layer.id.is_empty())
        .map(|layer| layer.id.clone())
        .collect();

    for (layer, previous) in desired.iter_mut().zip(prior) {
        if layer.id.is_empty() && !previous.id.is_empty() && !pinned.contains(&previous.id) {
            layer.id = previous.id.clone();
        }
    }
}

/// Active layers of a remote schedule in declared order. The service lists
/// layers most recently added first.
pub fn materialize_layers(remote: &[ScheduleLayer], now: DateTime<Utc>) -> Result<Vec<LayerState>> {
    let mut active = Vec::with_capacity(remote.len());
    for layer in remote {
        if has_ended(layer.end.as_deref(), now)? {
            continue;
        }
        active.push(layer_state(layer));
    }
    active.reverse();
    Ok(active)
}

/// Materialized view of a schedule read from the service.
pub fn materialize(schedule: &Schedule, now: DateTime<Utc>) -> Result<ScheduleState> {
    Ok(ScheduleState {
        id: schedule.id.clone(),
        name: schedule.name.clone(),
        time_zone: schedule.time_zone.clone(),
        description: schedule.description.clone().unwrap_or_default(),
        layers: materialize_layers(&schedule.schedule_layers, now)?,
        teams: schedule.teams.iter().map(|team| team.id.clone()).collect(),
        final_schedule: schedule
            .final_schedule
            .as_ref()
            .map(|final_schedule| FinalScheduleState {
                name: final_schedule.name.clone(),
                rendered_coverage_percentage: render_percentage(
                    final_schedule.rendered_coverage_percentage,
                ),
            }),
    })
}

fn layer_state(layer: &ScheduleLayer) -> LayerState {
    LayerState {
        id: layer.id.clone(),
        name: layer.name.clone(),
        start: layer.start.clone(),
        end: layer.end.clone().filter(|end| !end.is_empty()),
        rotation_virtual_start: layer.rotation_virtual_start.clone(),
        rotation_turn_length_seconds: layer.rotation_turn_length_seconds,
        users: layer.user_ids(),
        restrictions: layer
            .restrictions
            .iter()
            .map(|restriction| RestrictionState {
                kind: restriction.kind,
                start_time_of_day: restriction.start_time_of_day.clone(),
                start_day_of_week: restriction.start_day_of_week.filter(|day| *day > 0),
                duration_seconds: restriction.duration_seconds,
            })
            .collect(),
        rendered_coverage_percentage: render_percentage(layer.rendered_coverage_percentage),
    }
}

pub fn render_percentage(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}"),
        None => String::new(),
    }
}
