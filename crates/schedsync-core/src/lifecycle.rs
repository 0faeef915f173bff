use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{LayerConfig, ScheduleConfig};
use crate::deletion::DeletionCoordinator;
use crate::error::{ApiError, Result, ScheduleError};
use crate::gateway::ScheduleGateway;
use crate::model::{Reference, ReferenceKind, Restriction, Schedule, ScheduleLayer, UserMember};
use crate::plan::{Change, plan};
use crate::reconcile::{assign_layer_ids, materialize, reconcile};
use crate::retry::{Timeouts, retry_if};
use crate::scanner::transient_read;
use crate::state::{ScheduleState, load_state, save_state};
use crate::time::normalize;
use crate::validate::validate_schedule;

/// Validate a declared schedule and convert it to the document sent to the service.
pub fn build_schedule(config: &ScheduleConfig) -> Result<Schedule> {
    validate_schedule(config)?;

    let schedule_layers = config
        .layers
        .iter()
        .map(build_layer)
        .collect::<Result<Vec<_>>>()?;

    let description = Some(config.description.clone()).filter(|text| !text.is_empty());

    Ok(Schedule {
        id: String::new(),
        name: config.name.clone(),
        time_zone: config.time_zone.clone(),
        description,
        schedule_layers,
        teams: config
            .teams
            .iter()
            .map(|team| Reference::new(team.as_str(), ReferenceKind::TeamReference))
            .collect(),
        escalation_policies: Vec::new(),
        final_schedule: None,
    })
}

fn build_layer(layer: &LayerConfig) -> Result<ScheduleLayer> {
    // The service echoes a rotation_virtual_start shifted by its offset; UTC avoids the drift.
    let rotation_virtual_start = normalize(&layer.rotation_virtual_start)?;

    Ok(ScheduleLayer {
        id: layer.id.clone(),
        name: layer.name.clone(),
        start: layer.start.clone(),
        end: layer.end.clone().filter(|end| !end.trim().is_empty()),
        rotation_virtual_start,
        rotation_turn_length_seconds: layer.rotation_turn_length_seconds,
        users: layer.users.iter().map(UserMember::new).collect(),
        restrictions: layer
            .restrictions
            .iter()
            .map(|restriction| Restriction {
                kind: restriction.kind,
                start_time_of_day: restriction.start_time_of_day.clone(),
                start_day_of_week: restriction.start_day_of_week.filter(|day| *day > 0),
                duration_seconds: restriction.duration_seconds,
            })
            .collect(),
        rendered_coverage_percentage: None,
    })
}

/// Layer document an update would send: declared layers with inherited ids,
/// followed by end-dated prior layers that are no longer declared.
pub fn plan_write_set(config: &ScheduleConfig, prior: &ScheduleState) -> Result<Vec<ScheduleLayer>> {
    update_document(config, prior).map(|schedule| schedule.schedule_layers)
}

fn update_document(config: &ScheduleConfig, prior: &ScheduleState) -> Result<Schedule> {
    let mut schedule = build_schedule(config)?;
    let prior_layers = prior.prior_layers();
    assign_layer_ids(&mut schedule.schedule_layers, &prior_layers);
    schedule.schedule_layers = reconcile(&schedule.schedule_layers, &prior_layers);
    Ok(schedule)
}

/// Create, read, update, import and delete operations for one schedule.
pub struct ScheduleManager<'a, G: ScheduleGateway> {
    gateway: &'a G,
    timeouts: Timeouts,
}

impl<'a, G: ScheduleGateway> ScheduleManager<'a, G> {
    pub fn new(gateway: &'a G, timeouts: Timeouts) -> Self {
        Self { gateway, timeouts }
    }

    /// Create the schedule. When the read-back fails the new schedule still
    /// exists remotely, so the error carries a view of it in
    /// [`ScheduleError::Created`].
    pub fn create(&self, config: &ScheduleConfig) -> Result<ScheduleState> {
        let schedule = build_schedule(config)?;

        info!(name = %schedule.name, "Creating schedule");
        let created = self
            .gateway
            .create_schedule(&schedule, config.overflow)
            .map_err(|err| ScheduleError::remote("create schedule", schedule.name.as_str(), err))?;

        self.read(&created.id).map_err(|source| {
            warn!(schedule = %created.id, error = %source, "Created schedule could not be read back");
            ScheduleError::Created {
                state: Box::new(created_view(&created)),
                source: Box::new(source),
            }
        })
    }

    pub fn read(&self, id: &str) -> Result<ScheduleState> {
        info!(schedule = id, "Reading schedule");
        let schedule = retry_if(
            "read schedule",
            self.timeouts.read,
            || self.gateway.get_schedule(id),
            transient_read,
        )
        .map_err(|err| {
            if err.is_not_found() {
                ScheduleError::NotFound(id.to_string())
            } else {
                ScheduleError::remote("read schedule", id, err)
            }
        })?;

        materialize(&schedule, Utc::now())
    }

    /// Replace the remote schedule with `config`, end-dating layers of `prior`
    /// that are no longer declared.
    pub fn update(
        &self,
        id: &str,
        config: &ScheduleConfig,
        prior: &ScheduleState,
    ) -> Result<ScheduleState> {
        let schedule = update_document(config, prior)?;

        info!(
            schedule = id,
            layers = schedule.schedule_layers.len(),
            "Updating schedule"
        );
        retry_if(
            "update schedule",
            self.timeouts.update,
            || self.gateway.update_schedule(id, &schedule, config.overflow),
            ApiError::is_transient,
        )
        .map_err(|err| ScheduleError::remote("update schedule", id, err))?;

        self.read(id)
    }

    /// Adopt an existing schedule by id.
    pub fn import(&self, id: &str) -> Result<ScheduleState> {
        info!(schedule = id, "Importing schedule");
        self.read(id)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        DeletionCoordinator::new(self.gateway, self.timeouts).delete(id)
    }

    /// Changes an apply would make to the schedule tracked at `state_path`.
    pub fn preview(&self, config: &ScheduleConfig, state_path: &Path) -> Result<Preview> {
        build_schedule(config)?;
        let Some(applied) = load_state(state_path)? else {
            return Ok(Preview::Create);
        };

        let current = self.read(&applied.id)?;
        let changes = plan(config, &current);
        if changes.is_empty() {
            return Ok(Preview::Unchanged { id: current.id });
        }

        let end_dated = plan_write_set(config, &current)?
            .into_iter()
            .skip(config.layers.len())
            .collect();
        Ok(Preview::Update {
            id: current.id,
            changes,
            end_dated,
        })
    }

    /// Create the schedule when `state_path` tracks none, otherwise converge
    /// the tracked one against a fresh read. The resulting state is written
    /// to `state_path`, including after a create whose read-back failed.
    pub fn apply(&self, config: &ScheduleConfig, state_path: &Path) -> Result<Applied> {
        build_schedule(config)?;

        let applied = match load_state(state_path)? {
            None => match self.create(config) {
                Ok(state) => Applied {
                    outcome: ApplyOutcome::Created,
                    state,
                },
                Err(err) => {
                    if let Some(state) = err.created_state() {
                        save_state(state_path, state)?;
                    }
                    return Err(err);
                }
            },
            Some(prior) => {
                let current = self.read(&prior.id)?;
                if plan(config, &current).is_empty() {
                    info!(schedule = %current.id, "Schedule already matches declaration");
                    Applied {
                        outcome: ApplyOutcome::Unchanged,
                        state: current,
                    }
                } else {
                    let state = self.update(&current.id, config, &current)?;
                    Applied {
                        outcome: ApplyOutcome::Updated,
                        state,
                    }
                }
            }
        };

        save_state(state_path, &applied.state)?;
        Ok(applied)
    }
}

/// Best-effort view of a freshly created schedule, used when reading it back failed.
fn created_view(created: &Schedule) -> ScheduleState {
    match materialize(created, Utc::now()) {
        Ok(state) => state,
        Err(_) => ScheduleState {
            id: created.id.clone(),
            name: created.name.clone(),
            time_zone: created.time_zone.clone(),
            description: created.description.clone().unwrap_or_default(),
            layers: Vec::new(),
            teams: created.teams.iter().map(|team| team.id.clone()).collect(),
            final_schedule: None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub outcome: ApplyOutcome,
    pub state: ScheduleState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Create,
    Unchanged {
        id: String,
    },
    Update {
        id: String,
        changes: Vec<Change>,
        /// Prior layers the update would close.
        end_dated: Vec<ScheduleLayer>,
    },
}
