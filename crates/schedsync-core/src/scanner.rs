//! Discovery of entities that depend on a schedule.
//!
//! Open incidents are found through the teams attached to the schedule; the
//! service exposes no direct schedule to incident link. This over-reports
//! incidents of unrelated services on the same teams and misses incidents on
//! teams not attached to the schedule.

use std::collections::BTreeSet;

use tracing::info;

use crate::error::{ApiError, Result, ScheduleError};
use crate::gateway::ScheduleGateway;
use crate::model::{IncidentQuery, Schedule};
use crate::retry::{Timeouts, retry_if};

pub struct DependencyScanner<'a, G: ScheduleGateway> {
    gateway: &'a G,
    timeouts: Timeouts,
}

/// Reads retry on anything except a 404.
pub(crate) fn transient_read(err: &ApiError) -> bool {
    !err.is_not_found()
}

impl<'a, G: ScheduleGateway> DependencyScanner<'a, G> {
    pub fn new(gateway: &'a G, timeouts: Timeouts) -> Self {
        Self { gateway, timeouts }
    }

    fn fetch_schedule(&self, schedule_id: &str) -> Result<Schedule> {
        retry_if(
            "lookup schedule",
            self.timeouts.lookup,
            || self.gateway.get_schedule(schedule_id),
            transient_read,
        )
        .map_err(|err| {
            if err.is_not_found() {
                ScheduleError::NotFound(schedule_id.to_string())
            } else {
                ScheduleError::remote("read schedule", schedule_id, err)
            }
        })
    }

    /// Ids of escalation policies that reference the schedule.
    pub fn find_escalation_policies(&self, schedule_id: &str) -> Result<BTreeSet<String>> {
        info!(schedule = schedule_id, "Listing escalation policies that use schedule");
        let schedule = self.fetch_schedule(schedule_id)?;
        Ok(schedule
            .escalation_policies
            .iter()
            .map(|policy| policy.id.clone())
            .collect())
    }

    /// Links to triggered or acknowledged incidents on the schedule's teams.
    pub fn find_open_incidents(&self, schedule_id: &str) -> Result<Vec<String>> {
        let schedule = self.fetch_schedule(schedule_id)?;
        let team_ids: Vec<String> = schedule.teams.iter().map(|team| team.id.clone()).collect();
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = IncidentQuery::open_for_teams(team_ids);
        let incidents = retry_if(
            "list open incidents",
            self.timeouts.lookup,
            || self.gateway.list_open_incidents(&query),
            ApiError::is_transient,
        )
        .map_err(|err| ScheduleError::remote("list incidents for schedule", schedule_id, err))?;

        Ok(incidents
            .into_iter()
            .filter(|incident| incident.status.is_open())
            .map(|incident| incident.html_url)
            .collect())
    }
}
