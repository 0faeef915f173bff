use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::{ApiError, Result, ScheduleError};
use crate::gateway::ScheduleGateway;
use crate::model::EscalationPolicy;
use crate::retry::{Attempt, Timeouts, retry};
use crate::scanner::DependencyScanner;

/// Error text the service returns when a schedule is still targeted by escalation rules.
pub const SCHEDULE_IN_USE_MESSAGE: &str =
    "Schedule can't be deleted if it's being used by escalation policies";

/// Whether a failed delete was refused because escalation policies still use the schedule.
pub fn is_schedule_in_use_by_escalation_policies_conflict(err: &ApiError) -> bool {
    err.is_status(400) && matches!(err.errors(), [only] if only == SCHEDULE_IN_USE_MESSAGE)
}

/// Drop every target pointing at `schedule_id`. Rules left without targets are
/// removed. Returns whether the policy changed.
pub fn remove_schedule_from_policy(policy: &mut EscalationPolicy, schedule_id: &str) -> bool {
    let mut changed = false;
    policy.escalation_rules.retain_mut(|rule| {
        let before = rule.targets.len();
        rule.targets
            .retain(|target| !target.references_schedule(schedule_id));
        if rule.targets.len() == before {
            return true;
        }
        changed = true;
        !rule.targets.is_empty()
    });
    changed
}

pub struct DeletionCoordinator<'a, G: ScheduleGateway> {
    gateway: &'a G,
    timeouts: Timeouts,
}

impl<'a, G: ScheduleGateway> DeletionCoordinator<'a, G> {
    pub fn new(gateway: &'a G, timeouts: Timeouts) -> Self {
        Self { gateway, timeouts }
    }

    /// Delete a schedule once nothing blocks it, detaching escalation
    /// policies if the service refuses because they still target it.
    pub fn delete(&self, schedule_id: &str) -> Result<()> {
        info!(schedule = schedule_id, "Starting deletion process of schedule");

        let scanner = DependencyScanner::new(self.gateway, self.timeouts);
        let policies = scanner.find_escalation_policies(schedule_id)?;
        let incidents = scanner.find_open_incidents(schedule_id)?;
        if !incidents.is_empty() {
            return Err(ScheduleError::BlockedByOpenIncidents {
                id: schedule_id.to_string(),
                incidents,
            });
        }

        info!(schedule = schedule_id, "Deleting schedule");
        retry("delete schedule", self.timeouts.delete, || {
            let err = match self.gateway.delete_schedule(schedule_id) {
                Ok(()) => return Attempt::Done(()),
                Err(err) => err,
            };

            if !err.is_status(400) {
                return Attempt::Retry(ScheduleError::remote("delete schedule", schedule_id, err));
            }
            if !is_schedule_in_use_by_escalation_policies_conflict(&err) {
                return Attempt::Fail(ScheduleError::remote("delete schedule", schedule_id, err));
            }

            info!(
                schedule = schedule_id,
                policies = policies.len(),
                "Dissociating escalation policies that use the schedule"
            );
            match self.dissociate(schedule_id, &policies) {
                Ok(()) => Attempt::Retry(ScheduleError::remote("delete schedule", schedule_id, err)),
                Err(workaround) => {
                    warn!(schedule = schedule_id, error = %workaround, "Dissociation failed");
                    Attempt::Retry(ScheduleError::Compensation {
                        original: err,
                        source: Box::new(workaround),
                    })
                }
            }
        })
    }

    fn dissociate(&self, schedule_id: &str, policies: &BTreeSet<String>) -> Result<()> {
        for policy_id in policies {
            let Some(mut policy) = self.fetch_policy(policy_id)? else {
                info!(policy = %policy_id, "Escalation policy already gone");
                continue;
            };
            if !remove_schedule_from_policy(&mut policy, schedule_id) {
                continue;
            }
            self.write_policy(&policy)?;
        }
        Ok(())
    }

    fn fetch_policy(&self, policy_id: &str) -> Result<Option<EscalationPolicy>> {
        retry("fetch escalation policy", self.timeouts.lookup, || {
            match self.gateway.get_escalation_policy(policy_id) {
                Ok(policy) => Attempt::Done(Some(policy)),
                Err(err) if err.is_not_found() => Attempt::Done(None),
                Err(err) => Attempt::Retry(err),
            }
        })
        .map_err(|err| ScheduleError::remote("read escalation policy", policy_id, err))
    }

    fn write_policy(&self, policy: &EscalationPolicy) -> Result<()> {
        info!(policy = %policy.id, rules = policy.escalation_rules.len(), "Updating escalation policy");
        retry("update escalation policy", self.timeouts.lookup, || {
            match self.gateway.update_escalation_policy(&policy.id, policy) {
                Ok(_) => Attempt::Done(()),
                Err(err) if err.is_not_found() => Attempt::Done(()),
                Err(err) => Attempt::Retry(err),
            }
        })
        .map_err(|err| ScheduleError::remote("update escalation policy", policy.id.as_str(), err))
    }
}
