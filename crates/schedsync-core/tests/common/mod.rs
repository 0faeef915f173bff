#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use schedsync_core::model::{
    EscalationPolicy, EscalationRule, Incident, IncidentQuery, IncidentStatus, Reference,
    ReferenceKind, Schedule, SubSchedule,
};
use schedsync_core::{ApiError, ScheduleGateway};
use serde_json::Map;

pub const IN_USE: &str = "Schedule can't be deleted if it's being used by escalation policies";

/// In-memory stand-in for the scheduling service.
///
/// Like the real service it refuses to drop layers on update, refuses to
/// delete schedules still targeted by escalation rules, and lists layers
/// most recently added first.
#[derive(Default)]
pub struct FakeService {
    inner: RefCell<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u32,
    schedules: BTreeMap<String, Schedule>,
    policies: BTreeMap<String, EscalationPolicy>,
    incidents: Vec<Incident>,
    calls: Vec<String>,
    get_failures: VecDeque<ApiError>,
    update_failures: VecDeque<ApiError>,
    delete_failures: VecDeque<ApiError>,
    policy_update_error: Option<ApiError>,
    last_write: Option<Schedule>,
    vanishing: BTreeSet<String>,
}

impl Inner {
    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn referencing_policies(&self, schedule_id: &str) -> Vec<Reference> {
        self.policies
            .values()
            .filter(|policy| {
                policy
                    .escalation_rules
                    .iter()
                    .flat_map(|rule| rule.targets.iter())
                    .any(|target| target.references_schedule(schedule_id))
            })
            .map(|policy| {
                Reference::new(policy.id.as_str(), ReferenceKind::EscalationPolicyReference)
            })
            .collect()
    }
}

pub fn not_found() -> ApiError {
    ApiError::status(404, "Not Found", Vec::new())
}

pub fn server_error() -> ApiError {
    ApiError::status(502, "Bad Gateway", Vec::new())
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.borrow().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter(|recorded| recorded.as_str() == call)
            .count()
    }

    pub fn last_write(&self) -> Option<Schedule> {
        self.inner.borrow().last_write.clone()
    }

    pub fn schedule(&self, id: &str) -> Option<Schedule> {
        self.inner.borrow().schedules.get(id).cloned()
    }

    pub fn policy(&self, id: &str) -> Option<EscalationPolicy> {
        self.inner.borrow().policies.get(id).cloned()
    }

    pub fn insert_schedule(&self, mut schedule: Schedule) -> String {
        let mut inner = self.inner.borrow_mut();
        if schedule.id.is_empty() {
            schedule.id = inner.assign_id("PSCHED");
        }
        for layer in &mut schedule.schedule_layers {
            if layer.id.is_empty() {
                layer.id = inner.assign_id("PLAYER");
            }
        }
        let id = schedule.id.clone();
        inner.schedules.insert(id.clone(), schedule);
        id
    }

    pub fn insert_policy(&self, id: &str, rules: Vec<Vec<Reference>>) {
        let policy = EscalationPolicy {
            id: id.to_string(),
            name: format!("Policy {id}"),
            escalation_rules: rules
                .into_iter()
                .map(|targets| EscalationRule {
                    id: None,
                    escalation_delay_in_minutes: 30,
                    targets,
                    extra: Map::new(),
                })
                .collect(),
            extra: Map::new(),
        };
        self.inner
            .borrow_mut()
            .policies
            .insert(id.to_string(), policy);
    }

    /// The policy is deleted by someone else just before it is next fetched.
    pub fn vanish_policy_on_fetch(&self, id: &str) {
        self.inner.borrow_mut().vanishing.insert(id.to_string());
    }

    pub fn insert_incident(&self, id: &str, status: IncidentStatus, team: &str) {
        self.inner.borrow_mut().incidents.push(Incident {
            id: id.to_string(),
            status,
            html_url: format!("https://acme.pagerduty.com/incidents/{id}"),
            teams: vec![Reference::new(team, ReferenceKind::TeamReference)],
        });
    }

    pub fn fail_next_get(&self, err: ApiError) {
        self.inner.borrow_mut().get_failures.push_back(err);
    }

    pub fn fail_next_update(&self, err: ApiError) {
        self.inner.borrow_mut().update_failures.push_back(err);
    }

    pub fn fail_next_delete(&self, err: ApiError) {
        self.inner.borrow_mut().delete_failures.push_back(err);
    }

    /// Every escalation policy update fails with `err` from now on.
    pub fn fail_policy_updates(&self, err: ApiError) {
        self.inner.borrow_mut().policy_update_error = Some(err);
    }
}

impl ScheduleGateway for FakeService {
    fn create_schedule(&self, schedule: &Schedule, _overflow: bool) -> Result<Schedule, ApiError> {
        self.inner.borrow_mut().calls.push("create_schedule".to_string());
        self.inner.borrow_mut().last_write = Some(schedule.clone());
        let id = self.insert_schedule(schedule.clone());
        let mut created = self.schedule(&id).expect("just inserted");
        created.schedule_layers.reverse();
        Ok(created)
    }

    fn get_schedule(&self, id: &str) -> Result<Schedule, ApiError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push("get_schedule".to_string());
        if let Some(err) = inner.get_failures.pop_front() {
            return Err(err);
        }
        let mut schedule = inner.schedules.get(id).cloned().ok_or_else(not_found)?;
        schedule.schedule_layers.reverse();
        schedule.escalation_policies = inner.referencing_policies(id);
        schedule.final_schedule = Some(SubSchedule {
            name: "Final Schedule".to_string(),
            rendered_coverage_percentage: Some(100.0),
        });
        Ok(schedule)
    }

    fn update_schedule(
        &self,
        id: &str,
        schedule: &Schedule,
        _overflow: bool,
    ) -> Result<Schedule, ApiError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push("update_schedule".to_string());
        inner.last_write = Some(schedule.clone());
        if let Some(err) = inner.update_failures.pop_front() {
            return Err(err);
        }
        let existing = inner.schedules.get(id).cloned().ok_or_else(not_found)?;

        for layer in &existing.schedule_layers {
            if !schedule.schedule_layers.iter().any(|sent| sent.id == layer.id) {
                return Err(ApiError::status(
                    400,
                    "Invalid Input Provided",
                    vec!["Schedule layers cannot be removed".to_string()],
                ));
            }
        }

        let mut replacement = schedule.clone();
        replacement.id = id.to_string();
        for layer in &mut replacement.schedule_layers {
            if layer.id.is_empty() {
                layer.id = inner.assign_id("PLAYER");
            }
        }
        inner.schedules.insert(id.to_string(), replacement.clone());
        Ok(replacement)
    }

    fn delete_schedule(&self, id: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push("delete_schedule".to_string());
        if let Some(err) = inner.delete_failures.pop_front() {
            return Err(err);
        }
        if !inner.schedules.contains_key(id) {
            return Err(not_found());
        }
        if !inner.referencing_policies(id).is_empty() {
            return Err(ApiError::status(
                400,
                "Invalid Input Provided",
                vec![IN_USE.to_string()],
            ));
        }
        inner.schedules.remove(id);
        Ok(())
    }

    fn get_escalation_policy(&self, id: &str) -> Result<EscalationPolicy, ApiError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push("get_escalation_policy".to_string());
        if inner.vanishing.remove(id) {
            inner.policies.remove(id);
        }
        inner.policies.get(id).cloned().ok_or_else(not_found)
    }

    fn update_escalation_policy(
        &self,
        id: &str,
        policy: &EscalationPolicy,
    ) -> Result<EscalationPolicy, ApiError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push("update_escalation_policy".to_string());
        if let Some(err) = inner.policy_update_error.clone() {
            return Err(err);
        }
        if !inner.policies.contains_key(id) {
            return Err(not_found());
        }
        inner.policies.insert(id.to_string(), policy.clone());
        Ok(policy.clone())
    }

    fn list_open_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>, ApiError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push("list_open_incidents".to_string());
        Ok(inner
            .incidents
            .iter()
            .filter(|incident| query.statuses.contains(&incident.status))
            .filter(|incident| {
                incident
                    .teams
                    .iter()
                    .any(|team| query.team_ids.contains(&team.id))
            })
            .cloned()
            .collect())
    }
}
