//! Wire documents exchanged with the scheduling service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_DESCRIPTION: &str = "Managed by Terraform";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    DailyRestriction,
    WeeklyRestriction,
}

impl RestrictionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RestrictionKind::DailyRestriction => "daily_restriction",
            RestrictionKind::WeeklyRestriction => "weekly_restriction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    TeamReference,
    User,
    UserReference,
    Schedule,
    ScheduleReference,
    EscalationPolicyReference,
}

impl ReferenceKind {
    pub fn is_schedule(self) -> bool {
        match self {
            ReferenceKind::Schedule | ReferenceKind::ScheduleReference => true,
            ReferenceKind::TeamReference
            | ReferenceKind::User
            | ReferenceKind::UserReference
            | ReferenceKind::EscalationPolicyReference => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn new<I: Into<String>>(id: I, kind: ReferenceKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn references_schedule(&self, schedule_id: &str) -> bool {
        self.kind.is_schedule() && self.id == schedule_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMember {
    pub user: Reference,
}

impl UserMember {
    pub fn new<I: Into<String>>(id: I) -> Self {
        Self {
            user: Reference::new(id, ReferenceKind::UserReference),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    #[serde(rename = "type")]
    pub kind: RestrictionKind,
    pub start_time_of_day: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_day_of_week: Option<u8>,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleLayer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start: String,
    /// Always serialized; `null` clears a previously set end.
    #[serde(default)]
    pub end: Option<String>,
    pub rotation_virtual_start: String,
    pub rotation_turn_length_seconds: u64,
    #[serde(default)]
    pub users: Vec<UserMember>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
    #[serde(default, skip_serializing)]
    pub rendered_coverage_percentage: Option<f64>,
}

impl ScheduleLayer {
    pub fn user_ids(&self) -> Vec<String> {
        self.users.iter().map(|member| member.user.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubSchedule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rendered_coverage_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub time_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub schedule_layers: Vec<ScheduleLayer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<Reference>,
    #[serde(default, skip_serializing)]
    pub escalation_policies: Vec<Reference>,
    #[serde(default, skip_serializing)]
    pub final_schedule: Option<SubSchedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub escalation_delay_in_minutes: u32,
    #[serde(default)]
    pub targets: Vec<Reference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Escalation policy as returned by the service. Fields this crate does not
/// model survive a read-modify-write through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Triggered => "triggered",
            IncidentStatus::Acknowledged => "acknowledged",
            IncidentStatus::Resolved => "resolved",
        }
    }

    pub fn is_open(self) -> bool {
        match self {
            IncidentStatus::Triggered | IncidentStatus::Acknowledged => true,
            IncidentStatus::Resolved => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub status: IncidentStatus,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub teams: Vec<Reference>,
}

/// Filter for the incident listing used during dependency scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentQuery {
    pub team_ids: Vec<String>,
    pub statuses: Vec<IncidentStatus>,
    pub date_range: String,
}

impl IncidentQuery {
    pub fn open_for_teams(team_ids: Vec<String>) -> Self {
        Self {
            team_ids,
            statuses: vec![IncidentStatus::Triggered, IncidentStatus::Acknowledged],
            date_range: "all".to_string(),
        }
    }
}
