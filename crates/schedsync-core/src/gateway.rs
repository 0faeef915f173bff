use crate::error::ApiError;
use crate::model::{EscalationPolicy, Incident, IncidentQuery, Schedule};

/// Remote operations the engine depends on.
///
/// Implemented over HTTP by [`crate::client::PagerDutyClient`]; tests provide
/// in-memory fakes.
pub trait ScheduleGateway {
    fn create_schedule(&self, schedule: &Schedule, overflow: bool) -> Result<Schedule, ApiError>;

    fn get_schedule(&self, id: &str) -> Result<Schedule, ApiError>;

    /// Full-document replace; the complete layer list must be supplied.
    fn update_schedule(
        &self,
        id: &str,
        schedule: &Schedule,
        overflow: bool,
    ) -> Result<Schedule, ApiError>;

    fn delete_schedule(&self, id: &str) -> Result<(), ApiError>;

    fn get_escalation_policy(&self, id: &str) -> Result<EscalationPolicy, ApiError>;

    fn update_escalation_policy(
        &self,
        id: &str,
        policy: &EscalationPolicy,
    ) -> Result<EscalationPolicy, ApiError>;

    fn list_open_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>, ApiError>;
}

impl<G: ScheduleGateway + ?Sized> ScheduleGateway for &G {
    fn create_schedule(&self, schedule: &Schedule, overflow: bool) -> Result<Schedule, ApiError> {
        (**self).create_schedule(schedule, overflow)
    }

    fn get_schedule(&self, id: &str) -> Result<Schedule, ApiError> {
        (**self).get_schedule(id)
    }

    fn update_schedule(
        &self,
        id: &str,
        schedule: &Schedule,
        overflow: bool,
    ) -> Result<Schedule, ApiError> {
        (**self).update_schedule(id, schedule, overflow)
    }

    fn delete_schedule(&self, id: &str) -> Result<(), ApiError> {
        (**self).delete_schedule(id)
    }

    fn get_escalation_policy(&self, id: &str) -> Result<EscalationPolicy, ApiError> {
        (**self).get_escalation_policy(id)
    }

    fn update_escalation_policy(
        &self,
        id: &str,
        policy: &EscalationPolicy,
    ) -> Result<EscalationPolicy, ApiError> {
        (**self).update_escalation_policy(id, policy)
    }

    fn list_open_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>, ApiError> {
        (**self).list_open_incidents(query)
    }
}
