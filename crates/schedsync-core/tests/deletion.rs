mod common;

use std::time::Duration;

use common::{FakeService, IN_USE, server_error};
use schedsync_core::model::{IncidentStatus, Reference, ReferenceKind};
use schedsync_core::{
    ApiError, ScheduleConfig, ScheduleError, ScheduleManager, Timeouts, build_schedule,
};

const SCHEDULE: &str = r#"
name = "Ops"
time_zone = "UTC"

[[layer]]
start = "2024-01-01T00:00:00Z"
rotation_virtual_start = "2024-01-01T00:00:00Z"
rotation_turn_length_seconds = 86400
users = ["PUSER1"]
"#;

fn timeouts() -> Timeouts {
    Timeouts::immediate(Duration::from_millis(200))
}

fn seed(service: &FakeService, teams: &[&str]) -> String {
    let mut config = ScheduleConfig::from_toml(SCHEDULE).unwrap();
    config.teams = teams.iter().map(|team| team.to_string()).collect();
    service.insert_schedule(build_schedule(&config).unwrap())
}

fn schedule_ref(id: &str) -> Reference {
    Reference::new(id, ReferenceKind::ScheduleReference)
}

fn user_ref(id: &str) -> Reference {
    Reference::new(id, ReferenceKind::UserReference)
}

#[test]
fn unreferenced_schedule_is_deleted_directly() {
    let service = FakeService::new();
    let id = seed(&service, &[]);

    ScheduleManager::new(&service, timeouts()).delete(&id).unwrap();

    assert!(service.schedule(&id).is_none());
    assert_eq!(service.count("delete_schedule"), 1);
    assert_eq!(service.count("update_escalation_policy"), 0);
}

#[test]
fn sole_target_rule_is_removed_then_delete_succeeds() {
    let service = FakeService::new();
    let id = seed(&service, &[]);
    service.insert_policy("PEP1", vec![vec![schedule_ref(&id)]]);

    ScheduleManager::new(&service, timeouts()).delete(&id).unwrap();

    assert!(service.policy("PEP1").unwrap().escalation_rules.is_empty());
    assert!(service.schedule(&id).is_none());
    assert_eq!(service.count("delete_schedule"), 2);
    assert_eq!(service.count("update_escalation_policy"), 1);
}

#[test]
fn shared_rule_keeps_other_targets() {
    let service = FakeService::new();
    let id = seed(&service, &[]);
    service.insert_policy(
        "PEP1",
        vec![
            vec![user_ref("PUSER1"), schedule_ref(&id)],
            vec![user_ref("PUSER2")],
        ],
    );
    service.insert_policy("PEP2", vec![vec![schedule_ref(&id)], vec![user_ref("PUSER3")]]);

    ScheduleManager::new(&service, timeouts()).delete(&id).unwrap();

    let first = service.policy("PEP1").unwrap();
    assert_eq!(first.escalation_rules.len(), 2);
    assert_eq!(first.escalation_rules[0].targets, vec![user_ref("PUSER1")]);

    let second = service.policy("PEP2").unwrap();
    assert_eq!(second.escalation_rules.len(), 1);
    assert_eq!(second.escalation_rules[0].targets, vec![user_ref("PUSER3")]);
    assert!(service.schedule(&id).is_none());
}

#[test]
fn open_incident_blocks_deletion_before_any_delete_call() {
    let service = FakeService::new();
    let id = seed(&service, &["PTEAM1"]);
    service.insert_incident("PINC1", IncidentStatus::Triggered, "PTEAM1");

    let err = ScheduleManager::new(&service, timeouts())
        .delete(&id)
        .unwrap_err();

    match &err {
        ScheduleError::BlockedByOpenIncidents { incidents, .. } => {
            assert_eq!(
                incidents,
                &vec!["https://acme.pagerduty.com/incidents/PINC1".to_string()]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        err.to_string()
            .contains("https://acme.pagerduty.com/incidents/PINC1")
    );
    assert_eq!(service.count("delete_schedule"), 0);
    assert!(service.schedule(&id).is_some());
}

#[test]
fn resolved_or_unrelated_incidents_do_not_block() {
    let service = FakeService::new();
    let id = seed(&service, &["PTEAM1"]);
    service.insert_incident("PINC1", IncidentStatus::Resolved, "PTEAM1");
    service.insert_incident("PINC2", IncidentStatus::Acknowledged, "PTEAM9");

    ScheduleManager::new(&service, timeouts()).delete(&id).unwrap();
    assert!(service.schedule(&id).is_none());
}

#[test]
fn schedule_without_teams_skips_incident_lookup() {
    let service = FakeService::new();
    let id = seed(&service, &[]);
    service.insert_incident("PINC1", IncidentStatus::Triggered, "PTEAM1");

    ScheduleManager::new(&service, timeouts()).delete(&id).unwrap();
    assert_eq!(service.count("list_open_incidents"), 0);
}

#[test]
fn other_bad_request_fails_without_retrying() {
    let service = FakeService::new();
    let id = seed(&service, &[]);
    service.fail_next_delete(ApiError::status(
        400,
        "Invalid Input Provided",
        vec!["Schedule is locked".to_string()],
    ));

    let err = ScheduleManager::new(&service, timeouts())
        .delete(&id)
        .unwrap_err();

    assert!(matches!(err, ScheduleError::Remote { .. }));
    assert_eq!(err.api_error().unwrap().errors(), ["Schedule is locked"]);
    assert_eq!(service.count("delete_schedule"), 1);
    assert!(service.schedule(&id).is_some());
}

#[test]
fn transient_delete_failure_is_retried() {
    let service = FakeService::new();
    let id = seed(&service, &[]);
    service.fail_next_delete(server_error());

    ScheduleManager::new(&service, timeouts()).delete(&id).unwrap();

    assert_eq!(service.count("delete_schedule"), 2);
    assert!(service.schedule(&id).is_none());
}

#[test]
fn policy_deleted_concurrently_is_skipped() {
    let service = FakeService::new();
    let id = seed(&service, &[]);
    service.insert_policy("PEP1", vec![vec![schedule_ref(&id)]]);
    service.vanish_policy_on_fetch("PEP1");

    ScheduleManager::new(&service, timeouts()).delete(&id).unwrap();

    assert!(service.policy("PEP1").is_none());
    assert_eq!(service.count("update_escalation_policy"), 0);
    assert!(service.schedule(&id).is_none());
}

#[test]
fn failed_dissociation_surfaces_both_errors() {
    let service = FakeService::new();
    let id = seed(&service, &[]);
    service.insert_policy("PEP1", vec![vec![schedule_ref(&id)]]);
    service.fail_policy_updates(server_error());

    let err = ScheduleManager::new(&service, Timeouts::immediate(Duration::from_millis(30)))
        .delete(&id)
        .unwrap_err();

    match &err {
        ScheduleError::Compensation { original, source } => {
            assert_eq!(original.errors(), [IN_USE]);
            assert!(source.to_string().contains("PEP1"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(IN_USE));
    assert!(service.schedule(&id).is_some());
}

#[test]
fn missing_schedule_is_not_found() {
    let service = FakeService::new();

    let err = ScheduleManager::new(&service, timeouts())
        .delete("PMISSING")
        .unwrap_err();

    assert!(matches!(err, ScheduleError::NotFound(id) if id == "PMISSING"));
    assert_eq!(service.count("delete_schedule"), 0);
}
