mod common;

use std::path::PathBuf;
use std::time::Duration;

use common::{FakeService, not_found};
use schedsync_core::{
    ApplyOutcome, Preview, ScheduleConfig, ScheduleManager, Timeouts, load_state, save_state,
};
use tempfile::TempDir;

const SCHEDULE: &str = r#"
name = "Support"
time_zone = "UTC"

[[layer]]
name = "Day"
start = "2030-06-01T00:00:00Z"
rotation_virtual_start = "2030-06-01T00:00:00Z"
rotation_turn_length_seconds = 86400
users = ["PUSER1", "PUSER2"]

[[layer]]
name = "Night"
start = "2030-06-01T00:00:00Z"
rotation_virtual_start = "2030-06-01T12:00:00Z"
rotation_turn_length_seconds = 86400
users = ["PUSER3"]
"#;

fn config() -> ScheduleConfig {
    ScheduleConfig::from_toml(SCHEDULE).unwrap()
}

fn timeouts() -> Timeouts {
    Timeouts::immediate(Duration::from_secs(2))
}

fn state_file() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("applied").join("schedule.json");
    (dir, path)
}

#[test]
fn first_apply_creates_and_records_state() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();

    let applied = manager.apply(&config(), &path).unwrap();

    assert_eq!(applied.outcome, ApplyOutcome::Created);
    assert_eq!(service.count("create_schedule"), 1);
    assert_eq!(load_state(&path).unwrap(), Some(applied.state));
}

#[test]
fn apply_without_changes_sends_no_update() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();
    let created = manager.apply(&config(), &path).unwrap().state;

    let applied = manager.apply(&config(), &path).unwrap();

    assert_eq!(applied.outcome, ApplyOutcome::Unchanged);
    assert_eq!(applied.state, created);
    assert_eq!(service.count("create_schedule"), 1);
    assert_eq!(service.count("update_schedule"), 0);
}

#[test]
fn apply_end_dates_layer_removed_from_declaration() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();
    let created = manager.apply(&config(), &path).unwrap().state;

    let mut shrunk = config();
    shrunk.layers.truncate(1);
    let applied = manager.apply(&shrunk, &path).unwrap();

    assert_eq!(applied.outcome, ApplyOutcome::Updated);
    let sent = service.last_write().unwrap();
    assert_eq!(sent.schedule_layers.len(), 2);
    assert_eq!(sent.schedule_layers[1].id, created.layers[1].id);
    assert!(sent.schedule_layers[1].end.is_some());

    let recorded = load_state(&path).unwrap().unwrap();
    assert_eq!(recorded.layers.len(), 1);
    assert_eq!(recorded.layers[0].name, "Day");
}

#[test]
fn apply_converges_against_the_remote_not_the_state_file() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();
    let created = manager.apply(&config(), &path).unwrap().state;

    // someone adds a layer by hand
    let mut remote = service.schedule(&created.id).unwrap();
    let mut extra = remote.schedule_layers[0].clone();
    extra.id = String::new();
    extra.name = "Manual".to_string();
    remote.schedule_layers.push(extra);
    service.insert_schedule(remote);

    let applied = manager.apply(&config(), &path).unwrap();

    assert_eq!(applied.outcome, ApplyOutcome::Updated);
    let sent = service.last_write().unwrap();
    assert_eq!(sent.schedule_layers.len(), 3);
    assert_eq!(sent.schedule_layers[2].name, "Manual");
    assert!(sent.schedule_layers[2].end.is_some());
    assert_eq!(applied.state.layers.len(), 2);
}

#[test]
fn failed_read_back_still_records_created_schedule() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();
    service.fail_next_get(not_found());

    let err = manager.apply(&config(), &path).unwrap_err();

    let created_id = err.created_state().unwrap().id.clone();
    assert_eq!(load_state(&path).unwrap().unwrap().id, created_id);

    let applied = manager.apply(&config(), &path).unwrap();
    assert_eq!(applied.state.id, created_id);
    assert_eq!(service.count("create_schedule"), 1);
}

#[test]
fn invalid_declaration_leaves_state_untouched() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();
    let created = manager.apply(&config(), &path).unwrap().state;

    let mut bad = config();
    bad.layers[0].users.clear();
    assert!(manager.apply(&bad, &path).is_err());

    assert_eq!(load_state(&path).unwrap(), Some(created));
    assert_eq!(service.count("update_schedule"), 0);
}

#[test]
fn preview_describes_pending_work() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();

    assert_eq!(manager.preview(&config(), &path).unwrap(), Preview::Create);

    let created = manager.apply(&config(), &path).unwrap().state;
    assert_eq!(
        manager.preview(&config(), &path).unwrap(),
        Preview::Unchanged {
            id: created.id.clone()
        }
    );

    let mut shrunk = config();
    shrunk.layers.truncate(1);
    match manager.preview(&shrunk, &path).unwrap() {
        Preview::Update {
            id,
            changes,
            end_dated,
        } => {
            assert_eq!(id, created.id);
            assert!(changes.iter().any(|change| change.path == "layer.1"));
            assert_eq!(end_dated.len(), 1);
            assert_eq!(end_dated[0].id, created.layers[1].id);
        }
        other => panic!("unexpected preview: {other:?}"),
    }
    assert_eq!(service.count("update_schedule"), 0);
}

#[test]
fn state_written_elsewhere_is_picked_up() {
    let service = FakeService::new();
    let manager = ScheduleManager::new(&service, timeouts());
    let (_dir, path) = state_file();
    let created = manager.create(&config()).unwrap();
    save_state(&path, &created).unwrap();

    let applied = manager.apply(&config(), &path).unwrap();

    assert_eq!(applied.outcome, ApplyOutcome::Unchanged);
    assert_eq!(service.count("create_schedule"), 1);
}
