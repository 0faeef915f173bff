//! Reconciliation engine keeping a declared on-call schedule in sync with PagerDuty.

pub mod client;
pub mod config;
pub mod deletion;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod plan;
pub mod reconcile;
pub mod retry;
pub mod scanner;
pub mod state;
pub mod time;
pub mod validate;

pub use client::PagerDutyClient;
pub use config::{
    LayerConfig, RestrictionConfig, ScheduleConfig, Settings, SettingsLoadResult, SettingsSource,
    config_directory, load_settings, load_settings_from, settings_path,
};
pub use deletion::{DeletionCoordinator, is_schedule_in_use_by_escalation_policies_conflict};
pub use error::{ApiError, Result, ScheduleError, ValidationError};
pub use gateway::ScheduleGateway;
pub use lifecycle::{
    Applied, ApplyOutcome, Preview, ScheduleManager, build_schedule, plan_write_set,
};
pub use plan::{Change, plan};
pub use reconcile::{materialize_layers, reconcile};
pub use retry::{RetryPolicy, Timeouts};
pub use scanner::DependencyScanner;
pub use state::{ScheduleState, load_state, remove_state, save_state};
pub use time::normalize;
