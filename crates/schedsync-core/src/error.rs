use std::io;

use thiserror::Error;

use crate::state::ScheduleState;

/// Failures reported by the remote scheduling service or the transport to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("HTTP {status}: {message}{}", format_error_list(.errors))]
    Status {
        status: u16,
        message: String,
        errors: Vec<String>,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

fn format_error_list(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(" [{}]", errors.join(", "))
    }
}

impl ApiError {
    pub fn status<M: Into<String>>(status: u16, message: M, errors: Vec<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
            errors,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Decode(_) => None,
        }
    }

    pub fn is_status(&self, code: u16) -> bool {
        self.status_code() == Some(code)
    }

    pub fn is_not_found(&self) -> bool {
        self.is_status(404)
    }

    /// Network failures, throttling and server errors. Worth retrying on
    /// writes; anything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode(_) => false,
        }
    }

    /// Structured error list attached to a status error, empty otherwise.
    pub fn errors(&self) -> &[String] {
        match self {
            ApiError::Status { errors, .. } => errors,
            ApiError::Transport(_) | ApiError::Decode(_) => &[],
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Problems in a declared schedule detected before any remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown time zone {0:?}")]
    UnknownTimeZone(String),
    #[error("at least one layer is required")]
    NoLayers,
    #[error("{field}: {value:?} is not a valid RFC 3339 timestamp")]
    InvalidTimestamp { field: String, value: String },
    #[error("{field}: rotation_turn_length_seconds must be between 3600 and 31536000, got {value}")]
    TurnLengthOutOfRange { field: String, value: u64 },
    #[error("{field}: at least one user is required")]
    NoUsers { field: String },
    #[error("{field}: start_time_of_day must be of 00:00:00 format, got {value:?}")]
    InvalidTimeOfDay { field: String, value: String },
    #[error("{field}: start_day_of_week must be between 1 and 7, got {value}")]
    DayOfWeekOutOfRange { field: String, value: u8 },
    #[error("{field}: duration_seconds must be between 1 and 604799, got {value}")]
    DurationOutOfRange { field: String, value: u64 },
    #[error(
        "{field}: start_day_of_week must only be set for a weekly_restriction schedule restriction type"
    )]
    DailyRestrictionDayOfWeek { field: String },
    #[error(
        "{field}: duration_seconds for a daily_restriction schedule restriction type must be shorter than a day"
    )]
    DailyRestrictionTooLong { field: String },
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("failed to {action} {id}: {source}")]
    Remote {
        action: &'static str,
        id: String,
        #[source]
        source: ApiError,
    },
    #[error("schedule {0:?} not found")]
    NotFound(String),
    #[error(
        "Before removing schedule {id:?} you must first resolve the following incidents related with escalation policies using this schedule:{}",
        format_incident_links(.incidents)
    )]
    BlockedByOpenIncidents { id: String, incidents: Vec<String> },
    #[error("{original}; {source}")]
    Compensation {
        original: ApiError,
        #[source]
        source: Box<ScheduleError>,
    },
    #[error(
        "schedule {} was created but could not be read back: {source}",
        created_id(.state)
    )]
    Created {
        /// View built from the create response; carries the new id.
        state: Box<ScheduleState>,
        #[source]
        source: Box<ScheduleError>,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn created_id(state: &ScheduleState) -> &str {
    &state.id
}

fn format_incident_links(incidents: &[String]) -> String {
    incidents.iter().map(|link| format!("\n{link}")).collect()
}

impl ScheduleError {
    pub fn remote<I: Into<String>>(action: &'static str, id: I, source: ApiError) -> Self {
        ScheduleError::Remote {
            action,
            id: id.into(),
            source,
        }
    }

    pub fn config<T: Into<String>>(message: T) -> Self {
        ScheduleError::Config(message.into())
    }

    /// The remote failure underneath any context wrapping, if there is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ScheduleError::Remote { source, .. } => Some(source),
            ScheduleError::Compensation { original, .. } => Some(original),
            ScheduleError::Created { source, .. } => source.api_error(),
            _ => None,
        }
    }

    /// State of a schedule that exists remotely even though the operation failed.
    pub fn created_state(&self) -> Option<&ScheduleState> {
        match self {
            ScheduleError::Created { state, .. } => Some(state.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;
