//! Materialized schedule view and its on-disk form.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Restriction, RestrictionKind, ScheduleLayer, UserMember};

/// Active view of a remote schedule, as last applied or read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub id: String,
    pub name: String,
    pub time_zone: String,
    pub description: String,
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerState>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_schedule: Option<FinalScheduleState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub id: String,
    pub name: String,
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub rotation_virtual_start: String,
    pub rotation_turn_length_seconds: u64,
    pub users: Vec<String>,
    #[serde(default, rename = "restriction")]
    pub restrictions: Vec<RestrictionState>,
    #[serde(default)]
    pub rendered_coverage_percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionState {
    #[serde(rename = "type")]
    pub kind: RestrictionKind,
    pub start_time_of_day: String,
    /// Absent rather than zero when not applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_day_of_week: Option<u8>,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScheduleState {
    pub name: String,
    pub rendered_coverage_percentage: String,
}

impl LayerState {
    /// Wire form of a previously applied layer, used as reconciliation input.
    pub fn to_layer(&self) -> ScheduleLayer {
        ScheduleLayer {
            id: self.id.clone(),
            name: self.name.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            rotation_virtual_start: self.rotation_virtual_start.clone(),
            rotation_turn_length_seconds: self.rotation_turn_length_seconds,
            users: self.users.iter().map(UserMember::new).collect(),
            restrictions: self
                .restrictions
                .iter()
                .map(|restriction| Restriction {
                    kind: restriction.kind,
                    start_time_of_day: restriction.start_time_of_day.clone(),
                    start_day_of_week: restriction.start_day_of_week,
                    duration_seconds: restriction.duration_seconds,
                })
                .collect(),
            rendered_coverage_percentage: None,
        }
    }
}

impl ScheduleState {
    pub fn prior_layers(&self) -> Vec<ScheduleLayer> {
        self.layers.iter().map(LayerState::to_layer).collect()
    }
}

/// Read the applied state, `None` when the file does not exist.
pub fn load_state(path: &Path) -> Result<Option<ScheduleState>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn save_state(path: &Path, state: &ScheduleState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut serialized = serde_json::to_string_pretty(state)?;
    serialized.push('\n');
    fs::write(path, serialized)?;
    Ok(())
}

pub fn remove_state(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
