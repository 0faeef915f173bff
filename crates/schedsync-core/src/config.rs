use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_API_URL;
use crate::error::{Result, ScheduleError};
use crate::model::{DEFAULT_DESCRIPTION, RestrictionKind};
use crate::retry::{RetryPolicy, Timeouts};

const CONFIG_DIR_NAME: &str = "schedsync";
const SETTINGS_FILE_NAME: &str = "settings.toml";
pub const TOKEN_ENV: &str = "PAGERDUTY_TOKEN";
pub const API_URL_ENV: &str = "PAGERDUTY_API_URL";

/// Declared schedule document, as written by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub name: String,
    pub time_zone: String,
    /// Write-only; controls rotation clipping on create and update.
    #[serde(default)]
    pub overflow: bool,
    #[serde(default = "ScheduleConfig::default_description")]
    pub description: String,
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub teams: Vec<String>,
}

impl ScheduleConfig {
    fn default_description() -> String {
        DEFAULT_DESCRIPTION.to_string()
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            ScheduleError::config(format!("failed to read {}: {}", path.display(), err))
        })?;
        Self::from_toml(&raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Pins the declared layer to an existing remote layer. Usually left
    /// empty and inherited positionally from the applied state.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    pub rotation_virtual_start: String,
    pub rotation_turn_length_seconds: u64,
    pub users: Vec<String>,
    #[serde(default, rename = "restriction")]
    pub restrictions: Vec<RestrictionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionConfig {
    #[serde(rename = "type")]
    pub kind: RestrictionKind,
    pub start_time_of_day: String,
    #[serde(default)]
    pub start_day_of_week: Option<u8>,
    pub duration_seconds: u64,
}

/// Result returned by [`load_settings`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct SettingsLoadResult {
    pub settings: Settings,
    pub warnings: Vec<String>,
    pub source: SettingsSource,
}

/// Indicates where the settings were loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    /// No settings file was found or usable; defaults were synthesized.
    Default,
    /// Settings were read from `settings.toml`.
    File,
}

/// Connection settings for the scheduling service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "Settings::default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_token: None,
            api_url: Self::default_api_url(),
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    fn default_api_url() -> String {
        DEFAULT_API_URL.to_string()
    }

    /// Apply `PAGERDUTY_TOKEN` / `PAGERDUTY_API_URL` on top of file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(token) = non_empty_env(TOKEN_ENV) {
            self.api_token = Some(token);
        }
        if let Some(url) = non_empty_env(API_URL_ENV) {
            self.api_url = url;
        }
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

/// Retry tuning, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "RetrySettings::default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default = "RetrySettings::default_lookup_secs")]
    pub lookup_timeout_secs: u64,
    #[serde(default = "RetrySettings::default_read_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "RetrySettings::default_write_secs")]
    pub update_timeout_secs: u64,
    #[serde(default = "RetrySettings::default_write_secs")]
    pub delete_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            backoff_secs: Self::default_backoff_secs(),
            lookup_timeout_secs: Self::default_lookup_secs(),
            read_timeout_secs: Self::default_read_secs(),
            update_timeout_secs: Self::default_write_secs(),
            delete_timeout_secs: Self::default_write_secs(),
        }
    }
}

impl RetrySettings {
    const fn default_backoff_secs() -> u64 {
        2
    }

    const fn default_lookup_secs() -> u64 {
        10
    }

    const fn default_read_secs() -> u64 {
        30
    }

    const fn default_write_secs() -> u64 {
        120
    }

    pub fn timeouts(&self) -> Timeouts {
        let backoff = Duration::from_secs(self.backoff_secs);
        let policy = |secs: u64| RetryPolicy::new(Duration::from_secs(secs), backoff);
        Timeouts {
            lookup: policy(self.lookup_timeout_secs),
            read: policy(self.read_timeout_secs),
            update: policy(self.update_timeout_secs),
            delete: policy(self.delete_timeout_secs),
        }
    }
}

/// Path to the configuration directory.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path to `settings.toml`.
pub fn settings_path() -> PathBuf {
    config_directory().join(SETTINGS_FILE_NAME)
}

/// Load settings from the default location, then apply environment overrides.
pub fn load_settings() -> SettingsLoadResult {
    let mut result = load_settings_from(&settings_path());
    result.settings = result.settings.with_env_overrides();
    result
}

/// Load settings from `path`, falling back to defaults.
pub fn load_settings_from(path: &Path) -> SettingsLoadResult {
    let mut warnings = Vec::new();

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<Settings>(&raw) {
                Ok(settings) => {
                    let (settings, mut sanitize_warnings) = sanitize_settings(settings);
                    warnings.append(&mut sanitize_warnings);
                    return SettingsLoadResult {
                        settings,
                        warnings,
                        source: SettingsSource::File,
                    };
                }
                Err(err) => warnings.push(format!(
                    "Failed to parse {} as TOML: {}. Falling back to defaults.",
                    path.display(),
                    err
                )),
            },
            Err(err) => warnings.push(format!(
                "Failed to read {}: {}. Falling back to defaults.",
                path.display(),
                err
            )),
        }
    }

    SettingsLoadResult {
        settings: Settings::default(),
        warnings,
        source: SettingsSource::Default,
    }
}

fn sanitize_settings(mut settings: Settings) -> (Settings, Vec<String>) {
    let mut warnings = Vec::new();

    if settings.api_url.trim().is_empty() {
        warnings.push(format!(
            "api_url is empty. Resetting to {}.",
            DEFAULT_API_URL
        ));
        settings.api_url = Settings::default_api_url();
    }

    let retry = &mut settings.retry;
    for (name, value, default) in [
        (
            "lookup_timeout_secs",
            &mut retry.lookup_timeout_secs,
            RetrySettings::default_lookup_secs(),
        ),
        (
            "read_timeout_secs",
            &mut retry.read_timeout_secs,
            RetrySettings::default_read_secs(),
        ),
        (
            "update_timeout_secs",
            &mut retry.update_timeout_secs,
            RetrySettings::default_write_secs(),
        ),
        (
            "delete_timeout_secs",
            &mut retry.delete_timeout_secs,
            RetrySettings::default_write_secs(),
        ),
    ] {
        if *value == 0 {
            warnings.push(format!(
                "retry.{} must be positive. Resetting to {}.",
                name, default
            ));
            *value = default;
        }
    }

    (settings, warnings)
}
