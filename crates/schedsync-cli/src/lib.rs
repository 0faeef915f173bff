//! Command-line front end for `schedsync-core`.

pub mod cli_args;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rpassword::prompt_password;
use schedsync_core::config::TOKEN_ENV;
use schedsync_core::logging::{LoggingDestination, init_logging};
use schedsync_core::state::ScheduleState;
use schedsync_core::{
    ApplyOutcome, PagerDutyClient, Preview, ScheduleConfig, ScheduleManager, Timeouts,
    build_schedule, load_settings, load_state, remove_state, save_state, settings_path,
};

use tracing::info;

use cli_args::{Cli, Command};

/// Expand a leading `~` in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Load and validate a declared schedule.
pub fn validate_config(path: &Path) -> Result<ScheduleConfig> {
    let config = ScheduleConfig::load(path)?;
    build_schedule(&config).with_context(|| format!("{} is invalid", path.display()))?;
    Ok(config)
}

/// Human readable summary of an applied schedule.
pub fn render_state(state: &ScheduleState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "schedule {} ({})", state.name, state.id);
    let _ = writeln!(out, "  time_zone   = {}", state.time_zone);
    let _ = writeln!(out, "  description = {}", state.description);
    if !state.teams.is_empty() {
        let _ = writeln!(out, "  teams       = {}", state.teams.join(", "));
    }
    if let Some(final_schedule) = &state.final_schedule {
        let _ = writeln!(
            out,
            "  coverage    = {}%",
            final_schedule.rendered_coverage_percentage
        );
    }
    for (index, layer) in state.layers.iter().enumerate() {
        let _ = writeln!(out, "  layer {index}: {} ({})", layer.name, layer.id);
        let _ = writeln!(out, "    start = {}", layer.start);
        if let Some(end) = &layer.end {
            let _ = writeln!(out, "    end   = {end}");
        }
        let _ = writeln!(
            out,
            "    turn  = {}s, users = {}",
            layer.rotation_turn_length_seconds,
            layer.users.join(", ")
        );
        for restriction in &layer.restrictions {
            let day = restriction
                .start_day_of_week
                .map(|day| format!(" day {day}"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "    {}{day} at {} for {}s",
                restriction.kind.as_str(),
                restriction.start_time_of_day,
                restriction.duration_seconds
            );
        }
    }
    out
}

struct Session {
    client: PagerDutyClient,
    timeouts: Timeouts,
}

impl Session {
    fn connect() -> Result<Self> {
        let load = load_settings();
        for warning in &load.warnings {
            eprintln!("Warning: {warning}");
        }
        let settings = load.settings;

        let token = match settings.token() {
            Some(token) => token.to_string(),
            None => prompt_password("Enter PagerDuty API token: ")
                .context("failed to read API token")?,
        };
        if token.trim().is_empty() {
            bail!(
                "an API token is required; set {TOKEN_ENV} or api_token in {}",
                settings_path().display()
            );
        }

        let client = PagerDutyClient::new(&settings.api_url, &token)?;
        Ok(Self {
            client,
            timeouts: settings.retry.timeouts(),
        })
    }

    fn manager(&self) -> ScheduleManager<'_, PagerDutyClient> {
        ScheduleManager::new(&self.client, self.timeouts)
    }
}

fn require_state(path: &Path) -> Result<ScheduleState> {
    match load_state(path)? {
        Some(state) => Ok(state),
        None => bail!(
            "no applied state at {}; run `schedsync apply` or `schedsync import <ID>` first",
            path.display()
        ),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let destination = if cli.no_log_file {
        LoggingDestination::StderrOnly
    } else {
        LoggingDestination::FileAndStderr
    };
    if let Err(err) = init_logging(destination) {
        eprintln!("Warning: logging disabled: {err}");
    }

    let config_path = expand_path(&cli.config);
    let state_path = expand_path(&cli.state);
    info!(
        command = ?cli.command,
        config = %config_path.display(),
        state = %state_path.display(),
        "Running command"
    );

    match cli.command {
        Command::Validate => {
            let config = validate_config(&config_path)?;
            println!(
                "{} is valid ({} layer(s)).",
                config_path.display(),
                config.layers.len()
            );
            Ok(())
        }
        Command::Plan => run_plan(&config_path, &state_path),
        Command::Apply => run_apply(&config_path, &state_path),
        Command::Show => {
            let state = require_state(&state_path)?;
            let session = Session::connect()?;
            let current = session.manager().read(&state.id)?;
            save_state(&state_path, &current)?;
            print!("{}", render_state(&current));
            Ok(())
        }
        Command::Import(args) => {
            if let Some(existing) = load_state(&state_path)? {
                if existing.id != args.id {
                    bail!(
                        "{} already tracks schedule {}; remove it before importing {}",
                        state_path.display(),
                        existing.id,
                        args.id
                    );
                }
            }
            let session = Session::connect()?;
            let state = session.manager().import(&args.id)?;
            save_state(&state_path, &state)?;
            println!("Imported schedule {} ({}).", state.name, state.id);
            Ok(())
        }
        Command::Destroy => {
            let state = require_state(&state_path)?;
            let session = Session::connect()?;
            session.manager().delete(&state.id)?;
            remove_state(&state_path)?;
            println!("Destroyed schedule {} ({}).", state.name, state.id);
            Ok(())
        }
    }
}

fn run_plan(config_path: &Path, state_path: &Path) -> Result<()> {
    let config = validate_config(config_path)?;
    if load_state(state_path)?.is_none() {
        println!(
            "+ schedule {:?} will be created with {} layer(s)",
            config.name,
            config.layers.len()
        );
        return Ok(());
    }

    let session = Session::connect()?;
    match session.manager().preview(&config, state_path)? {
        Preview::Create => println!(
            "+ schedule {:?} will be created with {} layer(s)",
            config.name,
            config.layers.len()
        ),
        Preview::Unchanged { id } => println!("No changes. Schedule {id} is up to date."),
        Preview::Update {
            id,
            changes,
            end_dated,
        } => {
            println!("Schedule {id} will be updated in place:");
            for change in &changes {
                println!("  {change}");
            }
            for layer in &end_dated {
                println!("  - layer {} ({}) will be end-dated", layer.id, layer.name);
            }
        }
    }
    Ok(())
}

fn run_apply(config_path: &Path, state_path: &Path) -> Result<()> {
    let config = validate_config(config_path)?;
    let session = Session::connect()?;

    let applied = session.manager().apply(&config, state_path)?;

    let state = &applied.state;
    match applied.outcome {
        ApplyOutcome::Created => println!("Created schedule {} ({}).", state.name, state.id),
        ApplyOutcome::Updated => println!("Updated schedule {} ({}).", state.name, state.id),
        ApplyOutcome::Unchanged => println!("No changes. Schedule {} is up to date.", state.id),
    }
    Ok(())
}
