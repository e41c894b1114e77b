use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use restage_core::{
    CarryoverConfig, InstallConfig, InstallLayout, UpdateConfig, UpdatePhase, CONFIG_FILE_NAME,
};
use restage_updater::{
    resolve_relaunch, stage_backup, UpdateGuard, UpdatePlan, UpdateSequence,
};

use crate::render::{current_output_style, render_status_line, TerminalReporter};

static UPDATE_GUARD: UpdateGuard = UpdateGuard::new();

pub fn resolve_install_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => std::env::current_dir().context("failed to resolve current directory"),
    }
}

fn config_path_for(layout: &InstallLayout, config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| layout.root().join(CONFIG_FILE_NAME))
}

pub fn load_config(layout: &InstallLayout, config_path: Option<&Path>) -> Result<UpdateConfig> {
    UpdateConfig::load(&config_path_for(layout, config_path))
}

/// Maintenance commands (backup, restart, doctor) run with defaults when the
/// config file is absent or broken; only `update` needs the source locator.
fn load_config_optional(layout: &InstallLayout, config_path: Option<&Path>) -> Option<UpdateConfig> {
    let path = config_path_for(layout, config_path);
    if !path.is_file() {
        return None;
    }
    match UpdateConfig::load(&path) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("ignoring unreadable config: {err:#}");
            None
        }
    }
}

fn install_config_for(layout: &InstallLayout, config_path: Option<&Path>) -> InstallConfig {
    load_config_optional(layout, config_path)
        .map(|config| config.install)
        .unwrap_or_default()
}

fn ensure_marker(layout: &InstallLayout, entry_point: &str) -> Result<()> {
    let marker = layout.marker_path(entry_point);
    if !marker.is_file() {
        anyhow::bail!(
            "installation root {} does not contain entry point '{}'",
            layout.root().display(),
            entry_point
        );
    }
    Ok(())
}

pub fn run_update_command(
    layout: &InstallLayout,
    config: &UpdateConfig,
    dry_run: bool,
) -> Result<()> {
    let style = current_output_style();
    let sequence = UpdateSequence::new(layout, config, &UPDATE_GUARD);

    if dry_run {
        for line in format_plan_lines(&sequence.plan()) {
            println!("{line}");
        }
        return Ok(());
    }

    layout.ensure_base_dirs()?;
    let mut reporter = TerminalReporter::new(style);
    let outcome = sequence.run(&mut reporter)?;

    use restage_updater::StatusReporter;
    reporter.phase(
        UpdatePhase::Terminating,
        "handing off to the detached script",
    );
    println!(
        "{}",
        render_status_line(
            style,
            "done",
            &format!(
                "update staged from {} ({})",
                config.source.location, outcome.handle.snapshot_id
            )
        )
    );
    println!(
        "{}",
        render_status_line(
            style,
            "done",
            &format!("backup retained at {}", outcome.backup.path.display())
        )
    );
    println!(
        "{}",
        render_status_line(
            style,
            "done",
            &format!(
                "carried over {} files ({} missing)",
                outcome.carryover.copied.len(),
                outcome.carryover.missing.len()
            )
        )
    );

    outcome
        .handle
        .launch()
        .context("failed launching handoff script")?;
    outcome
        .handle
        .finalize()
        .context("failed writing exit sentinel")?;
    log::info!("exiting so the handoff script can take over");
    std::process::exit(0)
}

pub fn format_plan_lines(plan: &UpdatePlan) -> Vec<String> {
    let source_line = match plan.source_kind {
        restage_core::SourceKind::Git => format!(
            "plan: update from git {} (branch {})",
            plan.source_location, plan.source_branch
        ),
        restage_core::SourceKind::Filesystem => {
            format!("plan: update from filesystem {}", plan.source_location)
        }
    };
    vec![
        source_line,
        format!("backup destination: {}", plan.backup_destination.display()),
        format!(
            "scratch destination: {}",
            plan.scratch_destination.display()
        ),
        format!("carryover: {}", plan.carryover_candidates.join(", ")),
        format!("relaunch: {}", plan.relaunch_line),
        "no filesystem changes were made (dry run)".to_string(),
    ]
}

pub fn run_backup_command(layout: &InstallLayout, config_path: Option<&Path>) -> Result<()> {
    let style = current_output_style();
    let install = install_config_for(layout, config_path);
    ensure_marker(layout, &install.entry_point)?;

    let snapshot = stage_backup(layout)?;
    println!(
        "{}",
        render_status_line(
            style,
            "done",
            &format!(
                "backed up {} files to {}",
                snapshot.file_count,
                snapshot.path.display()
            )
        )
    );
    Ok(())
}

pub fn run_restart_command(layout: &InstallLayout, config_path: Option<&Path>) -> Result<()> {
    let install = install_config_for(layout, config_path);
    ensure_marker(layout, &install.entry_point)?;

    let relaunch = resolve_relaunch(layout, &install);
    log::warn!("restarting in place: {}", relaunch.display_line());
    exec_restart(layout, &relaunch)
}

#[cfg(unix)]
fn exec_restart(
    layout: &InstallLayout,
    relaunch: &restage_updater::RelaunchCommand,
) -> Result<()> {
    use std::os::unix::process::CommandExt;
    let err = std::process::Command::new(&relaunch.program)
        .arg(&relaunch.entry_point)
        .current_dir(layout.root())
        .exec();
    Err(anyhow::Error::new(err).context(format!("failed to exec {}", relaunch.display_line())))
}

#[cfg(not(unix))]
fn exec_restart(
    layout: &InstallLayout,
    relaunch: &restage_updater::RelaunchCommand,
) -> Result<()> {
    std::process::Command::new(&relaunch.program)
        .arg(&relaunch.entry_point)
        .current_dir(layout.root())
        .spawn()
        .with_context(|| format!("failed to spawn {}", relaunch.display_line()))?;
    std::process::exit(0)
}

#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub root: PathBuf,
    pub backups_dir: PathBuf,
    pub scratch_base: PathBuf,
    pub config_path: PathBuf,
    pub config_loaded: bool,
    pub marker: PathBuf,
    pub marker_present: bool,
    pub venv: Option<PathBuf>,
    pub relaunch_line: String,
    pub carryover: Vec<(String, bool)>,
    pub update_in_flight: bool,
}

pub fn run_doctor_command(layout: &InstallLayout, config_path: Option<&Path>) -> Result<()> {
    let report = collect_doctor_report(layout, config_path);
    let style = current_output_style();
    for line in format_doctor_lines(&report) {
        println!("{}", render_status_line(style, "step", &line));
    }
    Ok(())
}

fn collect_doctor_report(layout: &InstallLayout, config_path: Option<&Path>) -> DoctorReport {
    let config = load_config_optional(layout, config_path);
    let install = config
        .as_ref()
        .map(|config| config.install.clone())
        .unwrap_or_default();
    let carryover_config = config
        .as_ref()
        .map(|config| config.carryover.clone())
        .unwrap_or_default();

    let marker = layout.marker_path(&install.entry_point);
    let mut carryover = vec![
        (
            carryover_config.credentials_file.clone(),
            layout.root().join(&carryover_config.credentials_file).is_file(),
        ),
        (
            CONFIG_FILE_NAME.to_string(),
            layout.root().join(CONFIG_FILE_NAME).is_file(),
        ),
    ];
    for name in &carryover_config.extra_files {
        carryover.push((name.clone(), layout.root().join(name).is_file()));
    }
    carryover.push((
        format!("*.{}", carryover_config.database_extension),
        database_files_present(layout.root(), &carryover_config),
    ));

    DoctorReport {
        root: layout.root().to_path_buf(),
        backups_dir: layout.backups_dir(),
        scratch_base: layout.scratch_base(),
        config_path: config_path_for(layout, config_path),
        config_loaded: config.is_some(),
        marker_present: marker.is_file(),
        marker,
        venv: layout.discover_venv(&install.venv_dir),
        relaunch_line: resolve_relaunch(layout, &install).display_line(),
        carryover,
        update_in_flight: UPDATE_GUARD.is_in_flight(),
    }
}

fn database_files_present(root: &Path, config: &CarryoverConfig) -> bool {
    std::fs::read_dir(root)
        .map(|entries| {
            entries.filter_map(|entry| entry.ok()).any(|entry| {
                entry.path().extension().and_then(|value| value.to_str())
                    == Some(config.database_extension.as_str())
            })
        })
        .unwrap_or(false)
}

pub fn format_doctor_lines(report: &DoctorReport) -> Vec<String> {
    let mut lines = vec![
        format!("root: {}", report.root.display()),
        format!("backups: {}", report.backups_dir.display()),
        format!("scratch: {}", report.scratch_base.display()),
        format!(
            "config: {} ({})",
            report.config_path.display(),
            if report.config_loaded { "loaded" } else { "missing" }
        ),
        format!(
            "entry point: {} ({})",
            report.marker.display(),
            if report.marker_present { "present" } else { "MISSING" }
        ),
        match &report.venv {
            Some(venv) => format!("venv: {}", venv.display()),
            None => "venv: none".to_string(),
        },
        format!("relaunch: {}", report.relaunch_line),
        format!(
            "update in flight: {}",
            if report.update_in_flight { "yes" } else { "no" }
        ),
    ];
    for (name, present) in &report.carryover {
        lines.push(format!(
            "carryover {}: {}",
            name,
            if *present { "present" } else { "absent" }
        ));
    }
    lines
}
