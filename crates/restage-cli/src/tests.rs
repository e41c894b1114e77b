use super::*;

use std::path::PathBuf;

use crate::flows::{format_doctor_lines, format_plan_lines, DoctorReport};
use crate::render::{format_phase_line, render_status_line, style_from, OutputStyle};
use restage_core::{SourceKind, UpdatePhase};
use restage_updater::UpdatePlan;

#[test]
fn cli_parses_update_with_root_and_dry_run() {
    let cli = Cli::try_parse_from(["restage", "--root", "/opt/community-bot", "update", "--dry-run"])
        .expect("must parse update command");
    assert_eq!(cli.root, Some(PathBuf::from("/opt/community-bot")));
    assert!(matches!(cli.command, Commands::Update { dry_run: true }));
}

#[test]
fn cli_parses_update_without_flags() {
    let cli = Cli::try_parse_from(["restage", "update"]).expect("must parse update command");
    assert_eq!(cli.root, None);
    assert!(matches!(cli.command, Commands::Update { dry_run: false }));
}

#[test]
fn cli_parses_maintenance_commands() {
    for (args, expected) in [
        (vec!["restage", "backup"], "Backup"),
        (vec!["restage", "restart"], "Restart"),
        (vec!["restage", "doctor"], "Doctor"),
        (vec!["restage", "version"], "Version"),
    ] {
        let cli = Cli::try_parse_from(args).expect("must parse command");
        let name = match cli.command {
            Commands::Backup => "Backup",
            Commands::Restart => "Restart",
            Commands::Doctor => "Doctor",
            Commands::Version => "Version",
            other => panic!("unexpected command parsed: {other:?}"),
        };
        assert_eq!(name, expected);
    }
}

#[test]
fn cli_parses_explicit_config_path() {
    let cli = Cli::try_parse_from(["restage", "--config", "/etc/bot/config.toml", "doctor"])
        .expect("must parse doctor command");
    assert_eq!(cli.config, Some(PathBuf::from("/etc/bot/config.toml")));
}

#[test]
fn cli_rejects_unknown_command() {
    Cli::try_parse_from(["restage", "upgrade"]).expect_err("must reject unknown command");
}

#[test]
fn plan_lines_name_every_destination() {
    let plan = UpdatePlan {
        source_kind: SourceKind::Git,
        source_location: "https://example.invalid/community-bot.git".to_string(),
        source_branch: "main".to_string(),
        backup_destination: PathBuf::from("/home/operator/backups"),
        scratch_destination: PathBuf::from("/home/operator/downloading"),
        carryover_candidates: vec![
            ".env".to_string(),
            "config.toml".to_string(),
            "*.db".to_string(),
        ],
        relaunch_line: "python3 bot.py".to_string(),
    };

    let lines = format_plan_lines(&plan);
    assert_eq!(
        lines[0],
        "plan: update from git https://example.invalid/community-bot.git (branch main)"
    );
    assert!(lines.iter().any(|line| line == "backup destination: /home/operator/backups"));
    assert!(lines
        .iter()
        .any(|line| line == "scratch destination: /home/operator/downloading"));
    assert!(lines
        .iter()
        .any(|line| line == "carryover: .env, config.toml, *.db"));
    assert!(lines.iter().any(|line| line == "relaunch: python3 bot.py"));
    assert_eq!(
        lines.last().expect("must have lines"),
        "no filesystem changes were made (dry run)"
    );
}

#[test]
fn plan_lines_for_filesystem_source_omit_branch() {
    let plan = UpdatePlan {
        source_kind: SourceKind::Filesystem,
        source_location: "/srv/bot-source".to_string(),
        source_branch: "main".to_string(),
        backup_destination: PathBuf::from("/home/operator/backups"),
        scratch_destination: PathBuf::from("/home/operator/downloading"),
        carryover_candidates: vec![".env".to_string()],
        relaunch_line: "python3 bot.py".to_string(),
    };
    assert_eq!(
        format_plan_lines(&plan)[0],
        "plan: update from filesystem /srv/bot-source"
    );
}

#[test]
fn phase_lines_are_numbered_for_sequence_steps() {
    assert_eq!(
        format_phase_line(UpdatePhase::BackingUp, "snapshotting"),
        "[1/6] backing up: snapshotting"
    );
    assert_eq!(
        format_phase_line(UpdatePhase::Terminating, "handing off"),
        "[6/6] terminating: handing off"
    );
    assert_eq!(
        format_phase_line(UpdatePhase::Failed, "fetch-failed: boom"),
        "failed: fetch-failed: boom"
    );
}

#[test]
fn status_lines_render_plain_and_rich() {
    let plain = render_status_line(OutputStyle::Plain, "done", "backup retained");
    assert_eq!(plain, "[done] backup retained");

    let rich = render_status_line(OutputStyle::Rich, "done", "backup retained");
    assert!(rich.contains("done"));
    assert!(rich.contains("backup retained"));
    assert_ne!(rich, plain);
}

#[test]
fn output_style_prefers_env_override_then_tty() {
    assert_eq!(style_from(Some("plain"), true), OutputStyle::Plain);
    assert_eq!(style_from(Some("rich"), false), OutputStyle::Rich);
    assert_eq!(style_from(None, true), OutputStyle::Rich);
    assert_eq!(style_from(None, false), OutputStyle::Plain);
    assert_eq!(style_from(Some("garbage"), false), OutputStyle::Plain);
}

#[test]
fn doctor_lines_cover_layout_and_carryover() {
    let report = DoctorReport {
        root: PathBuf::from("/home/operator/community-bot"),
        backups_dir: PathBuf::from("/home/operator/backups"),
        scratch_base: PathBuf::from("/home/operator/downloading"),
        config_path: PathBuf::from("/home/operator/community-bot/config.toml"),
        config_loaded: true,
        marker: PathBuf::from("/home/operator/community-bot/bot.py"),
        marker_present: true,
        venv: None,
        relaunch_line: "python3 bot.py".to_string(),
        carryover: vec![(".env".to_string(), true), ("*.db".to_string(), false)],
        update_in_flight: false,
    };

    let lines = format_doctor_lines(&report);
    assert!(lines.iter().any(|line| line == "root: /home/operator/community-bot"));
    assert!(lines
        .iter()
        .any(|line| line == "config: /home/operator/community-bot/config.toml (loaded)"));
    assert!(lines
        .iter()
        .any(|line| line == "entry point: /home/operator/community-bot/bot.py (present)"));
    assert!(lines.iter().any(|line| line == "venv: none"));
    assert!(lines.iter().any(|line| line == "update in flight: no"));
    assert!(lines.iter().any(|line| line == "carryover .env: present"));
    assert!(lines.iter().any(|line| line == "carryover *.db: absent"));
}

#[test]
fn doctor_lines_flag_missing_marker() {
    let report = DoctorReport {
        root: PathBuf::from("/tmp/nowhere"),
        backups_dir: PathBuf::from("/tmp/backups"),
        scratch_base: PathBuf::from("/tmp/downloading"),
        config_path: PathBuf::from("/tmp/nowhere/config.toml"),
        config_loaded: false,
        marker: PathBuf::from("/tmp/nowhere/bot.py"),
        marker_present: false,
        venv: Some(PathBuf::from("/tmp/venv")),
        relaunch_line: "python3 bot.py".to_string(),
        carryover: Vec::new(),
        update_in_flight: true,
    };

    let lines = format_doctor_lines(&report);
    assert!(lines
        .iter()
        .any(|line| line == "config: /tmp/nowhere/config.toml (missing)"));
    assert!(lines
        .iter()
        .any(|line| line == "entry point: /tmp/nowhere/bot.py (MISSING)"));
    assert!(lines.iter().any(|line| line == "venv: /tmp/venv"));
    assert!(lines.iter().any(|line| line == "update in flight: yes"));
}

#[test]
fn completions_generate_for_bash() {
    let mut command = Cli::command();
    let mut buffer = Vec::new();
    clap_complete::generate(
        clap_complete::Shell::Bash,
        &mut command,
        "restage",
        &mut buffer,
    );
    assert!(!buffer.is_empty());
}
