use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::anyhow;

use restage_core::{
    tree_digest, InstallLayout, SourceKind, UpdateConfig, UpdateError, UpdatePhase,
};

use crate::backup::{stage_backup, BackupSnapshot};
use crate::carryover::{carry_state, CarryoverReport};
use crate::fetch::fetch_source;
use crate::fs_ops::unique_suffix;
use crate::git_ops::git_head_snapshot_id;
use crate::handoff::{
    resolve_relaunch, verify_scratch_tree, write_handoff_script, HandoffHandle, HandoffScript,
};
use crate::status::StatusReporter;

/// Mutual exclusion across operator triggers within one process lifetime.
/// Compare-and-swap: safe to share from a parallel runtime.
#[derive(Debug)]
pub struct UpdateGuard {
    in_flight: AtomicBool,
}

impl UpdateGuard {
    pub const fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn release(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for UpdateGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub source_kind: SourceKind,
    pub source_location: String,
    pub source_branch: String,
    pub backup_destination: PathBuf,
    pub scratch_destination: PathBuf,
    pub carryover_candidates: Vec<String>,
    pub relaunch_line: String,
}

/// Everything the caller needs after a successful run: the handle to drive
/// the handoff, plus the backup and carryover results for the final status
/// message.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub handle: HandoffHandle,
    pub backup: BackupSnapshot,
    pub carryover: CarryoverReport,
}

pub struct UpdateSequence<'a> {
    layout: &'a InstallLayout,
    config: &'a UpdateConfig,
    guard: &'a UpdateGuard,
}

impl<'a> UpdateSequence<'a> {
    pub fn new(layout: &'a InstallLayout, config: &'a UpdateConfig, guard: &'a UpdateGuard) -> Self {
        Self {
            layout,
            config,
            guard,
        }
    }

    /// Dry-run description of the sequence. Pure derivation: touches no
    /// filesystem state.
    pub fn plan(&self) -> UpdatePlan {
        let mut carryover_candidates = vec![
            self.config.carryover.credentials_file.clone(),
            restage_core::CONFIG_FILE_NAME.to_string(),
        ];
        carryover_candidates.extend(self.config.carryover.extra_files.iter().cloned());
        carryover_candidates.push(format!("*.{}", self.config.carryover.database_extension));

        UpdatePlan {
            source_kind: self.config.source.kind,
            source_location: self.config.source.location.clone(),
            source_branch: self.config.source.branch.clone(),
            backup_destination: self.layout.backups_dir(),
            scratch_destination: self.layout.scratch_base(),
            carryover_candidates,
            relaunch_line: resolve_relaunch(self.layout, &self.config.install).display_line(),
        }
    }

    /// The full redeploy sequence up to HANDOFF_WRITTEN. Strictly ordered,
    /// no retry, no partial-success continuation: the first failure aborts
    /// with the live installation untouched. On success the guard stays
    /// held for the remainder of the process lifetime — the caller launches
    /// the handoff, finalizes the sentinel, and exits.
    pub fn run(&self, reporter: &mut dyn StatusReporter) -> Result<UpdateOutcome, UpdateError> {
        if !self.guard.try_begin() {
            let err = UpdateError::AlreadyInProgress;
            reporter.phase(UpdatePhase::Failed, &err.to_string());
            return Err(err);
        }

        let mut backup_path: Option<PathBuf> = None;
        let result = self.run_inner(reporter, &mut backup_path);
        if let Err(err) = &result {
            self.guard.release();
            reporter.phase(UpdatePhase::Failed, &failure_message(err, backup_path.as_deref()));
        }
        result
    }

    fn run_inner(
        &self,
        reporter: &mut dyn StatusReporter,
        backup_path: &mut Option<PathBuf>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let entry_point = &self.config.install.entry_point;
        let marker = self.layout.marker_path(entry_point);
        if !marker.is_file() {
            return Err(UpdateError::Verification(anyhow!(
                "installation root {} does not contain entry point '{}'",
                self.layout.root().display(),
                entry_point
            )));
        }

        reporter.phase(
            UpdatePhase::BackingUp,
            &format!("snapshotting into {}", self.layout.backups_dir().display()),
        );
        let backup = stage_backup(self.layout).map_err(UpdateError::Backup)?;
        *backup_path = Some(backup.path.clone());

        let suffix = unique_suffix();
        let scratch = self.layout.scratch_path(suffix);
        reporter.phase(
            UpdatePhase::Fetching,
            &format!("{} -> {}", self.config.source.location, scratch.display()),
        );
        fetch_source(
            &self.config.source,
            &scratch,
            Duration::from_secs(self.config.handoff.fetch_timeout_secs),
        )
        .map_err(UpdateError::Fetch)?;

        reporter.phase(
            UpdatePhase::CarryingOver,
            &format!("preserving state into {}", scratch.display()),
        );
        let carryover = match carry_state(self.layout.root(), &scratch, &self.config.carryover) {
            Ok(carryover) => carryover,
            Err(err) => {
                let _ = fs::remove_dir_all(&scratch);
                return Err(UpdateError::Carryover(err));
            }
        };

        reporter.phase(
            UpdatePhase::Verifying,
            &format!("checking fetched tree {}", scratch.display()),
        );
        if let Err(err) = verify_scratch_tree(&scratch, entry_point) {
            let _ = fs::remove_dir_all(&scratch);
            return Err(UpdateError::Verification(err));
        }
        let snapshot_id = match self.fetched_snapshot_id(&scratch) {
            Ok(snapshot_id) => snapshot_id,
            Err(err) => {
                let _ = fs::remove_dir_all(&scratch);
                return Err(UpdateError::Verification(err));
            }
        };

        let script_path = self.layout.handoff_script_path(suffix);
        let sentinel_path = self.layout.sentinel_path(suffix);
        let script = HandoffScript::new(
            self.layout,
            self.config,
            &scratch,
            &backup.path,
            &script_path,
            &sentinel_path,
        );
        if let Err(err) = write_handoff_script(&script_path, &script.render()) {
            let _ = fs::remove_dir_all(&scratch);
            return Err(UpdateError::Handoff(err));
        }
        reporter.phase(
            UpdatePhase::HandoffWritten,
            &format!("handoff script at {}", script_path.display()),
        );

        Ok(UpdateOutcome {
            handle: HandoffHandle {
                script_path,
                sentinel_path,
                backup_path: backup.path.clone(),
                snapshot_id,
            },
            backup,
            carryover,
        })
    }

    fn fetched_snapshot_id(&self, scratch: &std::path::Path) -> anyhow::Result<String> {
        match self.config.source.kind {
            SourceKind::Git => git_head_snapshot_id(scratch),
            SourceKind::Filesystem => tree_digest(scratch),
        }
    }
}

fn failure_message(err: &UpdateError, backup_path: Option<&std::path::Path>) -> String {
    let step = err.failed_phase().label();
    match backup_path {
        Some(path) => format!("{err} (step: {step}; backup retained at {})", path.display()),
        None => format!("{err} (step: {step})"),
    }
}
