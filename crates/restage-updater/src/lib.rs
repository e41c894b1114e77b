mod backup;
mod carryover;
mod fetch;
mod fs_ops;
mod git_ops;
mod handoff;
mod sequence;
mod status;

pub use backup::{stage_backup, BackupSnapshot, BACKUP_EXCLUDED_DIRS};
pub use carryover::{carry_state, CarryoverReport};
pub use fetch::fetch_source;
pub use handoff::{
    resolve_installer, resolve_relaunch, spawn_detached, verify_scratch_tree,
    write_handoff_script, HandoffHandle, HandoffScript, RelaunchCommand,
};
pub use sequence::{UpdateGuard, UpdateOutcome, UpdatePlan, UpdateSequence};
pub use status::{NullReporter, StatusReporter};
