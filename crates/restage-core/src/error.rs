use thiserror::Error;

use crate::UpdatePhase;

/// Failure taxonomy of the redeploy sequence. Every variant is raised before
/// the handoff script launches, so the live installation is guaranteed
/// unmodified when one of these reaches the operator.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("update-already-running: an update sequence is already in progress")]
    AlreadyInProgress,
    #[error("backup-failed: {0:#}")]
    Backup(anyhow::Error),
    #[error("fetch-failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("carryover-failed: {0:#}")]
    Carryover(anyhow::Error),
    #[error("verification-failed: {0:#}")]
    Verification(anyhow::Error),
    #[error("handoff-failed: {0:#}")]
    Handoff(anyhow::Error),
}

impl UpdateError {
    pub fn code(&self) -> &'static str {
        match self {
            UpdateError::AlreadyInProgress => "update-already-running",
            UpdateError::Backup(_) => "backup-failed",
            UpdateError::Fetch(_) => "fetch-failed",
            UpdateError::Carryover(_) => "carryover-failed",
            UpdateError::Verification(_) => "verification-failed",
            UpdateError::Handoff(_) => "handoff-failed",
        }
    }

    pub fn failed_phase(&self) -> UpdatePhase {
        match self {
            UpdateError::AlreadyInProgress => UpdatePhase::Idle,
            UpdateError::Backup(_) => UpdatePhase::BackingUp,
            UpdateError::Fetch(_) => UpdatePhase::Fetching,
            UpdateError::Carryover(_) => UpdatePhase::CarryingOver,
            UpdateError::Verification(_) => UpdatePhase::Verifying,
            UpdateError::Handoff(_) => UpdatePhase::HandoffWritten,
        }
    }
}
