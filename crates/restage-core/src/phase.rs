/// Number of user-visible steps in a full redeploy sequence.
pub const UPDATE_STEP_COUNT: u8 = 6;

/// State machine of the redeploy sequence. Every state up to and including
/// `HandoffWritten` can fail into `Failed` with the live installation
/// untouched; from `Terminating` on, the invoking process no longer observes
/// outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    BackingUp,
    Fetching,
    CarryingOver,
    Verifying,
    HandoffWritten,
    Terminating,
    Failed,
}

impl UpdatePhase {
    pub fn step(self) -> Option<u8> {
        match self {
            UpdatePhase::Idle | UpdatePhase::Failed => None,
            UpdatePhase::BackingUp => Some(1),
            UpdatePhase::Fetching => Some(2),
            UpdatePhase::CarryingOver => Some(3),
            UpdatePhase::Verifying => Some(4),
            UpdatePhase::HandoffWritten => Some(5),
            UpdatePhase::Terminating => Some(6),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::BackingUp => "backing up",
            UpdatePhase::Fetching => "fetching source",
            UpdatePhase::CarryingOver => "carrying over state",
            UpdatePhase::Verifying => "verifying",
            UpdatePhase::HandoffWritten => "handoff written",
            UpdatePhase::Terminating => "terminating",
            UpdatePhase::Failed => "failed",
        }
    }
}
