/// Run state definitions for the run controller
///
/// A run starts `Idle`, moves to `Running` once its seeds are loaded, and
/// ends in exactly one terminal state.
use std::fmt;

/// Lifecycle of a single scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Created, seeds not yet loaded
    Idle,

    /// Seeds are being dispatched
    Running,

    /// Every seed was processed, failed, or skipped
    Completed,

    /// A configuration error or fatal storage error ended the run
    Failed,
}

impl RunState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Checks whether moving from `self` to `next` is allowed
    ///
    /// Valid transitions:
    /// - Idle -> Running (seeds loaded)
    /// - Idle -> Failed (configuration error)
    /// - Running -> Completed
    /// - Running -> Failed (fatal storage error)
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Idle, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
