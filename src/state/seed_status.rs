use std::fmt;

/// Final status of one seed within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedStatus {
    /// Every page fetched, parsed, and written without error
    Completed,

    /// At least one stage failed; details are in the seed's errors
    Failed,

    /// Never dispatched because the run was stopped
    Skipped,
}

impl SeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for SeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
