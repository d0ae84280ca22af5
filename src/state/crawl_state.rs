//! Lifecycle states of a crawl coordinator
//!
//! The lifecycle is linear: `Created -> Running -> Stopping -> Stopped`.
//! A stopped coordinator may be started again.
use std::fmt;

/// Represents the current state of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Constructed, pools not yet started
    Created,

    /// Fetch and analyze pools are running
    Running,

    /// Shutdown sequence in progress
    Stopping,

    /// All workers have exited
    Stopped,
}

impl CrawlState {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Stopped, Self::Running)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Returns true if no worker can be running in this state
    ///
    /// Seeding the frontier is only allowed while idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Created | Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
