/// Source state definitions for tracking crawl progress
///
/// This module defines all possible states a source can be in during a run.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a source in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    // ===== Active States =====
    /// Source has not been started in this run
    Pending,

    /// A worker is traversing the source
    InProgress,

    // ===== Terminal States =====
    /// Traversal ended on an end marker, the empty-page threshold or scroll stability
    Completed,

    /// Traversal was cut off by the safety bound; the list may continue
    SafetyLimited,

    /// Transport errors exhausted the retry budget
    Failed,
}

impl SourceState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::SafetyLimited | Self::Failed)
    }

    /// Returns true if the source produced a usable item list
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::SafetyLimited)
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    ///
    /// Pending -> InProgress -> {Completed, SafetyLimited, Failed}. Terminal
    /// states never move again.
    pub fn can_transition_to(&self, next: SourceState) -> bool {
        match self {
            Self::Pending => next == Self::InProgress,
            Self::InProgress => next.is_terminal(),
            _ => false,
        }
    }

    /// Converts the source state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::SafetyLimited => "safety_limited",
            Self::Failed => "failed",
        }
    }

    /// Parses a source state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "safety_limited" => Some(Self::SafetyLimited),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible source states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::InProgress,
            Self::Completed,
            Self::SafetyLimited,
            Self::Failed,
        ]
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
