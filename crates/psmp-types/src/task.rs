//! Task entity and lifecycle states

use crate::ids::{ProjectId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Highest allowed task priority.
pub const MAX_TASK_PRIORITY: u8 = 5;

/// A unit of planned work inside a project.
///
/// Tasks form an intra-project DAG via `dependencies`; the State Manager
/// rejects creations that would introduce a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// Owning project
    pub project_id: ProjectId,

    /// Short title
    pub title: String,

    /// Current status
    pub status: TaskStatus,

    /// Priority in `[0, 5]`, higher is more urgent
    pub priority: u8,

    /// Optional milestone label
    pub milestone: Option<String>,

    /// Planner estimate
    pub estimated_hours: Option<f64>,

    /// Kind of agent expected to pick this up
    pub agent_type: Option<String>,

    /// Tasks that must complete first
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
}

/// Task lifecycle states. Completed, failed and skipped are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Valid target states from this state.
    pub fn valid_targets(&self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Pending => &[InProgress, Skipped],
            InProgress => &[Completed, Failed],
            Completed | Failed | Skipped => &[],
        }
    }

    /// Whether `self -> target` is an allowed transition.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        self.valid_targets().contains(&target)
    }

    /// Whether this state has no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        self.valid_targets().is_empty()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_transitions_are_monotonic() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Skipped));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }
}
