//! Project entity and lifecycle states

use crate::ids::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A governed project.
///
/// Projects are created by an external caller and mutated only through
/// State Manager transitions. They are never destroyed; `Archived` is the
/// terminal resting state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: ProjectId,

    /// Project name, unique within a scope
    pub name: String,

    /// Human description
    pub description: String,

    /// Current lifecycle status
    pub status: ProjectStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,

    /// Open-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Project {
    /// Create a fresh project in the `Initialized` state.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::generate(),
            name: name.into(),
            description: description.into(),
            status: ProjectStatus::Initialized,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }
}

/// Project lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    /// Created, nothing planned yet
    Initialized,
    /// Planning in progress
    Planning,
    /// Agents actively producing artifacts
    InProgress,
    /// Blocked by at least one unresolved critical conflict
    Blocked,
    /// All work finished
    Completed,
    /// Unrecoverable failure
    Failed,
    /// Terminal resting state
    Archived,
}

impl ProjectStatus {
    /// Valid target states from this state.
    ///
    /// Self-transitions are forbidden and `Archived` has no outgoing edges.
    pub fn valid_targets(&self) -> &'static [ProjectStatus] {
        use ProjectStatus::*;
        match self {
            Initialized => &[Planning, Failed, Archived],
            Planning => &[InProgress, Blocked, Failed],
            InProgress => &[Blocked, Completed, Failed],
            Blocked => &[InProgress, Failed, Archived],
            Completed => &[Archived],
            Failed => &[Archived],
            Archived => &[],
        }
    }

    /// Whether `self -> target` is an allowed transition.
    pub fn can_transition_to(&self, target: ProjectStatus) -> bool {
        self.valid_targets().contains(&target)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectStatus::Initialized => "INITIALIZED",
            ProjectStatus::Planning => "PLANNING",
            ProjectStatus::InProgress => "IN_PROGRESS",
            ProjectStatus::Blocked => "BLOCKED",
            ProjectStatus::Completed => "COMPLETED",
            ProjectStatus::Failed => "FAILED",
            ProjectStatus::Archived => "ARCHIVED",
        };
        f.write_str(s)
    }
}

/// How strictly the engine treats dependency issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceMode {
    /// Warning-level dependency issues block as if critical
    Strict,
    /// Default behavior: only critical conflicts block
    #[default]
    Adaptive,
    /// Log-only: conflicts are recorded but never block
    Playground,
}
