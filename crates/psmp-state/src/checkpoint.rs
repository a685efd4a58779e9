//! Project checkpoints
//!
//! A checkpoint is a self-contained snapshot of a project, its tasks and
//! its live artifact ids, restorable as a single unit. Restoring never
//! erases events appended between checkpoint and restore.

use chrono::{DateTime, Utc};
use psmp_types::{ArtifactId, CheckpointId, Project, ProjectId, Task};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One point-in-time snapshot of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCheckpoint {
    /// Checkpoint ID
    pub id: CheckpointId,

    /// Project the snapshot belongs to
    pub project_id: ProjectId,

    /// Snapshot creation time
    pub created_at: DateTime<Utc>,

    /// The project as it was
    pub project: Project,

    /// Its tasks as they were
    pub tasks: Vec<Task>,

    /// Artifacts that were live at snapshot time
    pub live_artifact_ids: BTreeSet<ArtifactId>,
}

impl ProjectCheckpoint {
    /// Storage key, `<project_id>/<checkpoint_id>`.
    pub fn storage_key(project_id: &ProjectId, checkpoint_id: &CheckpointId) -> String {
        format!("{}/{}", project_id, checkpoint_id)
    }
}
