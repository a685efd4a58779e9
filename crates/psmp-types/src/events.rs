//! Governance event types
//!
//! Every mutation of a governed entity corresponds to exactly one appended
//! event. The log is append-only; events are never updated or deleted.

use crate::conflict::DependencyConflict;
use crate::ids::{ArtifactId, CheckpointId, EventId, ProjectId, TaskId};
use crate::project::ProjectStatus;
use crate::task::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor name the core uses when no agent initiated a mutation.
pub const SYSTEM_ACTOR: &str = "system";

/// Envelope wrapping all governance events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsmpEventEnvelope {
    /// Unique event ID
    pub event_id: EventId,

    /// Project the event belongs to
    pub project_id: ProjectId,

    /// Commit timestamp, UTC
    pub timestamp: DateTime<Utc>,

    /// Agent id or `system`
    pub actor: String,

    /// The event payload
    #[serde(flatten)]
    pub event: PsmpEvent,
}

impl PsmpEventEnvelope {
    /// Wrap an event with a fresh id and the current timestamp.
    pub fn new(project_id: ProjectId, actor: impl Into<String>, event: PsmpEvent) -> Self {
        Self {
            event_id: EventId::generate(),
            project_id,
            timestamp: Utc::now(),
            actor: actor.into(),
            event,
        }
    }
}

/// Governance events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PsmpEvent {
    /// A project was created
    ProjectCreated { name: String },

    /// A project moved between lifecycle states
    StateTransition {
        from: ProjectStatus,
        to: ProjectStatus,
        reason: String,
    },

    /// An artifact was declared and persisted
    ArtifactDeclared {
        artifact_id: ArtifactId,
        agent_id: String,
        dependency_count: usize,
    },

    /// A dependency conflict was detected
    ConflictDetected { conflict: DependencyConflict },

    /// The project was blocked by a critical conflict
    ProjectBlocked { libraries: Vec<String> },

    /// A conflict was resolved by an actor
    ConflictResolved {
        library: String,
        chosen_constraint: String,
    },

    /// The project left the blocked state
    ProjectUnblocked { to: ProjectStatus },

    /// A task was created
    TaskCreated { task_id: TaskId, title: String },

    /// A task moved between states
    TaskStatusChanged {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// An artifact was revoked and stopped being live
    ArtifactRevoked { artifact_id: ArtifactId },
}

impl PsmpEvent {
    /// Wire name of the event kind, as recorded in the log.
    pub fn kind(&self) -> &'static str {
        match self {
            PsmpEvent::ProjectCreated { .. } => "PROJECT_CREATED",
            PsmpEvent::StateTransition { .. } => "STATE_TRANSITION",
            PsmpEvent::ArtifactDeclared { .. } => "ARTIFACT_DECLARED",
            PsmpEvent::ConflictDetected { .. } => "CONFLICT_DETECTED",
            PsmpEvent::ProjectBlocked { .. } => "PROJECT_BLOCKED",
            PsmpEvent::ConflictResolved { .. } => "CONFLICT_RESOLVED",
            PsmpEvent::ProjectUnblocked { .. } => "PROJECT_UNBLOCKED",
            PsmpEvent::TaskCreated { .. } => "TASK_CREATED",
            PsmpEvent::TaskStatusChanged { .. } => "TASK_STATUS_CHANGED",
            PsmpEvent::ArtifactRevoked { .. } => "ARTIFACT_REVOKED",
        }
    }
}

/// Checkpoint restore events carry this reason prefix.
pub fn restored_from_reason(checkpoint_id: &CheckpointId) -> String {
    format!("restored_from={}", checkpoint_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let envelope = PsmpEventEnvelope::new(
            ProjectId::generate(),
            "Coder",
            PsmpEvent::ProjectCreated {
                name: "chat".to_string(),
            },
        );

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event_type"], "PROJECT_CREATED");
        assert_eq!(json["payload"]["name"], "chat");
        assert_eq!(json["actor"], "Coder");
    }

    #[test]
    fn test_event_roundtrip() {
        let envelope = PsmpEventEnvelope::new(
            ProjectId::generate(),
            SYSTEM_ACTOR,
            PsmpEvent::StateTransition {
                from: ProjectStatus::Initialized,
                to: ProjectStatus::Planning,
                reason: "planner started".to_string(),
            },
        );

        let json = serde_json::to_string(&envelope).unwrap();
        let back: PsmpEventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_id, envelope.event_id);
        assert_eq!(back.event.kind(), "STATE_TRANSITION");
    }

    #[test]
    fn test_restore_reason_shape() {
        let id = CheckpointId::generate();
        let reason = restored_from_reason(&id);
        assert!(reason.starts_with("restored_from="));
        assert!(reason.ends_with(&id.to_string()));
    }
}
