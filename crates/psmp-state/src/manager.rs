//! State Manager - lifecycle authority for projects and tasks

use crate::checkpoint::ProjectCheckpoint;
use crate::error::StateError;
use chrono::Utc;
use dashmap::DashMap;
use psmp_storage::{EntityKind, Storage, WriteOp, EVENT_LOG};
use psmp_types::{
    Artifact, CheckpointId, Project, ProjectId, ProjectStatus, PsmpEvent, PsmpEventEnvelope,
    Task, TaskId, TaskStatus, events::restored_from_reason, task::MAX_TASK_PRIORITY,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument};

/// Events broadcast by the state manager.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// Project was created.
    ProjectCreated { project_id: ProjectId },

    /// Project moved between lifecycle states.
    ProjectTransitioned {
        project_id: ProjectId,
        from: ProjectStatus,
        to: ProjectStatus,
    },

    /// Task was created.
    TaskCreated {
        project_id: ProjectId,
        task_id: TaskId,
    },

    /// Task moved between states.
    TaskTransitioned {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Checkpoint was created.
    CheckpointCreated {
        project_id: ProjectId,
        checkpoint_id: CheckpointId,
    },

    /// Project state was replaced from a checkpoint.
    ProjectRestored {
        project_id: ProjectId,
        checkpoint_id: CheckpointId,
    },
}

/// Parameters for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    /// Short title
    pub title: String,

    /// Priority in `[0, 5]`
    pub priority: u8,

    /// Optional milestone label
    pub milestone: Option<String>,

    /// Planner estimate
    pub estimated_hours: Option<f64>,

    /// Kind of agent expected to pick this up
    pub agent_type: Option<String>,

    /// Tasks that must complete first
    pub dependencies: BTreeSet<TaskId>,
}

/// Single source of truth for project and task lifecycle.
///
/// Every mutation holds the owning project's lock across
/// read-validate-write-append and lands as one storage transaction:
/// entity write plus exactly one governance event.
pub struct StateManager {
    storage: Arc<dyn Storage>,
    locks: DashMap<ProjectId, Arc<Mutex<()>>>,
    create_lock: Mutex<()>,
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateManager {
    /// Create a manager over a storage backend.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            storage,
            locks: DashMap::new(),
            create_lock: Mutex::new(()),
            event_tx,
        }
    }

    /// Subscribe to state events.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    /// Shared storage handle.
    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.storage)
    }

    fn project_lock(&self, id: &ProjectId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn emit(&self, event: StateEvent) {
        let _ = self.event_tx.send(event);
    }

    // ── Projects ────────────────────────────────────────────────────

    /// Create a project. Names are unique within the scope.
    #[instrument(skip(self, metadata))]
    pub async fn create_project(
        &self,
        name: &str,
        description: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<Project, StateError> {
        let _guard = self.create_lock.lock().await;

        if self.find_project_by_name(name).await?.is_some() {
            return Err(StateError::DuplicateProject(name.to_string()));
        }

        let mut project = Project::new(name, description);
        project.metadata = metadata;

        let envelope = PsmpEventEnvelope::new(
            project.id.clone(),
            psmp_types::events::SYSTEM_ACTOR,
            PsmpEvent::ProjectCreated {
                name: project.name.clone(),
            },
        );

        self.storage
            .transaction(vec![
                put_op(EntityKind::Project, &project.id.to_string(), &project)?,
                append_op(&envelope)?,
            ])
            .await?;

        info!(project_id = %project.id, name = %project.name, "Project created");
        self.emit(StateEvent::ProjectCreated {
            project_id: project.id.clone(),
        });

        Ok(project)
    }

    /// Fetch a project.
    pub async fn get_project(&self, id: &ProjectId) -> Result<Project, StateError> {
        self.load(EntityKind::Project, &id.to_string())
            .await?
            .ok_or_else(|| StateError::NotFound(format!("project {}", id)))
    }

    /// Find a project by name.
    pub async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>, StateError> {
        for (_, bytes) in self.storage.scan(EntityKind::Project).await? {
            let project: Project = decode(&bytes)?;
            if project.name == name {
                return Ok(Some(project));
            }
        }
        Ok(None)
    }

    /// All projects, unordered.
    pub async fn list_projects(&self) -> Result<Vec<Project>, StateError> {
        self.storage
            .scan(EntityKind::Project)
            .await?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    /// Transition a project, validating against the adjacency set.
    #[instrument(skip(self), fields(project_id = %id))]
    pub async fn transition_project(
        &self,
        id: &ProjectId,
        new_status: ProjectStatus,
        reason: &str,
        actor: &str,
    ) -> Result<Project, StateError> {
        self.transition_with_event(id, new_status, actor, |from| PsmpEvent::StateTransition {
            from,
            to: new_status,
            reason: reason.to_string(),
        })
        .await
    }

    /// Transition to `Blocked` because of critical conflicts. Emits a
    /// `PROJECT_BLOCKED` event naming the conflicting libraries.
    pub async fn transition_project_blocked(
        &self,
        id: &ProjectId,
        libraries: Vec<String>,
        actor: &str,
    ) -> Result<Project, StateError> {
        self.transition_with_event(id, ProjectStatus::Blocked, actor, |_| {
            PsmpEvent::ProjectBlocked { libraries }
        })
        .await
    }

    /// Transition out of `Blocked` after resolution. Emits a
    /// `PROJECT_UNBLOCKED` event.
    pub async fn transition_project_unblocked(
        &self,
        id: &ProjectId,
        to: ProjectStatus,
        actor: &str,
    ) -> Result<Project, StateError> {
        self.transition_with_event(id, to, actor, |_| PsmpEvent::ProjectUnblocked { to })
            .await
    }

    async fn transition_with_event(
        &self,
        id: &ProjectId,
        new_status: ProjectStatus,
        actor: &str,
        event: impl FnOnce(ProjectStatus) -> PsmpEvent,
    ) -> Result<Project, StateError> {
        let lock = self.project_lock(id);
        let _guard = lock.lock().await;

        let mut project = self.get_project(id).await?;
        let from = project.status;
        if !from.can_transition_to(new_status) {
            return Err(StateError::InvalidTransition {
                from,
                to: new_status,
            });
        }

        project.status = new_status;
        project.updated_at = Utc::now();

        let envelope = PsmpEventEnvelope::new(id.clone(), actor, event(from));

        self.storage
            .transaction(vec![
                put_op(EntityKind::Project, &id.to_string(), &project)?,
                append_op(&envelope)?,
            ])
            .await?;

        info!(project_id = %id, %from, to = %new_status, "Project transitioned");
        self.emit(StateEvent::ProjectTransitioned {
            project_id: id.clone(),
            from,
            to: new_status,
        });

        Ok(project)
    }

    // ── Tasks ───────────────────────────────────────────────────────

    /// Create a task inside a project.
    ///
    /// Dependencies must name existing tasks of the same project, which
    /// keeps the task graph acyclic by construction: a new node only
    /// points at nodes that already exist.
    #[instrument(skip(self, new_task), fields(project_id = %project_id))]
    pub async fn create_task(
        &self,
        project_id: &ProjectId,
        new_task: NewTask,
    ) -> Result<Task, StateError> {
        let lock = self.project_lock(project_id);
        let _guard = lock.lock().await;

        self.get_project(project_id).await?;

        if new_task.title.trim().is_empty() {
            return Err(StateError::InvalidTask("title is empty".to_string()));
        }
        if new_task.priority > MAX_TASK_PRIORITY {
            return Err(StateError::InvalidTask(format!(
                "priority {} is outside [0, {}]",
                new_task.priority, MAX_TASK_PRIORITY
            )));
        }

        let existing = self.tasks_of(project_id).await?;
        let known: BTreeSet<&TaskId> = existing.iter().map(|t| &t.id).collect();
        for dependency in &new_task.dependencies {
            if !known.contains(dependency) {
                return Err(StateError::InvalidTask(format!(
                    "dependency {} does not exist in project",
                    dependency
                )));
            }
        }

        let task = Task {
            id: TaskId::generate(),
            project_id: project_id.clone(),
            title: new_task.title,
            status: TaskStatus::Pending,
            priority: new_task.priority,
            milestone: new_task.milestone,
            estimated_hours: new_task.estimated_hours,
            agent_type: new_task.agent_type,
            dependencies: new_task.dependencies,
        };

        let envelope = PsmpEventEnvelope::new(
            project_id.clone(),
            psmp_types::events::SYSTEM_ACTOR,
            PsmpEvent::TaskCreated {
                task_id: task.id.clone(),
                title: task.title.clone(),
            },
        );

        self.storage
            .transaction(vec![
                put_op(EntityKind::Task, &task.id.to_string(), &task)?,
                append_op(&envelope)?,
            ])
            .await?;

        self.emit(StateEvent::TaskCreated {
            project_id: project_id.clone(),
            task_id: task.id.clone(),
        });

        Ok(task)
    }

    /// Fetch a task.
    pub async fn get_task(&self, id: &TaskId) -> Result<Task, StateError> {
        self.load(EntityKind::Task, &id.to_string())
            .await?
            .ok_or_else(|| StateError::NotFound(format!("task {}", id)))
    }

    /// Transition a task to its monotonic next-or-fail status.
    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn transition_task(
        &self,
        id: &TaskId,
        new_status: TaskStatus,
        actor: &str,
    ) -> Result<Task, StateError> {
        let mut task = self.get_task(id).await?;

        let lock = self.project_lock(&task.project_id);
        let _guard = lock.lock().await;

        // Reload under the lock; the first read was unguarded.
        task = self.get_task(id).await?;
        let from = task.status;
        if !from.can_transition_to(new_status) {
            return Err(StateError::InvalidTaskTransition {
                from,
                to: new_status,
            });
        }

        task.status = new_status;

        let envelope = PsmpEventEnvelope::new(
            task.project_id.clone(),
            actor,
            PsmpEvent::TaskStatusChanged {
                task_id: id.clone(),
                from,
                to: new_status,
            },
        );

        self.storage
            .transaction(vec![
                put_op(EntityKind::Task, &id.to_string(), &task)?,
                append_op(&envelope)?,
            ])
            .await?;

        self.emit(StateEvent::TaskTransitioned {
            task_id: id.clone(),
            from,
            to: new_status,
        });

        Ok(task)
    }

    /// Tasks of a project, optionally filtered by status, highest
    /// priority first.
    pub async fn get_tasks(
        &self,
        project_id: &ProjectId,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StateError> {
        let mut tasks = self.tasks_of(project_id).await?;
        if let Some(status) = status {
            tasks.retain(|t| t.status == status);
        }
        tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.title.cmp(&b.title)));
        Ok(tasks)
    }

    async fn tasks_of(&self, project_id: &ProjectId) -> Result<Vec<Task>, StateError> {
        let mut tasks = Vec::new();
        for (_, bytes) in self.storage.scan(EntityKind::Task).await? {
            let task: Task = decode(&bytes)?;
            if &task.project_id == project_id {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    // ── Checkpoints ─────────────────────────────────────────────────

    /// Snapshot a project, its tasks and its live artifact ids.
    #[instrument(skip(self), fields(project_id = %id))]
    pub async fn checkpoint_project(&self, id: &ProjectId) -> Result<CheckpointId, StateError> {
        let lock = self.project_lock(id);
        let _guard = lock.lock().await;

        let project = self.get_project(id).await?;
        let tasks = self.tasks_of(id).await?;
        let live_artifact_ids = self
            .artifacts_of(id)
            .await?
            .into_iter()
            .filter(|a| a.is_live())
            .map(|a| a.id)
            .collect();

        let checkpoint = ProjectCheckpoint {
            id: CheckpointId::generate(),
            project_id: id.clone(),
            created_at: Utc::now(),
            project,
            tasks,
            live_artifact_ids,
        };

        let key = ProjectCheckpoint::storage_key(id, &checkpoint.id);
        self.storage
            .put(EntityKind::Checkpoint, &key, serde_json::to_vec(&checkpoint)?)
            .await?;

        info!(project_id = %id, checkpoint_id = %checkpoint.id, "Checkpoint created");
        self.emit(StateEvent::CheckpointCreated {
            project_id: id.clone(),
            checkpoint_id: checkpoint.id.clone(),
        });

        Ok(checkpoint.id)
    }

    /// List checkpoints of a project, newest first.
    pub async fn list_checkpoints(
        &self,
        id: &ProjectId,
    ) -> Result<Vec<ProjectCheckpoint>, StateError> {
        let prefix = format!("{}/", id);
        let mut checkpoints: Vec<ProjectCheckpoint> = self
            .storage
            .scan_prefix(EntityKind::Checkpoint, &prefix)
            .await?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect::<Result<_, _>>()?;
        checkpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(checkpoints)
    }

    /// Replace a project's state with a snapshot.
    ///
    /// Appends a `STATE_TRANSITION` event with reason
    /// `restored_from=<checkpoint_id>`; prior events stay in the log.
    /// Artifacts declared after the snapshot are revoked so the live set
    /// matches the snapshot exactly.
    #[instrument(skip(self), fields(project_id = %id, checkpoint_id = %checkpoint_id))]
    pub async fn restore_project(
        &self,
        id: &ProjectId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Project, StateError> {
        let lock = self.project_lock(id);
        let _guard = lock.lock().await;

        let key = ProjectCheckpoint::storage_key(id, checkpoint_id);
        let checkpoint: ProjectCheckpoint = self
            .load(EntityKind::Checkpoint, &key)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("checkpoint {}", checkpoint_id)))?;

        let current = self.get_project(id).await?;
        let mut ops = vec![put_op(
            EntityKind::Project,
            &id.to_string(),
            &checkpoint.project,
        )?];

        // Tasks: snapshot wins; later additions disappear.
        let snapshot_ids: BTreeSet<&TaskId> = checkpoint.tasks.iter().map(|t| &t.id).collect();
        for task in &checkpoint.tasks {
            ops.push(put_op(EntityKind::Task, &task.id.to_string(), task)?);
        }
        for task in self.tasks_of(id).await? {
            if !snapshot_ids.contains(&task.id) {
                ops.push(WriteOp::Delete {
                    kind: EntityKind::Task,
                    id: task.id.to_string(),
                });
            }
        }

        // Artifacts: restore the live set of the snapshot.
        let now = Utc::now();
        for mut artifact in self.artifacts_of(id).await? {
            let in_snapshot = checkpoint.live_artifact_ids.contains(&artifact.id);
            if artifact.is_live() && !in_snapshot {
                artifact.revoked_at = Some(now);
                ops.push(put_op(EntityKind::Artifact, &artifact.id.to_string(), &artifact)?);
            } else if !artifact.is_live() && in_snapshot {
                artifact.revoked_at = None;
                ops.push(put_op(EntityKind::Artifact, &artifact.id.to_string(), &artifact)?);
            }
        }

        let envelope = PsmpEventEnvelope::new(
            id.clone(),
            psmp_types::events::SYSTEM_ACTOR,
            PsmpEvent::StateTransition {
                from: current.status,
                to: checkpoint.project.status,
                reason: restored_from_reason(checkpoint_id),
            },
        );
        ops.push(append_op(&envelope)?);

        self.storage.transaction(ops).await?;

        info!(project_id = %id, checkpoint_id = %checkpoint_id, "Project restored");
        self.emit(StateEvent::ProjectRestored {
            project_id: id.clone(),
            checkpoint_id: checkpoint_id.clone(),
        });

        Ok(checkpoint.project)
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Append a derived governance event (conflict materialization and
    /// the like) outside an entity transaction.
    pub async fn append_event(&self, envelope: &PsmpEventEnvelope) -> Result<(), StateError> {
        self.storage
            .append(EVENT_LOG, serde_json::to_value(envelope)?)
            .await?;
        Ok(())
    }

    /// Read the event log for one project, in append order.
    pub async fn events_for(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<PsmpEventEnvelope>, StateError> {
        let mut events = Vec::new();
        for value in self.storage.read_log(EVENT_LOG).await? {
            let envelope: PsmpEventEnvelope = serde_json::from_value(value)?;
            if &envelope.project_id == project_id {
                events.push(envelope);
            }
        }
        Ok(events)
    }

    async fn artifacts_of(&self, project_id: &ProjectId) -> Result<Vec<Artifact>, StateError> {
        let mut artifacts = Vec::new();
        for (_, bytes) in self.storage.scan(EntityKind::Artifact).await? {
            let artifact: Artifact = decode(&bytes)?;
            if &artifact.project_id == project_id {
                artifacts.push(artifact);
            }
        }
        Ok(artifacts)
    }

    async fn load<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<T>, StateError> {
        match self.storage.get(kind, id).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StateError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn put_op<T: Serialize>(kind: EntityKind, id: &str, value: &T) -> Result<WriteOp, StateError> {
    Ok(WriteOp::Put {
        kind,
        id: id.to_string(),
        bytes: serde_json::to_vec(value)?,
    })
}

fn append_op(envelope: &PsmpEventEnvelope) -> Result<WriteOp, StateError> {
    Ok(WriteOp::Append {
        log: EVENT_LOG.to_string(),
        record: serde_json::to_value(envelope)?,
    })
}
