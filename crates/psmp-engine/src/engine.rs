//! Artifact declaration pipeline and conflict lifecycle

use crate::error::EngineError;
use crate::report::BlockingReport;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use psmp_resolver::{
    detect_conflicts, render_manifest, ConstraintSet, Declaration, ManifestEntry, MergedRange,
};
use psmp_state::StateManager;
use psmp_storage::{EntityKind, Storage, WriteOp, EVENT_LOG};
use psmp_types::{
    Artifact, ArtifactId, ArtifactType, ConflictSeverity, DependencyConflict, DependencyScope,
    DependencySpec, GovernanceMode, Project, ProjectId, ProjectStatus, PsmpEvent,
    PsmpEventEnvelope, artifact::MAX_SUMMARY_CHARS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// One dependency as submitted by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRequest {
    /// Library name
    pub name: String,

    /// Version constraint string
    pub version_constraint: String,

    /// Declaring scope
    pub scope: DependencyScope,

    /// Why the dependency is needed
    pub purpose: String,
}

/// An artifact declaration as submitted by an agent.
#[derive(Debug, Clone)]
pub struct ArtifactDraft {
    /// Caller-supplied id; redeclaring an existing id is a no-op
    pub id: Option<ArtifactId>,

    /// Producing agent
    pub agent_id: String,

    /// Kind of artifact
    pub artifact_type: ArtifactType,

    /// Content summary, at most 200 chars
    pub content_summary: String,

    /// Declared dependencies
    pub dependencies: Vec<DependencyRequest>,

    /// Open-form metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Result of a successful declaration.
#[derive(Debug, Clone)]
pub struct DeclarationOutcome {
    /// The persisted artifact
    pub artifact: Artifact,

    /// Conflicts detected across the project after this declaration
    pub conflicts: Vec<DependencyConflict>,
}

/// A recorded conflict resolution, superseding earlier declarations of
/// one library.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConflictResolution {
    project_id: ProjectId,
    library: String,
    chosen_constraint: String,
    resolved_by: String,
    resolved_at: DateTime<Utc>,
}

impl ConflictResolution {
    fn storage_key(project_id: &ProjectId, library: &str) -> String {
        format!("{}/{}", project_id, library)
    }
}

/// Artifact registry and dependency-conflict resolver.
pub struct PsmpEngine {
    state: Arc<StateManager>,
    storage: Arc<dyn Storage>,
    mode: GovernanceMode,
    // Serializes declarations and resolutions per project so conflict
    // detection always sees a settled artifact set.
    declare_locks: DashMap<ProjectId, Arc<Mutex<()>>>,
}

impl PsmpEngine {
    /// Create an engine over the shared state manager.
    pub fn new(state: Arc<StateManager>, mode: GovernanceMode) -> Self {
        let storage = state.storage();
        Self {
            state,
            storage,
            mode,
            declare_locks: DashMap::new(),
        }
    }

    /// Active governance mode.
    pub fn mode(&self) -> GovernanceMode {
        self.mode
    }

    fn declare_lock(&self, id: &ProjectId) -> Arc<Mutex<()>> {
        self.declare_locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ── Declaration ─────────────────────────────────────────────────

    /// Declare an artifact.
    ///
    /// Refused with [`EngineError::ProjectBlocked`] while the project is
    /// blocked, so conflicts cannot compound. On success the artifact is
    /// persisted, conflict detection runs over every live artifact of
    /// the project, and a critical conflict blocks the project.
    #[instrument(skip(self, draft), fields(project_id = %project_id, agent = %draft.agent_id))]
    pub async fn declare_artifact(
        &self,
        project_id: &ProjectId,
        draft: ArtifactDraft,
    ) -> Result<DeclarationOutcome, EngineError> {
        let lock = self.declare_lock(project_id);
        let _guard = lock.lock().await;

        let project = self.state.get_project(project_id).await?;
        if project.status == ProjectStatus::Blocked {
            return Err(self.blocked_error(&project).await?);
        }

        // Idempotence: a redeclared id is a no-op after the first commit.
        if let Some(id) = &draft.id {
            if let Some(existing) = self.find_artifact(id).await? {
                if &existing.project_id != project_id {
                    return Err(EngineError::NotFound(format!(
                        "artifact {} belongs to another project",
                        id
                    )));
                }
                return Ok(DeclarationOutcome {
                    artifact: existing,
                    conflicts: Vec::new(),
                });
            }
        }

        let dependencies = validate_dependencies(&draft)?;

        let artifact = Artifact {
            id: draft.id.unwrap_or_else(ArtifactId::generate),
            project_id: project_id.clone(),
            agent_id: draft.agent_id.clone(),
            artifact_type: draft.artifact_type,
            content_summary: draft.content_summary,
            dependencies,
            created_at: Utc::now(),
            revoked_at: None,
            metadata: draft.metadata,
        };

        let envelope = PsmpEventEnvelope::new(
            project_id.clone(),
            draft.agent_id.clone(),
            PsmpEvent::ArtifactDeclared {
                artifact_id: artifact.id.clone(),
                agent_id: draft.agent_id.clone(),
                dependency_count: artifact.dependencies.len(),
            },
        );

        self.storage
            .transaction(vec![
                WriteOp::Put {
                    kind: EntityKind::Artifact,
                    id: artifact.id.to_string(),
                    bytes: serde_json::to_vec(&artifact)?,
                },
                WriteOp::Append {
                    log: EVENT_LOG.to_string(),
                    record: serde_json::to_value(&envelope)?,
                },
            ])
            .await?;

        info!(
            artifact_id = %artifact.id,
            dependency_count = artifact.dependencies.len(),
            "Artifact declared"
        );

        let conflicts = self.current_conflicts(project_id).await?;
        for conflict in &conflicts {
            self.state
                .append_event(&PsmpEventEnvelope::new(
                    project_id.clone(),
                    draft.agent_id.clone(),
                    PsmpEvent::ConflictDetected {
                        conflict: conflict.clone(),
                    },
                ))
                .await?;
        }

        self.block_if_critical(&project, &conflicts).await?;

        Ok(DeclarationOutcome {
            artifact,
            conflicts,
        })
    }

    /// Revoke an artifact: it stops being live, its declarations leave
    /// conflict detection, and the project may unblock as a result.
    #[instrument(skip(self), fields(project_id = %project_id, artifact_id = %artifact_id))]
    pub async fn revoke_artifact(
        &self,
        project_id: &ProjectId,
        artifact_id: &ArtifactId,
        actor: &str,
    ) -> Result<Artifact, EngineError> {
        let lock = self.declare_lock(project_id);
        let _guard = lock.lock().await;

        let mut artifact = self
            .find_artifact(artifact_id)
            .await?
            .filter(|a| &a.project_id == project_id)
            .ok_or_else(|| EngineError::NotFound(format!("artifact {}", artifact_id)))?;

        if !artifact.is_live() {
            return Ok(artifact);
        }

        artifact.revoked_at = Some(Utc::now());

        let envelope = PsmpEventEnvelope::new(
            project_id.clone(),
            actor,
            PsmpEvent::ArtifactRevoked {
                artifact_id: artifact_id.clone(),
            },
        );

        self.storage
            .transaction(vec![
                WriteOp::Put {
                    kind: EntityKind::Artifact,
                    id: artifact.id.to_string(),
                    bytes: serde_json::to_vec(&artifact)?,
                },
                WriteOp::Append {
                    log: EVENT_LOG.to_string(),
                    record: serde_json::to_value(&envelope)?,
                },
            ])
            .await?;

        self.unblock_if_clear(project_id, actor).await?;
        Ok(artifact)
    }

    // ── Conflicts ───────────────────────────────────────────────────

    /// Detect conflicts over the project's live declarations, with
    /// recorded resolutions applied and governance mode folded into the
    /// severities.
    pub async fn current_conflicts(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<DependencyConflict>, EngineError> {
        let declarations = self.effective_declarations(project_id).await?;
        let mut conflicts = detect_conflicts(&declarations);

        if self.mode == GovernanceMode::Strict {
            for conflict in &mut conflicts {
                conflict.severity = ConflictSeverity::Critical;
            }
        }

        Ok(conflicts)
    }

    /// Blocking report for a project (§ agent-facing API).
    pub async fn blocking_report(
        &self,
        project_id: &ProjectId,
    ) -> Result<BlockingReport, EngineError> {
        let project = self.state.get_project(project_id).await?;
        let conflicts = self.current_conflicts(project_id).await?;
        Ok(BlockingReport::new(
            project_id.clone(),
            project.status,
            conflicts,
        ))
    }

    /// Resolve a conflict by choosing a constraint for the library.
    ///
    /// Records the choice, emits `CONFLICT_RESOLVED`, and unblocks the
    /// project when no critical conflict remains.
    #[instrument(skip(self), fields(project_id = %project_id, library = %library))]
    pub async fn resolve_conflict(
        &self,
        project_id: &ProjectId,
        library: &str,
        chosen_constraint: &str,
        actor: &str,
    ) -> Result<DependencyConflict, EngineError> {
        let lock = self.declare_lock(project_id);
        let _guard = lock.lock().await;

        ConstraintSet::parse(chosen_constraint)
            .map_err(|err| EngineError::InvalidDeclaration(err.to_string()))?;

        let conflicts = self.current_conflicts(project_id).await?;
        let resolved = conflicts
            .into_iter()
            .find(|c| c.library.eq_ignore_ascii_case(library))
            .ok_or_else(|| EngineError::ConflictNotFound(library.to_string()))?;

        let resolution = ConflictResolution {
            project_id: project_id.clone(),
            library: library.to_ascii_lowercase(),
            chosen_constraint: chosen_constraint.to_string(),
            resolved_by: actor.to_string(),
            resolved_at: Utc::now(),
        };

        let envelope = PsmpEventEnvelope::new(
            project_id.clone(),
            actor,
            PsmpEvent::ConflictResolved {
                library: resolution.library.clone(),
                chosen_constraint: chosen_constraint.to_string(),
            },
        );

        self.storage
            .transaction(vec![
                WriteOp::Put {
                    kind: EntityKind::Resolution,
                    id: ConflictResolution::storage_key(project_id, &resolution.library),
                    bytes: serde_json::to_vec(&resolution)?,
                },
                WriteOp::Append {
                    log: EVENT_LOG.to_string(),
                    record: serde_json::to_value(&envelope)?,
                },
            ])
            .await?;

        info!(library = %resolution.library, constraint = %chosen_constraint, "Conflict resolved");

        self.unblock_if_clear(project_id, actor).await?;
        Ok(resolved)
    }

    // ── Manifest ────────────────────────────────────────────────────

    /// Assemble the unified dependency manifest.
    ///
    /// Fails with [`EngineError::ProjectBlocked`] while any unresolved
    /// critical conflict exists.
    pub async fn generate_manifest(&self, project_id: &ProjectId) -> Result<String, EngineError> {
        let project = self.state.get_project(project_id).await?;
        let conflicts = self.current_conflicts(project_id).await?;
        if conflicts.iter().any(|c| c.is_critical()) {
            return Err(EngineError::ProjectBlocked {
                report: Box::new(BlockingReport::new(
                    project_id.clone(),
                    project.status,
                    conflicts,
                )),
            });
        }

        let declarations = self.effective_declarations(project_id).await?;
        let mut groups: BTreeMap<(DependencyScope, String), Vec<&Declaration>> = BTreeMap::new();
        for declaration in &declarations {
            groups
                .entry((declaration.scope, declaration.library.to_ascii_lowercase()))
                .or_default()
                .push(declaration);
        }

        let entries: Vec<ManifestEntry> = groups
            .into_iter()
            .map(|((scope, library), group)| {
                let merged = MergedRange::from_sets(group.iter().map(|d| &d.parsed));
                ManifestEntry {
                    library,
                    constraint: merged.render(),
                    scope,
                }
            })
            .collect();

        Ok(render_manifest(&entries))
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn blocked_error(&self, project: &Project) -> Result<EngineError, EngineError> {
        let conflicts = self.current_conflicts(&project.id).await?;
        Ok(EngineError::ProjectBlocked {
            report: Box::new(BlockingReport::new(
                project.id.clone(),
                project.status,
                conflicts,
            )),
        })
    }

    async fn block_if_critical(
        &self,
        project: &Project,
        conflicts: &[DependencyConflict],
    ) -> Result<(), EngineError> {
        if self.mode == GovernanceMode::Playground {
            return Ok(());
        }

        let critical: Vec<String> = conflicts
            .iter()
            .filter(|c| c.is_critical())
            .map(|c| c.library.clone())
            .collect();
        if critical.is_empty() {
            return Ok(());
        }

        if !project.status.can_transition_to(ProjectStatus::Blocked) {
            warn!(
                project_id = %project.id,
                status = %project.status,
                "Critical conflict on a project that cannot block"
            );
            return Ok(());
        }

        self.state
            .transition_project_blocked(&project.id, critical, "psmp-engine")
            .await?;
        Ok(())
    }

    async fn unblock_if_clear(&self, project_id: &ProjectId, actor: &str) -> Result<(), EngineError> {
        let project = self.state.get_project(project_id).await?;
        if project.status != ProjectStatus::Blocked {
            return Ok(());
        }

        let conflicts = self.current_conflicts(project_id).await?;
        if conflicts.iter().any(|c| c.is_critical()) {
            return Ok(());
        }

        self.state
            .transition_project_unblocked(project_id, ProjectStatus::InProgress, actor)
            .await?;
        Ok(())
    }

    /// Live declarations with resolutions substituted in: declarations
    /// that predate a recorded resolution are superseded by it, newer
    /// declarations still count against it.
    async fn effective_declarations(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<Declaration>, EngineError> {
        let artifacts = self.live_artifacts(project_id).await?;
        let resolutions = self.resolutions(project_id).await?;

        let mut declarations = Vec::new();
        let mut resolved_scopes: BTreeMap<String, BTreeSet<DependencyScope>> = BTreeMap::new();

        for artifact in &artifacts {
            for spec in &artifact.dependencies {
                let library = spec.name.to_ascii_lowercase();
                if let Some(resolution) = resolutions.get(&library) {
                    resolved_scopes
                        .entry(library.clone())
                        .or_default()
                        .insert(spec.scope);
                    if artifact.created_at <= resolution.resolved_at {
                        continue;
                    }
                }
                declarations.push(to_declaration(spec, artifact.created_at));
            }
        }

        for (library, resolution) in &resolutions {
            let Some(scopes) = resolved_scopes.get(library) else {
                continue;
            };
            let parsed = ConstraintSet::parse(&resolution.chosen_constraint)
                .map_err(|err| EngineError::InvalidDeclaration(err.to_string()))?;
            for scope in scopes {
                declarations.push(Declaration {
                    library: library.clone(),
                    constraint: resolution.chosen_constraint.clone(),
                    parsed: parsed.clone(),
                    scope: *scope,
                    agent: resolution.resolved_by.clone(),
                    purpose: "conflict resolution".to_string(),
                    declared_at: resolution.resolved_at,
                });
            }
        }

        Ok(declarations)
    }

    /// Live artifacts of a project.
    pub async fn live_artifacts(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<Artifact>, EngineError> {
        let mut artifacts = Vec::new();
        for (_, bytes) in self.storage.scan(EntityKind::Artifact).await? {
            let artifact: Artifact = serde_json::from_slice(&bytes)?;
            if &artifact.project_id == project_id && artifact.is_live() {
                artifacts.push(artifact);
            }
        }
        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(artifacts)
    }

    async fn find_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, EngineError> {
        match self.storage.get(EntityKind::Artifact, &id.to_string()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn resolutions(
        &self,
        project_id: &ProjectId,
    ) -> Result<BTreeMap<String, ConflictResolution>, EngineError> {
        let prefix = format!("{}/", project_id);
        let mut resolutions = BTreeMap::new();
        for (_, bytes) in self
            .storage
            .scan_prefix(EntityKind::Resolution, &prefix)
            .await?
        {
            let resolution: ConflictResolution = serde_json::from_slice(&bytes)?;
            resolutions.insert(resolution.library.clone(), resolution);
        }
        Ok(resolutions)
    }
}

fn validate_dependencies(draft: &ArtifactDraft) -> Result<Vec<DependencySpec>, EngineError> {
    if draft.agent_id.trim().is_empty() {
        return Err(EngineError::InvalidDeclaration(
            "agent_id is empty".to_string(),
        ));
    }
    if draft.content_summary.chars().count() > MAX_SUMMARY_CHARS {
        return Err(EngineError::InvalidDeclaration(format!(
            "content summary exceeds {} chars",
            MAX_SUMMARY_CHARS
        )));
    }

    let mut dependencies = Vec::with_capacity(draft.dependencies.len());
    for request in &draft.dependencies {
        if request.name.trim().is_empty() {
            return Err(EngineError::InvalidDeclaration(
                "dependency name is empty".to_string(),
            ));
        }
        if request.purpose.trim().is_empty() {
            return Err(EngineError::InvalidDeclaration(format!(
                "dependency '{}' has no purpose",
                request.name
            )));
        }
        ConstraintSet::parse(&request.version_constraint).map_err(|err| {
            EngineError::InvalidDeclaration(format!(
                "dependency '{}': {}",
                request.name, err
            ))
        })?;

        dependencies.push(DependencySpec {
            name: request.name.clone(),
            version_constraint: request.version_constraint.clone(),
            scope: request.scope,
            declared_by_agent: draft.agent_id.clone(),
            purpose: request.purpose.clone(),
        });
    }

    Ok(dependencies)
}

fn to_declaration(spec: &DependencySpec, declared_at: DateTime<Utc>) -> Declaration {
    // Constraints were validated at declaration time; a stored artifact
    // with an unparseable constraint cannot exist.
    let parsed = ConstraintSet::parse(&spec.version_constraint).unwrap_or_else(|_| {
        warn!(library = %spec.name, "Stored constraint no longer parses, treating as unconstrained");
        ConstraintSet::any()
    });
    Declaration {
        library: spec.name.clone(),
        constraint: spec.version_constraint.clone(),
        parsed,
        scope: spec.scope,
        agent: spec.declared_by_agent.clone(),
        purpose: spec.purpose.clone(),
        declared_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmp_storage::MemoryStorage;
    use psmp_types::ArtifactType;

    fn engine(mode: GovernanceMode) -> (PsmpEngine, Arc<StateManager>) {
        let state = Arc::new(StateManager::new(Arc::new(MemoryStorage::new())));
        (PsmpEngine::new(Arc::clone(&state), mode), state)
    }

    async fn project_in_progress(state: &StateManager) -> Project {
        let project = state
            .create_project("chat", "chat service", HashMap::new())
            .await
            .unwrap();
        state
            .transition_project(&project.id, ProjectStatus::Planning, "plan", "system")
            .await
            .unwrap();
        state
            .transition_project(&project.id, ProjectStatus::InProgress, "go", "system")
            .await
            .unwrap()
    }

    fn draft(agent: &str, deps: &[(&str, &str)]) -> ArtifactDraft {
        ArtifactDraft {
            id: None,
            agent_id: agent.to_string(),
            artifact_type: ArtifactType::Code,
            content_summary: format!("artifact from {}", agent),
            dependencies: deps
                .iter()
                .map(|(name, constraint)| DependencyRequest {
                    name: name.to_string(),
                    version_constraint: constraint.to_string(),
                    scope: DependencyScope::Runtime,
                    purpose: format!("{} uses {}", agent, name),
                })
                .collect(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_intersecting_declarations() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        let first = engine
            .declare_artifact(&project.id, draft("Coder", &[("fastapi", ">=0.100")]))
            .await
            .unwrap();
        assert!(first.conflicts.is_empty());

        let second = engine
            .declare_artifact(
                &project.id,
                draft("DataSci", &[("fastapi", ">=0.100,<0.120")]),
            )
            .await
            .unwrap();
        assert!(second.conflicts.is_empty());

        let reloaded = state.get_project(&project.id).await.unwrap();
        assert_eq!(reloaded.status, ProjectStatus::InProgress);

        let manifest = engine.generate_manifest(&project.id).await.unwrap();
        assert!(manifest.contains("# runtime"));
        assert!(manifest.contains("fastapi>=0.100,<0.120"));
    }

    #[tokio::test]
    async fn test_critical_conflict_blocks_project() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        engine
            .declare_artifact(&project.id, draft("Coder", &[("fastapi", ">=0.100")]))
            .await
            .unwrap();
        engine
            .declare_artifact(
                &project.id,
                draft("DataSci", &[("fastapi", ">=0.100,<0.120")]),
            )
            .await
            .unwrap();

        let third = engine
            .declare_artifact(&project.id, draft("Notebook", &[("fastapi", "==0.90")]))
            .await
            .unwrap();
        assert_eq!(third.conflicts.len(), 1);
        assert!(third.conflicts[0].is_critical());

        let reloaded = state.get_project(&project.id).await.unwrap();
        assert_eq!(reloaded.status, ProjectStatus::Blocked);

        let kinds: Vec<&str> = state
            .events_for(&project.id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.event.kind())
            .collect();
        assert!(kinds.contains(&"CONFLICT_DETECTED"));
        assert!(kinds.contains(&"PROJECT_BLOCKED"));

        // Manifest is refused while blocked.
        let manifest = engine.generate_manifest(&project.id).await;
        assert!(matches!(manifest, Err(EngineError::ProjectBlocked { .. })));

        // The report carries all three requirements.
        let report = engine.blocking_report(&project.id).await.unwrap();
        assert_eq!(report.total_conflicts, 1);
        assert_eq!(report.conflicts[0].requirements.len(), 3);
    }

    #[tokio::test]
    async fn test_blocked_project_rejects_declarations() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        engine
            .declare_artifact(&project.id, draft("Coder", &[("numpy", ">=2.0")]))
            .await
            .unwrap();
        engine
            .declare_artifact(&project.id, draft("DataSci", &[("numpy", "==1.5.*")]))
            .await
            .unwrap();

        let result = engine
            .declare_artifact(&project.id, draft("Late", &[("requests", ">=2.0")]))
            .await;
        match result {
            Err(EngineError::ProjectBlocked { report }) => {
                assert_eq!(report.total_conflicts, 1);
            }
            other => panic!("expected ProjectBlocked, got {:?}", other.map(|o| o.artifact.id)),
        }
    }

    #[tokio::test]
    async fn test_resolution_unblocks_and_fixes_manifest() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        engine
            .declare_artifact(&project.id, draft("Coder", &[("fastapi", ">=0.100")]))
            .await
            .unwrap();
        engine
            .declare_artifact(
                &project.id,
                draft("DataSci", &[("fastapi", ">=0.100,<0.120")]),
            )
            .await
            .unwrap();
        engine
            .declare_artifact(&project.id, draft("Notebook", &[("fastapi", "==0.90")]))
            .await
            .unwrap();

        let resolved = engine
            .resolve_conflict(&project.id, "fastapi", "==0.115", "ConflictResolver")
            .await
            .unwrap();
        assert_eq!(resolved.library, "fastapi");

        let reloaded = state.get_project(&project.id).await.unwrap();
        assert_eq!(reloaded.status, ProjectStatus::InProgress);

        let kinds: Vec<&str> = state
            .events_for(&project.id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.event.kind())
            .collect();
        assert!(kinds.contains(&"CONFLICT_RESOLVED"));
        assert!(kinds.contains(&"PROJECT_UNBLOCKED"));

        let manifest = engine.generate_manifest(&project.id).await.unwrap();
        assert!(manifest.contains("fastapi==0.115"));
    }

    #[tokio::test]
    async fn test_resolving_unknown_library_fails() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        let result = engine
            .resolve_conflict(&project.id, "fastapi", "==1.0", "resolver")
            .await;
        assert!(matches!(result, Err(EngineError::ConflictNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_constraint_is_rejected_without_persisting() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        let result = engine
            .declare_artifact(&project.id, draft("Coder", &[("fastapi", ">>=1")]))
            .await;
        assert!(matches!(result, Err(EngineError::InvalidDeclaration(_))));
        assert!(engine.live_artifacts(&project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redeclaring_same_id_is_noop() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        let id = ArtifactId::generate();
        let mut first_draft = draft("Coder", &[("fastapi", ">=0.100")]);
        first_draft.id = Some(id.clone());
        let first = engine
            .declare_artifact(&project.id, first_draft)
            .await
            .unwrap();

        let mut second_draft = draft("Coder", &[("fastapi", "==0.90")]);
        second_draft.id = Some(id.clone());
        let second = engine
            .declare_artifact(&project.id, second_draft)
            .await
            .unwrap();

        // First commit wins; no conflicting constraint entered the pool.
        assert_eq!(second.artifact.created_at, first.artifact.created_at);
        assert_eq!(
            second.artifact.dependencies[0].version_constraint,
            ">=0.100"
        );
        assert_eq!(engine.live_artifacts(&project.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revocation_unblocks() {
        let (engine, state) = engine(GovernanceMode::Adaptive);
        let project = project_in_progress(&state).await;

        engine
            .declare_artifact(&project.id, draft("Coder", &[("numpy", ">=2.0")]))
            .await
            .unwrap();
        let conflicting = engine
            .declare_artifact(&project.id, draft("DataSci", &[("numpy", "==1.5.*")]))
            .await
            .unwrap();
        assert_eq!(
            state.get_project(&project.id).await.unwrap().status,
            ProjectStatus::Blocked
        );

        engine
            .revoke_artifact(&project.id, &conflicting.artifact.id, "Supervisor")
            .await
            .unwrap();

        let reloaded = state.get_project(&project.id).await.unwrap();
        assert_eq!(reloaded.status, ProjectStatus::InProgress);

        let kinds: Vec<&str> = state
            .events_for(&project.id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.event.kind())
            .collect();
        assert!(kinds.contains(&"ARTIFACT_REVOKED"));
    }

    #[tokio::test]
    async fn test_playground_mode_never_blocks() {
        let (engine, state) = engine(GovernanceMode::Playground);
        let project = project_in_progress(&state).await;

        engine
            .declare_artifact(&project.id, draft("Coder", &[("numpy", ">=2.0")]))
            .await
            .unwrap();
        let outcome = engine
            .declare_artifact(&project.id, draft("DataSci", &[("numpy", "==1.5.*")]))
            .await
            .unwrap();

        // The conflict is detected and recorded, but nothing blocks.
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(
            state.get_project(&project.id).await.unwrap().status,
            ProjectStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_strict_mode_blocks_on_warning() {
        let (engine, state) = engine(GovernanceMode::Strict);
        let project = project_in_progress(&state).await;

        engine
            .declare_artifact(&project.id, draft("Coder", &[("pydantic", "==2.5.0")]))
            .await
            .unwrap();
        let outcome = engine
            .declare_artifact(&project.id, draft("Planner", &[("pydantic", ">=2.0")]))
            .await
            .unwrap();

        // Warning-level tension is treated as critical in strict mode.
        assert!(outcome.conflicts[0].is_critical());
        assert_eq!(
            state.get_project(&project.id).await.unwrap().status,
            ProjectStatus::Blocked
        );
    }
}
