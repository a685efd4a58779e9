//! Artifact entity and dependency declarations

use crate::ids::{ArtifactId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum length of an artifact content summary.
pub const MAX_SUMMARY_CHARS: usize = 200;

/// A durable agent-produced output governed by the engine.
///
/// Artifacts are immutable once declared; new versions create new
/// artifacts. Revocation flips `revoked_at` (via the engine) without
/// touching the declared content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Globally unique artifact ID
    pub id: ArtifactId,

    /// Owning project
    pub project_id: ProjectId,

    /// Name of the producing agent
    pub agent_id: String,

    /// Kind of artifact
    pub artifact_type: ArtifactType,

    /// What this artifact contains, at most 200 chars
    pub content_summary: String,

    /// Declared dependencies
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,

    /// Declaration timestamp
    pub created_at: DateTime<Utc>,

    /// When the artifact stopped being live, if ever
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,

    /// Open-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Artifact {
    /// Whether the artifact still participates in conflict detection.
    pub fn is_live(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Code,
    Config,
    Model,
    Data,
    Plan,
    Analysis,
    Test,
    Docs,
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArtifactType::Code => "code",
            ArtifactType::Config => "config",
            ArtifactType::Model => "model",
            ArtifactType::Data => "data",
            ArtifactType::Plan => "plan",
            ArtifactType::Analysis => "analysis",
            ArtifactType::Test => "test",
            ArtifactType::Docs => "docs",
        };
        f.write_str(s)
    }
}

/// One declared dependency of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Library name
    pub name: String,

    /// Version constraint string, e.g. `>=1.0,<2.0`
    pub version_constraint: String,

    /// Where the dependency is needed
    pub scope: DependencyScope,

    /// Agent that declared it
    pub declared_by_agent: String,

    /// Why it is needed
    pub purpose: String,
}

/// Dependency scopes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependencyScope {
    Runtime,
    Dev,
    Build,
}

impl DependencyScope {
    /// Manifest header comment for this scope.
    pub fn manifest_header(&self) -> &'static str {
        match self {
            DependencyScope::Runtime => "# runtime",
            DependencyScope::Dev => "# dev",
            DependencyScope::Build => "# build",
        }
    }
}

impl std::fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DependencyScope::Runtime => "RUNTIME",
            DependencyScope::Dev => "DEV",
            DependencyScope::Build => "BUILD",
        };
        f.write_str(s)
    }
}
