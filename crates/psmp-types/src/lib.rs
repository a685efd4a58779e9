//! PSMP Types - Core types for the multi-agent governance engine
//!
//! PSMP (Project State Management Protocol) is the mandatory
//! artifact-declaration and conflict-detection protocol enforced at the
//! persistence boundary. This crate holds the entities and identifiers
//! shared by every governance component.
//!
//! ## Architectural Boundaries
//!
//! - **State Manager** owns: Project and Task mutations
//! - **PSMP Engine** owns: Artifact creation and conflict materialization
//! - **Compliance Auditor** owns: audit entry persistence
//!
//! Nothing in this crate performs I/O; it is types all the way down.

#![deny(unsafe_code)]

pub mod artifact;
pub mod conflict;
pub mod events;
pub mod ids;
pub mod project;
pub mod sensitivity;
pub mod task;

pub use artifact::{Artifact, ArtifactType, DependencyScope, DependencySpec};
pub use conflict::{ConflictRequirement, ConflictSeverity, DependencyConflict};
pub use events::{PsmpEvent, PsmpEventEnvelope};
pub use ids::{ArtifactId, CheckpointId, EventId, ProjectId, TaskId};
pub use project::{GovernanceMode, Project, ProjectStatus};
pub use sensitivity::{DataResidency, Sensitivity};
pub use task::{Task, TaskStatus};
