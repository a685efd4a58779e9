//! PSMP Engine - artifact registry and dependency-conflict resolver
//!
//! The engine is the write path for artifacts: it validates dependency
//! declarations, persists them transactionally, runs conflict detection
//! over every live artifact of the project, blocks the project through
//! the State Manager when a critical conflict appears, and assembles the
//! unified dependency manifest once no critical conflict remains.
//!
//! The dependency is one-directional: the engine calls the State Manager
//! for project status and transitions; the State Manager never calls
//! back.

#![deny(unsafe_code)]

mod engine;
mod error;
mod report;

pub use engine::{ArtifactDraft, DeclarationOutcome, DependencyRequest, PsmpEngine};
pub use error::EngineError;
pub use report::BlockingReport;
