//! PSMP State - single source of truth for project and task lifecycle
//!
//! The [`StateManager`] brokers every project and task mutation: it
//! validates transitions against the lifecycle adjacency sets, holds a
//! per-project lock across read-validate-write-append, and records each
//! mutation as exactly one governance event in the same storage
//! transaction as the entity write. Checkpoints snapshot a project, its
//! tasks and its live artifact ids as one restorable unit.

#![deny(unsafe_code)]

mod checkpoint;
mod error;
mod manager;

pub use checkpoint::ProjectCheckpoint;
pub use error::StateError;
pub use manager::{NewTask, StateEvent, StateManager};
