//! PSMP Storage - durable persistence for governance entities
//!
//! A narrow key/value + indexed-scan interface shared by the State
//! Manager, the PSMP Engine and the Compliance Auditor. Two backends:
//!
//! - [`MemoryStorage`] for development and tests
//! - [`FileStorage`] with the on-disk layout `projects/<id>`,
//!   `tasks/<id>`, `artifacts/<id>`, `checkpoints/<project>/<checkpoint>`
//!   and the append-only `psmp_events.jsonl`
//!
//! All single-record writes are atomic; [`Storage::transaction`] groups a
//! bounded batch. On write failure the backend returns
//! [`StorageError::Unavailable`] and the caller must abort the
//! surrounding operation without state change.

#![deny(unsafe_code)]

mod error;
mod file;
mod memory;
mod traits;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{EntityKind, Storage, StorageResult, WriteOp, EVENT_LOG};
