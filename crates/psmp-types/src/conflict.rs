//! Dependency conflict types
//!
//! Conflicts are derived, not stored standalone; they materialize in
//! events and blocking reports.

use serde::{Deserialize, Serialize};

/// A set of incompatible dependency declarations for one library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConflict {
    /// Library the declarations disagree about
    pub library: String,

    /// The competing requirements
    pub requirements: Vec<ConflictRequirement>,

    /// Conflict severity
    pub severity: ConflictSeverity,

    /// Human-readable resolution options
    pub suggested_resolutions: Vec<String>,
}

impl DependencyConflict {
    /// Whether this conflict blocks the project on its own.
    pub fn is_critical(&self) -> bool {
        self.severity == ConflictSeverity::Critical
    }
}

/// One agent's requirement participating in a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRequirement {
    /// Declaring agent
    pub agent: String,

    /// Constraint the agent needs
    pub needs: String,

    /// Declared purpose
    pub purpose: String,
}

/// Conflict severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictSeverity::Warning => f.write_str("warning"),
            ConflictSeverity::Critical => f.write_str("critical"),
        }
    }
}
