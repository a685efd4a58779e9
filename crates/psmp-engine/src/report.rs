//! Blocking report payload

use psmp_types::{DependencyConflict, ProjectId, ProjectStatus};
use serde::{Deserialize, Serialize};

/// Machine-readable summary of a project's unresolved conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingReport {
    /// Project the report describes
    pub project_id: ProjectId,

    /// Project status at report time
    pub status: ProjectStatus,

    /// Number of unresolved conflicts
    pub total_conflicts: usize,

    /// The conflicts, most severe first
    pub conflicts: Vec<DependencyConflict>,
}

impl BlockingReport {
    /// Build a report from detected conflicts.
    pub fn new(
        project_id: ProjectId,
        status: ProjectStatus,
        mut conflicts: Vec<DependencyConflict>,
    ) -> Self {
        conflicts.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.library.cmp(&b.library)));
        Self {
            project_id,
            status,
            total_conflicts: conflicts.len(),
            conflicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmp_types::{ConflictRequirement, ConflictSeverity};

    #[test]
    fn test_report_orders_critical_first() {
        let warn = DependencyConflict {
            library: "alpha".to_string(),
            requirements: vec![],
            severity: ConflictSeverity::Warning,
            suggested_resolutions: vec![],
        };
        let critical = DependencyConflict {
            library: "zeta".to_string(),
            requirements: vec![ConflictRequirement {
                agent: "Coder".to_string(),
                needs: "==1.0".to_string(),
                purpose: "api".to_string(),
            }],
            severity: ConflictSeverity::Critical,
            suggested_resolutions: vec![],
        };

        let report = BlockingReport::new(
            ProjectId::generate(),
            ProjectStatus::Blocked,
            vec![warn, critical],
        );
        assert_eq!(report.total_conflicts, 2);
        assert_eq!(report.conflicts[0].library, "zeta");
    }

    #[test]
    fn test_report_wire_shape() {
        let report = BlockingReport::new(ProjectId::generate(), ProjectStatus::Blocked, vec![]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "BLOCKED");
        assert_eq!(json["total_conflicts"], 0);
        assert!(json["conflicts"].as_array().unwrap().is_empty());
    }
}
