//! Compliance summary reports

use crate::entry::{AuditEntry, PolicyDecision};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated view over a window of audit entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Total entries in the window
    pub total: usize,

    /// Decisions per agent
    pub by_agent: BTreeMap<String, usize>,

    /// Decisions per sensitivity level
    pub by_sensitivity: BTreeMap<String, usize>,

    /// Decisions per selected provider
    pub by_provider: BTreeMap<String, usize>,

    /// Number of vetoed calls
    pub policy_violations: usize,
}

/// Summarize entries. Pure function, no side effects.
pub fn summarize(entries: &[AuditEntry]) -> AuditSummary {
    let mut summary = AuditSummary {
        total: entries.len(),
        by_agent: BTreeMap::new(),
        by_sensitivity: BTreeMap::new(),
        by_provider: BTreeMap::new(),
        policy_violations: 0,
    };

    for entry in entries {
        *summary.by_agent.entry(entry.agent_name.clone()).or_insert(0) += 1;
        *summary
            .by_sensitivity
            .entry(entry.sensitivity.to_string())
            .or_insert(0) += 1;
        if let Some(provider) = &entry.selected_provider {
            *summary.by_provider.entry(provider.clone()).or_insert(0) += 1;
        }
        if entry.policy_decision == PolicyDecision::Denied {
            summary.policy_violations += 1;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmp_types::{DataResidency, Sensitivity};

    fn entry(agent: &str, sensitivity: Sensitivity, decision: PolicyDecision) -> AuditEntry {
        let mut builder = AuditEntry::builder()
            .agent_name(agent)
            .task_type("planning")
            .sensitivity(sensitivity)
            .policy_decision(decision)
            .policy_name("default_local_first")
            .organization("acme")
            .data_residency(DataResidency::Local);
        if decision == PolicyDecision::Allowed {
            builder = builder.selected_provider("local_runtime");
        }
        builder.build().unwrap().finalize(None, false)
    }

    #[test]
    fn test_summary_counts() {
        let entries = vec![
            entry("Coder", Sensitivity::Public, PolicyDecision::Allowed),
            entry("Coder", Sensitivity::Sensitive, PolicyDecision::Allowed),
            entry("Planner", Sensitivity::Internal, PolicyDecision::Denied),
        ];

        let summary = summarize(&entries);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_agent["Coder"], 2);
        assert_eq!(summary.by_agent["Planner"], 1);
        assert_eq!(summary.by_sensitivity["PUBLIC"], 1);
        assert_eq!(summary.by_provider["local_runtime"], 2);
        assert_eq!(summary.policy_violations, 1);
    }

    #[test]
    fn test_empty_window() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert!(summary.by_agent.is_empty());
        assert_eq!(summary.policy_violations, 0);
    }
}
