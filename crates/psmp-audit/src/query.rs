//! Audit query support

use crate::entry::AuditEntry;
use chrono::{DateTime, Utc};
use psmp_types::Sensitivity;

/// Filterable query over audit entries.
///
/// Results are ordered ascending by timestamp, the order the log was
/// written in.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Filter by agent name
    pub agent: Option<String>,

    /// Filter by classified sensitivity
    pub sensitivity: Option<Sensitivity>,

    /// Filter by selected provider
    pub provider: Option<String>,

    /// Filter by policy name
    pub policy_name: Option<String>,

    /// Window start (inclusive)
    pub from: Option<DateTime<Utc>>,

    /// Window end (exclusive)
    pub to: Option<DateTime<Utc>>,

    /// Maximum number of results
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// Whether `entry` satisfies every filter.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(agent) = &self.agent {
            if &entry.agent_name != agent {
                return false;
            }
        }
        if let Some(sensitivity) = self.sensitivity {
            if entry.sensitivity != sensitivity {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            if entry.selected_provider.as_ref() != Some(provider) {
                return false;
            }
        }
        if let Some(policy_name) = &self.policy_name {
            if &entry.policy_name != policy_name {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp >= to {
                return false;
            }
        }
        true
    }

    /// Apply the query to a slice of entries.
    pub fn apply(&self, entries: &[AuditEntry]) -> Vec<AuditEntry> {
        let mut results: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}
