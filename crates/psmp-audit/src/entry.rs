//! Compliance audit entry types

use chrono::{DateTime, Utc};
use psmp_types::{DataResidency, Sensitivity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of a governance decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyDecision {
    /// The operation was allowed to proceed
    Allowed,
    /// The operation was vetoed
    Denied,
}

/// One immutable compliance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// Decision timestamp, UTC
    pub timestamp: DateTime<Utc>,

    /// Agent the decision was made for
    pub agent_name: String,

    /// Kind of task the agent announced
    pub task_type: String,

    /// Classified sensitivity
    pub sensitivity: Sensitivity,

    /// Provider the router chose, if any
    pub selected_provider: Option<String>,

    /// Whether the policy allowed the call
    pub policy_decision: PolicyDecision,

    /// Name of the active routing policy
    pub policy_name: String,

    /// Organization the entry belongs to
    pub organization: String,

    /// Where the request's data resides
    pub data_residency: DataResidency,

    /// Additional context
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Hash of the previous entry when chaining is enabled
    pub prev_hash: Option<String>,

    /// Hash of this entry when chaining is enabled
    pub entry_hash: Option<String>,
}

impl AuditEntry {
    /// Start building an entry.
    pub fn builder() -> AuditEntryBuilder {
        AuditEntryBuilder::default()
    }

    /// Recompute the hash this entry should carry given its predecessor.
    pub fn compute_hash(&self, prev_hash: Option<&str>) -> String {
        hash_fields(
            &self.id,
            &self.timestamp,
            &self.agent_name,
            &self.task_type,
            self.sensitivity,
            self.selected_provider.as_deref(),
            self.policy_decision,
            &self.policy_name,
            &self.organization,
            prev_hash,
        )
    }
}

/// An entry that has not been chained yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialAuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub task_type: String,
    pub sensitivity: Sensitivity,
    pub selected_provider: Option<String>,
    pub policy_decision: PolicyDecision,
    pub policy_name: String,
    pub organization: String,
    pub data_residency: DataResidency,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PartialAuditEntry {
    /// Finalize into a chained entry. With `prev_hash == None` and
    /// chaining disabled the hash fields stay empty.
    pub fn finalize(self, prev_hash: Option<String>, chained: bool) -> AuditEntry {
        let mut entry = AuditEntry {
            id: self.id,
            timestamp: self.timestamp,
            agent_name: self.agent_name,
            task_type: self.task_type,
            sensitivity: self.sensitivity,
            selected_provider: self.selected_provider,
            policy_decision: self.policy_decision,
            policy_name: self.policy_name,
            organization: self.organization,
            data_residency: self.data_residency,
            metadata: self.metadata,
            prev_hash: None,
            entry_hash: None,
        };

        if chained {
            let hash = entry.compute_hash(prev_hash.as_deref());
            entry.prev_hash = prev_hash;
            entry.entry_hash = Some(hash);
        }

        entry
    }
}

/// Builder for audit entries.
#[derive(Debug, Default)]
pub struct AuditEntryBuilder {
    agent_name: Option<String>,
    task_type: Option<String>,
    sensitivity: Option<Sensitivity>,
    selected_provider: Option<String>,
    policy_decision: Option<PolicyDecision>,
    policy_name: Option<String>,
    organization: Option<String>,
    data_residency: Option<DataResidency>,
    metadata: HashMap<String, serde_json::Value>,
}

impl AuditEntryBuilder {
    pub fn agent_name(mut self, value: impl Into<String>) -> Self {
        self.agent_name = Some(value.into());
        self
    }

    pub fn task_type(mut self, value: impl Into<String>) -> Self {
        self.task_type = Some(value.into());
        self
    }

    pub fn sensitivity(mut self, value: Sensitivity) -> Self {
        self.sensitivity = Some(value);
        self
    }

    pub fn selected_provider(mut self, value: impl Into<String>) -> Self {
        self.selected_provider = Some(value.into());
        self
    }

    pub fn policy_decision(mut self, value: PolicyDecision) -> Self {
        self.policy_decision = Some(value);
        self
    }

    pub fn policy_name(mut self, value: impl Into<String>) -> Self {
        self.policy_name = Some(value.into());
        self
    }

    pub fn organization(mut self, value: impl Into<String>) -> Self {
        self.organization = Some(value.into());
        self
    }

    pub fn data_residency(mut self, value: DataResidency) -> Self {
        self.data_residency = Some(value);
        self
    }

    /// Add a metadata value; values that fail to serialize are skipped.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(json) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), json);
        }
        self
    }

    /// Build the unchained entry.
    pub fn build(self) -> Result<PartialAuditEntry, &'static str> {
        Ok(PartialAuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_name: self.agent_name.ok_or("agent_name is required")?,
            task_type: self.task_type.ok_or("task_type is required")?,
            sensitivity: self.sensitivity.ok_or("sensitivity is required")?,
            selected_provider: self.selected_provider,
            policy_decision: self.policy_decision.ok_or("policy_decision is required")?,
            policy_name: self.policy_name.ok_or("policy_name is required")?,
            organization: self.organization.ok_or("organization is required")?,
            data_residency: self.data_residency.ok_or("data_residency is required")?,
            metadata: self.metadata,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn hash_fields(
    id: &Uuid,
    timestamp: &DateTime<Utc>,
    agent_name: &str,
    task_type: &str,
    sensitivity: Sensitivity,
    selected_provider: Option<&str>,
    policy_decision: PolicyDecision,
    policy_name: &str,
    organization: &str,
    prev_hash: Option<&str>,
) -> String {
    let input = format!(
        "{}{}{}{}{}{}{:?}{}{}{}",
        id,
        timestamp.to_rfc3339(),
        agent_name,
        task_type,
        sensitivity,
        selected_provider.unwrap_or(""),
        policy_decision,
        policy_name,
        organization,
        prev_hash.unwrap_or("")
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
