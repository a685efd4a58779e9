//! Hash-chain integrity for the audit log

use crate::entry::AuditEntry;

/// Tracks the head of the audit hash chain.
#[derive(Debug, Default)]
pub struct IntegrityChain {
    last_hash: Option<String>,
    entry_count: u64,
}

impl IntegrityChain {
    /// Fresh chain with no entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from persisted state.
    pub fn from_state(last_hash: Option<String>, entry_count: u64) -> Self {
        Self {
            last_hash,
            entry_count,
        }
    }

    /// Hash the next entry must link to.
    pub fn previous_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Advance the chain past `entry`.
    pub fn update(&mut self, entry: &AuditEntry) {
        if entry.entry_hash.is_some() {
            self.last_hash = entry.entry_hash.clone();
        }
        self.entry_count += 1;
    }

    /// Number of entries seen.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}

/// Result of verifying a chain of entries.
#[derive(Debug, Clone)]
pub struct ChainVerification {
    /// Whether every link held
    pub valid: bool,

    /// Entries examined
    pub total_entries: usize,

    /// Index of the first broken entry, if any
    pub first_invalid_index: Option<usize>,

    /// Human-readable failure description
    pub error: Option<String>,
}

/// Verify a sequence of chained entries in log order.
///
/// Unchained entries (no `entry_hash`) are tolerated only when the whole
/// log is unchained; a mix means the log was rewritten.
pub fn verify_chain(entries: &[AuditEntry]) -> ChainVerification {
    let mut result = ChainVerification {
        valid: true,
        total_entries: entries.len(),
        first_invalid_index: None,
        error: None,
    };

    let chained = entries.iter().filter(|e| e.entry_hash.is_some()).count();
    if chained == 0 {
        return result;
    }
    if chained != entries.len() {
        result.valid = false;
        result.first_invalid_index = entries.iter().position(|e| e.entry_hash.is_none());
        result.error = Some("log mixes chained and unchained entries".to_string());
        return result;
    }

    let mut prev_hash: Option<String> = None;
    for (index, entry) in entries.iter().enumerate() {
        if entry.prev_hash != prev_hash {
            result.valid = false;
            result.first_invalid_index = Some(index);
            result.error = Some(format!("entry {} has a broken chain link", entry.id));
            return result;
        }

        let expected = entry.compute_hash(prev_hash.as_deref());
        if entry.entry_hash.as_deref() != Some(expected.as_str()) {
            result.valid = false;
            result.first_invalid_index = Some(index);
            result.error = Some(format!("entry {} content does not match its hash", entry.id));
            return result;
        }

        prev_hash = entry.entry_hash.clone();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditEntry, PolicyDecision};
    use psmp_types::{DataResidency, Sensitivity};

    fn chained_entries(count: usize) -> Vec<AuditEntry> {
        let mut chain = IntegrityChain::new();
        let mut entries = Vec::new();
        for i in 0..count {
            let entry = AuditEntry::builder()
                .agent_name(format!("agent-{}", i))
                .task_type("planning")
                .sensitivity(Sensitivity::Internal)
                .policy_decision(PolicyDecision::Allowed)
                .policy_name("default_local_first")
                .organization("acme")
                .data_residency(DataResidency::Local)
                .build()
                .unwrap()
                .finalize(chain.previous_hash(), true);
            chain.update(&entry);
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn test_valid_chain() {
        let entries = chained_entries(4);
        let result = verify_chain(&entries);
        assert!(result.valid, "{:?}", result.error);
    }

    #[test]
    fn test_tampered_content_detected() {
        let mut entries = chained_entries(3);
        entries[1].agent_name = "forged".to_string();

        let result = verify_chain(&entries);
        assert!(!result.valid);
        assert_eq!(result.first_invalid_index, Some(1));
    }

    #[test]
    fn test_removed_entry_detected() {
        let mut entries = chained_entries(3);
        entries.remove(1);

        let result = verify_chain(&entries);
        assert!(!result.valid);
        assert_eq!(result.first_invalid_index, Some(1));
    }

    #[test]
    fn test_unchained_log_is_tolerated() {
        let entries: Vec<AuditEntry> = chained_entries(2)
            .into_iter()
            .map(|mut e| {
                e.entry_hash = None;
                e.prev_hash = None;
                e
            })
            .collect();
        assert!(verify_chain(&entries).valid);
    }
}
