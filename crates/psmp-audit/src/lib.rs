//! PSMP Audit - append-only compliance trail
//!
//! Every governance decision (classification, provider selection, policy
//! veto, system fault) becomes one immutable [`AuditEntry`], serialized
//! as a JSON line to a per-organization log. Entries are optionally
//! hash-chained so tampering is detectable after the fact.
//!
//! Producers never touch the log file directly: the [`ComplianceAuditor`]
//! funnels entries through a single-writer queue. Strict mode blocks the
//! caller until the entry is durable; best-effort mode enqueues and keeps
//! a drop counter when the queue overflows.

#![deny(unsafe_code)]

mod auditor;
mod entry;
mod error;
mod integrity;
mod query;
mod report;
mod sink;

pub use auditor::{AuditMode, AuditorConfig, ComplianceAuditor};
pub use entry::{AuditEntry, PartialAuditEntry, PolicyDecision};
pub use error::AuditError;
pub use integrity::{ChainVerification, IntegrityChain, verify_chain};
pub use query::AuditQuery;
pub use report::{summarize, AuditSummary};
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};

/// Compliance log file name for an organization.
pub fn audit_log_name(organization: &str) -> String {
    let slug: String = organization
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("compliance_audit_{}.jsonl", slug)
}
