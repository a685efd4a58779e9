//! Routing policies
//!
//! A policy maps each sensitivity level to the set of data residencies
//! it may be served from. Exactly one policy is active per process.

use psmp_types::{DataResidency, Sensitivity};
use std::sync::Arc;

/// Pluggable organization data-residency policy.
pub trait RoutingPolicy: Send + Sync + std::fmt::Debug {
    /// Wire name, e.g. `default_local_first`.
    fn name(&self) -> &'static str;

    /// Residencies allowed for a sensitivity, most preferred first.
    fn allowed_residencies(&self, sensitivity: Sensitivity) -> &'static [DataResidency];

    /// Whether a residency is allowed for a sensitivity.
    fn allows(&self, sensitivity: Sensitivity, residency: DataResidency) -> bool {
        self.allowed_residencies(sensitivity).contains(&residency)
    }
}

const LOCAL_ONLY: &[DataResidency] = &[DataResidency::Local];
const LOCAL_THEN_CLOUD: &[DataResidency] = &[DataResidency::Local, DataResidency::Cloud];

/// Default policy: local preferred everywhere, cloud tolerated for
/// public and internal work.
#[derive(Debug)]
pub struct LocalFirstPolicy;

impl RoutingPolicy for LocalFirstPolicy {
    fn name(&self) -> &'static str {
        "default_local_first"
    }

    fn allowed_residencies(&self, sensitivity: Sensitivity) -> &'static [DataResidency] {
        match sensitivity {
            Sensitivity::Public | Sensitivity::Internal => LOCAL_THEN_CLOUD,
            Sensitivity::Sensitive | Sensitivity::Critical => LOCAL_ONLY,
        }
    }
}

/// Enterprise residency: only public work may leave the premises.
#[derive(Debug)]
pub struct EnterpriseResidencyPolicy;

impl RoutingPolicy for EnterpriseResidencyPolicy {
    fn name(&self) -> &'static str {
        "enterprise_residency"
    }

    fn allowed_residencies(&self, sensitivity: Sensitivity) -> &'static [DataResidency] {
        match sensitivity {
            Sensitivity::Public => LOCAL_THEN_CLOUD,
            _ => LOCAL_ONLY,
        }
    }
}

/// Compliance lockdown: nothing leaves the premises, ever.
#[derive(Debug)]
pub struct ComplianceLocalOnlyPolicy;

impl RoutingPolicy for ComplianceLocalOnlyPolicy {
    fn name(&self) -> &'static str {
        "compliance_local_only"
    }

    fn allowed_residencies(&self, _sensitivity: Sensitivity) -> &'static [DataResidency] {
        LOCAL_ONLY
    }
}

/// Resolve a policy by its configured name.
pub fn policy_from_name(name: &str) -> Option<Arc<dyn RoutingPolicy>> {
    match name {
        "default_local_first" => Some(Arc::new(LocalFirstPolicy)),
        "enterprise_residency" => Some(Arc::new(EnterpriseResidencyPolicy)),
        "compliance_local_only" => Some(Arc::new(ComplianceLocalOnlyPolicy)),
        _ => None,
    }
}
