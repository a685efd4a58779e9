//! PSMP Secure - sensitivity classification and policy-routed provider
//! selection
//!
//! Every LLM-bound task passes through here before any provider sees it:
//! the deterministic classifier assigns an ordinal sensitivity, the
//! active routing policy maps that sensitivity to an allowed residency
//! set, and selection intersects the allowed set with currently healthy
//! providers. Each classification and selection writes a compliance
//! audit entry before returning.

#![deny(unsafe_code)]

mod classify;
mod error;
mod gateway;
mod policy;

pub use classify::{classify, TaskContext, SECURITY_REVIEWER_AGENTS};
pub use error::PolicyError;
pub use gateway::{Classification, SecureGateway, SecureGatewayConfig};
pub use policy::{
    policy_from_name, ComplianceLocalOnlyPolicy, EnterpriseResidencyPolicy, LocalFirstPolicy,
    RoutingPolicy,
};
