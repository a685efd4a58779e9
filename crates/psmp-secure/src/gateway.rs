//! Secure gateway facade

use crate::classify::{classify, TaskContext};
use crate::error::PolicyError;
use crate::policy::RoutingPolicy;
use psmp_audit::{AuditEntry, ComplianceAuditor, PolicyDecision};
use psmp_gateway::{DispatchRequest, GenerationRequest, LlmGateway, LlmResponse, ProviderKind};
use psmp_types::{DataResidency, Sensitivity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Secure gateway configuration.
#[derive(Debug, Clone)]
pub struct SecureGatewayConfig {
    /// Escalate audit write failures regardless of policy
    pub strict_audit: bool,

    /// Force local-only selection regardless of policy
    pub offline: bool,

    /// Organization recorded on every audit entry
    pub organization: String,
}

/// Outcome of classifying and routing one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Classified sensitivity
    pub sensitivity: Sensitivity,

    /// Provider selection survived the policy
    pub policy_decision: PolicyDecision,

    /// Active policy
    pub policy_name: String,

    /// Selected provider
    pub selected_provider: String,

    /// Residency of the selected provider
    pub data_residency: DataResidency,
}

struct Selection {
    provider: String,
    residency: DataResidency,
    fallback_from: Vec<String>,
}

/// Classifies every LLM-bound task and vetoes providers that violate
/// the active organization policy.
pub struct SecureGateway {
    policy: Arc<dyn RoutingPolicy>,
    llm: Arc<LlmGateway>,
    auditor: Arc<ComplianceAuditor>,
    config: SecureGatewayConfig,
}

impl SecureGateway {
    /// Create a gateway with exactly one active policy.
    pub fn new(
        policy: Arc<dyn RoutingPolicy>,
        llm: Arc<LlmGateway>,
        auditor: Arc<ComplianceAuditor>,
        config: SecureGatewayConfig,
    ) -> Self {
        Self {
            policy,
            llm,
            auditor,
            config,
        }
    }

    /// Name of the active policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Classify a task and select a provider for it.
    ///
    /// An audit entry is written before this returns, on the allow and
    /// the veto path alike.
    #[instrument(skip(self, context), fields(agent = %context.agent_name, task_type = %context.task_type))]
    pub async fn classify_task(
        &self,
        context: &TaskContext,
    ) -> Result<Classification, PolicyError> {
        let sensitivity = classify(context);

        match self.select(sensitivity).await {
            Ok(selection) => {
                let classification = Classification {
                    sensitivity,
                    policy_decision: PolicyDecision::Allowed,
                    policy_name: self.policy.name().to_string(),
                    selected_provider: selection.provider.clone(),
                    data_residency: selection.residency,
                };

                self.audit(context, &classification, &selection.fallback_from)
                    .await?;

                info!(
                    %sensitivity,
                    provider = %selection.provider,
                    "Task classified and routed"
                );
                Ok(classification)
            }
            Err(reason) => {
                let veto = Classification {
                    sensitivity,
                    policy_decision: PolicyDecision::Denied,
                    policy_name: self.policy.name().to_string(),
                    selected_provider: String::new(),
                    data_residency: DataResidency::Local,
                };
                self.audit(context, &veto, &[]).await?;

                Err(PolicyError::PolicyViolation {
                    policy_name: self.policy.name().to_string(),
                    sensitivity,
                    reason,
                })
            }
        }
    }

    /// Classify, route and dispatch one generation request.
    pub async fn generate(
        &self,
        context: &TaskContext,
        request: GenerationRequest,
    ) -> Result<LlmResponse, PolicyError> {
        let classification = self.classify_task(context).await?;

        let allow_fallback = classification.sensitivity.permits_fallback()
            && !self.config.offline
            && self
                .policy
                .allows(classification.sensitivity, DataResidency::Cloud);

        let model = request.model.clone();
        let dispatch = DispatchRequest {
            provider: classification.selected_provider.clone(),
            allow_fallback,
            request,
        };

        match self.llm.dispatch(dispatch).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(LlmResponse::failed(
                classification.selected_provider,
                model,
                format!("{}: {}", err.category(), err),
            )),
        }
    }

    /// Select the highest-priority provider whose residency the policy
    /// allows and that is currently healthy.
    async fn select(&self, sensitivity: Sensitivity) -> Result<Selection, String> {
        let allowed = self.policy.allowed_residencies(sensitivity);
        let monitor = self.llm.monitor();

        let candidates: Vec<(String, DataResidency)> = self
            .llm
            .providers()
            .map(|(name, kind, _)| (name.to_string(), residency_of(kind)))
            .filter(|(_, residency)| {
                allowed.contains(residency)
                    && (!self.config.offline || *residency == DataResidency::Local)
            })
            .collect();

        let mut fallback_from = Vec::new();
        for (name, residency) in &candidates {
            if monitor.is_healthy(name).await {
                return Ok(Selection {
                    provider: name.clone(),
                    residency: *residency,
                    fallback_from,
                });
            }
            fallback_from.push(name.clone());
        }

        Err(format!(
            "no healthy provider within allowed residencies {:?}",
            allowed
        ))
    }

    async fn audit(
        &self,
        context: &TaskContext,
        classification: &Classification,
        fallback_from: &[String],
    ) -> Result<(), PolicyError> {
        let mut builder = AuditEntry::builder()
            .agent_name(&context.agent_name)
            .task_type(&context.task_type)
            .sensitivity(classification.sensitivity)
            .policy_decision(classification.policy_decision)
            .policy_name(&classification.policy_name)
            .organization(self.auditor.organization())
            .data_residency(classification.data_residency);

        if !classification.selected_provider.is_empty() {
            builder = builder.selected_provider(&classification.selected_provider);
        }
        if !fallback_from.is_empty() {
            builder = builder.metadata(
                "fallback_reason",
                format!("unhealthy: {}", fallback_from.join(", ")),
            );
        }

        let entry = match builder.build() {
            Ok(entry) => entry,
            Err(reason) => return self.audit_failure(reason.to_string()),
        };

        match self.auditor.append(entry).await {
            Ok(_) => Ok(()),
            Err(err) => self.audit_failure(err.to_string()),
        }
    }

    fn audit_failure(&self, reason: String) -> Result<(), PolicyError> {
        let must_escalate =
            self.config.strict_audit || self.policy.name() == "compliance_local_only";
        if must_escalate {
            Err(PolicyError::AuditObligation {
                policy_name: self.policy.name().to_string(),
                reason,
            })
        } else {
            warn!(reason = %reason, "Audit write failed, proceeding best-effort");
            Ok(())
        }
    }
}

fn residency_of(kind: ProviderKind) -> DataResidency {
    match kind {
        ProviderKind::LocalRuntime => DataResidency::Local,
        ProviderKind::CloudAggregator => DataResidency::Cloud,
    }
}
