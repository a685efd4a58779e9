//! Governance core wiring

use crate::config::{GovernanceConfig, StorageConfig};
use crate::watchdog::Watchdog;
use psmp_audit::{
    audit_log_name, AuditEntry, AuditMode, AuditorConfig, ComplianceAuditor, FileAuditSink,
    MemoryAuditSink, PolicyDecision,
};
use psmp_engine::{ArtifactDraft, DeclarationOutcome, EngineError, PsmpEngine};
use psmp_gateway::{
    CloudAggregatorProvider, GatewayConfig, HealthMonitorConfig, LlmGateway,
    LocalRuntimeProvider, ModelMap, Provider, ProviderKind,
};
use psmp_secure::{policy_from_name, SecureGateway, SecureGatewayConfig};
use psmp_state::{StateError, StateManager};
use psmp_storage::{FileStorage, MemoryStorage, Storage};
use psmp_types::{DataResidency, Project, ProjectId, ProjectStatus, Sensitivity};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Failures while building the core.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unknown routing policy '{0}'")]
    UnknownPolicy(String),

    #[error("Storage initialization failed: {0}")]
    Storage(#[from] psmp_storage::StorageError),

    #[error("Audit initialization failed: {0}")]
    Audit(#[from] psmp_audit::AuditError),

    #[error("Provider initialization failed: {0}")]
    Provider(String),
}

/// The five governance components, built once and shared by reference.
pub struct GovernanceCore {
    config: GovernanceConfig,
    state: Arc<StateManager>,
    engine: Arc<PsmpEngine>,
    auditor: Arc<ComplianceAuditor>,
    llm: Arc<LlmGateway>,
    secure: Arc<SecureGateway>,
    watchdog: Watchdog,
}

impl GovernanceCore {
    /// Build the core from configuration, constructing HTTP providers
    /// from the `llm.providers` table.
    pub async fn build(config: GovernanceConfig) -> Result<Self, ServiceError> {
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
        for provider in &config.llm.providers {
            match provider.kind {
                ProviderKind::LocalRuntime => {
                    let served = provider
                        .default_model
                        .iter()
                        .cloned()
                        .chain(config.llm.model_mappings.values().cloned())
                        .collect();
                    let mut built =
                        LocalRuntimeProvider::new(&provider.name, &provider.endpoint, served)
                            .map_err(|e| ServiceError::Provider(e.to_string()))?;
                    if let Some(priority) = provider.priority {
                        built = built.with_priority(priority);
                    }
                    providers.push(Arc::new(built));
                }
                ProviderKind::CloudAggregator => {
                    let mut built = CloudAggregatorProvider::new(
                        &provider.name,
                        &provider.endpoint,
                        provider.api_key.clone(),
                    )
                    .map_err(|e| ServiceError::Provider(e.to_string()))?;
                    if let Some(priority) = provider.priority {
                        built = built.with_priority(priority);
                    }
                    providers.push(Arc::new(built));
                }
            }
        }
        Self::build_with_providers(config, providers).await
    }

    /// Build the core with an explicit provider set. The injection seam
    /// for tests and simulations.
    pub async fn build_with_providers(
        config: GovernanceConfig,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Result<Self, ServiceError> {
        let storage: Arc<dyn Storage> = match &config.storage {
            StorageConfig::Memory => Arc::new(MemoryStorage::new()),
            StorageConfig::File { root } => Arc::new(FileStorage::open(root.clone()).await?),
        };

        let state = Arc::new(StateManager::new(storage));
        let engine = Arc::new(PsmpEngine::new(
            Arc::clone(&state),
            config.governance_mode,
        ));

        let policy = policy_from_name(&config.secure_gateway_policy)
            .ok_or_else(|| ServiceError::UnknownPolicy(config.secure_gateway_policy.clone()))?;

        // Audit failures must surface under strict audit or compliance
        // lockdown; elsewhere the queue may shed load.
        let strict_writes =
            config.strict_audit || config.secure_gateway_policy == "compliance_local_only";
        let auditor_config = AuditorConfig {
            organization: config.organization.clone(),
            mode: if strict_writes {
                AuditMode::Strict
            } else {
                AuditMode::BestEffort
            },
            queue_depth: config.audit.queue_depth,
        };
        let auditor = match &config.audit.log_dir {
            Some(dir) => {
                let path = dir.join(audit_log_name(&config.organization));
                ComplianceAuditor::new(
                    auditor_config,
                    Arc::new(FileAuditSink::open(path, config.audit.hash_chaining).await?),
                )
            }
            None => ComplianceAuditor::new(
                auditor_config,
                Arc::new(MemoryAuditSink::new(config.audit.hash_chaining)),
            ),
        };

        let gateway_config = GatewayConfig {
            request_timeout: Duration::from_secs(config.llm.request_timeout_seconds),
            max_retries: config.llm.max_retries,
            health: HealthMonitorConfig {
                check_interval: Duration::from_secs(config.llm.health_check_interval_seconds),
                ..Default::default()
            },
        };
        let model_map = ModelMap::with_mappings(
            config.llm.default_local_model.clone(),
            config.llm.model_mappings.clone(),
        );
        let llm = Arc::new(LlmGateway::new(gateway_config, providers, model_map));

        let secure = Arc::new(SecureGateway::new(
            policy,
            Arc::clone(&llm),
            Arc::clone(&auditor),
            SecureGatewayConfig {
                strict_audit: config.strict_audit,
                offline: config.offline,
                organization: config.organization.clone(),
            },
        ));

        info!(
            policy = %config.secure_gateway_policy,
            mode = ?config.governance_mode,
            organization = %config.organization,
            "Governance core built"
        );

        Ok(Self {
            config,
            state,
            engine,
            auditor,
            llm,
            secure,
            watchdog: Watchdog::new(),
        })
    }

    /// Start background work: health probing and the watchdog.
    pub async fn start(&self) {
        self.llm.start().await;
        self.watchdog
            .start(self.llm.monitor(), Arc::clone(&self.auditor))
            .await;
    }

    /// Stop background work.
    pub async fn shutdown(&self) {
        self.watchdog.stop().await;
        self.llm.monitor().stop().await;
    }

    /// Configuration the core was built from.
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Lifecycle authority.
    pub fn state(&self) -> Arc<StateManager> {
        Arc::clone(&self.state)
    }

    /// Artifact registry and conflict resolver.
    pub fn engine(&self) -> Arc<PsmpEngine> {
        Arc::clone(&self.engine)
    }

    /// Compliance audit trail.
    pub fn auditor(&self) -> Arc<ComplianceAuditor> {
        Arc::clone(&self.auditor)
    }

    /// LLM gateway.
    pub fn llm(&self) -> Arc<LlmGateway> {
        Arc::clone(&self.llm)
    }

    /// Secure gateway.
    pub fn secure(&self) -> Arc<SecureGateway> {
        Arc::clone(&self.secure)
    }

    // ── Agent-facing operations ─────────────────────────────────────
    //
    // Thin delegations that also discharge the propagation policy:
    // infrastructure failures are recorded as `system_fault` audit
    // events in addition to being returned.

    /// Create a project.
    pub async fn create_project(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Project, StateError> {
        let result = self
            .state
            .create_project(name, description, Default::default())
            .await;
        if let Err(StateError::Storage(err)) = &result {
            self.record_system_fault("state_manager", &err.to_string())
                .await;
        }
        result
    }

    /// Transition a project.
    pub async fn transition_project(
        &self,
        id: &ProjectId,
        new_status: ProjectStatus,
        reason: &str,
        actor: &str,
    ) -> Result<Project, StateError> {
        let result = self
            .state
            .transition_project(id, new_status, reason, actor)
            .await;
        if let Err(StateError::Storage(err)) = &result {
            self.record_system_fault("state_manager", &err.to_string())
                .await;
        }
        result
    }

    /// Declare an artifact.
    pub async fn declare_artifact(
        &self,
        project_id: &ProjectId,
        draft: ArtifactDraft,
    ) -> Result<DeclarationOutcome, EngineError> {
        let result = self.engine.declare_artifact(project_id, draft).await;
        if let Err(err) = &result {
            if is_infrastructure(err) {
                self.record_system_fault("psmp_engine", &err.to_string())
                    .await;
            }
        }
        result
    }

    /// Record an infrastructure failure on the compliance trail.
    pub async fn record_system_fault(&self, component: &str, error: &str) {
        let entry = AuditEntry::builder()
            .agent_name(psmp_types::events::SYSTEM_ACTOR)
            .task_type("system_fault")
            .sensitivity(Sensitivity::Internal)
            .policy_decision(PolicyDecision::Allowed)
            .policy_name(&self.config.secure_gateway_policy)
            .organization(&self.config.organization)
            .data_residency(DataResidency::Local)
            .metadata("component", component)
            .metadata("error", error)
            .build();

        match entry {
            Ok(entry) => {
                if let Err(err) = self.auditor.append(entry).await {
                    warn!(error = %err, "Failed to record system fault");
                }
            }
            Err(reason) => warn!(reason, "Failed to build system fault entry"),
        }
    }
}

fn is_infrastructure(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::Storage(_) | EngineError::State(StateError::Storage(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmp_gateway::StaticProvider;

    #[tokio::test]
    async fn test_build_with_defaults() {
        let core = GovernanceCore::build_with_providers(
            GovernanceConfig::default(),
            vec![Arc::new(StaticProvider::new(
                "local_runtime",
                ProviderKind::LocalRuntime,
            ))],
        )
        .await
        .unwrap();

        assert_eq!(core.secure().policy_name(), "default_local_first");
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_policy_is_rejected() {
        let config = GovernanceConfig {
            secure_gateway_policy: "anything_goes".to_string(),
            ..Default::default()
        };
        let result = GovernanceCore::build_with_providers(config, Vec::new()).await;
        assert!(matches!(result, Err(ServiceError::UnknownPolicy(_))));
    }

    #[tokio::test]
    async fn test_build_from_provider_table() {
        let core = GovernanceCore::build(GovernanceConfig::default()).await.unwrap();
        let names: Vec<String> = core.llm().providers().map(|(n, _, _)| n.to_string()).collect();
        assert_eq!(names, vec!["local_runtime"]);
        core.shutdown().await;
    }
}
