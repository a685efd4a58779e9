//! Governance core configuration
//!
//! A single structured config loaded from defaults, an optional file and
//! `PSMP_*` environment variables. The explicitly recognized overrides
//! `PSMP_GOVERNANCE_MODE`, `PSMP_POLICY` and `PSMP_OFFLINE` win over
//! everything else.

use psmp_gateway::ProviderKind;
use psmp_types::GovernanceMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// How the engine treats dependency issues
    #[serde(default)]
    pub governance_mode: GovernanceMode,

    /// Active routing policy name
    #[serde(default = "default_policy")]
    pub secure_gateway_policy: String,

    /// Escalate audit failures regardless of policy
    #[serde(default)]
    pub strict_audit: bool,

    /// Force local-only provider selection
    #[serde(default)]
    pub offline: bool,

    /// Organization the audit trail belongs to
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// LLM gateway settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Audit settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            governance_mode: GovernanceMode::Adaptive,
            secure_gateway_policy: default_policy(),
            strict_audit: false,
            offline: false,
            organization: default_organization(),
            storage: StorageConfig::default(),
            llm: LlmConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage for development and testing
    #[default]
    Memory,

    /// File-backed storage rooted at a directory
    File {
        /// Data directory
        root: PathBuf,
    },
}

/// One configured provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry name
    pub name: String,

    /// Provider variant
    pub kind: ProviderKind,

    /// Selection priority, lower preferred
    #[serde(default)]
    pub priority: Option<u8>,

    /// Service endpoint
    pub endpoint: String,

    /// Default model served by this provider
    #[serde(default)]
    pub default_model: Option<String>,

    /// API key, cloud providers only
    #[serde(default)]
    pub api_key: Option<String>,
}

/// LLM gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Configured providers
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// `cloud_model_name -> local_model_name`
    #[serde(default)]
    pub model_mappings: HashMap<String, String>,

    /// Fallback local model
    #[serde(default = "default_local_model")]
    pub default_local_model: String,

    /// Background probe interval
    #[serde(default = "default_health_interval")]
    pub health_check_interval_seconds: u64,

    /// Per-request deadline
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            model_mappings: HashMap::new(),
            default_local_model: default_local_model(),
            health_check_interval_seconds: default_health_interval(),
            request_timeout_seconds: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Audit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Queue high-water mark
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Hash-chain entries for tamper evidence
    #[serde(default = "default_true")]
    pub hash_chaining: bool,

    /// Directory for compliance logs; in-memory sink when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            hash_chaining: true,
            log_dir: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl GovernanceConfig {
    /// Load configuration: defaults, then an optional file, then the
    /// `PSMP_*` environment.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&GovernanceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PSMP")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: GovernanceConfig = builder.build()?.try_deserialize()?;
        loaded.apply_env_overrides();
        Ok(loaded)
    }

    /// Apply the explicitly recognized environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(mode) = std::env::var("PSMP_GOVERNANCE_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "strict" => self.governance_mode = GovernanceMode::Strict,
                "adaptive" => self.governance_mode = GovernanceMode::Adaptive,
                "playground" => self.governance_mode = GovernanceMode::Playground,
                other => tracing::warn!(value = other, "Unknown PSMP_GOVERNANCE_MODE ignored"),
            }
        }

        if let Ok(policy) = std::env::var("PSMP_POLICY") {
            self.secure_gateway_policy = policy;
        }

        if let Ok(offline) = std::env::var("PSMP_OFFLINE") {
            self.offline = matches!(offline.as_str(), "1" | "true" | "yes");
        }
    }
}

fn default_policy() -> String {
    "default_local_first".to_string()
}

fn default_organization() -> String {
    "default".to_string()
}

fn default_local_model() -> String {
    "llama3".to_string()
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "local_runtime".to_string(),
        kind: ProviderKind::LocalRuntime,
        priority: None,
        endpoint: "http://127.0.0.1:11434".to_string(),
        default_model: Some(default_local_model()),
        api_key: None,
    }]
}

fn default_health_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_queue_depth() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
