//! Deterministic task sensitivity classification

use psmp_types::Sensitivity;
use serde::{Deserialize, Serialize};

/// Agents whose work is security-bearing regardless of task type.
pub const SECURITY_REVIEWER_AGENTS: &[&str] =
    &["SecurityReviewer", "SecurityAuditor", "PenTester"];

const SENSITIVE_TASK_TYPES: &[&str] = &["code_validation", "test_critique", "notebook_generation"];

const INTERNAL_TASK_TYPES: &[&str] = &[
    "planning",
    "idea_validation",
    "data_science_design",
    "mlops_planning",
    "devops_planning",
    "conflict_resolution",
];

/// What an agent announces about the task it is about to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    /// Announcing agent
    pub agent_name: String,

    /// Kind of task, e.g. `planning` or `code_validation`
    pub task_type: String,

    /// Task touches data the organization considers sensitive
    #[serde(default)]
    pub has_sensitive_data: bool,

    /// Task touches private or personal data
    #[serde(default)]
    pub has_private_data: bool,

    /// Task is itself a security activity
    #[serde(default)]
    pub is_security_task: bool,
}

/// Classify a task. Deterministic: same context, same answer.
pub fn classify(context: &TaskContext) -> Sensitivity {
    let is_security_agent = SECURITY_REVIEWER_AGENTS
        .iter()
        .any(|agent| agent.eq_ignore_ascii_case(&context.agent_name));

    if context.has_private_data || context.is_security_task || is_security_agent {
        return Sensitivity::Critical;
    }

    let task_type = context.task_type.to_ascii_lowercase();
    if context.has_sensitive_data || SENSITIVE_TASK_TYPES.contains(&task_type.as_str()) {
        return Sensitivity::Sensitive;
    }

    if INTERNAL_TASK_TYPES.contains(&task_type.as_str()) {
        return Sensitivity::Internal;
    }

    Sensitivity::Public
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(agent: &str, task_type: &str) -> TaskContext {
        TaskContext {
            agent_name: agent.to_string(),
            task_type: task_type.to_string(),
            has_sensitive_data: false,
            has_private_data: false,
            is_security_task: false,
        }
    }

    #[test]
    fn test_private_data_is_critical() {
        let mut ctx = context("Coder", "ideation");
        ctx.has_private_data = true;
        assert_eq!(classify(&ctx), Sensitivity::Critical);
    }

    #[test]
    fn test_security_task_is_critical() {
        let mut ctx = context("Coder", "ideation");
        ctx.is_security_task = true;
        assert_eq!(classify(&ctx), Sensitivity::Critical);
    }

    #[test]
    fn test_security_reviewer_agent_is_critical() {
        assert_eq!(
            classify(&context("SecurityReviewer", "ideation")),
            Sensitivity::Critical
        );
        assert_eq!(
            classify(&context("securityreviewer", "ideation")),
            Sensitivity::Critical
        );
    }

    #[test]
    fn test_sensitive_task_types() {
        for task_type in ["code_validation", "test_critique", "notebook_generation"] {
            assert_eq!(
                classify(&context("Coder", task_type)),
                Sensitivity::Sensitive,
                "{task_type}"
            );
        }

        let mut ctx = context("Coder", "ideation");
        ctx.has_sensitive_data = true;
        assert_eq!(classify(&ctx), Sensitivity::Sensitive);
    }

    #[test]
    fn test_internal_task_types() {
        for task_type in ["planning", "conflict_resolution", "mlops_planning"] {
            assert_eq!(
                classify(&context("Planner", task_type)),
                Sensitivity::Internal,
                "{task_type}"
            );
        }
    }

    #[test]
    fn test_everything_else_is_public() {
        assert_eq!(classify(&context("Coder", "ideation")), Sensitivity::Public);
        assert_eq!(
            classify(&context("Writer", "docs_generation")),
            Sensitivity::Public
        );
    }

    #[test]
    fn test_private_data_outranks_task_type() {
        let mut ctx = context("Planner", "planning");
        ctx.has_private_data = true;
        assert_eq!(classify(&ctx), Sensitivity::Critical);
    }
}
