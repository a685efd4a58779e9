//! Concrete provider adapters

mod cloud;
mod local;

pub use cloud::CloudAggregatorProvider;
pub use local::LocalRuntimeProvider;

/// Cap error bodies copied into messages.
pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Combine system and user prompt for single-prompt APIs.
pub(crate) fn compose_prompt(prompt: &str, system_prompt: Option<&str>) -> String {
    if let Some(system) = system_prompt {
        if !system.trim().is_empty() {
            return format!("System:\n{}\n\nUser:\n{}", system.trim(), prompt.trim());
        }
    }
    prompt.trim().to_string()
}
