//! Cloud-to-local model mapping

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps cloud model names onto locally-served equivalents.
///
/// When a requested model is not served by the selected provider, the
/// gateway translates it through this map; if it is still unknown, the
/// default local model substitutes and the substitution is visible in
/// the response's `model` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMap {
    /// `cloud_model_name -> local_model_name`
    #[serde(default)]
    mappings: HashMap<String, String>,

    /// Fallback local model
    default_local_model: String,
}

impl ModelMap {
    /// Create a map with a default local model.
    pub fn new(default_local_model: impl Into<String>) -> Self {
        Self {
            mappings: HashMap::new(),
            default_local_model: default_local_model.into(),
        }
    }

    /// Create from explicit mappings.
    pub fn with_mappings(
        default_local_model: impl Into<String>,
        mappings: HashMap<String, String>,
    ) -> Self {
        Self {
            mappings,
            default_local_model: default_local_model.into(),
        }
    }

    /// Direct translation, if one is configured.
    pub fn translate(&self, model: &str) -> Option<&str> {
        self.mappings.get(model).map(String::as_str)
    }

    /// The fallback model.
    pub fn default_local_model(&self) -> &str {
        &self.default_local_model
    }

    /// Resolve a requested model for a provider: the model itself when
    /// served, its mapped equivalent when that is served, the default
    /// otherwise.
    pub fn resolve(&self, requested: &str, serves: impl Fn(&str) -> bool) -> String {
        if serves(requested) {
            return requested.to_string();
        }
        if let Some(mapped) = self.translate(requested) {
            if serves(mapped) {
                return mapped.to_string();
            }
        }
        self.default_local_model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> ModelMap {
        ModelMap::with_mappings(
            "llama3",
            HashMap::from([
                ("gpt-4o".to_string(), "llama3:70b".to_string()),
                ("claude-sonnet".to_string(), "qwen2".to_string()),
            ]),
        )
    }

    #[test]
    fn test_served_model_passes_through() {
        let resolved = map().resolve("llama3:70b", |m| m == "llama3:70b");
        assert_eq!(resolved, "llama3:70b");
    }

    #[test]
    fn test_cloud_name_translates() {
        let resolved = map().resolve("gpt-4o", |m| m == "llama3:70b");
        assert_eq!(resolved, "llama3:70b");
    }

    #[test]
    fn test_unknown_model_substitutes_default() {
        let resolved = map().resolve("mystery-model", |_| false);
        assert_eq!(resolved, "llama3");
    }
}
