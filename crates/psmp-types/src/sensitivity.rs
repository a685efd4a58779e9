//! Sensitivity taxonomy for LLM-bound tasks

use serde::{Deserialize, Serialize};

/// Ordinal sensitivity of an LLM-bound task.
///
/// The ordering drives provider routing: `Public < Internal < Sensitive <
/// Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sensitivity {
    Public,
    Internal,
    Sensitive,
    Critical,
}

impl Sensitivity {
    /// Whether routing may fall back to a lower-preference provider when
    /// the preferred one is unhealthy.
    pub fn permits_fallback(&self) -> bool {
        matches!(self, Sensitivity::Public | Sensitivity::Internal)
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sensitivity::Public => "PUBLIC",
            Sensitivity::Internal => "INTERNAL",
            Sensitivity::Sensitive => "SENSITIVE",
            Sensitivity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Where a request's data is allowed to reside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataResidency {
    Local,
    Cloud,
}

impl std::fmt::Display for DataResidency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataResidency::Local => f.write_str("local"),
            DataResidency::Cloud => f.write_str("cloud"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Sensitivity::Public < Sensitivity::Internal);
        assert!(Sensitivity::Internal < Sensitivity::Sensitive);
        assert!(Sensitivity::Sensitive < Sensitivity::Critical);
    }

    #[test]
    fn test_fallback_permission() {
        assert!(Sensitivity::Public.permits_fallback());
        assert!(Sensitivity::Internal.permits_fallback());
        assert!(!Sensitivity::Sensitive.permits_fallback());
        assert!(!Sensitivity::Critical.permits_fallback());
    }
}
