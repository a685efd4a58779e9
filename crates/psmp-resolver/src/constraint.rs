//! Version constraint specifiers and conjunctions

use crate::version::{ParseError, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a single specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOp {
    /// `==`, optionally with a `.*` wildcard suffix
    Eq,
    /// `!=`, optionally with a `.*` wildcard suffix
    Ne,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `<`
    Lt,
    /// `~=` compatible release
    Compatible,
}

impl ConstraintOp {
    fn symbol(&self) -> &'static str {
        match self {
            ConstraintOp::Eq => "==",
            ConstraintOp::Ne => "!=",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Gt => ">",
            ConstraintOp::Le => "<=",
            ConstraintOp::Lt => "<",
            ConstraintOp::Compatible => "~=",
        }
    }
}

/// One specifier, e.g. `>=1.0` or `==1.5.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    pub op: ConstraintOp,
    pub version: Version,
    /// `.*` suffix; only valid with `==` and `!=`
    pub wildcard: bool,
}

impl Constraint {
    /// Parse a single specifier.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = input.trim();

        // Two-char operators must be tried before their one-char prefixes.
        const OPS: &[(&str, ConstraintOp)] = &[
            ("==", ConstraintOp::Eq),
            ("!=", ConstraintOp::Ne),
            (">=", ConstraintOp::Ge),
            ("<=", ConstraintOp::Le),
            ("~=", ConstraintOp::Compatible),
            (">", ConstraintOp::Gt),
            ("<", ConstraintOp::Lt),
        ];

        let (op, version_text) = OPS
            .iter()
            .find_map(|(symbol, op)| text.strip_prefix(symbol).map(|tail| (*op, tail)))
            .ok_or_else(|| ParseError::new(input, "missing comparison operator"))?;

        let version_text = version_text.trim();
        let (version_text, wildcard) = match version_text.strip_suffix(".*") {
            Some(stripped) => (stripped, true),
            None => (version_text, false),
        };

        if wildcard && !matches!(op, ConstraintOp::Eq | ConstraintOp::Ne) {
            return Err(ParseError::new(input, "wildcard requires == or !="));
        }

        let version = Version::parse(version_text)?;
        if wildcard && !version.is_final() {
            return Err(ParseError::new(input, "wildcard on non-final version"));
        }
        if op == ConstraintOp::Compatible && version.compatible_upper().is_none() {
            return Err(ParseError::new(
                input,
                "compatible release needs at least two release segments",
            ));
        }

        Ok(Self {
            op,
            version,
            wildcard,
        })
    }

    /// Whether `candidate` satisfies this specifier.
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.op {
            ConstraintOp::Eq if self.wildcard => {
                candidate.epoch == self.version.epoch
                    && candidate.release_starts_with(&self.version.release)
            }
            ConstraintOp::Eq => candidate.cmp(&self.version).is_eq(),
            ConstraintOp::Ne if self.wildcard => {
                !(candidate.epoch == self.version.epoch
                    && candidate.release_starts_with(&self.version.release))
            }
            ConstraintOp::Ne => !candidate.cmp(&self.version).is_eq(),
            ConstraintOp::Ge => candidate >= &self.version,
            ConstraintOp::Gt => candidate > &self.version,
            ConstraintOp::Le => candidate <= &self.version,
            ConstraintOp::Lt => candidate < &self.version,
            ConstraintOp::Compatible => {
                // `~=X` is `>=X` plus the prefix family of X minus its
                // last segment.
                let upper = self
                    .version
                    .compatible_upper()
                    .unwrap_or_else(|| self.version.clone());
                candidate >= &self.version && candidate < &upper
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

/// A comma-joined conjunction of specifiers.
///
/// The empty string and `*` both parse to the unconstrained set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// The set matching every version.
    pub fn any() -> Self {
        Self {
            constraints: Vec::new(),
        }
    }

    /// Parse a constraint string.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = input.trim();
        if text.is_empty() || text == "*" {
            return Ok(Self::any());
        }

        let constraints = text
            .split(',')
            .map(Constraint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { constraints })
    }

    /// Individual specifiers, empty when unconstrained.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Whether the set places no restriction at all.
    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether `candidate` satisfies every specifier.
    pub fn matches(&self, candidate: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(candidate))
    }

    /// The exact pin of this set, if one of its specifiers is `==X`.
    pub fn exact_pin(&self) -> Option<&Version> {
        self.constraints
            .iter()
            .find(|c| c.op == ConstraintOp::Eq && !c.wildcard)
            .map(|c| &c.version)
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return f.write_str("*");
        }
        let parts = self
            .constraints
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(s: &str) -> ConstraintSet {
        ConstraintSet::parse(s).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_accepted_forms() {
        // Boundary inputs that must parse.
        for input in ["", "*", ">=0", "==1.0.0.post1", ">=1.0,<2.0,!=1.5.*", "~=1.4.2"] {
            assert!(ConstraintSet::parse(input).is_ok(), "should parse: {input}");
        }
    }

    #[test]
    fn test_parse_rejected_forms() {
        for input in [">>=1", "1..0", "==", "1.0", "~=2", ">=1.0.*"] {
            assert!(
                ConstraintSet::parse(input).is_err(),
                "should fail: {input}"
            );
        }
    }

    #[test]
    fn test_simple_matching() {
        let c = set(">=1.0,<2.0");
        assert!(c.matches(&v("1.0")));
        assert!(c.matches(&v("1.9.9")));
        assert!(!c.matches(&v("2.0")));
        assert!(!c.matches(&v("0.9")));
    }

    #[test]
    fn test_wildcard_matching() {
        let eq = set("==1.5.*");
        assert!(eq.matches(&v("1.5")));
        assert!(eq.matches(&v("1.5.9")));
        assert!(eq.matches(&v("1.5.2.post1")));
        assert!(!eq.matches(&v("1.6")));

        let ne = set("!=1.5.*");
        assert!(!ne.matches(&v("1.5.3")));
        assert!(ne.matches(&v("1.6")));
    }

    #[test]
    fn test_compatible_release() {
        let c = set("~=1.4.2");
        assert!(c.matches(&v("1.4.2")));
        assert!(c.matches(&v("1.4.9")));
        assert!(!c.matches(&v("1.5")));
        assert!(!c.matches(&v("1.4.1")));
    }

    #[test]
    fn test_conjunction_with_exclusion() {
        let c = set(">=1.0,<2.0,!=1.5.*");
        assert!(c.matches(&v("1.4")));
        assert!(!c.matches(&v("1.5.2")));
        assert!(c.matches(&v("1.6")));
    }

    #[test]
    fn test_unconstrained() {
        assert!(set("*").matches(&v("0.0.1")));
        assert!(set("").matches(&v("99.0")));
        assert!(set("").is_unconstrained());
    }

    #[test]
    fn test_exact_pin_detection() {
        assert_eq!(set("==1.5").exact_pin(), Some(&v("1.5")));
        assert_eq!(set("==1.5.*").exact_pin(), None);
        assert_eq!(set(">=1.5").exact_pin(), None);
    }

    #[test]
    fn test_display_roundtrip() {
        for input in [">=1.0,<2.0,!=1.5.*", "==1.5", "*", "~=1.4.2"] {
            assert_eq!(set(input).to_string(), input);
        }
    }
}
