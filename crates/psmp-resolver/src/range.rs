//! Intersection analysis over merged constraint sets
//!
//! A [`MergedRange`] folds the specifiers of any number of constraint
//! sets into max-lower / min-upper bounds, an optional exact pin and an
//! exclusion list, and answers whether the intersection can still be
//! satisfied. The version space is treated as dense within bounds; an
//! empty intersection therefore means the bounds themselves (or a pin
//! against them) are contradictory, which is exactly the condition the
//! conflict detector cares about.

use crate::constraint::{Constraint, ConstraintOp, ConstraintSet};
use crate::version::Version;
use std::fmt;

/// An endpoint with inclusivity.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    version: Version,
    inclusive: bool,
}

/// The merged intersection of one or more constraint sets.
#[derive(Debug, Clone, Default)]
pub struct MergedRange {
    lower: Option<Endpoint>,
    upper: Option<Endpoint>,
    pin: Option<Version>,
    pin_conflict: bool,
    exclusions: Vec<Constraint>,
}

impl MergedRange {
    /// Merge every specifier of every set.
    pub fn from_sets<'a>(sets: impl IntoIterator<Item = &'a ConstraintSet>) -> Self {
        let mut merged = Self::default();
        for set in sets {
            for constraint in set.constraints() {
                merged.fold(constraint);
            }
        }
        merged
    }

    fn fold(&mut self, constraint: &Constraint) {
        match constraint.op {
            ConstraintOp::Ge => self.tighten_lower(constraint.version.clone(), true),
            ConstraintOp::Gt => self.tighten_lower(constraint.version.clone(), false),
            ConstraintOp::Le => self.tighten_upper(constraint.version.clone(), true),
            ConstraintOp::Lt => self.tighten_upper(constraint.version.clone(), false),
            ConstraintOp::Compatible => {
                self.tighten_lower(constraint.version.clone(), true);
                if let Some(upper) = constraint.version.compatible_upper() {
                    self.tighten_upper(upper, false);
                }
            }
            ConstraintOp::Eq if constraint.wildcard => {
                // `==X.*` is the half-open family [X, bump(X)).
                self.tighten_lower(Version::from_release(constraint.version.release.clone()), true);
                self.tighten_upper(Version::wildcard_upper(&constraint.version.release), false);
            }
            ConstraintOp::Eq => match &self.pin {
                Some(existing) if existing.cmp(&constraint.version).is_ne() => {
                    self.pin_conflict = true;
                }
                _ => self.pin = Some(constraint.version.clone()),
            },
            ConstraintOp::Ne => self.exclusions.push(constraint.clone()),
        }
    }

    fn tighten_lower(&mut self, version: Version, inclusive: bool) {
        let candidate = Endpoint { version, inclusive };
        let replace = match &self.lower {
            None => true,
            Some(current) => match candidate.version.cmp(&current.version) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => current.inclusive && !candidate.inclusive,
                std::cmp::Ordering::Less => false,
            },
        };
        if replace {
            self.lower = Some(candidate);
        }
    }

    fn tighten_upper(&mut self, version: Version, inclusive: bool) {
        let candidate = Endpoint { version, inclusive };
        let replace = match &self.upper {
            None => true,
            Some(current) => match candidate.version.cmp(&current.version) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => current.inclusive && !candidate.inclusive,
                std::cmp::Ordering::Greater => false,
            },
        };
        if replace {
            self.upper = Some(candidate);
        }
    }

    /// The exact pin surviving the merge, if any.
    pub fn pin(&self) -> Option<&Version> {
        if self.pin_conflict {
            None
        } else {
            self.pin.as_ref()
        }
    }

    /// Smallest version any participating set accepts, used for
    /// union-of-minimums suggestions.
    pub fn lower_version(&self) -> Option<&Version> {
        self.lower.as_ref().map(|e| &e.version)
    }

    /// Whether no version can satisfy the merged constraints.
    pub fn is_empty(&self) -> bool {
        if self.pin_conflict {
            return true;
        }

        if let Some(pin) = &self.pin {
            return !self.bounds_admit(pin) || self.is_excluded(pin);
        }

        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            match lower.version.cmp(&upper.version) {
                std::cmp::Ordering::Greater => return true,
                std::cmp::Ordering::Equal => {
                    let point = &lower.version;
                    if !(lower.inclusive && upper.inclusive) {
                        return true;
                    }
                    // Degenerate single-point range killed by an exclusion.
                    if self.is_excluded(point) {
                        return true;
                    }
                }
                std::cmp::Ordering::Less => {}
            }
        }

        // A wildcard exclusion can still blanket the whole window.
        self.wildcard_exclusion_covers_range()
    }

    fn bounds_admit(&self, candidate: &Version) -> bool {
        if let Some(lower) = &self.lower {
            let ord = candidate.cmp(&lower.version);
            if ord.is_lt() || (ord.is_eq() && !lower.inclusive) {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ord = candidate.cmp(&upper.version);
            if ord.is_gt() || (ord.is_eq() && !upper.inclusive) {
                return false;
            }
        }
        true
    }

    fn is_excluded(&self, candidate: &Version) -> bool {
        self.exclusions.iter().any(|exclusion| {
            if exclusion.wildcard {
                candidate.epoch == exclusion.version.epoch
                    && candidate.release_starts_with(&exclusion.version.release)
            } else {
                candidate.cmp(&exclusion.version).is_eq()
            }
        })
    }

    fn wildcard_exclusion_covers_range(&self) -> bool {
        let (Some(lower), Some(upper)) = (&self.lower, &self.upper) else {
            return false;
        };

        self.exclusions
            .iter()
            .filter(|e| e.wildcard)
            .any(|exclusion| {
                let family_lower = Version::from_release(exclusion.version.release.clone());
                let family_upper = Version::wildcard_upper(&exclusion.version.release);
                lower.version >= family_lower && upper.version <= family_upper
            })
    }

    /// Render the canonical merged constraint string: the pin when one
    /// exists, otherwise the surviving bounds and exclusions, `*` when
    /// nothing restricts the library.
    pub fn render(&self) -> String {
        if let Some(pin) = self.pin() {
            return format!("=={}", pin);
        }

        let mut parts = Vec::new();
        if let Some(lower) = &self.lower {
            let symbol = if lower.inclusive { ">=" } else { ">" };
            parts.push(format!("{}{}", symbol, lower.version));
        }
        if let Some(upper) = &self.upper {
            let symbol = if upper.inclusive { "<=" } else { "<" };
            parts.push(format!("{}{}", symbol, upper.version));
        }
        for exclusion in &self.exclusions {
            parts.push(exclusion.to_string());
        }

        if parts.is_empty() {
            "*".to_string()
        } else {
            parts.join(",")
        }
    }
}

impl fmt::Display for MergedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(inputs: &[&str]) -> MergedRange {
        let sets: Vec<ConstraintSet> = inputs
            .iter()
            .map(|s| ConstraintSet::parse(s).unwrap())
            .collect();
        MergedRange::from_sets(&sets)
    }

    #[test]
    fn test_compatible_lowers_merge() {
        // >=1.0 and >=2.0 intersect to >=2.0.
        let range = merged(&[">=1.0", ">=2.0"]);
        assert!(!range.is_empty());
        assert_eq!(range.render(), ">=2.0");
    }

    #[test]
    fn test_bounded_window_intersection() {
        let range = merged(&[">=0.100", ">=0.100,<0.120"]);
        assert!(!range.is_empty());
        assert_eq!(range.render(), ">=0.100,<0.120");
    }

    #[test]
    fn test_pin_outside_window_is_empty() {
        // ==0.90 against >=0.100,<0.120.
        let range = merged(&["==0.90", ">=0.100,<0.120"]);
        assert!(range.is_empty());
    }

    #[test]
    fn test_wildcard_pin_against_floor_is_empty() {
        // >=2.0 and ==1.5.* cannot both hold.
        let range = merged(&[">=2.0", "==1.5.*"]);
        assert!(range.is_empty());
    }

    #[test]
    fn test_contradictory_bounds() {
        assert!(merged(&[">=2.0", "<1.0"]).is_empty());
        assert!(merged(&[">1.0", "<=1.0"]).is_empty());
        assert!(!merged(&[">=1.0", "<=1.0"]).is_empty());
    }

    #[test]
    fn test_distinct_pins_are_empty() {
        assert!(merged(&["==1.0", "==1.1"]).is_empty());
        assert!(!merged(&["==1.0", "==1.0"]).is_empty());
    }

    #[test]
    fn test_pin_killed_by_exclusion() {
        assert!(merged(&["==1.5", "!=1.5"]).is_empty());
        assert!(merged(&["==1.5.2", "!=1.5.*"]).is_empty());
        assert!(!merged(&["==1.6", "!=1.5.*"]).is_empty());
    }

    #[test]
    fn test_wildcard_exclusion_covering_window() {
        assert!(merged(&[">=1.5,<1.6", "!=1.5.*"]).is_empty());
        assert!(!merged(&[">=1.5,<2.0", "!=1.5.*"]).is_empty());
    }

    #[test]
    fn test_pin_inside_window_survives() {
        let range = merged(&["==0.115", ">=0.100,<0.120"]);
        assert!(!range.is_empty());
        assert_eq!(range.render(), "==0.115");
    }

    #[test]
    fn test_unconstrained_renders_star() {
        assert_eq!(merged(&["*", ""]).render(), "*");
    }
}
