//! Library-scoped conflict detection
//!
//! Declarations are grouped by `(scope, library)`; an empty constraint
//! intersection within a group is critical, a surviving exact pin next to
//! differing range constraints is a warning, and disagreements that only
//! span scopes (runtime vs dev) warn without blocking.

use crate::constraint::ConstraintSet;
use crate::range::MergedRange;
use chrono::{DateTime, Utc};
use psmp_types::{ConflictRequirement, ConflictSeverity, DependencyConflict, DependencyScope};
use std::collections::BTreeMap;

/// One agent's dependency declaration, ready for analysis.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Library name as declared
    pub library: String,

    /// Raw constraint string
    pub constraint: String,

    /// Parsed form of `constraint`
    pub parsed: ConstraintSet,

    /// Declaring scope
    pub scope: DependencyScope,

    /// Declaring agent
    pub agent: String,

    /// Declared purpose
    pub purpose: String,

    /// When the owning artifact was declared
    pub declared_at: DateTime<Utc>,
}

/// Detect all conflicts across a project's live declarations.
pub fn detect_conflicts(declarations: &[Declaration]) -> Vec<DependencyConflict> {
    let mut conflicts = Vec::new();

    let mut by_scope: BTreeMap<(DependencyScope, String), Vec<&Declaration>> = BTreeMap::new();
    for declaration in declarations {
        by_scope
            .entry((declaration.scope, declaration.library.to_ascii_lowercase()))
            .or_default()
            .push(declaration);
    }

    for ((_, library), group) in &by_scope {
        if group.len() < 2 {
            continue;
        }
        if let Some(conflict) = analyze_group(library, group, false) {
            conflicts.push(conflict);
        }
    }

    // Cross-scope disagreements (runtime vs dev vs build) warn only.
    let mut by_library: BTreeMap<String, Vec<&Declaration>> = BTreeMap::new();
    for declaration in declarations {
        by_library
            .entry(declaration.library.to_ascii_lowercase())
            .or_default()
            .push(declaration);
    }

    for (library, group) in &by_library {
        let scopes: std::collections::BTreeSet<_> = group.iter().map(|d| d.scope).collect();
        if scopes.len() < 2 {
            continue;
        }
        // Skip libraries already conflicting within a single scope; the
        // scoped finding carries the useful severity.
        if conflicts.iter().any(|c| c.library.eq_ignore_ascii_case(library)) {
            continue;
        }
        if let Some(conflict) = analyze_group(library, group, true) {
            conflicts.push(conflict);
        }
    }

    conflicts
}

fn analyze_group(
    library: &str,
    group: &[&Declaration],
    cross_scope: bool,
) -> Option<DependencyConflict> {
    let merged = MergedRange::from_sets(group.iter().map(|d| &d.parsed));
    let most_recent = group.iter().max_by_key(|d| d.declared_at)?;

    let severity = if merged.is_empty() {
        if cross_scope {
            ConflictSeverity::Warning
        } else {
            ConflictSeverity::Critical
        }
    } else if has_pin_tension(group) {
        ConflictSeverity::Warning
    } else {
        return None;
    };

    let requirements = group
        .iter()
        .map(|d| ConflictRequirement {
            agent: d.agent.clone(),
            needs: d.constraint.clone(),
            purpose: d.purpose.clone(),
        })
        .collect();

    Some(DependencyConflict {
        library: library.to_string(),
        requirements,
        severity,
        suggested_resolutions: suggest_resolutions(library, group, most_recent, severity),
    })
}

// An exact pin next to differing non-pin constraints: satisfiable today,
// but one bump away from not being.
fn has_pin_tension(group: &[&Declaration]) -> bool {
    let pins: Vec<_> = group
        .iter()
        .filter(|d| d.parsed.exact_pin().is_some())
        .collect();
    if pins.is_empty() {
        return false;
    }
    group.iter().any(|d| {
        d.parsed.exact_pin().is_none()
            && !d.parsed.is_unconstrained()
            && pins.iter().all(|p| p.constraint != d.constraint)
    })
}

fn suggest_resolutions(
    library: &str,
    group: &[&Declaration],
    most_recent: &Declaration,
    severity: ConflictSeverity,
) -> Vec<String> {
    if severity == ConflictSeverity::Warning {
        return vec![
            format!(
                "Standardize on '{}' declared by {} (most recent declaration)",
                most_recent.constraint, most_recent.agent
            ),
            format!("Align every range on the pinned version of '{}'", library),
        ];
    }

    let union_minimum = group
        .iter()
        .filter_map(|d| {
            let merged = MergedRange::from_sets(std::iter::once(&d.parsed));
            merged.lower_version().cloned().or_else(|| {
                d.parsed.exact_pin().cloned()
            })
        })
        .min();

    let mut suggestions = Vec::new();
    if let Some(minimum) = union_minimum {
        suggestions.push(format!(
            "Relax all declarations of '{}' to '>={}' (union of declared minimums)",
            library, minimum
        ));
    }
    suggestions.push(format!(
        "Standardize on '{}' declared by {} (most recent declaration)",
        most_recent.constraint, most_recent.agent
    ));
    suggestions.push(format!(
        "Isolate '{}' in a separate environment per consumer",
        library
    ));
    suggestions.push(format!(
        "Introduce a compatibility shim decoupling consumers from '{}'",
        library
    ));
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn declaration(
        library: &str,
        constraint: &str,
        scope: DependencyScope,
        agent: &str,
        age_minutes: i64,
    ) -> Declaration {
        Declaration {
            library: library.to_string(),
            constraint: constraint.to_string(),
            parsed: ConstraintSet::parse(constraint).unwrap(),
            scope,
            agent: agent.to_string(),
            purpose: format!("{} needs {}", agent, library),
            declared_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn test_compatible_declarations_do_not_conflict() {
        let decls = vec![
            declaration("fastapi", ">=0.100", DependencyScope::Runtime, "Coder", 10),
            declaration(
                "fastapi",
                ">=0.100,<0.120",
                DependencyScope::Runtime,
                "DataSci",
                5,
            ),
        ];
        assert!(detect_conflicts(&decls).is_empty());
    }

    #[test]
    fn test_empty_intersection_is_critical() {
        let decls = vec![
            declaration("fastapi", ">=0.100", DependencyScope::Runtime, "Coder", 10),
            declaration(
                "fastapi",
                ">=0.100,<0.120",
                DependencyScope::Runtime,
                "DataSci",
                5,
            ),
            declaration("fastapi", "==0.90", DependencyScope::Runtime, "Notebook", 1),
        ];

        let conflicts = detect_conflicts(&decls);
        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.severity, ConflictSeverity::Critical);
        assert_eq!(conflict.requirements.len(), 3);
        assert_eq!(conflict.suggested_resolutions.len(), 4);
        // Most recent declaration wins the standardize suggestion.
        assert!(conflict.suggested_resolutions[1].contains("Notebook"));
    }

    #[test]
    fn test_wildcard_pin_against_floor_is_critical() {
        let decls = vec![
            declaration("numpy", ">=2.0", DependencyScope::Runtime, "Coder", 2),
            declaration("numpy", "==1.5.*", DependencyScope::Runtime, "DataSci", 1),
        ];

        let conflicts = detect_conflicts(&decls);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Critical);
    }

    #[test]
    fn test_surviving_pin_with_ranges_warns() {
        let decls = vec![
            declaration("pydantic", "==2.5.0", DependencyScope::Runtime, "Coder", 3),
            declaration("pydantic", ">=2.0", DependencyScope::Runtime, "Planner", 1),
        ];

        let conflicts = detect_conflicts(&decls);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Warning);
    }

    #[test]
    fn test_cross_scope_disagreement_warns_only() {
        let decls = vec![
            declaration("pytest", "==7.0", DependencyScope::Dev, "Tester", 3),
            declaration("pytest", ">=8.0", DependencyScope::Runtime, "Coder", 1),
        ];

        let conflicts = detect_conflicts(&decls);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Warning);
    }

    #[test]
    fn test_single_declaration_never_conflicts() {
        let decls = vec![declaration(
            "fastapi",
            "==0.90",
            DependencyScope::Runtime,
            "Coder",
            1,
        )];
        assert!(detect_conflicts(&decls).is_empty());
    }

    #[test]
    fn test_library_names_case_insensitive() {
        let decls = vec![
            declaration("FastAPI", "==1.0", DependencyScope::Runtime, "Coder", 2),
            declaration("fastapi", "==2.0", DependencyScope::Runtime, "DataSci", 1),
        ];
        let conflicts = detect_conflicts(&decls);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Critical);
    }
}
