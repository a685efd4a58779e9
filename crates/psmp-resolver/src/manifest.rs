//! Unified dependency manifest rendering and parsing
//!
//! One line per `(library, constraint, scope)` sorted by scope then
//! library, with scope header comments. `render` and `parse` are inverse
//! on well-formed manifests.

use crate::constraint::ConstraintSet;
use crate::version::ParseError;
use psmp_types::DependencyScope;
use thiserror::Error;

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Library name
    pub library: String,

    /// Merged constraint string; `*` for unconstrained
    pub constraint: String,

    /// Scope section the entry belongs to
    pub scope: DependencyScope,
}

/// Manifest parse failures.
#[derive(Debug, Error)]
pub enum ManifestParseError {
    #[error("line {line}: entry before any scope header")]
    EntryOutsideSection { line: usize },

    #[error("line {line}: unknown scope header '{header}'")]
    UnknownHeader { line: usize, header: String },

    #[error("line {line}: {source}")]
    BadConstraint {
        line: usize,
        #[source]
        source: ParseError,
    },
}

const SCOPE_ORDER: [DependencyScope; 3] = [
    DependencyScope::Runtime,
    DependencyScope::Dev,
    DependencyScope::Build,
];

/// Render entries as manifest text.
pub fn render_manifest(entries: &[ManifestEntry]) -> String {
    let mut sorted: Vec<&ManifestEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.scope.cmp(&b.scope).then_with(|| a.library.cmp(&b.library)));

    let mut out = String::new();
    for scope in SCOPE_ORDER {
        let section: Vec<_> = sorted.iter().filter(|e| e.scope == scope).collect();
        if section.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(scope.manifest_header());
        out.push('\n');
        for entry in section {
            if entry.constraint == "*" {
                out.push_str(&entry.library);
            } else {
                out.push_str(&format!("{}{}", entry.library, entry.constraint));
            }
            out.push('\n');
        }
    }
    out
}

/// Parse manifest text back into entries.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestEntry>, ManifestParseError> {
    let mut entries = Vec::new();
    let mut scope: Option<DependencyScope> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        let line_no = index + 1;
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('#') {
            scope = Some(match header.trim() {
                "runtime" => DependencyScope::Runtime,
                "dev" => DependencyScope::Dev,
                "build" => DependencyScope::Build,
                other => {
                    return Err(ManifestParseError::UnknownHeader {
                        line: line_no,
                        header: other.to_string(),
                    })
                }
            });
            continue;
        }

        let scope = scope.ok_or(ManifestParseError::EntryOutsideSection { line: line_no })?;

        let split = line
            .find(|c| ['=', '!', '>', '<', '~'].contains(&c))
            .unwrap_or(line.len());
        let (library, constraint) = line.split_at(split);
        let constraint = if constraint.is_empty() { "*" } else { constraint };

        // Validate so malformed manifests fail loudly on read.
        ConstraintSet::parse(constraint).map_err(|source| ManifestParseError::BadConstraint {
            line: line_no,
            source,
        })?;

        entries.push(ManifestEntry {
            library: library.trim().to_string(),
            constraint: constraint.to_string(),
            scope,
        });
    }

    Ok(entries)
}
