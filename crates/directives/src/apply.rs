//! Insert directives into kernel source after their `L<k>` markers.

use serde::{Deserialize, Serialize};

/// Transformed source plus how many directive lines were inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSource {
    pub text: String,
    pub inserted: usize,
    /// Markers consumed, including those of points without a directive.
    pub matched: usize,
}

/// Single forward scan over `source`. For action point `k` (1-based, in
/// order) the directive is written on its own line right after the first
/// remaining line whose whitespace-stripped form contains `L<k>`. Every
/// other line is copied verbatim.
pub fn apply_directives(source: &str, directives: &[Option<&str>]) -> AppliedSource {
    let mut text = String::with_capacity(source.len() + directives.len() * 32);
    let mut next = 0usize;
    let mut inserted = 0usize;

    for line in source.split_inclusive('\n') {
        text.push_str(line);

        if next >= directives.len() {
            continue;
        }
        let stripped: String = line
            .chars()
            .filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\r'))
            .collect();
        if !stripped.contains(&format!("L{}", next + 1)) {
            continue;
        }

        if let Some(directive) = directives[next] {
            if !line.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(directive);
            text.push('\n');
            inserted += 1;
        }
        next += 1;
    }

    AppliedSource {
        text,
        inserted,
        matched: next,
    }
}

/// Convenience wrapper for a fully specified configuration.
pub fn apply_all(source: &str, directives: &[&str]) -> AppliedSource {
    let wrapped: Vec<Option<&str>> = directives.iter().copied().map(Some).collect();
    apply_directives(source, &wrapped)
}
