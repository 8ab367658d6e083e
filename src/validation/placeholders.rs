// src/validation/placeholders.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::validation::outcome::L0Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    DoubleBrace,
    AngleBracket,
    Todo,
    Fixme,
    Xxx,
}

impl PlaceholderKind {
    /// Template placeholders block validation; marker comments are informational.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::DoubleBrace | Self::AngleBracket)
    }

    fn marker_label(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::Fixme => "FIXME",
            Self::Xxx => "XXX",
            Self::DoubleBrace | Self::AngleBracket => "PLACEHOLDER",
        }
    }
}

static PATTERNS: LazyLock<Vec<(Regex, PlaceholderKind)>> = LazyLock::new(|| {
    [
        (r"\{\{[A-Z_][A-Z0-9_]*\}\}", PlaceholderKind::DoubleBrace),
        (r"<[A-Z_][A-Z0-9_]*>", PlaceholderKind::AngleBracket),
        (r"(?i)\bTODO:\s*.+", PlaceholderKind::Todo),
        (r"(?i)\bFIXME:\s*.+", PlaceholderKind::Fixme),
        (r"(?i)\bXXX:\s*.+", PlaceholderKind::Xxx),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("placeholder regex"), kind))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderHit {
    pub text: String,
    pub kind: PlaceholderKind,
    pub line_number: usize,
}

/// Finds every placeholder and marker, comments included.
pub fn find_placeholders(content: &str) -> Vec<PlaceholderHit> {
    let mut hits = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        for (pattern, kind) in PATTERNS.iter() {
            for m in pattern.find_iter(line) {
                hits.push(PlaceholderHit {
                    text: m.as_str().to_string(),
                    kind: *kind,
                    line_number: idx + 1,
                });
            }
        }
    }
    hits
}

pub fn validate_l0(content: &str) -> L0Outcome {
    let (blocking, markers): (Vec<_>, Vec<_>) = find_placeholders(content)
        .into_iter()
        .partition(|hit| hit.kind.is_blocking());

    let mut placeholders_found = Vec::with_capacity(blocking.len() + markers.len());
    let mut details = Vec::with_capacity(blocking.len() + markers.len());

    for hit in &blocking {
        placeholders_found.push(hit.text.clone());
        details.push(format!(
            "Line {}: Unresolved placeholder {}",
            hit.line_number, hit.text
        ));
    }
    for hit in &markers {
        placeholders_found.push(hit.text.clone());
        details.push(format!(
            "Line {}: {} marker found: {}",
            hit.line_number,
            hit.kind.marker_label(),
            hit.text
        ));
    }

    L0Outcome {
        passed: blocking.is_empty(),
        placeholders_found,
        unresolved_count: blocking.len(),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::{PATTERNS, PlaceholderKind, find_placeholders, validate_l0};

    #[test]
    fn every_placeholder_pattern_compiles() {
        assert_eq!(PATTERNS.len(), 5);
    }

    #[test]
    fn double_brace_placeholder_blocks() {
        let outcome = validate_l0("units lj\ntimestep {{TS}}");
        assert!(!outcome.passed);
        assert_eq!(outcome.unresolved_count, 1);
        assert!(outcome.placeholders_found.contains(&"{{TS}}".to_string()));
        assert_eq!(outcome.details, vec!["Line 2: Unresolved placeholder {{TS}}"]);
    }

    #[test]
    fn angle_bracket_placeholder_blocks() {
        let outcome = validate_l0("read_data <DATA_FILE>\n");
        assert!(!outcome.passed);
        assert_eq!(outcome.unresolved_count, 1);
        assert_eq!(outcome.placeholders_found, vec!["<DATA_FILE>"]);
    }

    #[test]
    fn lowercase_angle_brackets_are_not_placeholders() {
        let outcome = validate_l0("variable a equal v_x<v_y\nprint \"<name>\"\n");
        assert!(outcome.passed);
        assert!(outcome.placeholders_found.is_empty());
    }

    #[test]
    fn markers_are_reported_but_never_block() {
        let deck = "# TODO: tune damping\nunits real # fixme: check\n# XXX: temporary\n";
        let outcome = validate_l0(deck);
        assert!(outcome.passed);
        assert_eq!(outcome.unresolved_count, 0);
        assert_eq!(outcome.placeholders_found.len(), 3);
        assert_eq!(outcome.details[0], "Line 1: TODO marker found: TODO: tune damping");
        assert!(outcome.details[1].starts_with("Line 2: FIXME marker found:"));
    }

    #[test]
    fn blocking_hits_are_listed_before_markers() {
        let deck = "# TODO: later\nvelocity all create {{T}} 4928459\n";
        let outcome = validate_l0(deck);
        assert_eq!(outcome.placeholders_found[0], "{{T}}");
        assert!(outcome.placeholders_found[1].starts_with("TODO:"));
    }

    #[test]
    fn every_occurrence_on_a_line_is_found() {
        let hits = find_placeholders("region box block {{XLO}} {{XHI}} 0 1 0 1");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.kind == PlaceholderKind::DoubleBrace));
        assert!(hits.iter().all(|h| h.line_number == 1));
    }
}
