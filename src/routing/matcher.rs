//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse `/literal/:variable` templates into segments
//! - Compare a pattern against a split input path
//! - Score the match and capture variable values
//!
//! # Design Decisions
//! - Comparison runs over the leading segments the shorter side has
//! - A literal mismatch anywhere in that prefix rejects the pattern
//! - No regex, O(segments) per pattern

use std::collections::HashMap;

/// Marker that introduces a variable segment.
pub const VAR_MARKER: char = ':';

/// One `/`-delimited piece of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Var(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix(VAR_MARKER) {
            Some(name) => Segment::Var(name.to_string()),
            None => Segment::Literal(raw.to_string()),
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Segment::Var(_))
    }
}

/// Result of comparing one pattern against an input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Number of leading segments compared.
    pub score: usize,
    /// Variables inside the compared prefix.
    pub var_count: usize,
    pub params: HashMap<String, String>,
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let segments = split_path(&raw).into_iter().map(Segment::parse).collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn var_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_var()).count()
    }

    /// Index of the first variable segment, if any.
    pub fn first_var_position(&self) -> Option<usize> {
        self.segments.iter().position(Segment::is_var)
    }

    pub fn is_static(&self) -> bool {
        self.first_var_position().is_none()
    }

    /// Compare against already split input segments.
    ///
    /// Returns `None` on any literal mismatch, or when nothing was compared.
    pub fn match_segments(&self, input: &[&str]) -> Option<PatternMatch> {
        let mut params = HashMap::new();
        let mut score = 0;
        let mut var_count = 0;

        for (segment, value) in self.segments.iter().zip(input) {
            match segment {
                Segment::Var(name) => {
                    params.insert(name.clone(), (*value).to_string());
                    var_count += 1;
                }
                Segment::Literal(literal) if literal == value => {}
                Segment::Literal(_) => return None,
            }
            score += 1;
        }

        if score == 0 {
            return None;
        }

        Some(PatternMatch {
            score,
            var_count,
            params,
        })
    }
}

/// Split a path on `/`, skipping the leading separator.
///
/// A trailing separator yields an empty last segment, so `/a/` and `/a`
/// are different paths, and `/` is one empty segment. Only `""` has none.
pub fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.strip_prefix('/').unwrap_or(path).split('/').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        let pattern = PathPattern::parse("/users/:id/orders");
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("users".into()),
                Segment::Var("id".into()),
                Segment::Literal("orders".into()),
            ]
        );
        assert_eq!(pattern.var_count(), 1);
        assert_eq!(pattern.first_var_position(), Some(1));
        assert!(!pattern.is_static());
    }

    #[test]
    fn test_match_captures_variables() {
        let pattern = PathPattern::parse("/users/:id/orders/:order");
        let m = pattern
            .match_segments(&split_path("/users/42/orders/7"))
            .unwrap();
        assert_eq!(m.score, 4);
        assert_eq!(m.var_count, 2);
        assert_eq!(m.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(m.params.get("order").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_literal_mismatch_rejects() {
        let pattern = PathPattern::parse("/users/:id");
        assert!(pattern.match_segments(&split_path("/orders/1")).is_none());
    }

    #[test]
    fn test_shorter_side_bounds_comparison() {
        let pattern = PathPattern::parse("/users/:id/orders");
        let m = pattern.match_segments(&split_path("/users/5")).unwrap();
        assert_eq!(m.score, 2);
        assert_eq!(m.var_count, 1);

        let m = pattern
            .match_segments(&split_path("/users/5/orders/9/items"))
            .unwrap();
        assert_eq!(m.score, 3);
    }

    #[test]
    fn test_empty_input_never_matches() {
        let pattern = PathPattern::parse("/users");
        assert!(pattern.match_segments(&split_path("/")).is_none());
        assert!(pattern.match_segments(&split_path("")).is_none());
    }

    #[test]
    fn test_root_binds_empty_variable() {
        assert_eq!(split_path("/"), vec![""]);
        let m = PathPattern::parse("/:slug").match_segments(&split_path("/")).unwrap();
        assert_eq!(m.score, 1);
        assert_eq!(m.params.get("slug").map(String::as_str), Some(""));
    }
}
