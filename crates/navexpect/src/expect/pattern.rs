//! Pattern types for expect operations.
//!
//! A pattern is either a literal substring or a regular expression, matched
//! against raw output bytes so match offsets line up with the buffer exactly.

use regex::bytes::Regex;
use std::fmt;

/// A pattern that can be matched against process output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact string.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
        }
    }

    /// Check if this pattern matches the given output.
    ///
    /// Returns the leftmost match position if successful.
    #[must_use]
    pub fn matches(&self, text: &[u8]) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => find_bytes(text, s.as_bytes()).map(|pos| PatternMatch {
                start: pos,
                end: pos + s.len(),
            }),
            Self::Regex(r) => r.find(text).map(|m| PatternMatch {
                start: m.start(),
                end: m.end(),
            }),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the first match in the text.
    #[must_use]
    pub fn find<'a>(&self, text: &'a [u8]) -> Option<regex::bytes::Match<'a>> {
        self.regex.find(text)
    }
}

/// Result of a successful pattern match.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Start position of the match in the text.
    pub start: usize,
    /// End position of the match in the text.
    pub end: usize,
}

impl PatternMatch {
    /// Get the length of the match.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the match is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An ordered set of patterns.
///
/// Order is priority: when several patterns match the same output, the one
/// listed first wins regardless of where in the output it matched.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Create a new empty pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pattern set from a vector of patterns.
    #[must_use]
    pub const fn from_patterns(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// Add a pattern to the set.
    pub fn add(&mut self, pattern: impl Into<Pattern>) -> &mut Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Get the number of patterns in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Find the highest-priority matching pattern in the text.
    ///
    /// Returns the pattern index and match details.
    #[must_use]
    pub fn find_match(&self, text: &[u8]) -> Option<(usize, PatternMatch)> {
        self.patterns
            .iter()
            .enumerate()
            .find_map(|(idx, pattern)| pattern.matches(text).map(|m| (idx, m)))
    }

    /// Get a pattern by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    /// Get iterator over patterns.
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// Human-readable list of the patterns, for logs and failure reports.
    #[must_use]
    pub fn describe(&self) -> String {
        self.patterns
            .iter()
            .map(|p| format!("'{}'", p.as_str()))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl From<Pattern> for PatternSet {
    fn from(pattern: Pattern) -> Self {
        Self::from_patterns(vec![pattern])
    }
}

impl FromIterator<Pattern> for PatternSet {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        Self::from_patterns(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches() {
        let pattern = Pattern::literal("hello");
        let m = pattern.matches(b"say hello world").unwrap();
        assert_eq!(m.start, 4);
        assert_eq!(m.end, 9);
    }

    #[test]
    fn regex_pattern_matches() {
        let pattern = Pattern::regex(r"\d+ rule\(s\) were added").unwrap();
        let m = pattern.matches(b"ok\n1 rule(s) were added\n").unwrap();
        assert_eq!(m.start, 3);
    }

    #[test]
    fn regex_pattern_spans_whole_match() {
        let pattern = Pattern::regex(r"(\d+) rule\(s\) were (\w+)").unwrap();
        let m = pattern.matches(b"ok 2 rule(s) were deleted\n").unwrap();
        assert_eq!((m.start, m.end), (3, 25));
    }

    #[test]
    fn pattern_set_first_listed_wins() {
        let mut set = PatternSet::new();
        set.add("world").add("hello");

        // "hello" appears earlier in the text, but "world" is listed first.
        let (idx, m) = set.find_match(b"hello world").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(m.start, 6);
    }

    #[test]
    fn pattern_set_skips_non_matching() {
        let set: PatternSet = [Pattern::literal("ERROR:"), Pattern::literal("Done.")]
            .into_iter()
            .collect();
        let (idx, _) = set.find_match(b"moving files... Done.").unwrap();
        assert_eq!(idx, 1);
        assert!(set.find_match(b"nothing here").is_none());
    }

    #[test]
    fn empty_set_never_matches() {
        assert!(PatternSet::new().find_match(b"anything").is_none());
    }

    #[test]
    fn describe_lists_patterns() {
        let set: PatternSet = [Pattern::literal("a"), Pattern::regex("b+").unwrap()]
            .into_iter()
            .collect();
        assert_eq!(set.describe(), "'a' | 'b+'");
    }
}
