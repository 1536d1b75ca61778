//! Value operators shared by the host, path, header and query matchers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Operator over a single request value, as written in configuration.
///
/// Read as a single-key map (`starts_with: /api`) inside [`MatchConfig`](super::MatchConfig).
/// Deserializing one on its own through serde_yaml needs
/// `serde_yaml::with::singleton_map`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StringMatcher {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    /// Regex pattern; case sensitivity belongs in the pattern itself
    Matches(String),
    /// Whether the field should be present at all
    Exists(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Whole,
    Anywhere,
    Prefix,
    Suffix,
}

/// Literal pattern, lowercased once up front for case-insensitive use.
#[derive(Debug, Clone)]
pub struct Literal {
    comparison: Comparison,
    pattern: String,
    folded: String,
}

impl Literal {
    fn new(comparison: Comparison, pattern: &str) -> Self {
        Literal {
            comparison,
            pattern: pattern.to_string(),
            folded: pattern.to_lowercase(),
        }
    }

    pub fn test(&self, candidate: &str, case_sensitive: bool) -> bool {
        let lowered;
        let (haystack, needle) = if case_sensitive {
            (candidate, self.pattern.as_str())
        } else {
            lowered = candidate.to_lowercase();
            (lowered.as_str(), self.folded.as_str())
        };
        match self.comparison {
            Comparison::Whole => haystack == needle,
            Comparison::Anywhere => haystack.contains(needle),
            Comparison::Prefix => haystack.starts_with(needle),
            Comparison::Suffix => haystack.ends_with(needle),
        }
    }
}

/// Ready-to-evaluate form of a [`StringMatcher`].
#[derive(Debug, Clone)]
pub enum ValuePattern {
    Literal(Literal),
    Regex(Arc<Regex>),
    Presence(bool),
}

impl ValuePattern {
    pub fn compile(matcher: &StringMatcher) -> Result<Self, regex::Error> {
        let literal =
            |comparison, pattern: &str| ValuePattern::Literal(Literal::new(comparison, pattern));
        Ok(match matcher {
            StringMatcher::Equals(p) => literal(Comparison::Whole, p),
            StringMatcher::Contains(p) => literal(Comparison::Anywhere, p),
            StringMatcher::StartsWith(p) => literal(Comparison::Prefix, p),
            StringMatcher::EndsWith(p) => literal(Comparison::Suffix, p),
            StringMatcher::Matches(p) => ValuePattern::Regex(Arc::new(Regex::new(p)?)),
            StringMatcher::Exists(present) => ValuePattern::Presence(*present),
        })
    }

    /// Whole-value equality.
    pub fn exact(pattern: &str) -> Self {
        ValuePattern::Literal(Literal::new(Comparison::Whole, pattern))
    }

    /// `value` is `None` when the field is absent from the request.
    pub fn matches(&self, value: Option<&str>, case_sensitive: bool) -> bool {
        match (self, value) {
            (ValuePattern::Presence(expected), v) => *expected == v.is_some(),
            (ValuePattern::Literal(literal), Some(v)) => literal.test(v, case_sensitive),
            (ValuePattern::Regex(regex), Some(v)) => regex.is_match(v),
            (_, None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(m: StringMatcher) -> ValuePattern {
        ValuePattern::compile(&m).unwrap()
    }

    #[test]
    fn test_equals_case_sensitivity() {
        let m = pattern(StringMatcher::Equals("/Login".to_string()));
        assert!(m.matches(Some("/Login"), true));
        assert!(!m.matches(Some("/login"), true));
        assert!(m.matches(Some("/login"), false));
        assert!(!m.matches(None, false));
    }

    #[test]
    fn test_prefix_suffix_contains() {
        assert!(pattern(StringMatcher::StartsWith("/api".into())).matches(Some("/api/v1"), true));
        assert!(pattern(StringMatcher::EndsWith(".json".into())).matches(Some("/a.json"), true));
        assert!(pattern(StringMatcher::Contains("Users".into())).matches(Some("/v1/users/2"), false));
        assert!(!pattern(StringMatcher::Contains("Users".into())).matches(Some("/v1/users/2"), true));
    }

    #[test]
    fn test_regex_and_presence() {
        let m = pattern(StringMatcher::Matches(r"^/users/\d+$".into()));
        assert!(m.matches(Some("/users/42"), true));
        assert!(!m.matches(Some("/users/me"), true));

        assert!(pattern(StringMatcher::Exists(true)).matches(Some(""), true));
        assert!(pattern(StringMatcher::Exists(false)).matches(None, true));
        assert!(!pattern(StringMatcher::Exists(false)).matches(Some("x"), true));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(ValuePattern::compile(&StringMatcher::Matches("(".into())).is_err());
    }

    #[test]
    fn test_yaml_operator_names() {
        let de = serde_yaml::Deserializer::from_str("starts_with: /login");
        let m: StringMatcher = serde_yaml::with::singleton_map::deserialize(de).unwrap();
        assert_eq!(m, StringMatcher::StartsWith("/login".to_string()));

        // Nested in a match block the operator is a plain single-key map
        let value: crate::matchers::ValueMatch =
            serde_yaml::from_str("{ ends_with: .png }").unwrap();
        assert_eq!(
            value,
            crate::matchers::ValueMatch::Operator(StringMatcher::EndsWith(".png".to_string()))
        );
    }
}
