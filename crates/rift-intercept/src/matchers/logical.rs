//! Combinators over other matchers.

use super::RequestMatcher;
use crate::request::InterceptedRequest;

/// Matches when every inner matcher matches. Empty matches everything.
pub struct All(Vec<Box<dyn RequestMatcher>>);

/// Matches when at least one inner matcher matches. Empty matches nothing.
pub struct Any(Vec<Box<dyn RequestMatcher>>);

/// Inverts a matcher.
pub struct Not(Box<dyn RequestMatcher>);

pub fn all(matchers: Vec<Box<dyn RequestMatcher>>) -> All {
    All(matchers)
}

pub fn any(matchers: Vec<Box<dyn RequestMatcher>>) -> Any {
    Any(matchers)
}

pub fn not(matcher: impl RequestMatcher + 'static) -> Not {
    Not(Box::new(matcher))
}

impl RequestMatcher for All {
    fn matches(&self, request: &InterceptedRequest) -> bool {
        self.0.iter().all(|m| m.matches(request))
    }
}

impl RequestMatcher for Any {
    fn matches(&self, request: &InterceptedRequest) -> bool {
        self.0.iter().any(|m| m.matches(request))
    }
}

impl RequestMatcher for Not {
    fn matches(&self, request: &InterceptedRequest) -> bool {
        !self.0.matches(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{is_method, path_starts_with};

    fn get(uri: &str) -> InterceptedRequest {
        InterceptedRequest::parse("GET", uri).unwrap()
    }

    #[test]
    fn test_all() {
        let m = all(vec![
            Box::new(is_method("GET")),
            Box::new(path_starts_with("/api")),
        ]);
        assert!(m.matches(&get("/api/users")));
        assert!(!m.matches(&get("/static/app.js")));
        assert!(all(vec![]).matches(&get("/")));
    }

    #[test]
    fn test_any() {
        let m = any(vec![
            Box::new(path_starts_with("/a")),
            Box::new(path_starts_with("/b")),
        ]);
        assert!(m.matches(&get("/b/1")));
        assert!(!m.matches(&get("/c/1")));
        assert!(!any(vec![]).matches(&get("/")));
    }

    #[test]
    fn test_not() {
        let m = not(is_method("POST"));
        assert!(m.matches(&get("/")));
        assert!(!not(|_: &InterceptedRequest| true).matches(&get("/")));
    }
}
