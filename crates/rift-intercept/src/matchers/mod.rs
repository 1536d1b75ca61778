//! Request predicates deciding whether a stub applies to a request.
//!
//! Any `Fn(&InterceptedRequest) -> bool` is a matcher. The helpers here cover
//! the common cases, `logical` combines them, and `request` compiles the
//! declarative match blocks used by configuration files.
//!
//! - `string_matcher` - equals / contains / starts_with / ends_with / matches / exists
//! - `logical` - `all`, `any`, `not`
//! - `request` - [`MatchConfig`] and its compiled form

mod logical;
mod request;
mod string_matcher;

pub use logical::{all, any, not, All, Any, Not};
pub use request::{CompiledMatch, FieldMatch, MatchConfig, ValueMatch};
pub use string_matcher::{Literal, StringMatcher, ValuePattern};

use crate::request::InterceptedRequest;
use regex::Regex;

/// Decides whether a stub applies to a request.
///
/// Matchers run on the resolving task and must not block.
pub trait RequestMatcher: Send + Sync {
    fn matches(&self, request: &InterceptedRequest) -> bool;
}

impl<F> RequestMatcher for F
where
    F: Fn(&InterceptedRequest) -> bool + Send + Sync,
{
    fn matches(&self, request: &InterceptedRequest) -> bool {
        self(request)
    }
}

/// Matches every request.
pub fn always() -> impl RequestMatcher {
    |_: &InterceptedRequest| true
}

pub fn is_method(method: &str) -> impl RequestMatcher {
    let method = method.to_ascii_uppercase();
    move |req: &InterceptedRequest| req.method().as_str().eq_ignore_ascii_case(&method)
}

/// Case-insensitive host comparison.
pub fn is_host(host: &str) -> impl RequestMatcher {
    let host = ValuePattern::exact(host);
    move |req: &InterceptedRequest| host.matches(req.host(), false)
}

pub fn is_scheme(scheme: &str) -> impl RequestMatcher {
    let scheme = scheme.to_ascii_lowercase();
    move |req: &InterceptedRequest| req.scheme().is_some_and(|s| s.eq_ignore_ascii_case(&scheme))
}

pub fn is_path(path: &str) -> impl RequestMatcher {
    let path = path.to_string();
    move |req: &InterceptedRequest| req.path() == path
}

pub fn path_starts_with(prefix: &str) -> impl RequestMatcher {
    let prefix = prefix.to_string();
    move |req: &InterceptedRequest| req.path().starts_with(&prefix)
}

pub fn path_ends_with(suffix: &str) -> impl RequestMatcher {
    let suffix = suffix.to_string();
    move |req: &InterceptedRequest| req.path().ends_with(&suffix)
}

/// Path matches a regular expression.
pub fn path_matches(pattern: &str) -> Result<impl RequestMatcher, regex::Error> {
    let regex = Regex::new(pattern)?;
    Ok(move |req: &InterceptedRequest| regex.is_match(req.path()))
}

pub fn has_header(name: &str) -> impl RequestMatcher {
    let name = name.to_ascii_lowercase();
    move |req: &InterceptedRequest| req.headers().contains_key(name.as_str())
}

/// Any value of the header equals `value` exactly.
pub fn header_equals(name: &str, value: &str) -> impl RequestMatcher {
    let name = name.to_ascii_lowercase();
    let value = value.to_string();
    move |req: &InterceptedRequest| {
        req.headers()
            .get_all(name.as_str())
            .iter()
            .any(|v| v.to_str().is_ok_and(|v| v == value))
    }
}

/// Query parameter equals `value` after percent-decoding.
pub fn query_param(name: &str, value: &str) -> impl RequestMatcher {
    let name = name.to_string();
    let value = value.to_string();
    move |req: &InterceptedRequest| {
        req.query_params()
            .get(&name)
            .is_some_and(|v| *v == value)
    }
}
