//! Declarative request matching, as written in configuration files.

use super::string_matcher::{StringMatcher, ValuePattern};
use super::RequestMatcher;
use crate::request::InterceptedRequest;
use serde::{Deserialize, Serialize};

/// A plain string means exact equality; a map selects an operator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ValueMatch {
    Exact(String),
    Operator(StringMatcher),
}

impl ValueMatch {
    fn compile(&self) -> Result<ValuePattern, regex::Error> {
        match self {
            ValueMatch::Exact(v) => Ok(ValuePattern::exact(v)),
            ValueMatch::Operator(m) => ValuePattern::compile(m),
        }
    }
}

/// Match on a named header or query parameter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FieldMatch {
    pub name: String,
    #[serde(flatten)]
    pub matcher: StringMatcher,
}

/// Request match block. Every populated field must match; an empty block matches everything.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    /// HTTP method, compared case-insensitively
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<ValueMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ValueMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<FieldMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<FieldMatch>,
    /// Applies to host, path, header and query comparisons
    pub case_sensitive: bool,
}

/// Compiled form of [`MatchConfig`].
#[derive(Debug, Clone)]
pub struct CompiledMatch {
    method: Option<String>,
    scheme: Option<String>,
    host: Option<ValuePattern>,
    path: Option<ValuePattern>,
    headers: Vec<(String, ValuePattern)>,
    query: Vec<(String, ValuePattern)>,
    case_sensitive: bool,
}

impl CompiledMatch {
    pub fn compile(config: &MatchConfig) -> Result<Self, regex::Error> {
        let compile_fields = |fields: &[FieldMatch]| -> Result<Vec<_>, regex::Error> {
            fields
                .iter()
                .map(|f| Ok((f.name.clone(), ValuePattern::compile(&f.matcher)?)))
                .collect()
        };

        Ok(CompiledMatch {
            method: config.method.as_ref().map(|m| m.to_ascii_uppercase()),
            scheme: config.scheme.as_ref().map(|s| s.to_ascii_lowercase()),
            host: config.host.as_ref().map(ValueMatch::compile).transpose()?,
            path: config.path.as_ref().map(ValueMatch::compile).transpose()?,
            headers: compile_fields(&config.headers)?,
            query: compile_fields(&config.query)?,
            case_sensitive: config.case_sensitive,
        })
    }
}

impl RequestMatcher for CompiledMatch {
    fn matches(&self, request: &InterceptedRequest) -> bool {
        if let Some(method) = &self.method {
            if !request.method().as_str().eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(scheme) = &self.scheme {
            if !request
                .scheme()
                .is_some_and(|s| s.eq_ignore_ascii_case(scheme))
            {
                return false;
            }
        }
        if let Some(host) = &self.host {
            if !host.matches(request.host(), self.case_sensitive) {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if !path.matches(Some(request.path()), self.case_sensitive) {
                return false;
            }
        }

        let headers_match = self.headers.iter().all(|(name, matcher)| {
            let mut values = request
                .headers()
                .get_all(name.as_str())
                .iter()
                .filter_map(|v| v.to_str().ok())
                .peekable();
            if values.peek().is_none() {
                return matcher.matches(None, self.case_sensitive);
            }
            values.any(|v| matcher.matches(Some(v), self.case_sensitive))
        });
        if !headers_match {
            return false;
        }

        if self.query.is_empty() {
            return true;
        }
        let params = request.query_params();
        self.query.iter().all(|(name, matcher)| {
            matcher.matches(params.get(name).map(String::as_str), self.case_sensitive)
        })
    }
}
