//! The view of an outgoing request that predicates and response factories see.

use bytes::Bytes;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Request, Uri, Version};
use std::collections::HashMap;

/// Outgoing request as seen by the interception layer.
///
/// When captured from a live `hyper::Request` only the head is available;
/// the body stays with the real request so pass-through traffic is untouched.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl InterceptedRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Convenience constructor for tests and hand-built requests.
    ///
    /// Returns `None` if the method or URI does not parse.
    pub fn parse(method: &str, uri: &str) -> Option<Self> {
        let method = Method::from_bytes(method.as_bytes()).ok()?;
        let uri = uri.parse::<Uri>().ok()?;
        Some(Self::new(method, uri))
    }

    /// Capture the head of a live request.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
            body: None,
        }
    }

    /// Add a header, ignoring names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Host from the URI authority, falling back to the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.uri.host().or_else(|| {
            self.headers
                .get(hyper::header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(|h| h.split(':').next().unwrap_or(h))
        })
    }

    pub fn scheme(&self) -> Option<&str> {
        self.uri.scheme_str()
    }

    /// First value of a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decoded query parameters. Later duplicates win.
    pub fn query_params(&self) -> HashMap<String, String> {
        parse_query_string(self.uri.query().unwrap_or(""))
    }
}

/// Parse a URL query string into a map, percent-decoding keys and values.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((decode_component(key), decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|v| v.into_owned())
        .unwrap_or(spaced)
}
