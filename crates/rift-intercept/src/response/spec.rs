//! The immutable description of a simulated response.

use crate::error::{ConstructionError, TransportError};
use crate::timing::{Bandwidth, ResponseTiming};
use bytes::Bytes;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Reader produced by a [`StreamFactory`].
pub type BodyStream = Pin<Box<dyn AsyncRead + Send>>;

/// Opens a fresh reader each time a streamed body is delivered.
pub trait StreamFactory: Send + Sync {
    fn open(&self) -> io::Result<BodyStream>;
}

impl<F, R> StreamFactory for F
where
    F: Fn() -> io::Result<R> + Send + Sync,
    R: AsyncRead + Send + 'static,
{
    fn open(&self) -> io::Result<BodyStream> {
        Ok(Box::pin(self()?))
    }
}

/// Shared [`StreamFactory`]. Two sources are equal only if they are the same factory.
#[derive(Clone)]
pub struct StreamSource(Arc<dyn StreamFactory>);

impl StreamSource {
    pub fn new(factory: impl StreamFactory + 'static) -> Self {
        StreamSource(Arc::new(factory))
    }

    pub fn open(&self) -> io::Result<BodyStream> {
        self.0.open()
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamSource(..)")
    }
}

impl PartialEq for StreamSource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Where the body bytes of a simulated response come from.
#[derive(Debug, Clone, PartialEq)]
pub enum BodySource {
    /// In-memory bytes.
    Bytes(Bytes),
    /// A file opened fresh for every delivery. `len` was taken at build time.
    File { path: PathBuf, len: u64 },
    /// A caller-supplied reader of declared length, opened per delivery.
    /// Only `len` bytes are read; a reader that ends sooner fails the delivery.
    Stream { source: StreamSource, len: u64 },
}

impl BodySource {
    pub fn len(&self) -> u64 {
        match self {
            BodySource::Bytes(b) => b.len() as u64,
            BodySource::File { len, .. } | BodySource::Stream { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            BodySource::File { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl Default for BodySource {
    fn default() -> Self {
        BodySource::Bytes(Bytes::new())
    }
}

/// A synthetic HTTP response plus the timing used to deliver it.
///
/// Built through [`super::ResponseSpecBuilder`] or the `from_*` constructors.
/// If `transport_error` is set it governs the outcome: status, headers and
/// body are never emitted.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub(super) status: StatusCode,
    pub(super) headers: HeaderMap,
    pub(super) body: BodySource,
    pub(super) request_delay: Duration,
    pub(super) response_timing: ResponseTiming,
    pub(super) transport_error: Option<TransportError>,
}

impl ResponseSpec {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &BodySource {
        &self.body
    }

    /// Length of the body in bytes.
    pub fn data_size(&self) -> u64 {
        self.body.len()
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn response_timing(&self) -> ResponseTiming {
        self.response_timing
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        self.transport_error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.transport_error.is_some()
    }

    /// Set the body timing from its signed form: seconds if `>= 0`, KB/s if `< 0`.
    pub fn with_response_timing(mut self, value: f64) -> Result<Self, ConstructionError> {
        self.response_timing = ResponseTiming::from_signed(value)?;
        Ok(self)
    }

    pub fn with_timing(mut self, timing: ResponseTiming) -> Self {
        self.response_timing = timing;
        self
    }

    pub fn with_timing_preset(self, preset: Bandwidth) -> Self {
        self.with_timing(preset.into())
    }

    /// Set the wait before headers arrive, in seconds. Negative values are rejected.
    pub fn with_request_delay(mut self, seconds: f64) -> Result<Self, ConstructionError> {
        self.request_delay = delay_from_secs(seconds)?;
        Ok(self)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Set both the request delay and the response timing at once.
    pub fn with_request_and_response_time(
        self,
        request_seconds: f64,
        response_time: f64,
    ) -> Result<Self, ConstructionError> {
        self.with_request_delay(request_seconds)?
            .with_response_timing(response_time)
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ConstructionError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

pub(super) fn delay_from_secs(seconds: f64) -> Result<Duration, ConstructionError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ConstructionError::InvalidTiming(format!(
            "request delay must be a non-negative number of seconds, got {seconds}"
        )));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| ConstructionError::InvalidTiming(e.to_string()))
}

pub(super) fn parse_header(
    name: &str,
    value: &str,
) -> Result<(HeaderName, HeaderValue), ConstructionError> {
    let header_name = HeaderName::try_from(name).map_err(|e| ConstructionError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let header_value =
        HeaderValue::from_str(value).map_err(|e| ConstructionError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    Ok((header_name, header_value))
}

/// Build a [`HeaderMap`] from string pairs, failing on the first invalid entry.
pub fn header_map<I, K, V>(pairs: I) -> Result<HeaderMap, ConstructionError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        headers.append(name, value);
    }
    Ok(headers)
}
