use super::message::parse_raw_message;
use super::spec::{
    delay_from_secs, parse_header, BodySource, ResponseSpec, StreamFactory, StreamSource,
};
use crate::error::{ConstructionError, TransportError};
use crate::timing::{Bandwidth, ResponseTiming};
use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::http::HeaderValue;
use hyper::{HeaderMap, StatusCode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct ResponseSpecBuilder {
    status: u16,
    headers: HeaderMap,
    body: PendingBody,
    declared_size: Option<u64>,
    request_delay: Duration,
    response_timing: ResponseTiming,
    transport_error: Option<TransportError>,
    // first invalid input seen by a chained setter, reported by `build`
    error: Option<ConstructionError>,
}

enum PendingBody {
    Bytes(Bytes),
    File(PathBuf),
    Stream(StreamSource, u64),
}

impl ResponseSpecBuilder {
    pub fn new(status: u16) -> Self {
        ResponseSpecBuilder {
            status,
            headers: HeaderMap::new(),
            body: PendingBody::Bytes(Bytes::new()),
            declared_size: None,
            request_delay: Duration::ZERO,
            response_timing: ResponseTiming::default(),
            transport_error: None,
            error: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match parse_header(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(e) => self.record(e),
        }
        self
    }

    /// Replace any headers named in `headers`, keeping every value they carry.
    pub fn merge_headers(mut self, headers: &HeaderMap) -> Self {
        for name in headers.keys() {
            self.headers.remove(name);
        }
        for (name, value) in headers {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = PendingBody::Bytes(body.into());
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = PendingBody::File(path.into());
        self
    }

    /// Body read from a fresh `factory` reader on every delivery. `len` is
    /// trusted as the body length.
    pub fn stream(mut self, factory: impl StreamFactory + 'static, len: u64) -> Self {
        self.body = PendingBody::Stream(StreamSource::new(factory), len);
        self
    }

    /// Expected body length; `build` fails if the real length differs.
    pub fn declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn request_delay(mut self, seconds: f64) -> Self {
        match delay_from_secs(seconds) {
            Ok(delay) => self.request_delay = delay,
            Err(e) => self.record(e),
        }
        self
    }

    pub fn response_timing(mut self, value: f64) -> Self {
        match ResponseTiming::from_signed(value) {
            Ok(timing) => self.response_timing = timing,
            Err(e) => self.record(e),
        }
        self
    }

    pub fn timing_preset(mut self, preset: Bandwidth) -> Self {
        self.response_timing = preset.into();
        self
    }

    pub fn transport_error(mut self, error: TransportError) -> Self {
        self.transport_error = Some(error);
        self
    }

    fn record(&mut self, error: ConstructionError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub fn build(self) -> Result<ResponseSpec, ConstructionError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let status =
            StatusCode::from_u16(self.status).map_err(|_| ConstructionError::InvalidStatus(self.status))?;

        let body = match self.body {
            PendingBody::Bytes(bytes) => BodySource::Bytes(bytes),
            PendingBody::File(path) => file_source(path)?,
            PendingBody::Stream(source, len) => BodySource::Stream { source, len },
        };

        if let Some(declared) = self.declared_size {
            if declared != body.len() {
                return Err(ConstructionError::SizeMismatch {
                    declared,
                    actual: body.len(),
                });
            }
        }

        Ok(ResponseSpec {
            status,
            headers: self.headers,
            body,
            request_delay: self.request_delay,
            response_timing: self.response_timing,
            transport_error: self.transport_error,
        })
    }
}

fn file_source(path: PathBuf) -> Result<BodySource, ConstructionError> {
    let not_found = |source| ConstructionError::FileNotFound {
        path: path.clone(),
        source,
    };
    let metadata = std::fs::metadata(&path).map_err(not_found)?;
    if !metadata.is_file() {
        return Err(not_found(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    // Open once so unreadable files fail here rather than mid-delivery.
    std::fs::File::open(&path).map_err(not_found)?;
    Ok(BodySource::File {
        len: metadata.len(),
        path,
    })
}

impl ResponseSpec {
    /// Response with an in-memory body.
    pub fn from_bytes(
        data: impl Into<Bytes>,
        status: u16,
        headers: HeaderMap,
    ) -> Result<Self, ConstructionError> {
        ResponseSpecBuilder::new(status)
            .merge_headers(&headers)
            .body(data)
            .build()
    }

    /// Response whose body is streamed from a file at delivery time.
    pub fn from_file(
        path: impl AsRef<Path>,
        status: u16,
        headers: HeaderMap,
    ) -> Result<Self, ConstructionError> {
        ResponseSpecBuilder::new(status)
            .merge_headers(&headers)
            .file(path.as_ref())
            .build()
    }

    /// Response whose body is read from `factory` at delivery time.
    ///
    /// The factory is called once per delivery. Delivery fails if the reader
    /// yields fewer than `len` bytes; anything past `len` is never read.
    pub fn from_stream(
        factory: impl StreamFactory + 'static,
        len: u64,
        status: u16,
        headers: HeaderMap,
    ) -> Result<Self, ConstructionError> {
        ResponseSpecBuilder::new(status)
            .merge_headers(&headers)
            .stream(factory, len)
            .build()
    }

    /// Response with a JSON-encoded body.
    ///
    /// Adds `Content-Type: application/json` unless the caller supplied one.
    pub fn from_json<T: Serialize + ?Sized>(
        value: &T,
        status: u16,
        mut headers: HeaderMap,
    ) -> Result<Self, ConstructionError> {
        let body = serde_json::to_vec(value)?;
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Self::from_bytes(body, status, headers)
    }

    /// Response parsed from a raw `status line + headers + blank line + body` message.
    pub fn from_raw_message(message: impl AsRef<[u8]>) -> Result<Self, ConstructionError> {
        let parsed = parse_raw_message(message.as_ref())?;
        ResponseSpecBuilder::new(parsed.status)
            .merge_headers(&parsed.headers)
            .body(parsed.body)
            .build()
    }

    /// Response that fails with a simulated transport error.
    pub fn from_error(error: TransportError) -> Self {
        ResponseSpec {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BodySource::default(),
            request_delay: Duration::ZERO,
            response_timing: ResponseTiming::default(),
            transport_error: Some(error),
        }
    }
}
