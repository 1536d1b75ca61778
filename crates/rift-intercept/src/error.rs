//! Error types for stub construction, evaluation and simulated transport failures.

use crate::stub::StubId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used at the transport seam, matching what tower/hyper clients return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid input handed to a response builder.
///
/// Always raised synchronously at build time, never deferred into delivery.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("response body file {path:?} is not readable: {source}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize structured body: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("malformed HTTP message: {0}")]
    MalformedMessage(String),
    #[error("invalid timing: {0}")]
    InvalidTiming(String),
    #[error("invalid status code {0}")]
    InvalidStatus(u16),
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("declared body size {declared} does not match actual size {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
}

/// Which part of a stub rule failed while a request was being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationFailure {
    PredicatePanicked,
    FactoryFailed,
    FactoryPanicked,
}

impl EvaluationFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationFailure::PredicatePanicked => "predicate_panicked",
            EvaluationFailure::FactoryFailed => "factory_failed",
            EvaluationFailure::FactoryPanicked => "factory_panicked",
        }
    }
}

impl fmt::Display for EvaluationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate or response factory failed for one rule.
///
/// Resolution skips the offending rule and keeps scanning older rules.
#[derive(Debug, Clone, Error)]
#[error("stub {stub_id}{name} {kind}: {message}", name = name_suffix(.display_name))]
pub struct StubEvaluationError {
    pub stub_id: StubId,
    pub display_name: Option<String>,
    pub kind: EvaluationFailure,
    pub message: String,
}

fn name_suffix(name: &Option<String>) -> String {
    name.as_ref().map(|n| format!(" ({n})")).unwrap_or_default()
}

/// Category of a simulated network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    NotConnectedToInternet,
    ConnectionRefused,
    ConnectionReset,
    TimedOut,
    HostNotFound,
    Cancelled,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::NotConnectedToInternet => "not connected to internet",
            TransportErrorKind::ConnectionRefused => "connection refused",
            TransportErrorKind::ConnectionReset => "connection reset by peer",
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::HostNotFound => "host not found",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Other => "transport error",
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            TransportErrorKind::NotConnectedToInternet => io::ErrorKind::NotConnected,
            TransportErrorKind::ConnectionRefused => io::ErrorKind::ConnectionRefused,
            TransportErrorKind::ConnectionReset => io::ErrorKind::ConnectionReset,
            TransportErrorKind::TimedOut => io::ErrorKind::TimedOut,
            TransportErrorKind::HostNotFound => io::ErrorKind::NotFound,
            TransportErrorKind::Cancelled => io::ErrorKind::Interrupted,
            TransportErrorKind::Other => io::ErrorKind::Other,
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulated network failure surfaced to the caller as if the real transport failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_connected() -> Self {
        Self::new(
            TransportErrorKind::NotConnectedToInternet,
            "the Internet connection appears to be offline",
        )
    }

    pub fn connection_reset() -> Self {
        Self::new(TransportErrorKind::ConnectionReset, "connection reset by peer")
    }

    pub fn timed_out() -> Self {
        Self::new(TransportErrorKind::TimedOut, "the request timed out")
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}

impl From<TransportErrorKind> for TransportError {
    fn from(kind: TransportErrorKind) -> Self {
        Self::new(kind, kind.as_str())
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        io::Error::new(err.kind.io_kind(), err)
    }
}
