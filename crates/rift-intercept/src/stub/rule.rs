use crate::error::{BoxError, EvaluationFailure, StubEvaluationError};
use crate::matchers::RequestMatcher;
use crate::request::InterceptedRequest;
use crate::response::ResponseSpec;
use parking_lot::RwLock;
use std::fmt;
use uuid::Uuid;

/// Metrics label shared by every rule without a display name.
pub const ANONYMOUS_LABEL: &str = "anonymous";

/// Identity of a registered stub. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubId(Uuid);

impl StubId {
    pub(crate) fn new() -> Self {
        StubId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for StubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Produces the simulated response for a matched request.
pub trait ResponseFactory: Send + Sync {
    fn respond(&self, request: &InterceptedRequest) -> Result<ResponseSpec, BoxError>;
}

impl<F, E> ResponseFactory for F
where
    F: Fn(&InterceptedRequest) -> Result<ResponseSpec, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn respond(&self, request: &InterceptedRequest) -> Result<ResponseSpec, BoxError> {
        self(request).map_err(Into::into)
    }
}

/// A fixed response, cloned for every matching request.
impl ResponseFactory for ResponseSpec {
    fn respond(&self, _request: &InterceptedRequest) -> Result<ResponseSpec, BoxError> {
        Ok(self.clone())
    }
}

pub struct StubRule {
    id: StubId,
    name: RwLock<Option<String>>,
    matcher: Box<dyn RequestMatcher>,
    factory: Box<dyn ResponseFactory>,
}

impl StubRule {
    pub(crate) fn new(
        matcher: Box<dyn RequestMatcher>,
        factory: Box<dyn ResponseFactory>,
        name: Option<String>,
    ) -> Self {
        Self {
            id: StubId::new(),
            name: RwLock::new(name),
            matcher,
            factory,
        }
    }

    pub fn id(&self) -> StubId {
        self.id
    }

    /// Diagnostic name, if one was given.
    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: Option<String>) {
        *self.name.write() = name;
    }

    /// Metrics label: the name, or [`ANONYMOUS_LABEL`] for unnamed rules.
    pub fn label(&self) -> String {
        self.name().unwrap_or_else(|| ANONYMOUS_LABEL.to_string())
    }

    pub fn matches(&self, request: &InterceptedRequest) -> bool {
        self.matcher.matches(request)
    }

    pub fn respond(&self, request: &InterceptedRequest) -> Result<ResponseSpec, BoxError> {
        self.factory.respond(request)
    }

    pub(crate) fn evaluation_error(
        &self,
        kind: EvaluationFailure,
        message: impl Into<String>,
    ) -> StubEvaluationError {
        StubEvaluationError {
            stub_id: self.id,
            display_name: self.name(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Debug for StubRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubRule")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .finish_non_exhaustive()
    }
}
