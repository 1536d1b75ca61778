use super::body::SimulatedBody;
use crate::delivery::{self, DeliveryEngine, DeliveryEvent};
use crate::error::{BoxError, TransportError, TransportErrorKind};
use crate::intercept::{Decision, InterceptionPoint};
use crate::request::InterceptedRequest;
use crate::response::ResponseSpec;
use crate::stub::{StubId, StubRegistry};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::{Request, Response};
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

/// Response type produced by [`InterceptService`].
pub type InterceptResponse = Response<BoxBody<Bytes, BoxError>>;

/// Installs stub interception in front of an HTTP client service.
///
/// ```ignore
/// let client = tower::ServiceBuilder::new()
///     .layer(InterceptLayer::new(registry))
///     .service(real_client);
/// ```
#[derive(Debug, Clone)]
pub struct InterceptLayer {
    point: InterceptionPoint,
    engine: DeliveryEngine,
}

impl InterceptLayer {
    pub fn new(registry: Arc<StubRegistry>) -> Self {
        Self {
            point: InterceptionPoint::new(registry),
            engine: DeliveryEngine::default(),
        }
    }

    pub fn with_engine(mut self, engine: DeliveryEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Turn interception on or off for every service this layer has built
    /// or will build. Other layers on the same registry are unaffected.
    pub fn set_enabled(&self, enabled: bool) {
        self.point.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.point.is_enabled()
    }
}

impl<S> Layer<S> for InterceptLayer {
    type Service = InterceptService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptService {
            inner,
            point: self.point.clone(),
            engine: self.engine.clone(),
        }
    }
}

/// Answers matched requests with simulated responses and forwards the rest.
///
/// Matchers see the request head only; the body stays with the request.
/// Simulated responses carry their [`StubId`] in the response extensions.
///
/// Delivery starts in `call`, so a stub's request delay runs from the call
/// rather than from the first poll of the returned future. Dropping that
/// future, or the response body, cancels the delivery.
///
/// # Panics
///
/// `call` panics on a matched request outside a Tokio runtime unless the
/// engine was given one with [`DeliveryEngine::with_runtime`].
#[derive(Debug, Clone)]
pub struct InterceptService<S> {
    inner: S,
    point: InterceptionPoint,
    engine: DeliveryEngine,
}

impl<S> InterceptService<S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Same switch as [`InterceptLayer::set_enabled`], shared with the layer
    /// and its other services.
    pub fn set_enabled(&self, enabled: bool) {
        self.point.set_enabled(enabled);
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for InterceptService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + Sync + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = InterceptResponse;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let intercepted = InterceptedRequest::from_request(&req);
        match self.point.intercept(&intercepted) {
            Decision::PassThrough => {
                let fut = self.inner.call(req);
                async move {
                    let response = fut.await.map_err(Into::<BoxError>::into)?;
                    Ok::<_, BoxError>(response.map(box_body))
                }
                .boxed()
            }
            Decision::Simulate { spec, stub_id } => {
                simulate(&self.engine, spec, stub_id).boxed()
            }
        }
    }
}

fn box_body<B>(body: B) -> BoxBody<Bytes, BoxError>
where
    B: Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed()
}

/// Start the delivery now and resolve once its head (or failure) arrives.
fn simulate(
    engine: &DeliveryEngine,
    spec: ResponseSpec,
    stub_id: StubId,
) -> impl Future<Output = Result<InterceptResponse, BoxError>> + Send + 'static {
    let len = spec.data_size();
    let (observer, rx) = delivery::channel();
    let handle = engine.deliver(spec, observer);
    // owns the canceller from here on, so dropping the future cancels too
    let mut body = SimulatedBody::new(rx, handle.canceller(), len);

    async move {
        match body.next_event().await {
            Some(DeliveryEvent::Headers { status, headers }) => {
                debug!(stub = %stub_id, status = status.as_u16(), "Serving simulated response");
                let mut response = Response::new(BoxBody::new(body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response.extensions_mut().insert(stub_id);
                Ok(response)
            }
            Some(DeliveryEvent::Failed(error)) => {
                debug!(stub = %stub_id, error = %error, "Simulated transport failure");
                Err(error.into())
            }
            Some(other) => Err(TransportError::other(format!(
                "simulated delivery produced {other:?} before headers"
            ))
            .into()),
            None => Err(TransportError::new(
                TransportErrorKind::Cancelled,
                "simulated delivery was cancelled",
            )
            .into()),
        }
    }
}
