//! The seam every outgoing request passes through before the real transport.

use crate::metrics;
use crate::request::InterceptedRequest;
use crate::response::ResponseSpec;
use crate::stub::{StubId, StubRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// What to do with an outgoing request.
#[derive(Debug, Clone)]
pub enum Decision {
    /// No stub applies; send the request over the real transport.
    PassThrough,
    /// Answer with a simulated response produced by `stub_id`.
    Simulate { spec: ResponseSpec, stub_id: StubId },
}

impl Decision {
    pub fn is_simulated(&self) -> bool {
        matches!(self, Decision::Simulate { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Decision::PassThrough => "pass_through",
            Decision::Simulate { .. } => "simulate",
        }
    }
}

/// Clones share the registry and the local on/off switch, so one
/// transport's clones toggle together while other points on the same
/// registry are unaffected.
#[derive(Debug, Clone)]
pub struct InterceptionPoint {
    registry: Arc<StubRegistry>,
    enabled: Arc<AtomicBool>,
}

impl InterceptionPoint {
    pub fn new(registry: Arc<StubRegistry>) -> Self {
        Self {
            registry,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn registry(&self) -> &Arc<StubRegistry> {
        &self.registry
    }

    /// Turn interception on or off for this point and its clones only.
    /// While off every request passes through and no stub is evaluated.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        debug!(enabled, "Interception point toggled");
    }

    /// Local switch only; the registry has its own.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Resolve `request` against the registry. Never touches the network.
    pub fn intercept(&self, request: &InterceptedRequest) -> Decision {
        let resolved = if self.is_enabled() {
            self.registry.resolve_response(request)
        } else {
            None
        };
        let decision = match resolved {
            Some((rule, spec)) => Decision::Simulate {
                spec,
                stub_id: rule.id(),
            },
            None => Decision::PassThrough,
        };

        if !decision.is_simulated() {
            debug!(method = %request.method(), uri = %request.uri(), "No stub matched, passing through");
        }
        metrics::record_decision(decision.label());
        decision
    }
}
