//! StubRegistry - ordered rule set shared by every interception point.
//!
//! Mutations swap in a new rule list; resolution clones the current list and
//! scans it without holding the lock, so a resolving request sees the rules
//! either entirely before or entirely after a concurrent mutation.

use super::rule::{ResponseFactory, StubId, StubRule};
use crate::error::{EvaluationFailure, StubEvaluationError};
use crate::matchers::RequestMatcher;
use crate::metrics;
use crate::request::InterceptedRequest;
use crate::response::ResponseSpec;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Called once per successful match, on the resolving task, before delivery.
pub type ActivationHook = Arc<dyn Fn(&InterceptedRequest, &StubRule) + Send + Sync>;

/// Diagnostic sink for predicate and factory failures.
pub type EvaluationErrorHook = Arc<dyn Fn(&StubEvaluationError) + Send + Sync>;

type RuleList = Arc<Vec<Arc<StubRule>>>;

pub struct StubRegistry {
    /// Insertion order; resolution walks it backwards
    rules: RwLock<RuleList>,
    enabled: AtomicBool,
    activation_hook: RwLock<Option<ActivationHook>>,
    evaluation_error_hook: RwLock<Option<EvaluationErrorHook>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Arc::new(Vec::new())),
            enabled: AtomicBool::new(true),
            activation_hook: RwLock::new(None),
            evaluation_error_hook: RwLock::new(None),
        }
    }

    /// Add a rule. Later registrations take precedence over earlier ones.
    pub fn register(
        &self,
        matcher: impl RequestMatcher + 'static,
        factory: impl ResponseFactory + 'static,
    ) -> StubId {
        self.insert(StubRule::new(Box::new(matcher), Box::new(factory), None))
    }

    pub fn register_named(
        &self,
        name: impl Into<String>,
        matcher: impl RequestMatcher + 'static,
        factory: impl ResponseFactory + 'static,
    ) -> StubId {
        self.insert(StubRule::new(
            Box::new(matcher),
            Box::new(factory),
            Some(name.into()),
        ))
    }

    /// Add an already boxed matcher and factory.
    pub fn register_boxed(
        &self,
        name: Option<String>,
        matcher: Box<dyn RequestMatcher>,
        factory: Box<dyn ResponseFactory>,
    ) -> StubId {
        self.insert(StubRule::new(matcher, factory, name))
    }

    fn insert(&self, rule: StubRule) -> StubId {
        let id = rule.id();
        debug!(stub = %id, name = ?rule.name(), "Registering stub");
        let mut rules = self.rules.write();
        Arc::make_mut(&mut *rules).push(Arc::new(rule));
        id
    }

    /// Remove the rule with `id`. Returns false if no such rule is registered.
    pub fn unregister(&self, id: StubId) -> bool {
        let mut rules = self.rules.write();
        let Some(index) = rules.iter().position(|r| r.id() == id) else {
            return false;
        };
        Arc::make_mut(&mut *rules).remove(index);
        debug!(stub = %id, "Removed stub");
        true
    }

    pub fn unregister_all(&self) {
        let mut rules = self.rules.write();
        let count = rules.len();
        *rules = Arc::new(Vec::new());
        debug!(count, "Removed all stubs");
    }

    /// While disabled every request resolves to no match. Rules are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        debug!(enabled, "Stub registry toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Snapshot of all rules in insertion order.
    pub fn all_rules(&self) -> Vec<Arc<StubRule>> {
        self.snapshot().iter().cloned().collect()
    }

    pub fn get(&self, id: StubId) -> Option<Arc<StubRule>> {
        self.snapshot().iter().find(|r| r.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_activation_hook(
        &self,
        hook: impl Fn(&InterceptedRequest, &StubRule) + Send + Sync + 'static,
    ) {
        *self.activation_hook.write() = Some(Arc::new(hook));
    }

    pub fn clear_activation_hook(&self) {
        *self.activation_hook.write() = None;
    }

    pub fn set_evaluation_error_hook(
        &self,
        hook: impl Fn(&StubEvaluationError) + Send + Sync + 'static,
    ) {
        *self.evaluation_error_hook.write() = Some(Arc::new(hook));
    }

    pub fn clear_evaluation_error_hook(&self) {
        *self.evaluation_error_hook.write() = None;
    }

    /// Find the newest rule whose matcher accepts `request`.
    ///
    /// Fires the activation hook on a match.
    pub fn resolve(&self, request: &InterceptedRequest) -> Option<Arc<StubRule>> {
        self.scan(request, |_| Ok(())).map(|(rule, ())| rule)
    }

    /// Like [`resolve`](Self::resolve), but also runs the factory. A rule
    /// whose factory fails is skipped and older rules are tried.
    pub fn resolve_response(
        &self,
        request: &InterceptedRequest,
    ) -> Option<(Arc<StubRule>, ResponseSpec)> {
        self.scan(request, |rule| {
            match catch_unwind(AssertUnwindSafe(|| rule.respond(request))) {
                Ok(Ok(spec)) => Ok(spec),
                Ok(Err(e)) => Err(rule.evaluation_error(EvaluationFailure::FactoryFailed, e.to_string())),
                Err(panic) => Err(rule.evaluation_error(
                    EvaluationFailure::FactoryPanicked,
                    panic_message(&*panic),
                )),
            }
        })
    }

    fn snapshot(&self) -> RuleList {
        Arc::clone(&self.rules.read())
    }

    fn scan<T>(
        &self,
        request: &InterceptedRequest,
        mut accept: impl FnMut(&StubRule) -> Result<T, StubEvaluationError>,
    ) -> Option<(Arc<StubRule>, T)> {
        if !self.is_enabled() {
            return None;
        }

        let rules = self.snapshot();
        for rule in rules.iter().rev() {
            match catch_unwind(AssertUnwindSafe(|| rule.matches(request))) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(panic) => {
                    self.report(rule.evaluation_error(
                        EvaluationFailure::PredicatePanicked,
                        panic_message(&*panic),
                    ));
                    continue;
                }
            }

            match accept(rule.as_ref()) {
                Ok(value) => {
                    debug!(
                        stub = %rule.id(),
                        name = ?rule.name(),
                        method = %request.method(),
                        uri = %request.uri(),
                        "Stub matched"
                    );
                    metrics::record_stub_match(&rule.label());
                    self.activate(request, rule);
                    return Some((Arc::clone(rule), value));
                }
                Err(e) => self.report(e),
            }
        }
        None
    }

    fn activate(&self, request: &InterceptedRequest, rule: &StubRule) {
        let hook = self.activation_hook.read().clone();
        if let Some(hook) = hook {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook(request, rule))) {
                warn!(
                    stub = %rule.id(),
                    "Activation hook panicked: {}",
                    panic_message(&*panic)
                );
            }
        }
    }

    fn report(&self, error: StubEvaluationError) {
        warn!(stub = %error.stub_id, kind = error.kind.as_str(), "Stub evaluation failed: {}", error);
        metrics::record_evaluation_error(error.kind.as_str());

        let hook = self.evaluation_error_hook.read().clone();
        if let Some(hook) = hook {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook(&error))) {
                warn!(
                    stub = %error.stub_id,
                    "Evaluation error hook panicked: {}",
                    panic_message(&*panic)
                );
            }
        }
    }
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StubRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubRegistry")
            .field("rules", &self.snapshot())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
