//! Stub rules and the registry that resolves requests against them.
//!
//! This module provides:
//! - `StubRule`: a request matcher bound to a response factory
//! - `StubRegistry`: the ordered, thread-safe rule set
//!
//! ## Module Structure
//!
//! - `rule`: `StubId`, `ResponseFactory` and `StubRule`
//! - `registry`: `StubRegistry`, resolution and hooks

mod registry;
mod rule;


pub use registry::{ActivationHook, EvaluationErrorHook, StubRegistry};
pub use rule::{ResponseFactory, StubId, StubRule, ANONYMOUS_LABEL};
