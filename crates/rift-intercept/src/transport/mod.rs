//! Tower middleware wiring interception and delivery into an HTTP client.
//!
//! Pass-through requests go to the wrapped service untouched. Matched
//! requests never reach it: the response head arrives after the stub's
//! request delay and the body streams on the delivery schedule. Simulated
//! transport errors come back as the service's `Err`, like a failed
//! connection would.

mod body;
mod service;

pub use body::SimulatedBody;
pub use service::{InterceptLayer, InterceptResponse, InterceptService};
