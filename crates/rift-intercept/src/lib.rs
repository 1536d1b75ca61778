//! Rift intercept: answer outgoing HTTP requests with registered stubs.
//!
//! Stubs pair a [`matchers::RequestMatcher`] with a [`stub::ResponseFactory`]
//! and live in a [`StubRegistry`]. The newest matching stub answers; requests
//! nothing matches go to the real client. Simulated responses are played back
//! by the [`DeliveryEngine`] with a request delay, bandwidth-limited body
//! chunks or a transport failure.
//!
//! ```ignore
//! let registry = Arc::new(StubRegistry::new());
//! registry.register(
//!     matchers::is_path("/login"),
//!     ResponseSpec::from_json(&json!({"token": "abc"}), 200, HeaderMap::new())?
//!         .with_timing_preset(Bandwidth::ThreeG),
//! );
//! let client = ServiceBuilder::new()
//!     .layer(InterceptLayer::new(registry))
//!     .service(real_client);
//! ```

// ===== Core =====
pub mod error;
pub mod intercept;
pub mod matchers;
pub mod request;
pub mod response;
pub mod stub;
pub mod timing;

// ===== Playback =====
pub mod delivery;
pub mod transport;

// ===== Ambient =====
pub mod config;
pub mod logging;
pub mod metrics;

pub use config::InterceptConfig;
pub use delivery::{DeliveryEngine, DeliveryEvent, DeliveryHandle, DeliveryObserver, DeliveryState};
pub use error::{ConstructionError, StubEvaluationError, TransportError, TransportErrorKind};
pub use intercept::{Decision, InterceptionPoint};
pub use request::InterceptedRequest;
pub use response::{ResponseSpec, ResponseSpecBuilder};
pub use stub::{StubId, StubRegistry, StubRule};
pub use timing::{Bandwidth, ResponseTiming};
pub use transport::{InterceptLayer, InterceptService};
