//! Simulated responses and the ways to build them.
//!
//! - `spec`: [`ResponseSpec`], its [`BodySource`] and streamed body factories
//! - `builder`: [`ResponseSpecBuilder`] and the `from_*` constructors
//! - `message`: raw HTTP message parsing and serialization
//! - `fixtures`: canned responses loaded from a directory

mod builder;
mod fixtures;
mod message;
mod spec;

pub use builder::ResponseSpecBuilder;
pub use fixtures::{Fixtures, RESPONSE_EXTENSION};
pub use spec::{header_map, BodySource, BodyStream, ResponseSpec, StreamFactory, StreamSource};
