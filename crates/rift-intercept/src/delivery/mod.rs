//! Time-accurate, cancellable playback of simulated responses.
//!
//! `DeliveryEngine::deliver` waits out the request delay, then emits headers,
//! body chunks spread linearly over the transfer window, and completion (or a
//! single failure for error responses) to a [`DeliveryObserver`].
//!
//! ## Module Structure
//!
//! - `engine`: `DeliveryEngine`, `DeliveryHandle` and the delivery task
//! - `schedule`: `ChunkPlan`, how a body is spread over time
//! - `observer`: observer trait and the channel adaptor
//! - `state`: `DeliveryState`

mod engine;
mod observer;
mod schedule;
mod state;

#[cfg(test)]
mod tests;

pub use engine::{DeliveryCanceller, DeliveryConfig, DeliveryEngine, DeliveryHandle};
pub use observer::{channel, ChannelObserver, DeliveryEvent, DeliveryObserver};
pub use schedule::{Chunk, ChunkPlan};
pub use state::DeliveryState;
