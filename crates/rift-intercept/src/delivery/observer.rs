use crate::error::TransportError;
use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use tokio::sync::mpsc;

/// Receives the notifications of one delivery, in order.
///
/// Either `on_failure` alone, or `on_headers`, any number of `on_data` calls,
/// then `on_complete`. A file or stream body that fails or runs short
/// mid-transfer ends with `on_failure` after the headers. Nothing is called after cancellation.
pub trait DeliveryObserver: Send + 'static {
    fn on_headers(&mut self, status: StatusCode, headers: &HeaderMap);
    fn on_data(&mut self, chunk: Bytes);
    fn on_complete(&mut self);
    fn on_failure(&mut self, error: TransportError);
}

/// A delivery notification as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    Headers {
        status: StatusCode,
        headers: HeaderMap,
    },
    Data(Bytes),
    Complete,
    Failed(TransportError),
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<DeliveryEvent>,
}

/// Observer plus the receiving end of its events.
///
/// The receiver yields `None` once the delivery has finished for any reason.
pub fn channel() -> (ChannelObserver, mpsc::UnboundedReceiver<DeliveryEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelObserver { tx }, rx)
}

impl ChannelObserver {
    fn send(&self, event: DeliveryEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl DeliveryObserver for ChannelObserver {
    fn on_headers(&mut self, status: StatusCode, headers: &HeaderMap) {
        self.send(DeliveryEvent::Headers {
            status,
            headers: headers.clone(),
        });
    }

    fn on_data(&mut self, chunk: Bytes) {
        self.send(DeliveryEvent::Data(chunk));
    }

    fn on_complete(&mut self) {
        self.send(DeliveryEvent::Complete);
    }

    fn on_failure(&mut self, error: TransportError) {
        self.send(DeliveryEvent::Failed(error));
    }
}
