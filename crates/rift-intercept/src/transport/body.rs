use crate::delivery::{DeliveryCanceller, DeliveryEvent};
use crate::error::{BoxError, TransportError, TransportErrorKind};
use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc;

/// Response body fed by a running delivery.
///
/// Frames arrive on the delivery's schedule. Dropping the body cancels the
/// delivery.
pub struct SimulatedBody {
    rx: mpsc::UnboundedReceiver<DeliveryEvent>,
    canceller: DeliveryCanceller,
    remaining: u64,
    done: bool,
}

impl SimulatedBody {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<DeliveryEvent>,
        canceller: DeliveryCanceller,
        len: u64,
    ) -> Self {
        Self {
            rx,
            canceller,
            remaining: len,
            done: false,
        }
    }

    /// Next event before the body is handed out; used to wait for headers.
    pub(crate) async fn next_event(&mut self) -> Option<DeliveryEvent> {
        self.rx.recv().await
    }
}

impl Body for SimulatedBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        loop {
            if this.done {
                return Poll::Ready(None);
            }
            match ready!(this.rx.poll_recv(cx)) {
                Some(DeliveryEvent::Data(chunk)) => {
                    this.remaining = this.remaining.saturating_sub(chunk.len() as u64);
                    return Poll::Ready(Some(Ok(Frame::data(chunk))));
                }
                Some(DeliveryEvent::Complete) => {
                    this.done = true;
                    this.remaining = 0;
                    return Poll::Ready(None);
                }
                Some(DeliveryEvent::Failed(error)) => {
                    this.done = true;
                    let error: BoxError = Box::new(error);
                    return Poll::Ready(Some(Err(error)));
                }
                // headers were consumed before the body was handed out
                Some(DeliveryEvent::Headers { .. }) => continue,
                None => {
                    this.done = true;
                    let error: BoxError = Box::new(TransportError::new(
                        TransportErrorKind::Cancelled,
                        "simulated delivery ended before the body completed",
                    ));
                    return Poll::Ready(Some(Err(error)));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}

impl Drop for SimulatedBody {
    fn drop(&mut self) {
        self.canceller.cancel();
    }
}
