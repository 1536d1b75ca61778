//! Tests for the delivery module.
//!
//! Timing tests run on Tokio's paused clock, so sleeps finish at their
//! deadlines without real waiting.

use super::*;
use crate::error::{TransportError, TransportErrorKind};
use crate::response::ResponseSpec;
use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

type Timeline = Vec<(Duration, DeliveryEvent)>;

async fn timeline(start: Instant, mut rx: UnboundedReceiver<DeliveryEvent>) -> Timeline {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push((start.elapsed(), event));
    }
    events
}

fn body(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

fn data_of(events: &Timeline) -> Vec<u8> {
    events
        .iter()
        .filter_map(|(_, e)| match e {
            DeliveryEvent::Data(chunk) => Some(chunk.to_vec()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Paused-clock timers fire on millisecond ticks.
fn assert_near(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(1),
        "expected ~{expected:?}, got {actual:?}"
    );
}

fn last_data_at(events: &Timeline) -> Duration {
    events
        .iter()
        .filter(|(_, e)| matches!(e, DeliveryEvent::Data(_)))
        .map(|(at, _)| *at)
        .last()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_flat_duration_spreads_body_over_window() {
    let payload = body(1000);
    let spec = ResponseSpec::from_bytes(payload.clone(), 200, HeaderMap::new())
        .unwrap()
        .with_response_timing(2.0)
        .unwrap();

    let engine = DeliveryEngine::default();
    let (observer, rx) = channel();
    let start = Instant::now();
    let handle = engine.deliver(spec, observer);
    let events = timeline(start, rx).await;

    assert_eq!(handle.join().await, DeliveryState::Completed);

    let (at, first) = &events[0];
    assert_eq!(*at, Duration::ZERO);
    assert!(matches!(first, DeliveryEvent::Headers { status, .. } if *status == StatusCode::OK));

    let first_data = events
        .iter()
        .find(|(_, e)| matches!(e, DeliveryEvent::Data(_)))
        .unwrap();
    assert_eq!(first_data.0, Duration::ZERO);
    assert_near(last_data_at(&events), Duration::from_secs(2));

    let (done_at, done) = events.last().unwrap();
    assert_eq!(*done, DeliveryEvent::Complete);
    assert_near(*done_at, Duration::from_secs(2));

    assert_eq!(data_of(&events), payload.to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_rate_timing_uses_body_size() {
    let payload = body(200 * 1024);
    let spec = ResponseSpec::from_bytes(payload.clone(), 200, HeaderMap::new())
        .unwrap()
        .with_response_timing(-100.0)
        .unwrap();

    let (observer, rx) = channel();
    let start = Instant::now();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(start, rx).await;

    assert_eq!(handle.join().await, DeliveryState::Completed);
    assert_near(last_data_at(&events), Duration::from_secs(2));
    assert_near(events.last().unwrap().0, Duration::from_secs(2));
    assert_eq!(data_of(&events).len(), 200 * 1024);
}

#[tokio::test(start_paused = true)]
async fn test_rate_timing_empty_body_is_immediate() {
    let spec = ResponseSpec::from_bytes("", 204, HeaderMap::new())
        .unwrap()
        .with_response_timing(-100.0)
        .unwrap();

    let (observer, rx) = channel();
    let start = Instant::now();
    DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(start, rx).await;

    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|(at, _)| at.is_zero()));
    assert_eq!(events[1].1, DeliveryEvent::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_flat_duration_applies_to_empty_body() {
    let spec = ResponseSpec::from_bytes("", 200, HeaderMap::new())
        .unwrap()
        .with_response_timing(1.0)
        .unwrap();

    let (observer, rx) = channel();
    let start = Instant::now();
    DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(start, rx).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, Duration::ZERO);
    assert_eq!(events[1].1, DeliveryEvent::Complete);
    assert_near(events[1].0, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_zero_timing_delivers_one_immediate_chunk() {
    let payload = body(4096);
    let spec = ResponseSpec::from_bytes(payload.clone(), 200, HeaderMap::new()).unwrap();

    let (observer, rx) = channel();
    let start = Instant::now();
    DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(start, rx).await;

    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|(at, _)| at.is_zero()));
    assert_eq!(events[1].1, DeliveryEvent::Data(payload));
}

#[tokio::test(start_paused = true)]
async fn test_request_delay_precedes_headers() {
    let spec = ResponseSpec::from_bytes("ok", 200, HeaderMap::new())
        .unwrap()
        .with_request_delay(1.5)
        .unwrap();

    let (observer, rx) = channel();
    let start = Instant::now();
    DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(start, rx).await;

    assert_eq!(events.len(), 3);
    for (at, _) in &events {
        assert_near(*at, Duration::from_millis(1500));
    }
    assert!(matches!(events[0].1, DeliveryEvent::Headers { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_error_spec_only_fails_after_delay() {
    let spec = ResponseSpec::from_error(TransportError::not_connected())
        .with_delay(Duration::from_millis(500));

    let (observer, rx) = channel();
    let start = Instant::now();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(start, rx).await;

    assert_eq!(handle.join().await, DeliveryState::Failed);
    assert_eq!(events.len(), 1);
    let (at, event) = &events[0];
    assert_near(*at, Duration::from_millis(500));
    match event {
        DeliveryEvent::Failed(e) => assert_eq!(e.kind, TransportErrorKind::NotConnectedToInternet),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_headers_emits_nothing() {
    let spec = ResponseSpec::from_bytes("late", 200, HeaderMap::new())
        .unwrap()
        .with_request_delay(5.0)
        .unwrap();

    let (observer, mut rx) = channel();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    handle.cancel();
    handle.cancel();
    assert_eq!(handle.state(), DeliveryState::Cancelled);

    assert_eq!(handle.join().await, DeliveryState::Cancelled);
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_stream_stops_notifications() {
    let spec = ResponseSpec::from_bytes(body(1000), 200, HeaderMap::new())
        .unwrap()
        .with_response_timing(10.0)
        .unwrap();

    let (observer, mut rx) = channel();
    let handle = DeliveryEngine::default().deliver(spec, observer);

    assert!(matches!(rx.recv().await, Some(DeliveryEvent::Headers { .. })));
    let first = match rx.recv().await {
        Some(DeliveryEvent::Data(chunk)) => chunk,
        other => panic!("expected data, got {other:?}"),
    };
    assert_eq!(handle.state(), DeliveryState::Streaming);

    let canceller = handle.canceller();
    canceller.cancel();
    canceller.cancel();
    assert_eq!(handle.join().await, DeliveryState::Cancelled);

    let mut rest = Vec::new();
    while let Some(event) = rx.recv().await {
        rest.push(event);
    }
    assert!(rest.is_empty(), "unexpected events after cancel: {rest:?}");
    assert!(first.len() < 1000);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_completion_is_noop() {
    let spec = ResponseSpec::from_bytes("done", 200, HeaderMap::new()).unwrap();
    let (observer, rx) = channel();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    let canceller = handle.canceller();

    timeline(Instant::now(), rx).await;
    assert_eq!(handle.join().await, DeliveryState::Completed);
    canceller.cancel();
    assert_eq!(canceller.state(), DeliveryState::Completed);
}

/// Cancels its own delivery from inside the first data callback.
struct CancelOnFirstData {
    canceller: Arc<Mutex<Option<DeliveryCanceller>>>,
    seen: Arc<Mutex<Vec<&'static str>>>,
}

impl DeliveryObserver for CancelOnFirstData {
    fn on_headers(&mut self, _status: StatusCode, _headers: &HeaderMap) {
        self.seen.lock().push("headers");
    }

    fn on_data(&mut self, _chunk: Bytes) {
        self.seen.lock().push("data");
        if let Some(canceller) = self.canceller.lock().as_ref() {
            canceller.cancel();
        }
    }

    fn on_complete(&mut self) {
        self.seen.lock().push("complete");
    }

    fn on_failure(&mut self, _error: TransportError) {
        self.seen.lock().push("failure");
    }
}

#[tokio::test(start_paused = true)]
async fn test_observer_can_cancel_from_callback() {
    let spec = ResponseSpec::from_bytes(body(1000), 200, HeaderMap::new())
        .unwrap()
        .with_response_timing(1.0)
        .unwrap();

    let canceller = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = CancelOnFirstData {
        canceller: Arc::clone(&canceller),
        seen: Arc::clone(&seen),
    };

    let handle = DeliveryEngine::default().deliver(spec, observer);
    *canceller.lock() = Some(handle.canceller());

    assert_eq!(handle.join().await, DeliveryState::Cancelled);
    assert_eq!(*seen.lock(), vec!["headers", "data"]);
}

#[tokio::test]
async fn test_file_body_streams_in_read_sized_pieces() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let payload = body(5000);
    file.write_all(&payload).unwrap();

    let spec = ResponseSpec::from_file(file.path(), 200, HeaderMap::new()).unwrap();
    let engine = DeliveryEngine::new(DeliveryConfig {
        read_chunk_size: 1000,
        ..DeliveryConfig::default()
    });
    let (observer, rx) = channel();
    let handle = engine.deliver(spec, observer);
    let events = timeline(Instant::now(), rx).await;

    assert_eq!(handle.join().await, DeliveryState::Completed);
    assert!(events.iter().all(|(_, e)| match e {
        DeliveryEvent::Data(chunk) => chunk.len() <= 1000,
        _ => true,
    }));
    assert_eq!(data_of(&events), payload.to_vec());
}

#[tokio::test]
async fn test_file_removed_after_build_fails_delivery() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"soon gone").unwrap();
    let spec = ResponseSpec::from_file(file.path(), 200, HeaderMap::new()).unwrap();
    drop(file);

    let (observer, rx) = channel();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(Instant::now(), rx).await;

    assert_eq!(handle.join().await, DeliveryState::Failed);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].1, DeliveryEvent::Failed(_)));
}

fn stream_spec(content: &'static [u8], len: u64) -> ResponseSpec {
    ResponseSpec::from_stream(
        move || Ok::<_, std::io::Error>(std::io::Cursor::new(content)),
        len,
        200,
        HeaderMap::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_stream_body_reads_declared_length() {
    // the reader holds more than declared; only `len` bytes go out
    let spec = stream_spec(b"0123456789abcdef", 10);
    let engine = DeliveryEngine::new(DeliveryConfig {
        read_chunk_size: 4,
        ..DeliveryConfig::default()
    });

    for _ in 0..2 {
        let (observer, rx) = channel();
        let handle = engine.deliver(spec.clone(), observer);
        let events = timeline(Instant::now(), rx).await;

        assert_eq!(handle.join().await, DeliveryState::Completed);
        assert_eq!(data_of(&events), b"0123456789".to_vec());
        assert!(matches!(events.last(), Some((_, DeliveryEvent::Complete))));
    }
}

#[tokio::test]
async fn test_short_stream_fails_after_headers() {
    let spec = stream_spec(b"only six", 100);
    let (observer, rx) = channel();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(Instant::now(), rx).await;

    assert_eq!(handle.join().await, DeliveryState::Failed);
    assert!(matches!(events[0].1, DeliveryEvent::Headers { .. }));
    match &events.last().unwrap().1 {
        DeliveryEvent::Failed(e) => assert_eq!(e.kind, TransportErrorKind::ConnectionReset),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!events
        .iter()
        .any(|(_, e)| matches!(e, DeliveryEvent::Complete)));
}

#[tokio::test]
async fn test_stream_open_error_fails_before_headers() {
    let spec = ResponseSpec::from_stream(
        || -> std::io::Result<tokio::io::Empty> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
        },
        5,
        200,
        HeaderMap::new(),
    )
    .unwrap();
    let (observer, rx) = channel();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    let events = timeline(Instant::now(), rx).await;

    assert_eq!(handle.join().await, DeliveryState::Failed);
    assert_eq!(events.len(), 1);
    match &events[0].1 {
        DeliveryEvent::Failed(e) => assert_eq!(e.kind, TransportErrorKind::Other),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_while_stream_read_is_pending() {
    // the write half stays open without sending, so the read never finishes
    let (writer, reader) = tokio::io::duplex(64);
    let reader = Mutex::new(Some(reader));
    let spec = ResponseSpec::from_stream(
        move || {
            reader
                .lock()
                .take()
                .ok_or_else(|| std::io::Error::other("already opened"))
        },
        10,
        200,
        HeaderMap::new(),
    )
    .unwrap();

    let (observer, mut rx) = channel();
    let handle = DeliveryEngine::default().deliver(spec, observer);
    assert!(matches!(rx.recv().await, Some(DeliveryEvent::Headers { .. })));

    handle.cancel();
    assert_eq!(handle.join().await, DeliveryState::Cancelled);
    assert_eq!(rx.recv().await, None);
    drop(writer);
}

#[tokio::test]
async fn test_explicit_runtime_handle() {
    let engine = DeliveryEngine::default().with_runtime(tokio::runtime::Handle::current());
    let spec = ResponseSpec::from_bytes("x", 201, HeaderMap::new()).unwrap();
    let (observer, rx) = channel();
    let handle = engine.deliver(Arc::new(spec), observer);
    let events = timeline(Instant::now(), rx).await;
    assert_eq!(events.len(), 3);
    assert_eq!(handle.join().await, DeliveryState::Completed);
}
