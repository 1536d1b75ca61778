use super::observer::DeliveryObserver;
use super::schedule::ChunkPlan;
use super::state::DeliveryState;
use crate::error::TransportError;
use crate::metrics;
use crate::response::{BodySource, BodyStream, ResponseSpec};
use bytes::Bytes;
use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Spacing between body chunks while throttling
    pub slot_interval: Duration,
    /// Largest single read from a file or stream body
    pub read_chunk_size: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            slot_interval: Duration::from_millis(100),
            read_chunk_size: 64 * 1024,
        }
    }
}

/// Plays simulated responses back to observers with realistic timing.
///
/// Each delivery is an independent task; the engine itself holds no
/// per-delivery state and can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct DeliveryEngine {
    config: DeliveryConfig,
    runtime: Option<Handle>,
}

impl DeliveryEngine {
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            runtime: None,
        }
    }

    /// Spawn deliveries on `handle` instead of the ambient runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Start delivering `spec` to `observer`.
    ///
    /// Timing starts now. Dropping the returned handle does not cancel the
    /// delivery.
    ///
    /// # Panics
    ///
    /// Without [`with_runtime`](Self::with_runtime), panics if called outside
    /// a Tokio runtime.
    pub fn deliver(
        &self,
        spec: impl Into<Arc<ResponseSpec>>,
        observer: impl DeliveryObserver,
    ) -> DeliveryHandle {
        let shared = Arc::new(Shared::new());
        let task = Delivery {
            shared: Arc::clone(&shared),
            spec: spec.into(),
            config: self.config.clone(),
            started: Instant::now(),
        }
        .run(observer);

        let task = match &self.runtime {
            Some(handle) => handle.spawn(task),
            None => tokio::spawn(task),
        };
        DeliveryHandle { shared, task }
    }
}

/// State shared between a delivery task and its handles.
///
/// Every notification is made while holding `state`, and `cancel` takes the
/// same lock, so no notification can start after `cancel` returns. The lock
/// is re-entrant so an observer may cancel from inside a callback.
struct Shared {
    state: ReentrantMutex<Cell<DeliveryState>>,
    token: CancellationToken,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: ReentrantMutex::new(Cell::new(DeliveryState::Pending)),
            token: CancellationToken::new(),
        }
    }

    fn state(&self) -> DeliveryState {
        self.state.lock().get()
    }

    /// Run `notify` and move to `next`, unless cancelled first.
    /// Returns false once the delivery has been cancelled.
    fn emit(&self, next: DeliveryState, notify: impl FnOnce()) -> bool {
        let guard = self.state.lock();
        if guard.get() == DeliveryState::Cancelled {
            return false;
        }
        notify();
        // the observer may have cancelled from inside the callback
        if guard.get() == DeliveryState::Cancelled {
            return false;
        }
        guard.set(next);
        true
    }

    fn cancel(&self) -> bool {
        {
            let guard = self.state.lock();
            if guard.get().is_terminal() {
                return false;
            }
            guard.set(DeliveryState::Cancelled);
        }
        self.token.cancel();
        true
    }

    /// Used when the task died without reaching a terminal state.
    fn abandon(&self) -> DeliveryState {
        let guard = self.state.lock();
        if !guard.get().is_terminal() {
            guard.set(DeliveryState::Failed);
        }
        guard.get()
    }

    /// Sleep until `deadline`. False if cancelled first.
    async fn wait_until(&self, deadline: Instant) -> bool {
        if deadline <= Instant::now() {
            return !self.token.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep_until(deadline) => true,
        }
    }
}

struct Delivery {
    shared: Arc<Shared>,
    spec: Arc<ResponseSpec>,
    config: DeliveryConfig,
    started: Instant,
}

impl Delivery {
    async fn run(self, mut observer: impl DeliveryObserver) -> DeliveryState {
        self.drive(&mut observer).await;
        // channel observers close here, before the outcome is recorded
        drop(observer);

        let state = self.shared.state();
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        metrics::record_delivery(state.as_str(), elapsed_ms);
        debug!(
            state = %state,
            status = self.spec.status().as_u16(),
            bytes = self.spec.data_size(),
            elapsed_ms,
            "Delivery finished"
        );
        state
    }

    async fn drive(&self, observer: &mut impl DeliveryObserver) {
        let shared = &self.shared;
        let spec = &self.spec;

        if !shared.wait_until(deadline(self.started, spec.request_delay())).await {
            return;
        }

        if let Some(error) = spec.transport_error() {
            let error = error.clone();
            shared.emit(DeliveryState::Failed, || observer.on_failure(error));
            return;
        }

        let mut reader = match BodyReader::open(spec.body(), self.config.read_chunk_size).await {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Failed to open response body: {}", e);
                let error = TransportError::other(format!("response body unavailable: {e}"));
                shared.emit(DeliveryState::Failed, || observer.on_failure(error));
                return;
            }
        };

        if !shared.emit(DeliveryState::HeadersSent, || {
            observer.on_headers(spec.status(), spec.headers())
        }) {
            return;
        }

        let total = spec.data_size();
        let window = spec.response_timing().transfer_window(total);
        let plan = ChunkPlan::new(total, window, self.config.slot_interval);
        let stream_start = Instant::now();

        for chunk in plan.chunks() {
            if !shared.wait_until(deadline(stream_start, chunk.at)).await {
                return;
            }
            let mut remaining = chunk.len;
            while remaining > 0 {
                let read = tokio::select! {
                    biased;
                    _ = shared.token.cancelled() => return,
                    read = reader.read(remaining) => read,
                };
                let data = match read {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("Response body read failed mid-transfer: {}", e);
                        let error = TransportError::connection_reset();
                        shared.emit(DeliveryState::Failed, || observer.on_failure(error));
                        return;
                    }
                };
                remaining -= data.len() as u64;
                let len = data.len();
                if !shared.emit(DeliveryState::Streaming, || observer.on_data(data)) {
                    return;
                }
                metrics::record_bytes_delivered(len);
            }
        }

        if !shared.wait_until(deadline(stream_start, window)).await {
            return;
        }
        shared.emit(DeliveryState::Completed, || observer.on_complete());
    }
}

/// `base + offset`, saturating far in the future.
fn deadline(base: Instant, offset: Duration) -> Instant {
    base.checked_add(offset)
        .unwrap_or_else(|| base + Duration::from_secs(86_400 * 365 * 30))
}

/// Body bytes for one delivery. File handles and readers live only as long
/// as the delivery.
enum BodyReader {
    Memory { bytes: Bytes, pos: usize },
    Reader { reader: BodyStream, chunk_size: usize },
}

impl BodyReader {
    async fn open(body: &BodySource, chunk_size: usize) -> io::Result<Self> {
        let reader: BodyStream = match body {
            BodySource::Bytes(bytes) => {
                return Ok(BodyReader::Memory {
                    bytes: bytes.clone(),
                    pos: 0,
                })
            }
            BodySource::File { path, .. } => Box::pin(tokio::fs::File::open(path).await?),
            BodySource::Stream { source, .. } => source.open()?,
        };
        Ok(BodyReader::Reader {
            reader,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Next piece of at most `max` bytes. Never returns an empty buffer.
    async fn read(&mut self, max: u64) -> io::Result<Bytes> {
        match self {
            BodyReader::Memory { bytes, pos } => {
                let end = (*pos as u64).saturating_add(max).min(bytes.len() as u64) as usize;
                if end == *pos {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
                let piece = bytes.slice(*pos..end);
                *pos = end;
                Ok(piece)
            }
            BodyReader::Reader { reader, chunk_size } => {
                let len = max.min(*chunk_size as u64) as usize;
                let mut buf = vec![0u8; len];
                reader.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// Control over one in-flight delivery.
pub struct DeliveryHandle {
    shared: Arc<Shared>,
    task: JoinHandle<DeliveryState>,
}

impl DeliveryHandle {
    pub fn state(&self) -> DeliveryState {
        self.shared.state()
    }

    /// Stop the delivery. No notification fires after this returns.
    ///
    /// Idempotent, and a no-op once the delivery has finished.
    pub fn cancel(&self) {
        if self.shared.cancel() {
            debug!("Delivery cancelled");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// A cloneable cancel-only handle, e.g. for a response body.
    pub fn canceller(&self) -> DeliveryCanceller {
        DeliveryCanceller {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Wait for the delivery to end and return its final state.
    pub async fn join(self) -> DeliveryState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                warn!("Delivery task ended abnormally: {}", e);
                self.shared.abandon()
            }
        }
    }
}

impl fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("state", &self.state())
            .finish()
    }
}

#[derive(Clone)]
pub struct DeliveryCanceller {
    shared: Arc<Shared>,
}

impl DeliveryCanceller {
    pub fn cancel(&self) {
        if self.shared.cancel() {
            debug!("Delivery cancelled");
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.shared.state()
    }
}

impl fmt::Debug for DeliveryCanceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryCanceller")
            .field("state", &self.state())
            .finish()
    }
}
