//! Spreading a body over its transfer window.

use std::time::Duration;

/// One scheduled slice of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub offset: u64,
    pub len: u64,
    /// Offset from the start of the transfer window
    pub at: Duration,
}

/// Linear delivery plan for `total` bytes over `window`.
///
/// Slots are `slot_interval` apart (fewer if the body is small). The first
/// slot fires at the start of the window and the last one exactly at its
/// end, so the final byte never arrives before the window has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: u64,
    window: Duration,
    slots: u64,
}

impl ChunkPlan {
    pub fn new(total: u64, window: Duration, slot_interval: Duration) -> Self {
        let slots = if total == 0 {
            0
        } else if window.is_zero() {
            1
        } else {
            let slot = slot_interval.as_nanos().max(1);
            let needed = window.as_nanos().div_ceil(slot) + 1;
            let cap = u128::from(total.max(2));
            needed.clamp(2, cap) as u64
        };
        ChunkPlan {
            total,
            window,
            slots,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn slots(&self) -> u64 {
        self.slots
    }

    /// Non-empty chunks in byte order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + Send + 'static {
        let plan = *self;
        (0..plan.slots)
            .map(move |k| plan.chunk(k))
            .filter(|c| c.len > 0)
    }

    fn chunk(&self, k: u64) -> Chunk {
        let n = u128::from(self.slots);
        let total = u128::from(self.total);
        let start = total * u128::from(k) / n;
        let end = total * (u128::from(k) + 1) / n;
        let at = if self.slots <= 1 {
            Duration::ZERO
        } else {
            let nanos = self.window.as_nanos() * u128::from(k) / (n - 1);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };
        Chunk {
            offset: start as u64,
            len: (end - start) as u64,
            at,
        }
    }
}
