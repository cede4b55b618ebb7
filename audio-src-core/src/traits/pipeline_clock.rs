use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::models::time::ClockTime;

/// The pipeline clock the element is running against.
pub trait PipelineClock: Send + Sync {
    /// Current absolute clock time in nanoseconds.
    fn time(&self) -> ClockTime;
}

/// Monotonic clock counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineClock for SystemClock {
    fn time(&self) -> ClockTime {
        self.epoch.elapsed().as_nanos() as ClockTime
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: ClockTime) -> Self {
        Self { now: AtomicU64::new(now) }
    }

    pub fn set(&self, now: ClockTime) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: ClockTime) {
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl PipelineClock for ManualClock {
    fn time(&self) -> ClockTime {
        self.now.load(Ordering::SeqCst)
    }
}
