//! Time source abstraction.

use chrono::{DateTime, Duration, DurationRound, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonically nondecreasing wall-clock time, millisecond precision.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock, truncated to whole milliseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        now.duration_trunc(Duration::milliseconds(1)).unwrap_or(now)
    }
}

/// Deterministic clock for tests: an atomic millisecond counter that only
/// moves when told to.
#[derive(Debug)]
pub struct MockClock {
    epoch_ms: AtomicI64,
}

impl MockClock {
    /// Starts the clock at the given milliseconds since the UNIX epoch.
    pub fn at_epoch_ms(epoch_ms: i64) -> Self {
        Self { epoch_ms: AtomicI64::new(epoch_ms) }
    }

    /// Advances the clock by `ms` milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.epoch_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute epoch-millisecond value.
    pub fn set_ms(&self, epoch_ms: i64) {
        self.epoch_ms.store(epoch_ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.epoch_ms.load(Ordering::SeqCst))
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}
