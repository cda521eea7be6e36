//! # Rate Limiter
//!
//! Minimum-interval throttle for publishers and subscribers.
//!
//! An event is accepted iff at least `1 / rate` seconds have elapsed since
//! the last accepted event. Rejected events are discarded, not queued, and
//! counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const NEVER: u64 = u64::MAX;

/// Lock-free minimum-interval gate.
///
/// # Algorithm
///
/// - `last` holds the nanosecond offset (from `epoch`) of the last accepted event
/// - `try_accept` compares the elapsed time against `period`
/// - a compare-exchange on `last` settles concurrent callers: exactly one wins
pub struct Throttle {
    /// Minimum spacing between accepted events.
    period: Duration,
    /// Reference instant for `last`.
    epoch: Instant,
    /// Offset of the last accepted event, `NEVER` before the first.
    last: AtomicU64,
    /// Rejected events.
    drops: AtomicU64,
}

impl Throttle {
    /// Allow at most `rate` events per second. `rate` must be non-zero.
    #[must_use]
    pub fn per_second(rate: u64) -> Self {
        let rate = rate.max(1);
        Self {
            period: Duration::from_nanos(1_000_000_000 / rate),
            epoch: Instant::now(),
            last: AtomicU64::new(NEVER),
            drops: AtomicU64::new(0),
        }
    }

    /// Build a throttle from an optional rate.
    #[must_use]
    pub fn from_rate(rate: Option<u64>) -> Option<Self> {
        rate.filter(|r| *r > 0).map(Self::per_second)
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(NEVER - 1)
    }

    fn ready_at(&self, last: u64, now: u64) -> bool {
        last == NEVER || now.saturating_sub(last) >= self.period.as_nanos() as u64
    }

    /// True if an event would be accepted now. Does not consume the slot.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready_at(self.last.load(Ordering::Acquire), self.now_nanos())
    }

    /// Accept the event if ready, otherwise count a drop.
    pub fn try_accept(&self) -> bool {
        loop {
            let last = self.last.load(Ordering::Acquire);
            let now = self.now_nanos();
            if !self.ready_at(last, now) {
                self.drops.fetch_add(1, Ordering::Relaxed);
                return false;
            }

            if self
                .last
                .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Number of rejected events.
    #[must_use]
    pub fn drops(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("period", &self.period)
            .field("drops", &self.drops())
            .finish()
    }
}
