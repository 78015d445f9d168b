//! Monotonic time source with single-shot, unschedulable waits (spec §3 Clock).

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Nanosecond-resolution clock time. `NONE` (`u64::MAX`) marks "no time".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(pub u64);

impl ClockTime {
    pub const NONE: ClockTime = ClockTime(u64::MAX);
    pub const ZERO: ClockTime = ClockTime(0);

    pub fn from_nanos(ns: u64) -> Self {
        ClockTime(ns)
    }

    pub fn from_millis(ms: u64) -> Self {
        ClockTime(ms.saturating_mul(1_000_000))
    }

    pub fn is_none(&self) -> bool {
        *self == ClockTime::NONE
    }

    pub fn nanos(&self) -> u64 {
        self.0
    }

    pub fn saturating_sub(self, rhs: ClockTime) -> ClockTime {
        if self.is_none() || rhs.is_none() {
            return ClockTime::NONE;
        }
        ClockTime(self.0.saturating_sub(rhs.0))
    }

    pub fn saturating_add(self, rhs: ClockTime) -> ClockTime {
        if self.is_none() || rhs.is_none() {
            return ClockTime::NONE;
        }
        ClockTime(self.0.saturating_add(rhs.0))
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "NONE")
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

/// Outcome of waiting on a single-shot clock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockWaitResult {
    /// The requested time was reached.
    Ok,
    /// `unschedule` was called before the time was reached.
    Unscheduled,
}

struct ClockIdInner {
    target: ClockTime,
    unscheduled: Mutex<bool>,
    cond: Condvar,
}

/// A single-shot wait handle. Cloning shares the same underlying wait so
/// that the waiter and the canceller (e.g. `BaseSource::unlock`) agree on
/// state.
#[derive(Clone)]
pub struct ClockId {
    inner: Arc<ClockIdInner>,
}

impl ClockId {
    pub fn time(&self) -> ClockTime {
        self.inner.target
    }

    /// Cancel this wait. Idempotent, as required by spec §5.
    pub fn unschedule(&self) {
        let mut g = self.inner.unscheduled.lock();
        *g = true;
        self.inner.cond.notify_all();
    }
}

/// Monotonic clock. Internally thread-safe (spec §5).
pub struct Clock {
    epoch: Instant,
    offset_ns: AtomicU64,
    live_waiters: AtomicUsize,
    name: String,
}

impl Clock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            epoch: Instant::now(),
            offset_ns: AtomicU64::new(0),
            live_waiters: AtomicUsize::new(0),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn now(&self) -> ClockTime {
        let elapsed = self.epoch.elapsed().as_nanos() as u64;
        ClockTime(elapsed + self.offset_ns.load(Ordering::Relaxed))
    }

    /// Advance this clock's idea of "now" independent of wall time; used by
    /// tests and by system-clock adjustment. Offset is additive and never
    /// rewinds below the current reading, keeping the clock monotonic.
    pub fn advance(&self, by: Duration) {
        self.offset_ns
            .fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Schedule a single-shot wait for `target`. Returns a `ClockId` the
    /// caller waits on and that a second thread may `unschedule`.
    pub fn new_single_shot_id(&self, target: ClockTime) -> ClockId {
        ClockId {
            inner: Arc::new(ClockIdInner {
                target,
                unscheduled: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Block the calling thread until `id.time()` is reached or the id is
    /// unscheduled.
    pub fn wait(&self, id: &ClockId) -> ClockWaitResult {
        self.live_waiters.fetch_add(1, Ordering::Relaxed);
        let result = loop {
            let mut g = id.inner.unscheduled.lock();
            if *g {
                break ClockWaitResult::Unscheduled;
            }
            let now = self.now();
            if now >= id.inner.target {
                break ClockWaitResult::Ok;
            }
            let remaining = Duration::from_nanos(id.inner.target.0 - now.0);
            // Bound each wait slice so we re-check wall-clock progress even
            // though this clock's `now` can be advanced out of band by tests.
            let slice = remaining.min(Duration::from_millis(20));
            let _ = self.live_waiters_dummy(&mut g, &id.inner.cond, slice);
        };
        self.live_waiters.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn live_waiters_dummy(
        &self,
        guard: &mut parking_lot::MutexGuard<'_, bool>,
        cond: &Condvar,
        slice: Duration,
    ) -> parking_lot::WaitTimeoutResult {
        cond.wait_for(guard, slice)
    }

    /// Number of threads currently blocked in `wait`. Exposed for tests
    /// that assert cancellation actually wakes a blocked waiter.
    pub fn active_waiters(&self) -> usize {
        self.live_waiters.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("name", &self.name)
            .field("now", &self.now())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration as StdDuration;

    #[test]
    fn now_is_monotonic() {
        let clock = Clock::new("test");
        let a = clock.now();
        thread::sleep(StdDuration::from_millis(5));
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn unschedule_wakes_waiter() {
        let clock = Arc::new(Clock::new("test"));
        let id = clock.new_single_shot_id(ClockTime(u64::MAX / 2));
        let waiter_clock = clock.clone();
        let waiter_id = id.clone();
        let handle = thread::spawn(move || waiter_clock.wait(&waiter_id));

        // Give the waiter a moment to actually enter the wait.
        thread::sleep(StdDuration::from_millis(20));
        id.unschedule();
        let result = handle.join().unwrap();
        assert_eq!(result, ClockWaitResult::Unscheduled);
    }

    #[test]
    fn unschedule_is_idempotent() {
        let clock = Clock::new("test");
        let id = clock.new_single_shot_id(ClockTime(1));
        id.unschedule();
        id.unschedule();
    }

    #[test]
    fn wait_returns_ok_when_time_reached() {
        let clock = Clock::new("test");
        let id = clock.new_single_shot_id(ClockTime::ZERO);
        assert_eq!(clock.wait(&id), ClockWaitResult::Ok);
    }
}
