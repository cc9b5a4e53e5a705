//! Timestamp source for the request tracer.
//!
//! Timestamps are nanoseconds since the UNIX epoch. "Unset" is modelled as
//! `Option<Timestamp>` at the API level; the atomic cell below uses zero
//! internally, which a `Timestamp` can never hold.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point in time, in nanoseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NonZeroU64);

impl Timestamp {
    /// Creates a timestamp from raw nanoseconds. Returns `None` for zero.
    pub fn from_nanos(nanos: u64) -> Option<Self> {
        NonZeroU64::new(nanos).map(Self)
    }

    pub fn as_nanos(self) -> u64 {
        self.0.get()
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later than `self`.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.as_nanos().saturating_sub(earlier.as_nanos()))
    }

    pub fn to_system_time(self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.as_nanos())
    }

    /// Converts a wall-clock time, clamping pre-epoch values to the smallest timestamp.
    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = time
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self(NonZeroU64::new(nanos).unwrap_or(NonZeroU64::MIN))
    }
}

/// Trait for time sources.
///
/// This abstraction allows the tracer to be driven by a deterministic
/// clock in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_system_time(SystemTime::now())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            nanos: AtomicU64::new(start.as_nanos()),
        }
    }

    pub fn set(&self, ts: Timestamp) {
        self.nanos.store(ts.as_nanos(), Ordering::SeqCst);
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.nanos.load(Ordering::SeqCst))
            .unwrap_or(Timestamp(NonZeroU64::MIN))
    }
}

/// Lock-free optional timestamp.
#[derive(Debug, Default)]
pub struct AtomicTimestamp(AtomicU64);

impl AtomicTimestamp {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn load(&self) -> Option<Timestamp> {
        Timestamp::from_nanos(self.0.load(Ordering::Acquire))
    }

    /// Records `ts` only if nothing was recorded yet. Returns whether this call won.
    pub fn set_once(&self, ts: Timestamp) -> bool {
        self.0
            .compare_exchange(0, ts.as_nanos(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Records `ts` unconditionally.
    pub fn store(&self, ts: Timestamp) {
        self.0.store(ts.as_nanos(), Ordering::Release);
    }
}
