//! Time management for the tracker engine
//!
//! Provides a clock abstraction so the engine can run against:
//! - The platform monotonic timer (normal operation)
//! - System wall-clock time (when available)
//! - A fixed or externally driven source (tests)
//!
//! The engine does all of its scheduling arithmetic in whole seconds of
//! uptime; milliseconds only matter for the tick rate limiter and the
//! wake-to-lock latency estimate.

/// Timestamp in milliseconds since device boot (or epoch for wall clocks)
pub type Timestamp = u64;

/// Whole seconds of device uptime
pub type Seconds = u32;

/// Convert a millisecond timestamp to whole seconds, truncating
pub const fn to_seconds(ts: Timestamp) -> Seconds {
    (ts / 1000) as Seconds
}

/// Convert a millisecond timestamp to whole seconds, rounding to nearest
pub const fn to_seconds_rounded(ts: Timestamp) -> Seconds {
    ((ts + 500) / 1000) as Seconds
}

/// Source of time for the engine
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;
}

/// System time source (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemTime;

#[cfg(feature = "std")]
impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Fixed time source for pure tests
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Create a source frozen at the given timestamp
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Move the clock to an absolute time
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Advance the clock by a delta
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Externally driven clock, shareable between a test and the engine
///
/// The engine owns its time source, so integration tests use this handle to
/// advance time from outside while the engine reads it from inside.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Default)]
pub struct SharedTime(std::sync::Arc<core::sync::atomic::AtomicU64>);

#[cfg(feature = "std")]
impl SharedTime {
    /// Create a shared clock starting at the given timestamp
    pub fn new(timestamp: Timestamp) -> Self {
        Self(std::sync::Arc::new(core::sync::atomic::AtomicU64::new(
            timestamp,
        )))
    }

    /// Move the clock to an absolute time
    pub fn set(&self, timestamp: Timestamp) {
        self.0.store(timestamp, core::sync::atomic::Ordering::Release);
    }

    /// Advance the clock by a delta
    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, core::sync::atomic::Ordering::AcqRel);
    }
}

#[cfg(feature = "std")]
impl TimeSource for SharedTime {
    fn now(&self) -> Timestamp {
        self.0.load(core::sync::atomic::Ordering::Acquire)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}
