//! Error and Outcome Types for the Location Engine
//!
//! ## Design Philosophy
//!
//! The error system follows embedded constraints:
//!
//! 1. **Small Size**: Variants carry only inline data (`&'static str`,
//!    integers) so errors stay cheap to return from hot paths.
//! 2. **No Heap Allocation**: No `String` anywhere; deterministic memory use.
//! 3. **Copy Semantics**: Errors implement `Copy` for painless propagation.
//! 4. **Degradation over Failure**: Nothing in this crate is fatal to the
//!    process. Every error maps to "drop this record", "reject this commit",
//!    or "report failure and try again next cycle".
//!
//! ## Error Categories
//!
//! - **Config**: `IntervalOrder`, `ConfigRange` - rejected at commit time,
//!   prior config retained.
//! - **Parsing**: `NotEnoughData`, `NotSupported` - a malformed modem record
//!   is dropped without touching the rest of the publish.
//! - **Commands**: `InvalidArgument` - a malformed cloud command rejects the
//!   whole update, no partial mutation.
//! - **Buffers**: `BufferOverflow` - the fixed publish/retry buffer could not
//!   hold the data; escalated to a terminal publish failure.

use thiserror_no_std::Error;

/// Result type for engine operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Errors surfaced by the location engine - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    /// Config commit would leave `interval_min > interval_max`
    #[error("interval_min {min}s exceeds interval_max {max}s")]
    IntervalOrder {
        /// Candidate minimum publish interval
        min: u32,
        /// Candidate maximum publish interval
        max: u32,
    },

    /// Config value outside its documented range
    #[error("config value for {field} out of range")]
    ConfigRange {
        /// Name of the offending config field
        field: &'static str,
    },

    /// Fewer parsed fields than the response grammar requires
    #[error("insufficient data: need {required} fields, have {available}")]
    NotEnoughData {
        /// Fields the grammar requires
        required: usize,
        /// Fields actually parsed
        available: usize,
    },

    /// Token or operation outside the supported set
    #[error("not supported: {what}")]
    NotSupported {
        /// What was rejected
        what: &'static str,
    },

    /// Malformed argument in a cloud command or API call
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected
        reason: &'static str,
    },

    /// Fixed-capacity buffer could not hold the data
    #[error("buffer capacity exhausted")]
    BufferOverflow,
}

/// Terminal failure kinds reported by the cloud transport for a send that was
/// accepted but could not complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// No cloud session is established
    #[error("transport not connected")]
    NotConnected,
    /// The transport rejected the payload outright
    #[error("transport rejected payload")]
    Rejected,
}

/// Terminal outcome of one cloud send attempt.
///
/// Exactly one of these is delivered for every send that was accepted by the
/// transport, and one-shot publish callbacks are drained exactly once per
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// Cloud acknowledged the publish
    Success,
    /// Delivery failed; a transient failure installs a retry buffer
    Failure,
    /// No acknowledgement arrived in time; no retry is attempted
    Timeout,
    /// Status code outside the known set, passed through to callbacks
    Unexpected(i32),
}

#[cfg(feature = "defmt")]
impl defmt::Format for TrackerError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::IntervalOrder { min, max } =>
                defmt::write!(fmt, "interval_min {}s exceeds interval_max {}s", min, max),
            Self::ConfigRange { field } =>
                defmt::write!(fmt, "config value for {} out of range", field),
            Self::NotEnoughData { required, available } =>
                defmt::write!(fmt, "need {} fields, have {}", required, available),
            Self::NotSupported { what } =>
                defmt::write!(fmt, "not supported: {}", what),
            Self::InvalidArgument { reason } =>
                defmt::write!(fmt, "invalid argument: {}", reason),
            Self::BufferOverflow =>
                defmt::write!(fmt, "buffer capacity exhausted"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PublishStatus {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Success => defmt::write!(fmt, "success"),
            Self::Failure => defmt::write!(fmt, "failure"),
            Self::Timeout => defmt::write!(fmt, "timeout"),
            Self::Unexpected(code) => defmt::write!(fmt, "unexpected status {}", code),
        }
    }
}
