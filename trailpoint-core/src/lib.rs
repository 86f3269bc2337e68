//! TrailPoint Core - Location-Publish Scheduling and Delivery
//!
//! ## Overview
//!
//! This crate is the location engine of a battery-powered asset tracker: it
//! decides *when* a device should publish its position, composes the publish
//! payload into a fixed buffer, and shepherds each payload through a
//! non-blocking cloud transport with single-slot retry.
//!
//! The scheduling core is a pair of pure functions driven once per second by
//! a cooperative tick:
//!
//! - [`evaluate::evaluate`] answers "is a publish due, and do the radios need
//!   to come up?" using a dual-threshold check around a monotonic schedule
//!   anchor.
//! - [`evaluate::decide`] maps the publish reason and the current GNSS lock
//!   state to an action, holding a due publish briefly while a stable lock is
//!   still worth waiting for.
//!
//! Around that core sit the trigger queue ([`triggers`]), the transactional
//! config store ([`config`]), payload assembly with byte-bounded cell/Wi-Fi
//! enrichment ([`payload`], [`radio`]), and the wake-time planner that wakes
//! the device early enough to have a GNSS lock by the publish deadline
//! ([`sleep`]).
//!
//! ## Architecture
//!
//! ```text
//!   TriggerHandle ----+                        +--> FixProvider
//!   (any context)     |                        +--> CloudTransport
//!                     v                        +--> SleepControl
//!   cloud cmds --> LocationEngine::tick() -----+--> WifiRadio
//!                     ^                        +--> CellularRadio
//!   outcome mpsc -----+                        +--> TimeSource
//! ```
//!
//! The engine owns no hardware; every peripheral sits behind a [`traits`]
//! seam, so the whole engine runs unmodified against scripted doubles.
//!
//! ## Feature Flags
//!
//! - `std` (default): the engine orchestration, cloud command decoding, and
//!   `log`-based diagnostics. The scheduling, payload, and parsing modules
//!   stay `no_std`-clean without it.
//! - `embedded`: `defmt` formatting for error and status types.
//!
//! ## Example
//!
//! ```no_run
//! use trailpoint_core::LocationConfig;
//!
//! let mut config = LocationConfig::default();
//! config.interval_min_seconds = 60;
//! config.interval_max_seconds = 600;
//! config.lock_trigger = true;
//! assert!(config.validate().is_ok());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod constants;
pub mod errors;
pub mod evaluate;
pub mod fix;
pub mod gnss;
pub mod payload;
pub mod radio;
pub mod sleep;
pub mod time;
pub mod traits;
pub mod triggers;

#[cfg(feature = "std")]
pub mod commands;
#[cfg(feature = "std")]
pub mod engine;

pub use config::{ConfigStore, LocationConfig, LocationConfigUpdate};
pub use errors::{PublishStatus, SendError, TrackerError, TrackerResult};
pub use evaluate::{decide, evaluate, Decision, EvalInput, EvaluationResults, PublishReason};
pub use fix::{FixKind, FixStatus, LocationPoint, LocationSource, SourceSet};
pub use gnss::{classify, GnssState, LockMonitor};
pub use payload::{PublishBuffer, PublishWriter};
pub use sleep::{plan_wake, SleepState, WakePlan, WakePlanInput, WakeRequestError};
pub use time::{Seconds, TimeSource, Timestamp};
pub use traits::{CellularRadio, CloudTransport, FixProvider, SleepControl, WifiRadio};
pub use triggers::{TriggerKind, TriggerSet};

#[cfg(feature = "std")]
pub use engine::{Collaborators, EnhancedCallback, LocationCallback, LocationEngine};
#[cfg(feature = "std")]
pub use triggers::{PublishCallback, TriggerHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn version_is_set() {
        assert!(!super::VERSION.is_empty());
    }
}
