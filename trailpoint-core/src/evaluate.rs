//! Publish-Time Evaluator and Decision Table
//!
//! ## Overview
//!
//! Once per tick the engine asks two pure questions:
//!
//! 1. [`evaluate`] - *is it time to publish, and do the radios need to come
//!    up?* A hysteresis-based dual-threshold check: the hard deadline
//!    (`interval_max` past the monotonic anchor) forces a publish, while a
//!    second threshold pulled in by the early-wake margin powers the network
//!    ahead of the deadline so a GNSS lock can be acquired in time.
//! 2. [`decide`] - *given the publish reason and the GNSS lock state, do we
//!    actually publish this tick or hold for a stable lock?* This is the
//!    `(reason x lock state)` table, expressed as a pure function so it can
//!    be tested without any I/O.
//!
//! ## Dual Thresholds
//!
//! ```text
//!              networkNeeded          publish
//!                    |                   |
//!  ------------------+-------------------+------> time
//!     sleep          |<-- early wake --->|
//!                    margin          deadline
//! ```
//!
//! Sleeping as long as possible saves power; waking early enough to acquire
//! a lock bounds latency. The early-wake margin is estimated each sleep cycle
//! from the last observed wake-to-lock latency (see [`crate::sleep`]).
//!
//! Both functions are deterministic given their inputs; the only side effect
//! anywhere near them is the caller's trace logging.

use crate::constants::LOCK_TIMEOUT_SEC;
use crate::gnss::GnssState;
use crate::time::Seconds;

/// Why a publish should (or should not) happen this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReason {
    /// No publish due
    None,
    /// Hard `interval_max` deadline reached
    Time,
    /// Pending triggers and `interval_min` satisfied
    Triggers,
    /// Immediate flag set; overrides all timers
    Immediate,
}

impl PublishReason {
    /// Short name for trace logging
    pub const fn name(&self) -> &'static str {
        match self {
            PublishReason::None => "none",
            PublishReason::Time => "time",
            PublishReason::Triggers => "triggers",
            PublishReason::Immediate => "immediate",
        }
    }
}

/// Output of one evaluator call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationResults {
    /// The single reason produced by this evaluation
    pub reason: PublishReason,
    /// Radios must be powered (independent of whether a publish fires now)
    pub network_needed: bool,
    /// The device should keep waiting for a stable GNSS lock before
    /// publishing
    pub lock_wait: bool,
}

/// Inputs to the evaluator, captured at the top of a tick
#[derive(Debug, Clone, Copy)]
pub struct EvalInput {
    /// Current uptime
    pub now: Seconds,
    /// Uptime of the last actual publish
    pub last_publish: Seconds,
    /// Monotonic publish anchor; advances by fixed intervals to expose drift
    pub monotonic_anchor: Seconds,
    /// Committed `interval_min`; 0 means no minimum
    pub interval_min: Seconds,
    /// Committed `interval_max`; 0 disables the timer publish
    pub interval_max: Seconds,
    /// Trigger queue is non-empty
    pub triggers_pending: bool,
    /// Immediate flag raised
    pub immediate: bool,
    /// Bootstrap publish has not happened yet
    pub first_publish: bool,
    /// Bootstrap publish has been sent but not yet acknowledged
    pub pending_first_publish: bool,
    /// Early-wake margin for this cycle
    pub early_wake: Seconds,
    /// Configured network connect timeout
    pub connecting_time: Seconds,
    /// Uptime when the network was last brought up
    pub network_started: Seconds,
}

/// Evaluate whether a publish is due
///
/// Produces exactly one [`PublishReason`] per call. Pure given its inputs.
pub fn evaluate(input: &EvalInput) -> EvaluationResults {
    // A request for immediate publish overrides min/max interval checking.
    if input.immediate {
        return EvaluationResults {
            reason: PublishReason::Immediate,
            network_needed: true,
            lock_wait: false,
        };
    }

    // Allow a trigger publish on boot. It may be published pre-emptively while
    // the network is still connecting; the lock wait times out after the
    // configured connect window.
    if input.first_publish && !input.pending_first_publish {
        return EvaluationResults {
            reason: PublishReason::Triggers,
            network_needed: true,
            lock_wait: input.now.wrapping_sub(input.network_started) < input.connecting_time,
        };
    }

    let interval = input.now.saturating_sub(input.last_publish);
    let max_interval = input.now.saturating_sub(input.monotonic_anchor);

    let mut network_needed = false;

    if input.interval_max != 0 {
        // The radio must come up an early-wake margin before the hard deadline
        // so a fix can be acquired in time.
        let max_network = input.interval_max.saturating_sub(input.early_wake);
        if max_interval >= max_network {
            network_needed = true;
        }

        if max_interval >= input.interval_max {
            return EvaluationResults {
                reason: PublishReason::Time,
                network_needed: true,
                lock_wait: (max_interval - input.interval_max) < LOCK_TIMEOUT_SEC,
            };
        }
    }

    if input.triggers_pending {
        let min_network = input.interval_min.saturating_sub(input.early_wake);
        if input.interval_min == 0 || interval >= min_network {
            network_needed = true;
        }

        if input.interval_min == 0 || interval >= input.interval_min {
            return EvaluationResults {
                reason: PublishReason::Triggers,
                network_needed: true,
                lock_wait: (interval - input.interval_min) < LOCK_TIMEOUT_SEC,
            };
        }
    }

    EvaluationResults {
        reason: PublishReason::None,
        network_needed,
        lock_wait: false,
    }
}

/// Action decided from `(reason, lock state, lock_wait)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decision {
    /// Publish this tick
    pub publish: bool,
    /// Trigger name to queue before the publish drains the set
    pub raise_trigger: Option<&'static str>,
    /// The monotonic anchor should snap to this publish time
    pub new_monotonic: bool,
}

/// Map a publish reason and the current GNSS state to an action
///
/// ```text
///                         NONE   TIME   TRIGGERS   IMMEDIATE
/// Disabled                 -     pub      pub         pub
/// Off / Error              -     wait*    wait*       pub
/// OnUnlocked               -     wait*    wait*       pub
/// OnLockedUnstable         -     wait*    wait*       pub
/// OnLockedStable           -     pub      pub         pub
///
/// *wait while lock_wait holds, publish once it expires
/// ```
pub fn decide(reason: PublishReason, gnss: GnssState, lock_wait: bool) -> Decision {
    let lock_ready = matches!(gnss, GnssState::Disabled | GnssState::OnLockedStable);

    match reason {
        PublishReason::None => Decision::default(),
        PublishReason::Time => {
            if lock_ready || !lock_wait {
                Decision {
                    publish: true,
                    raise_trigger: Some("time"),
                    new_monotonic: false,
                }
            } else {
                Decision::default()
            }
        }
        PublishReason::Triggers => {
            if lock_ready || !lock_wait {
                Decision {
                    publish: true,
                    raise_trigger: None,
                    new_monotonic: true,
                }
            } else {
                Decision::default()
            }
        }
        PublishReason::Immediate => Decision {
            publish: true,
            raise_trigger: None,
            new_monotonic: true,
        },
    }
}
