//! Wake Scheduling
//!
//! ## Overview
//!
//! Before the device sleeps, the engine plans when it must be running again
//! so the next scheduled publish leaves on time. The naive answer is
//! `last_publish + interval`, but waking at exactly that instant means the
//! publish goes out late by however long boot, network attach, and GNSS lock
//! acquisition take. The planner therefore wakes *early* by a learned margin.
//!
//! ## Early-wake estimation
//!
//! On a full wake cycle (cold boot rather than a pause/resume) the margin is
//! re-estimated from what this cycle actually measured:
//!
//! ```text
//! wake_to_lock = first_lock - (wake_time - misc_overhead)   [fallback: t_conn]
//! variance     = last_publish - monotonic_target
//! early_wake   = clamp(wake_to_lock + variance + 1, 0, t_conn)
//! ```
//!
//! `variance` folds in how late the previous publish actually was relative to
//! its monotonic target, so persistent lateness widens the margin and
//! persistent earliness narrows it. The margin never exceeds the transport's
//! connecting-time budget. On a pause/resume cycle no new measurement exists
//! and the previous margin is reused (seeded with `t_conn` the first time).

use crate::constants::MISC_SLEEP_WAKE_SEC;
use crate::time::Seconds;

/// Sleep preparation outcome reported back by the power system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    /// Network interfaces are being brought up after a wake
    Connecting,
    /// Interfaces are being shut down ahead of sleep
    Shutdown,
}

/// Failure to schedule a wake time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum WakeRequestError {
    /// The requested wake time already passed
    #[error("requested wake time is in the past")]
    TimeInPast,
}

/// Everything the planner needs, captured at sleep-prepare time
#[derive(Debug, Clone, Copy)]
pub struct WakePlanInput {
    /// Wall-clock second of the last publish
    pub last_publish: Seconds,
    /// Minimum publish interval, seconds
    pub interval_min: u32,
    /// Maximum publish interval, seconds
    pub interval_max: u32,
    /// Whether triggers are queued (a pending publish gated on min interval)
    pub triggers_pending: bool,
    /// Whether this cycle was a full wake (cold boot) rather than pause/resume
    pub full_wake_cycle: bool,
    /// Milliseconds-since-boot timestamp of this cycle's wake
    pub last_wake_ms: u64,
    /// Wall-clock second of the first stable GNSS lock this cycle, if any
    pub first_lock: Option<Seconds>,
    /// Monotonic schedule target the last publish was measured against
    pub monotonic_anchor: Seconds,
    /// Transport's connecting-time budget, seconds
    pub connecting_time: Seconds,
    /// Early-wake margin carried from the previous cycle
    pub prev_early_wake: Seconds,
}

/// Planned wake time and the margins to carry forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakePlan {
    /// Wall-clock second the device must be running again
    pub wake_at: Seconds,
    /// Margin applied to this plan; the evaluator's deadline slack
    pub early_wake: Seconds,
    /// Margin to reuse if the next cycle is a pause/resume
    pub next_early_wake: Seconds,
}

/// Plan the next wake time
pub fn plan_wake(input: &WakePlanInput) -> WakePlan {
    // Queued triggers are waiting on the min-interval gate; otherwise the
    // next publish is the max-interval one.
    let interval = if input.triggers_pending {
        input.interval_min
    } else {
        input.interval_max
    };
    let mut wake_at = input.last_publish.saturating_add(interval);

    let (early_wake, next_early_wake) = if input.full_wake_cycle {
        let wake_sec = crate::time::to_seconds_rounded(input.last_wake_ms)
            .saturating_sub(MISC_SLEEP_WAKE_SEC);

        let wake_to_lock = match input.first_lock {
            Some(first_lock) => first_lock.saturating_sub(wake_sec),
            // No lock this cycle: assume the full connection budget
            None => input.connecting_time,
        };

        let variance = input.last_publish as i64 - input.monotonic_anchor as i64;
        let margin = (wake_to_lock as i64 + variance + 1).clamp(0, input.connecting_time as i64)
            as Seconds;
        (margin, margin)
    } else {
        let carried = if input.prev_early_wake == 0 {
            input.connecting_time
        } else {
            input.prev_early_wake
        };
        (input.prev_early_wake, carried)
    };

    if wake_at > next_early_wake {
        wake_at -= next_early_wake;
    }

    WakePlan {
        wake_at,
        early_wake,
        next_early_wake,
    }
}
