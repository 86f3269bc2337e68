//! GNSS Lock Classification
//!
//! Every tick the engine distills the fix provider's status into one
//! [`GnssState`]. The classification is deliberately ordered: config gate
//! first (`Disabled`), then power (`Off`), then fix retrieval (`Error`), then
//! the `locked`/`stable` flags of the fix itself.
//!
//! [`LockMonitor`] watches the per-tick states for the transition *into*
//! `OnLockedStable`. That edge does two things:
//!
//! - records the first-lock time once per wake cycle, which feeds the
//!   wake-time estimator's wake-to-lock latency measurement, and
//! - raises a `lock` trigger, but only while sleep is disabled and the
//!   `lock_trigger` toggle is on. While sleep is enabled the trigger is
//!   suppressed so the device does not wake solely to re-announce a lock.

use crate::fix::LocationPoint;
use crate::time::Seconds;

/// GNSS receiver state distilled once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GnssState {
    /// Receiver disabled by config
    Disabled = 0,
    /// Receiver enabled but not powered
    Off = 1,
    /// Fix retrieval failed
    Error = 2,
    /// Powered, no position lock yet
    OnUnlocked = 3,
    /// Locked but the solution has not settled
    OnLockedUnstable = 4,
    /// Locked and stable; the fix is trustworthy
    OnLockedStable = 5,
}

impl GnssState {
    /// Short name for trace logging
    pub const fn name(&self) -> &'static str {
        match self {
            GnssState::Disabled => "disabled",
            GnssState::Off => "off",
            GnssState::Error => "error",
            GnssState::OnUnlocked => "on-unlocked",
            GnssState::OnLockedUnstable => "on-locked-unstable",
            GnssState::OnLockedStable => "on-locked-stable",
        }
    }
}

/// Classify the receiver state from this tick's observations
///
/// `fix` is `None` when fix retrieval errored; the point itself supplies the
/// `locked`/`stable` flags.
pub fn classify(gnss_enabled: bool, powered: bool, fix: Option<&LocationPoint>) -> GnssState {
    if !gnss_enabled {
        return GnssState::Disabled;
    }
    if !powered {
        return GnssState::Off;
    }
    let Some(fix) = fix else {
        return GnssState::Error;
    };
    if !fix.locked {
        GnssState::OnUnlocked
    } else if !fix.stable {
        GnssState::OnLockedUnstable
    } else {
        GnssState::OnLockedStable
    }
}

/// Tracks transitions into a stable lock across ticks
#[derive(Debug)]
pub struct LockMonitor {
    last_state: GnssState,
    first_lock: Option<Seconds>,
}

impl LockMonitor {
    /// Create a monitor with no lock history
    pub const fn new() -> Self {
        Self {
            last_state: GnssState::Off,
            first_lock: None,
        }
    }

    /// Uptime of the first stable lock this wake cycle, if observed
    pub fn first_lock(&self) -> Option<Seconds> {
        self.first_lock
    }

    /// Forget the first-lock time; called on wake so the next lock is "first"
    pub fn reset_first_lock(&mut self) {
        self.first_lock = None;
    }

    /// Record this tick's state; returns a trigger name to raise when the
    /// transition into a stable lock warrants one
    pub fn observe(
        &mut self,
        state: GnssState,
        now: Seconds,
        sleep_disabled: bool,
        lock_trigger_enabled: bool,
    ) -> Option<&'static str> {
        let mut raise = None;

        if state == GnssState::OnLockedStable && self.last_state != state {
            if self.first_lock.is_none() {
                self.first_lock = Some(now);
            }

            // Suppressed while sleeping so lock events alone never wake us
            if sleep_disabled && lock_trigger_enabled {
                raise = Some("lock");
            }
        }

        self.last_state = state;
        raise
    }
}

impl Default for LockMonitor {
    fn default() -> Self {
        Self::new()
    }
}
