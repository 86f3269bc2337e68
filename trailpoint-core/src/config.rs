//! Location Config with Transactional Shadow-Copy Commit
//!
//! ## Overview
//!
//! The engine is tuned through a small set of process-wide parameters: the
//! min/max publish intervals, a geofence radius, and boolean feature toggles.
//! Writers never mutate the live config directly. They take a shadow copy,
//! edit it, and commit; the commit validates the candidate as a whole and a
//! violating write is rejected with the prior config retained.
//!
//! The one cross-field invariant is `interval_min <= interval_max`, enforced
//! only at commit so that a writer may pass through transient violations while
//! editing individual fields.
//!
//! Readers get a plain `Copy` of the struct. The engine additionally captures
//! one "loop-safe" snapshot per tick so radio power decisions within a tick
//! observe a consistent config even if a commit lands mid-tick.

use crate::constants::{INTERVAL_LIMIT_SEC, RADIUS_LIMIT_M};
use crate::errors::{TrackerError, TrackerResult};

/// Tunable parameters of the location engine
///
/// Field names mirror the cloud-facing `location` config object; `loc_ack`
/// maps to [`process_ack`](Self::process_ack).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocationConfig {
    /// Geofence radius threshold in meters; 0 disables the radius trigger
    pub radius: f32,
    /// Minimum seconds between trigger-driven publishes; 0 means no minimum
    #[cfg_attr(feature = "serde", serde(rename = "interval_min"))]
    pub interval_min_seconds: u32,
    /// Maximum seconds between publishes; 0 disables the timer publish
    #[cfg_attr(feature = "serde", serde(rename = "interval_max"))]
    pub interval_max_seconds: u32,
    /// Publish only the minimal field set (time/lat/lon)
    pub min_publish: bool,
    /// Raise a `lock` trigger on each new stable GNSS lock
    pub lock_trigger: bool,
    /// Wait for the end-to-end cloud acknowledgement on publishes
    #[cfg_attr(feature = "serde", serde(rename = "loc_ack"))]
    pub process_ack: bool,
    /// Include cellular tower enrichment in publishes
    pub tower: bool,
    /// GNSS receiver enabled
    pub gnss: bool,
    /// Include Wi-Fi access point enrichment in publishes
    pub wps: bool,
    /// Enhanced (cloud-computed) location support
    pub enhance_loc: bool,
    /// Request an enhanced-location callback with each publish
    pub loc_cb: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            radius: 0.0,
            interval_min_seconds: 900,
            interval_max_seconds: 3600,
            min_publish: false,
            lock_trigger: false,
            process_ack: false,
            tower: false,
            gnss: true,
            wps: false,
            enhance_loc: false,
            loc_cb: false,
        }
    }
}

impl LocationConfig {
    /// Validate every field range plus the `min <= max` invariant
    pub fn validate(&self) -> TrackerResult<()> {
        if !(0.0..=RADIUS_LIMIT_M).contains(&self.radius) {
            return Err(TrackerError::ConfigRange { field: "radius" });
        }
        if self.interval_min_seconds > INTERVAL_LIMIT_SEC {
            return Err(TrackerError::ConfigRange { field: "interval_min" });
        }
        if self.interval_max_seconds > INTERVAL_LIMIT_SEC {
            return Err(TrackerError::ConfigRange { field: "interval_max" });
        }
        if self.interval_min_seconds > self.interval_max_seconds {
            return Err(TrackerError::IntervalOrder {
                min: self.interval_min_seconds,
                max: self.interval_max_seconds,
            });
        }
        Ok(())
    }

    /// Overlay the fields present in a partial update
    pub fn apply(&mut self, update: &LocationConfigUpdate) {
        if let Some(v) = update.radius {
            self.radius = v;
        }
        if let Some(v) = update.interval_min_seconds {
            self.interval_min_seconds = v;
        }
        if let Some(v) = update.interval_max_seconds {
            self.interval_max_seconds = v;
        }
        if let Some(v) = update.min_publish {
            self.min_publish = v;
        }
        if let Some(v) = update.lock_trigger {
            self.lock_trigger = v;
        }
        if let Some(v) = update.process_ack {
            self.process_ack = v;
        }
        if let Some(v) = update.tower {
            self.tower = v;
        }
        if let Some(v) = update.gnss {
            self.gnss = v;
        }
        if let Some(v) = update.wps {
            self.wps = v;
        }
        if let Some(v) = update.enhance_loc {
            self.enhance_loc = v;
        }
        if let Some(v) = update.loc_cb {
            self.loc_cb = v;
        }
    }
}

/// Partial update for [`LocationConfig`]; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LocationConfigUpdate {
    /// New geofence radius, meters
    pub radius: Option<f32>,
    /// New minimum publish interval, seconds
    #[cfg_attr(feature = "serde", serde(rename = "interval_min"))]
    pub interval_min_seconds: Option<u32>,
    /// New maximum publish interval, seconds
    #[cfg_attr(feature = "serde", serde(rename = "interval_max"))]
    pub interval_max_seconds: Option<u32>,
    /// New minimal-publish toggle
    pub min_publish: Option<bool>,
    /// New lock-trigger toggle
    pub lock_trigger: Option<bool>,
    /// New end-to-end acknowledgement toggle
    #[cfg_attr(feature = "serde", serde(rename = "loc_ack"))]
    pub process_ack: Option<bool>,
    /// New tower-enrichment toggle
    pub tower: Option<bool>,
    /// New GNSS toggle
    pub gnss: Option<bool>,
    /// New Wi-Fi-enrichment toggle
    pub wps: Option<bool>,
    /// New enhanced-location toggle
    pub enhance_loc: Option<bool>,
    /// New enhanced-callback-request toggle
    pub loc_cb: Option<bool>,
}

/// Holder of the committed config
///
/// `begin` hands out a shadow copy; `commit` validates and swaps it in
/// atomically from the reader's point of view (readers copy the whole struct).
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: LocationConfig,
}

impl ConfigStore {
    /// Create a store holding the given initial config
    pub fn new(initial: LocationConfig) -> TrackerResult<Self> {
        initial.validate()?;
        Ok(Self { current: initial })
    }

    /// Copy of the committed config
    pub fn get(&self) -> LocationConfig {
        self.current
    }

    /// Shadow copy for a writer to edit
    pub fn begin(&self) -> LocationConfig {
        self.current
    }

    /// Validate and install a candidate config
    ///
    /// On error the prior config is retained unchanged.
    pub fn commit(&mut self, candidate: LocationConfig) -> TrackerResult<()> {
        candidate.validate()?;
        self.current = candidate;
        Ok(())
    }

    /// Apply a partial update through the shadow-copy path
    pub fn commit_update(&mut self, update: &LocationConfigUpdate) -> TrackerResult<()> {
        let mut shadow = self.begin();
        shadow.apply(update);
        self.commit(shadow)
    }
}
