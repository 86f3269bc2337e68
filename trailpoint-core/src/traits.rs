//! Collaborator Seams
//!
//! The engine owns no hardware. Everything it touches sits behind one of
//! these traits: the fix provider, the cloud transport, the power/sleep
//! system, and the two radios queried for enrichment. Production code wires
//! in the real peripherals; tests wire in scripted doubles.
//!
//! The transport's `send` uses the [`nb`] convention: `WouldBlock` means the
//! transport is busy right now and the payload should be retried on a later
//! tick, while a real error means this attempt is over.

use crate::errors::{SendError, TrackerResult};
use crate::fix::{FixStatus, LocationPoint};
use crate::radio::WifiAccessPoint;
use crate::sleep::WakeRequestError;
use crate::time::Seconds;

/// Source of position fixes, usually a GNSS receiver
pub trait FixProvider {
    /// Current power and health state of the receiver
    fn status(&self) -> FixStatus;

    /// Latest fix; an error means retrieval failed this tick
    fn location(&mut self) -> TrackerResult<LocationPoint>;

    /// Power the receiver up
    fn start(&mut self);

    /// Power the receiver down
    fn stop(&mut self);

    /// Configure the geofence radius used by [`Self::is_outside_radius`]
    fn set_radius_threshold(&mut self, radius_m: f32);

    /// Currently configured geofence radius
    fn radius_threshold(&self) -> f32;

    /// Whether the point lies outside the radius around the way point
    fn is_outside_radius(&mut self, point: &LocationPoint) -> TrackerResult<bool>;

    /// Move the geofence way point; called after each published fix
    fn set_way_point(&mut self, latitude: f64, longitude: f64);
}

/// Cloud-bound message transport
pub trait CloudTransport {
    /// Whether the transport currently has a usable connection
    fn connected(&self) -> bool;

    /// Hand a payload to the transport
    ///
    /// `full_ack` requests end-to-end acknowledgement; the terminal outcome
    /// arrives later through the engine's outcome channel. `WouldBlock`
    /// means busy, try again next tick.
    fn send(&mut self, payload: &str, full_ack: bool) -> nb::Result<(), SendError>;
}

/// Power and sleep scheduling system
pub trait SleepControl {
    /// Request a wake at the given wall-clock second
    fn wake_at(&mut self, at: Seconds) -> Result<(), WakeRequestError>;

    /// Force the next wake to be a full cycle (cold boot path)
    fn force_full_wake_cycle(&mut self);

    /// Keep the device awake for at least `seconds` more; `early_shutdown`
    /// votes to sleep as soon as other holders release
    fn extend_execution(&mut self, seconds: Seconds, early_shutdown: bool);

    /// Whether the current cycle is a full wake rather than pause/resume
    fn is_full_wake_cycle(&self) -> bool;

    /// Whether sleep is disabled entirely (bench or mains power)
    fn is_sleep_disabled(&self) -> bool;

    /// Budgeted worst-case network attach time, seconds
    fn connecting_time(&self) -> Seconds;
}

/// Wi-Fi radio used for access point scans
pub trait WifiRadio {
    /// Power the radio up
    fn on(&mut self);

    /// Power the radio down
    fn off(&mut self);

    /// Scan and append visible access points, strongest coverage first is
    /// not guaranteed; results arrive in radio order
    fn scan(
        &mut self,
        out: &mut heapless::Vec<WifiAccessPoint, { crate::constants::MAX_WPS_COLLECT }>,
    ) -> TrackerResult<()>;
}

/// Cellular modem command channel
pub trait CellularRadio {
    /// Run an AT command, feeding each response line to `each_line`
    fn query(&mut self, command: &str, each_line: &mut dyn FnMut(&str)) -> TrackerResult<()>;
}
