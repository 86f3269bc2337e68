//! Location Fix Types
//!
//! A *fix* is a single location observation together with its accuracy and
//! lock-quality metadata. Fixes come from two places:
//!
//! - The on-device fix provider produces a fresh device-measured fix every
//!   tick while GNSS is powered.
//! - The cloud can push back an *enhanced* fix it computed server-side from
//!   cell/Wi-Fi/GNSS hints; those arrive through the `loc-enhanced` command
//!   and carry a `Cloud` provenance tag.
//!
//! Contributing sources are tracked as a small bitset rather than a list:
//! there are only three possible sources and set semantics (no duplicates,
//! order irrelevant) are exactly what the schema needs.

/// Where a fix was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FixKind {
    /// Measured by the device's own receivers
    #[default]
    Device = 0,
    /// Computed server-side and pushed back down (enhanced location)
    Cloud = 1,
}

/// A single location source that contributed to a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LocationSource {
    /// Cellular tower observations
    Cell = 0,
    /// Wi-Fi access point observations
    Wifi = 1,
    /// Satellite navigation
    Gnss = 2,
}

impl LocationSource {
    /// Schema name of this source
    pub const fn name(&self) -> &'static str {
        match self {
            LocationSource::Cell => "cell",
            LocationSource::Wifi => "wifi",
            LocationSource::Gnss => "gnss",
        }
    }

    /// Parse a schema name; unrecognized names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cell" => Some(LocationSource::Cell),
            "wifi" => Some(LocationSource::Wifi),
            "gnss" => Some(LocationSource::Gnss),
            _ => None,
        }
    }
}

/// Bit set of contributing location sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSet(u8);

impl SourceSet {
    /// The empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add a source; adding twice is a no-op
    pub fn insert(&mut self, source: LocationSource) {
        self.0 |= 1 << source as u8;
    }

    /// Check membership
    pub const fn contains(&self, source: LocationSource) -> bool {
        (self.0 & (1 << source as u8)) != 0
    }

    /// Check if no source has been recorded
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// A single location observation with accuracy and lock-quality metadata
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationPoint {
    /// Provenance of this fix
    pub kind: FixKind,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude in meters
    pub altitude: f32,
    /// Heading in degrees from north
    pub heading: f32,
    /// Ground speed in meters per second
    pub speed: f32,
    /// Horizontal accuracy estimate in meters
    pub horizontal_accuracy: f32,
    /// Vertical accuracy estimate in meters
    pub vertical_accuracy: f32,
    /// Fix time in epoch seconds
    pub epoch_time: u64,
    /// Receiver reports a position lock
    pub locked: bool,
    /// Lock has settled enough to trust
    pub stable: bool,
    /// Sources that contributed to this fix
    pub sources: SourceSet,
}

/// Power/health status reported by the fix provider
#[derive(Debug, Clone, Copy, Default)]
pub struct FixStatus {
    /// GNSS hardware is currently powered
    pub powered: bool,
}
