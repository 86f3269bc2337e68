//! Tuning Constants for the Location-Publish Engine
//!
//! ## Overview
//!
//! Everything here is a compile-time constant so the scheduler's memory and
//! timing behavior can be audited without running the device. Values fall into
//! three groups:
//!
//! 1. **Loop timing** - how often the tick runs and the fixed overheads of the
//!    sleep/wake cycle that the wake-time estimator must account for.
//! 2. **Payload sizing** - the fixed publish buffer and the per-entry byte
//!    estimates used to bound enrichment inside the remaining buffer space.
//! 3. **Collection caps** - hard limits on towers, Wi-Fi access points, and
//!    pending triggers so nothing in the tick path can grow unbounded.
//!
//! ## Enrichment Estimates
//!
//! Enrichment is written just-in-time into whatever space remains in the
//! publish buffer. Rather than serializing speculatively, the builders use a
//! worst-case byte estimate per entry plus a header/footer estimate, and cap
//! the entry count to `(remaining - header) / per_entry`. The estimates only
//! need to be conservative, not exact.

/// Period of the cooperative polling loop, in milliseconds.
pub const LOOP_SAMPLE_PERIOD_MS: u64 = 1000;

/// Execution extension granted when voting for an early shutdown after wake,
/// in seconds.
pub const EARLY_SLEEP_SEC: u32 = 2;

/// Miscellaneous time spent by the system entering and exiting sleep,
/// in seconds.
pub const MISC_SLEEP_WAKE_SEC: u32 = 3;

/// Time to wait for a stable GNSS lock before publishing anyway (sleep
/// disabled), in seconds.
pub const LOCK_TIMEOUT_SEC: u32 = 10;

/// Capacity of the serialized publish buffer, in bytes.
pub const PUBLISH_BUFFER_SIZE: usize = 1024;

/// Bytes reserved at the end of the buffer for closing the payload envelope.
pub const CLOSE_ESTIMATE: usize = 2;

/// Worst-case header/footer bytes for the `wps` enrichment array,
/// i.e. `,"wps":[]`.
pub const WPS_HEADER_ESTIMATE: usize = 11;

/// Worst-case bytes for one Wi-Fi access point entry,
/// i.e. `{"bssid":"00:11:22:33:44:55","ch":99,"str":-999},`.
pub const WPS_ENTRY_ESTIMATE: usize = 55;

/// Worst-case header/footer bytes for the `towers` enrichment array.
pub const TOWER_HEADER_ESTIMATE: usize = 14;

/// Worst-case bytes for one cellular tower entry (serving or neighbor).
pub const TOWER_ENTRY_ESTIMATE: usize = 75;

/// Maximum towers written per publish; the serving cell consumes one slot.
pub const MAX_TOWER_SEND: usize = 5;

/// Maximum neighbor cells retained from one modem query.
pub const MAX_NEIGHBOR_COLLECT: usize = 8;

/// Maximum Wi-Fi access points retained from one scan.
pub const MAX_WPS_COLLECT: usize = 20;

/// Maximum distinct trigger names queued between publishes.
pub const MAX_TRIGGERS: usize = 8;

/// Maximum nesting depth of the payload writer.
pub const MAX_JSON_DEPTH: usize = 8;

/// Upper bound for `interval_min`/`interval_max` config values, in seconds.
pub const INTERVAL_LIMIT_SEC: u32 = 86_400;

/// Upper bound for the geofence radius config value, in meters.
pub const RADIUS_LIMIT_M: f32 = 1_000_000.0;
