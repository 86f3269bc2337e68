//! Bounded JSON Payload Assembly
//!
//! ## Overview
//!
//! Publish payloads are serialized directly into a fixed-capacity buffer, the
//! same buffer the transport reads from. A small incremental writer tracks
//! nesting and comma placement and, crucially, can report how many bytes
//! remain at any point mid-build. That capability is what lets the tower and
//! Wi-Fi enrichers fill "as much as fits" instead of risking a truncated
//! payload: each computes a conservative per-entry byte estimate up front and
//! caps its entry count to `(remaining - header) / per_entry`, writing
//! nothing at all when even the header would not fit.
//!
//! A general-purpose serializer cannot do this against a fixed buffer
//! incrementally, which is why the payload path does not go through
//! `serde_json` (command *decoding* does).
//!
//! ## Schema
//!
//! ```text
//! {"cmd":"loc",
//!  "loc":{"lck":1,"time":..,"lat":..,"lon":..,"alt":..,"hd":..,"spd":..,
//!         "h_acc":..,"v_acc":..,<enricher fields>},
//!  "trig":["time","lock",...],
//!  "loc_cb":true,
//!  "towers":[{"rat":"lte","mcc":..,"mnc":..,"lac":..,"cid":..,"str":..},
//!            {"nid":..,"ch":..,"str":..},...],
//!  "wps":[{"bssid":"aa:bb:cc:dd:ee:ff","ch":..,"str":..},...]}
//! ```
//!
//! Values are controlled tokens (numbers, fixed names, MAC strings); the
//! writer performs no string escaping.

use core::fmt::Write as _;

use crate::constants::{
    CLOSE_ESTIMATE, MAX_TOWER_SEND, PUBLISH_BUFFER_SIZE, TOWER_ENTRY_ESTIMATE,
    TOWER_HEADER_ESTIMATE, WPS_ENTRY_ESTIMATE, WPS_HEADER_ESTIMATE,
};
use crate::errors::{TrackerError, TrackerResult};
use crate::fix::LocationPoint;
use crate::radio::{CellularNeighbor, CellularServing, WifiAccessPoint};

/// Fixed-capacity buffer a publish payload is serialized into
pub type PublishBuffer = heapless::String<PUBLISH_BUFFER_SIZE>;

/// Writer over the standard publish buffer
pub type PublishWriter<'a> = JsonWriter<'a, PUBLISH_BUFFER_SIZE>;

/// Incremental JSON writer over a fixed-capacity string
///
/// Overflowing the buffer or the nesting depth surfaces as
/// [`TrackerError::BufferOverflow`]; nothing is ever silently truncated.
pub struct JsonWriter<'a, const N: usize> {
    out: &'a mut heapless::String<N>,
    /// One flag per open container: "has at least one item"
    stack: heapless::Vec<bool, { crate::constants::MAX_JSON_DEPTH }>,
    pending_name: bool,
}

impl<'a, const N: usize> JsonWriter<'a, N> {
    /// Wrap a buffer; existing content is kept and appended to
    pub fn new(out: &'a mut heapless::String<N>) -> Self {
        Self {
            out,
            stack: heapless::Vec::new(),
            pending_name: false,
        }
    }

    /// Bytes still available in the buffer
    pub fn remaining(&self) -> usize {
        N - self.out.len()
    }

    /// Bytes written so far (including content present before wrapping)
    pub fn written(&self) -> usize {
        self.out.len()
    }

    /// Serialized content so far
    pub fn as_str(&self) -> &str {
        self.out
    }

    fn push_raw(&mut self, s: &str) -> TrackerResult<()> {
        self.out.push_str(s).map_err(|_| TrackerError::BufferOverflow)
    }

    /// Comma bookkeeping before a value, name, or container start
    fn pre_value(&mut self) -> TrackerResult<()> {
        if self.pending_name {
            self.pending_name = false;
            return Ok(());
        }
        if let Some(has_item) = self.stack.last().copied() {
            if let Some(top) = self.stack.last_mut() {
                *top = true;
            }
            if has_item {
                self.push_raw(",")?;
            }
        }
        Ok(())
    }

    /// Write a member name; the next write supplies its value
    pub fn name(&mut self, name: &str) -> TrackerResult<()> {
        self.pre_value()?;
        self.push_raw("\"")?;
        self.push_raw(name)?;
        self.push_raw("\":")?;
        self.pending_name = true;
        Ok(())
    }

    /// Open an object
    pub fn begin_object(&mut self) -> TrackerResult<()> {
        self.pre_value()?;
        self.push_raw("{")?;
        self.stack.push(false).map_err(|_| TrackerError::BufferOverflow)
    }

    /// Close the innermost object
    pub fn end_object(&mut self) -> TrackerResult<()> {
        self.stack.pop();
        self.push_raw("}")
    }

    /// Open an array
    pub fn begin_array(&mut self) -> TrackerResult<()> {
        self.pre_value()?;
        self.push_raw("[")?;
        self.stack.push(false).map_err(|_| TrackerError::BufferOverflow)
    }

    /// Close the innermost array
    pub fn end_array(&mut self) -> TrackerResult<()> {
        self.stack.pop();
        self.push_raw("]")
    }

    /// Write a string value (no escaping; values are controlled tokens)
    pub fn value_str(&mut self, value: &str) -> TrackerResult<()> {
        self.pre_value()?;
        self.push_raw("\"")?;
        self.push_raw(value)?;
        self.push_raw("\"")
    }

    /// Write a boolean value
    pub fn value_bool(&mut self, value: bool) -> TrackerResult<()> {
        self.pre_value()?;
        self.push_raw(if value { "true" } else { "false" })
    }

    /// Write an unsigned integer value
    pub fn value_u64(&mut self, value: u64) -> TrackerResult<()> {
        self.pre_value()?;
        write!(self.out, "{}", value).map_err(|_| TrackerError::BufferOverflow)
    }

    /// Write a signed integer value
    pub fn value_i64(&mut self, value: i64) -> TrackerResult<()> {
        self.pre_value()?;
        write!(self.out, "{}", value).map_err(|_| TrackerError::BufferOverflow)
    }

    /// Write a float value with fixed decimal precision
    pub fn value_f64(&mut self, value: f64, decimals: usize) -> TrackerResult<()> {
        self.pre_value()?;
        write!(self.out, "{:.*}", decimals, value).map_err(|_| TrackerError::BufferOverflow)
    }
}

/// Write the fix fields of the `loc` object
///
/// `lck` is always present; the rest only when locked, and the secondary
/// fields (altitude, heading, speed, accuracies) only when `min_publish` is
/// off. The enclosing object is the caller's: enricher callbacks append their
/// own fields after this before the object is closed.
pub fn write_fix_fields<const N: usize>(
    writer: &mut JsonWriter<'_, N>,
    fix: &LocationPoint,
    locked: bool,
    min_publish: bool,
) -> TrackerResult<()> {
    if !locked {
        writer.name("lck")?;
        writer.value_u64(0)?;
        return Ok(());
    }

    writer.name("lck")?;
    writer.value_u64(1)?;
    writer.name("time")?;
    writer.value_u64(fix.epoch_time)?;
    writer.name("lat")?;
    writer.value_f64(fix.latitude, 8)?;
    writer.name("lon")?;
    writer.value_f64(fix.longitude, 8)?;

    if !min_publish {
        writer.name("alt")?;
        writer.value_f64(fix.altitude as f64, 3)?;
        writer.name("hd")?;
        writer.value_f64(fix.heading as f64, 2)?;
        writer.name("spd")?;
        writer.value_f64(fix.speed as f64, 2)?;
        writer.name("h_acc")?;
        writer.value_f64(fix.horizontal_accuracy as f64, 3)?;
        writer.name("v_acc")?;
        writer.value_f64(fix.vertical_accuracy as f64, 3)?;
    }

    Ok(())
}

/// Write the `trig` array; omitted entirely when no triggers are queued
pub fn write_trigger_array<const N: usize>(
    writer: &mut JsonWriter<'_, N>,
    names: &[&str],
) -> TrackerResult<()> {
    if names.is_empty() {
        return Ok(());
    }

    writer.name("trig")?;
    writer.begin_array()?;
    for name in names {
        writer.value_str(name)?;
    }
    writer.end_array()
}

/// Entries that fit in the remaining buffer given header and per-entry
/// estimates; zero when even the header does not fit
fn bounded_entries(remaining: usize, header: usize, per_entry: usize) -> usize {
    if header >= remaining {
        return 0;
    }
    (remaining - header) / per_entry
}

/// Write the `towers` enrichment array into the remaining buffer space
///
/// The serving cell is always written first (when known) and consumes one of
/// the [`MAX_TOWER_SEND`] slots; neighbors fill the rest. Neighbor entries
/// are written in response order; any signal-strength sorting would happen
/// here before truncation.
pub fn write_tower_info<const N: usize>(
    writer: &mut JsonWriter<'_, N>,
    serving: Option<&CellularServing>,
    neighbors: &[CellularNeighbor],
) -> TrackerResult<()> {
    let Some(serving) = serving else {
        return Ok(());
    };

    let remaining = writer.remaining().saturating_sub(CLOSE_ESTIMATE);
    let capacity = bounded_entries(remaining, TOWER_HEADER_ESTIMATE, TOWER_ENTRY_ESTIMATE);
    if capacity == 0 {
        return Ok(());
    }

    writer.name("towers")?;
    writer.begin_array()?;

    writer.begin_object()?;
    writer.name("rat")?;
    writer.value_str(serving.rat.label())?;
    writer.name("mcc")?;
    writer.value_u64(serving.mcc as u64)?;
    writer.name("mnc")?;
    writer.value_u64(serving.mnc as u64)?;
    writer.name("lac")?;
    writer.value_u64(serving.tac as u64)?;
    writer.name("cid")?;
    writer.value_u64(serving.cell_id as u64)?;
    writer.name("str")?;
    writer.value_i64(serving.signal_power as i64)?;
    writer.end_object()?;

    // One slot already spent on the serving cell
    let neighbor_cap = capacity.min(MAX_TOWER_SEND).saturating_sub(1);
    for neighbor in neighbors.iter().take(neighbor_cap) {
        writer.begin_object()?;
        writer.name("nid")?;
        writer.value_u64(neighbor.neighbor_id as u64)?;
        writer.name("ch")?;
        writer.value_u64(neighbor.earfcn as u64)?;
        writer.name("str")?;
        writer.value_i64(neighbor.signal_power as i64)?;
        writer.end_object()?;
    }

    writer.end_array()
}

/// Write the `wps` enrichment array into the remaining buffer space
///
/// Access points are written in scan order; any signal-strength sorting
/// would happen here before truncation.
pub fn write_wps_info<const N: usize>(
    writer: &mut JsonWriter<'_, N>,
    access_points: &[WifiAccessPoint],
) -> TrackerResult<()> {
    let remaining = writer.remaining().saturating_sub(CLOSE_ESTIMATE);
    let capacity = bounded_entries(remaining, WPS_HEADER_ESTIMATE, WPS_ENTRY_ESTIMATE);
    if capacity == 0 || access_points.is_empty() {
        return Ok(());
    }

    writer.name("wps")?;
    writer.begin_array()?;
    for ap in access_points.iter().take(capacity) {
        let mut bssid: heapless::String<17> = heapless::String::new();
        write!(
            bssid,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            ap.bssid[0], ap.bssid[1], ap.bssid[2], ap.bssid[3], ap.bssid[4], ap.bssid[5]
        )
        .map_err(|_| TrackerError::BufferOverflow)?;

        writer.begin_object()?;
        writer.name("bssid")?;
        writer.value_str(&bssid)?;
        writer.name("ch")?;
        writer.value_u64(ap.channel as u64)?;
        writer.name("str")?;
        writer.value_i64(ap.rssi as i64)?;
        writer.end_object()?;
    }
    writer.end_array()
}
