//! Cellular and Wi-Fi Enrichment Records
//!
//! ## Overview
//!
//! Location publishes are enriched with whatever the radios can see: the
//! serving cellular tower, nearby neighbor cells, and Wi-Fi access points.
//! The cellular records come back from the modem as fixed-grammar text
//! responses to `AT+QENG` queries; this module parses them.
//!
//! ## Grammar
//!
//! ```text
//! +QENG: "servingcell",<state>,<rat>,<duplex>,<mcc>,<mnc>,<cellID hex>,
//!        <pcid>,<earfcn>,<band>,<ul_bw>,<dl_bw>,<tac hex>,<rsrp>,...
//! +QENG: "neighbourcell intra",<rat>,<earfcn>,<pcid>,<rsrq>,<rsrp>,<rssi>,...
//! ```
//!
//! Parsing is strict about the supported technology tokens and the minimum
//! field count, and nothing else: a record that fails to parse is silently
//! dropped by the caller with no partial state retained, and the publish
//! tolerates missing serving/neighbor data on any given attempt.

use crate::errors::{TrackerError, TrackerResult};

/// Modem query for the serving cell record
pub const SERVING_CELL_QUERY: &str = "AT+QENG=\"servingcell\"";

/// Modem query for the neighbor cell records
pub const NEIGHBOR_CELL_QUERY: &str = "AT+QENG=\"neighbourcell\"";

/// Cellular radio access technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RadioAccessTechnology {
    /// Unknown / not yet observed
    #[default]
    None = 0,
    /// LTE
    Lte = 1,
    /// LTE Cat-M1
    LteCatM1 = 2,
    /// LTE NB-IoT
    LteNbIot = 3,
}

impl RadioAccessTechnology {
    /// Parse a modem technology token; anything outside the supported set is
    /// rejected
    pub fn from_token(token: &str) -> TrackerResult<Self> {
        if token.starts_with("CAT-M") {
            Ok(RadioAccessTechnology::LteCatM1)
        } else if token.starts_with("LTE") {
            Ok(RadioAccessTechnology::Lte)
        } else if token.starts_with("CAT-NB") {
            Ok(RadioAccessTechnology::LteNbIot)
        } else {
            Err(TrackerError::NotSupported {
                what: "radio access technology",
            })
        }
    }

    /// Schema label for the payload
    pub const fn label(&self) -> &'static str {
        match self {
            RadioAccessTechnology::None => "none",
            RadioAccessTechnology::Lte => "lte",
            RadioAccessTechnology::LteCatM1 => "lte-m1",
            RadioAccessTechnology::LteNbIot => "nb-iot",
        }
    }
}

/// Serving cell observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellularServing {
    /// Radio access technology
    pub rat: RadioAccessTechnology,
    /// Mobile country code
    pub mcc: u32,
    /// Mobile network code
    pub mnc: u32,
    /// Cell identifier
    pub cell_id: u32,
    /// Tracking area code
    pub tac: u32,
    /// Signal power (RSRP), dBm
    pub signal_power: i32,
}

/// Neighbor cell observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellularNeighbor {
    /// Radio access technology
    pub rat: RadioAccessTechnology,
    /// E-UTRA absolute radio frequency channel number
    pub earfcn: u32,
    /// Physical cell id
    pub neighbor_id: u32,
    /// Signal quality (RSRQ), dB
    pub signal_quality: i32,
    /// Signal power (RSRP), dBm
    pub signal_power: i32,
    /// Received signal strength (RSSI), dBm
    pub signal_strength: i32,
}

/// Wi-Fi access point observation from a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WifiAccessPoint {
    /// Basic service set identifier (MAC address)
    pub bssid: [u8; 6],
    /// Channel number
    pub channel: u8,
    /// Received signal strength, dBm
    pub rssi: i32,
}

/// Strip surrounding double quotes from a response field
fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(field)
}

fn short(required: usize, available: usize) -> TrackerError {
    TrackerError::NotEnoughData {
        required,
        available,
    }
}

/// Split a `+QENG:` response into its comma-separated fields
///
/// Responses longer than the buffer are truncated; everything the parsers
/// need sits well inside it.
fn response_fields<'a>(line: &'a str) -> TrackerResult<heapless::Vec<&'a str, 24>> {
    let rest = line
        .trim_start()
        .strip_prefix("+QENG:")
        .ok_or(TrackerError::InvalidArgument {
            reason: "not a +QENG response",
        })?;

    let mut fields = heapless::Vec::new();
    for field in rest.split(',') {
        if fields.push(field).is_err() {
            break;
        }
    }
    Ok(fields)
}

/// Parse a serving cell response line
///
/// Logical items mirror the response grammar: state, technology, mcc, mnc,
/// cell id (hex), tac (hex), signal power. Fewer parseable items than that is
/// insufficient data.
pub fn parse_serving_cell(line: &str) -> TrackerResult<CellularServing> {
    // Field layout after the header:
    // <state>,<rat>,<duplex>,<mcc>,<mnc>,<cellID>,<pcid>,<earfcn>,<band>,
    // <ul_bw>,<dl_bw>,<tac>,<rsrp>
    const REQUIRED: usize = 7;

    let fields = response_fields(line)?;
    if unquote(fields.first().copied().unwrap_or("")) != "servingcell" {
        return Err(TrackerError::InvalidArgument {
            reason: "not a serving cell response",
        });
    }

    let field = |index: usize, item: usize| -> TrackerResult<&str> {
        fields.get(index).copied().ok_or(short(REQUIRED, item))
    };

    let _state = unquote(field(1, 0)?);
    let rat = RadioAccessTechnology::from_token(unquote(field(2, 1)?))?;
    let mcc = parse_dec_u32(field(4, 2)?, REQUIRED, 2)?;
    let mnc = parse_dec_u32(field(5, 3)?, REQUIRED, 3)?;
    let cell_id = parse_hex_u32(field(6, 4)?, REQUIRED, 4)?;
    let tac = parse_hex_u32(field(12, 5)?, REQUIRED, 5)?;
    let signal_power = parse_dec_i32(field(13, 6)?, REQUIRED, 6)?;

    Ok(CellularServing {
        rat,
        mcc,
        mnc,
        cell_id,
        tac,
        signal_power,
    })
}

/// Parse a neighbor cell response line
pub fn parse_neighbor_cell(line: &str) -> TrackerResult<CellularNeighbor> {
    // Field layout after the header:
    // <rat>,<earfcn>,<pcid>,<rsrq>,<rsrp>,<rssi>
    const REQUIRED: usize = 6;

    let fields = response_fields(line)?;
    if !unquote(fields.first().copied().unwrap_or("")).starts_with("neighbourcell") {
        return Err(TrackerError::InvalidArgument {
            reason: "not a neighbor cell response",
        });
    }

    let field = |index: usize, item: usize| -> TrackerResult<&str> {
        fields.get(index).copied().ok_or(short(REQUIRED, item))
    };

    let rat = RadioAccessTechnology::from_token(unquote(field(1, 0)?))?;
    let earfcn = parse_dec_u32(field(2, 1)?, REQUIRED, 1)?;
    let neighbor_id = parse_dec_u32(field(3, 2)?, REQUIRED, 2)?;
    let signal_quality = parse_dec_i32(field(4, 3)?, REQUIRED, 3)?;
    let signal_power = parse_dec_i32(field(5, 4)?, REQUIRED, 4)?;
    let signal_strength = parse_dec_i32(field(6, 5)?, REQUIRED, 5)?;

    Ok(CellularNeighbor {
        rat,
        earfcn,
        neighbor_id,
        signal_quality,
        signal_power,
        signal_strength,
    })
}

fn parse_dec_u32(field: &str, required: usize, item: usize) -> TrackerResult<u32> {
    field.trim().parse::<u32>().map_err(|_| short(required, item))
}

fn parse_dec_i32(field: &str, required: usize, item: usize) -> TrackerResult<i32> {
    field.trim().parse::<i32>().map_err(|_| short(required, item))
}

fn parse_hex_u32(field: &str, required: usize, item: usize) -> TrackerResult<u32> {
    u32::from_str_radix(field.trim(), 16).map_err(|_| short(required, item))
}
