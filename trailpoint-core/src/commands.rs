//! Cloud Command Decoding
//!
//! Commands arrive from the cloud as JSON documents already parsed into a
//! [`serde_json::Value`] tree by the transport layer. This module extracts
//! the enhanced-location answer the cloud sends back when a publish asked
//! for one (`loc_cb`): a coarse position derived server-side from the tower
//! and Wi-Fi enrichment.

use serde_json::Value;

use crate::errors::{TrackerError, TrackerResult};
use crate::fix::{FixKind, LocationPoint, LocationSource, SourceSet};

/// Extract an enhanced-location answer from a command document
///
/// Returns `Ok(None)` when the document carries no `loc-enhanced` object;
/// that is the normal case for unrelated commands. A present but malformed
/// answer is an error: the required `lat`/`lon`/`h_acc` members must be
/// numbers and `src`, when present, must be an array of strings. Source
/// names outside the known set are skipped, not rejected, so newer cloud
/// versions can add sources without breaking older devices.
pub fn parse_enhanced(root: &Value) -> TrackerResult<Option<LocationPoint>> {
    let Some(enhanced) = root.get("loc-enhanced") else {
        return Ok(None);
    };
    let Some(enhanced) = enhanced.as_object() else {
        return Ok(None);
    };

    let number = |name: &'static str| -> TrackerResult<f64> {
        enhanced
            .get(name)
            .and_then(Value::as_f64)
            .ok_or(TrackerError::InvalidArgument {
                reason: "enhanced location field is not a number",
            })
    };

    let latitude = number("lat")?;
    let longitude = number("lon")?;
    let horizontal_accuracy = number("h_acc")? as f32;

    let mut sources = SourceSet::empty();
    if let Some(src) = enhanced.get("src") {
        let entries = src.as_array().ok_or(TrackerError::InvalidArgument {
            reason: "enhanced location sources is not an array",
        })?;
        for entry in entries {
            let name = entry.as_str().ok_or(TrackerError::InvalidArgument {
                reason: "enhanced location source is not a string",
            })?;
            if let Some(source) = LocationSource::from_name(name) {
                sources.insert(source);
            }
        }
    }

    Ok(Some(LocationPoint {
        kind: FixKind::Cloud,
        latitude,
        longitude,
        horizontal_accuracy,
        locked: true,
        stable: true,
        sources,
        ..Default::default()
    }))
}
