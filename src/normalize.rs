use crate::calibration::CalibrationTable;
use crate::types::{FingerCurlSet, NormalizedCurlSet};

/// Maps a raw curl onto [0, 1] between the calibrated bounds.
///
/// Returns 0.0 when either bound is missing or the range is empty, so an
/// uncalibrated channel reads as fully open.
pub fn normalize(raw: f32, min: Option<f32>, max: Option<f32>) -> f32 {
    match (min, max) {
        (Some(min), Some(max)) if min != max => ((raw - min) / (max - min)).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Normalizes every channel; channels absent from the table read 0.0.
pub fn normalize_curls(curls: &FingerCurlSet, table: &CalibrationTable) -> NormalizedCurlSet {
    curls.map(|channel, raw| match table.get(channel) {
        Some(entry) => normalize(*raw, entry.min, entry.max),
        None => 0.0,
    })
}
