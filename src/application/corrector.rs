//! Raw angle to reported altitude

use libm::fabsf;

use crate::config::{FILTER_ALPHA, SCALE_RANGE_EPSILON};
use crate::drivers::calibration::CalibrationRecord;

/// Apply the stored calibration to a raw angle.
///
/// Uncalibrated records pass the raw angle through. Calibrated records only
/// subtract the zero offset: the two-point scale from [`two_point_scale`] is
/// not applied to the output.
pub fn correct(raw: f32, record: &CalibrationRecord) -> f32 {
    if !record.valid {
        return raw;
    }
    raw - record.zero_offset
}

/// Scale factor implied by the two stops, `None` when uncalibrated or when the
/// stops are too close together to divide by.
pub fn two_point_scale(record: &CalibrationRecord) -> Option<f32> {
    if !record.valid {
        return None;
    }

    let range = record.stop_b - record.stop_a;
    if fabsf(range) <= SCALE_RANGE_EPSILON {
        return None;
    }

    let span = (record.stop_b - record.zero_offset) - (record.stop_a - record.zero_offset);
    Some(span / range)
}

/// Exponential moving average of the reported altitude
pub struct AltitudeFilter {
    alpha: f32,
    value: Option<f32>,
}

impl AltitudeFilter {
    pub const fn new() -> Self {
        Self::with_alpha(FILTER_ALPHA)
    }

    pub const fn with_alpha(alpha: f32) -> Self {
        Self { alpha, value: None }
    }

    /// Feed one value and return the filtered one. The first value seeds the filter.
    pub fn update(&mut self, input: f32) -> f32 {
        let next = match self.value {
            Some(prev) => prev + self.alpha * (input - prev),
            None => input,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }

    /// Forget history so the next value is taken as-is
    pub fn reset(&mut self) {
        self.value = None;
    }
}

impl Default for AltitudeFilter {
    fn default() -> Self {
        Self::new()
    }
}
