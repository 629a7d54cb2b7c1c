//! Delta normalization
//!
//! This module turns one native wheel event into whole-step, pixel-based
//! deltas:
//! - native encodings resolved to `(delta_x, delta_y)`
//! - line and page units converted to pixels with the element's geometry
//! - magnitudes calibrated against the smallest step of the current burst

use crate::calibrator::Calibrator;
use crate::schema::{DeltaSource, RawWheelEvent};
use crate::types::{DeltaMode, ElementGeometry, NormalizedEvent};
use tracing::trace;

/// Normalizer for converting raw wheel events to normalized events
pub struct DeltaNormalizer;

impl DeltaNormalizer {
    /// Normalize a raw event.
    ///
    /// Returns `None` when the event carries no movement, in which case the
    /// calibrator is left untouched and nothing should be forwarded. An event
    /// whose steps both come out as zero is also dropped; the calibrator may
    /// have observed it by then.
    pub fn normalize(
        raw: &RawWheelEvent,
        geometry: &ElementGeometry,
        calibrator: &mut Calibrator,
    ) -> Option<NormalizedEvent> {
        let source = raw.classify()?;
        Self::normalize_source(source, raw.mode(), geometry, calibrator)
    }

    /// Normalize an already classified event
    pub fn normalize_source(
        source: DeltaSource,
        mode: DeltaMode,
        geometry: &ElementGeometry,
        calibrator: &mut Calibrator,
    ) -> Option<NormalizedEvent> {
        let (delta_x, delta_y) = source.deltas();
        if delta_x == 0.0 && delta_y == 0.0 {
            return None;
        }

        let (delta_x, delta_y) = to_pixels(delta_x, delta_y, mode, geometry);

        let abs_delta = delta_x.abs().max(delta_y.abs());
        if !(abs_delta.is_finite() && abs_delta > 0.0) {
            trace!(
                source = source.as_str(),
                "dropping event with degenerate magnitude after unit conversion"
            );
            return None;
        }

        let lowest_delta = calibrator.observe(abs_delta);

        let delta_x = calibrator.scale(delta_x);
        let delta_y = calibrator.scale(delta_y);

        into_event(delta_x, delta_y, lowest_delta)
    }
}

/// Build the delivered event, or `None` when no whole step is left on either axis
fn into_event(delta_x: f64, delta_y: f64, lowest_delta: f64) -> Option<NormalizedEvent> {
    let steps_x = to_steps(delta_x / lowest_delta);
    let steps_y = to_steps(delta_y / lowest_delta);
    if steps_x == 0 && steps_y == 0 {
        trace!(lowest_delta, "event rounded to zero steps, dropped");
        return None;
    }

    Some(NormalizedEvent {
        delta_x: steps_x,
        delta_y: steps_y,
        delta_factor: lowest_delta,
        delta_mode: DeltaMode::Pixel,
    })
}

/// Convert native units to pixels
fn to_pixels(delta_x: f64, delta_y: f64, mode: DeltaMode, geometry: &ElementGeometry) -> (f64, f64) {
    match mode {
        DeltaMode::Pixel => (delta_x, delta_y),
        DeltaMode::Line => (
            delta_x * geometry.line_height_px,
            delta_y * geometry.line_height_px,
        ),
        DeltaMode::Page => (
            delta_x * geometry.page_height_px,
            delta_y * geometry.page_height_px,
        ),
    }
}

/// Whole steps on the magnitude, sign restored afterwards: floor at or above
/// one step, ceil below it. Non-finite quotients yield zero.
fn to_steps(quotient: f64) -> i64 {
    if !quotient.is_finite() {
        return 0;
    }
    let magnitude = quotient.abs();
    let steps = if magnitude >= 1.0 {
        magnitude.floor()
    } else {
        magnitude.ceil()
    };
    (quotient.signum() * steps) as i64
}
