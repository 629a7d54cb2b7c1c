//! Native wheel event surface
//!
//! Platforms report scroll deltas through several overlapping encodings:
//! - `detail` (DOMMouseScroll, lines, positive = down)
//! - `wheelDelta` / `wheelDeltaY` / `wheelDeltaX` (mousewheel, 120 per notch, positive = up)
//! - `axis == HORIZONTAL_AXIS` (old Firefox horizontal scrolling through `detail`)
//! - `deltaX` / `deltaY` / `deltaMode` (the modern wheel event)
//!
//! A [`RawWheelEvent`] carries whatever subset the platform filled in.
//! [`RawWheelEvent::classify`] resolves the field precedence once, at ingestion,
//! into a [`DeltaSource`].

use crate::types::DeltaMode;
use serde::{Deserialize, Serialize};

/// Value of `HORIZONTAL_AXIS` when the event does not carry the constant itself
pub const HORIZONTAL_AXIS: u32 = 1;

/// One native wheel event, every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWheelEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheel_delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheel_delta_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheel_delta_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<u32>,
    #[serde(
        default,
        rename = "HORIZONTAL_AXIS",
        skip_serializing_if = "Option::is_none"
    )]
    pub horizontal_axis: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer_y: Option<f64>,
}

/// Encoding that determined an event's deltas, with the deltas already
/// resolved to the modern sign convention (positive = right / down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaSource {
    /// Only `detail` was present
    LegacyDetail { delta_y: f64 },
    /// `wheelDelta*` fields were the last to apply
    LegacyWheelDelta { delta_x: f64, delta_y: f64 },
    /// Old Firefox horizontal scroll: the vertical value moves to the x axis
    LegacyAxisHorizontal { delta_x: f64 },
    /// `deltaX` and/or `deltaY` were present
    ModernDelta { delta_x: f64, delta_y: f64 },
}

impl DeltaSource {
    /// `(delta_x, delta_y)` in native units
    pub fn deltas(&self) -> (f64, f64) {
        match *self {
            DeltaSource::LegacyDetail { delta_y } => (0.0, delta_y),
            DeltaSource::LegacyWheelDelta { delta_x, delta_y } => (delta_x, delta_y),
            DeltaSource::LegacyAxisHorizontal { delta_x } => (delta_x, 0.0),
            DeltaSource::ModernDelta { delta_x, delta_y } => (delta_x, delta_y),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaSource::LegacyDetail { .. } => "legacy_detail",
            DeltaSource::LegacyWheelDelta { .. } => "legacy_wheel_delta",
            DeltaSource::LegacyAxisHorizontal { .. } => "legacy_axis_horizontal",
            DeltaSource::ModernDelta { .. } => "modern_delta",
        }
    }
}

impl RawWheelEvent {
    /// Modern wheel event
    pub fn modern(delta_x: f64, delta_y: f64, mode: DeltaMode) -> Self {
        RawWheelEvent {
            delta_x: Some(delta_x),
            delta_y: Some(delta_y),
            delta_mode: Some(mode.code()),
            ..Default::default()
        }
    }

    /// Legacy `mousewheel` event with a vertical `wheelDelta`
    pub fn wheel_delta(wheel_delta: f64) -> Self {
        RawWheelEvent {
            wheel_delta: Some(wheel_delta),
            ..Default::default()
        }
    }

    /// Legacy `DOMMouseScroll` event
    pub fn detail(detail: f64) -> Self {
        RawWheelEvent {
            detail: Some(detail),
            ..Default::default()
        }
    }

    /// Attach a pointer position
    pub fn with_pointer(mut self, x: f64, y: f64) -> Self {
        self.pointer_x = Some(x);
        self.pointer_y = Some(y);
        self
    }

    /// Unit the deltas are expressed in; absent means pixels
    pub fn mode(&self) -> DeltaMode {
        self.delta_mode
            .map(DeltaMode::from_code)
            .unwrap_or(DeltaMode::Pixel)
    }

    fn is_horizontal_axis(&self) -> bool {
        match self.axis {
            Some(axis) => axis == self.horizontal_axis.unwrap_or(HORIZONTAL_AXIS),
            None => false,
        }
    }

    /// Resolve field precedence into a tagged source.
    ///
    /// Later encodings override earlier ones per axis: `detail`, then
    /// `wheelDelta`, `wheelDeltaY`, `wheelDeltaX`, the horizontal-axis remap,
    /// and finally the modern `deltaY` / `deltaX`. Returns `None` when no
    /// recognized field is present.
    pub fn classify(&self) -> Option<DeltaSource> {
        let mut delta_x = 0.0;
        let mut delta_y = 0.0;
        let mut source = None;

        if let Some(detail) = self.detail {
            delta_y = detail;
            source = Some(DeltaSource::LegacyDetail { delta_y });
        }

        let mut wheel = false;
        if let Some(wheel_delta) = self.wheel_delta {
            delta_y = -wheel_delta;
            wheel = true;
        }
        if let Some(wheel_delta_y) = self.wheel_delta_y {
            delta_y = -wheel_delta_y;
            wheel = true;
        }
        if let Some(wheel_delta_x) = self.wheel_delta_x {
            delta_x = -wheel_delta_x;
            wheel = true;
        }
        if wheel {
            source = Some(DeltaSource::LegacyWheelDelta { delta_x, delta_y });
        }

        if self.is_horizontal_axis() {
            delta_x = delta_y;
            delta_y = 0.0;
            source = Some(DeltaSource::LegacyAxisHorizontal { delta_x });
        }

        if self.delta_x.is_some() || self.delta_y.is_some() {
            if let Some(modern_y) = self.delta_y {
                delta_y = modern_y;
            }
            if let Some(modern_x) = self.delta_x {
                delta_x = modern_x;
            }
            source = Some(DeltaSource::ModernDelta { delta_x, delta_y });
        }

        source
    }

    /// Validate the event shape
    pub fn validate(&self) -> Result<(), ValidationError> {
        let numeric = [
            ("detail", self.detail),
            ("wheelDelta", self.wheel_delta),
            ("wheelDeltaY", self.wheel_delta_y),
            ("wheelDeltaX", self.wheel_delta_x),
            ("deltaX", self.delta_x),
            ("deltaY", self.delta_y),
            ("pointerX", self.pointer_x),
            ("pointerY", self.pointer_y),
        ];
        for (field, value) in numeric {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ValidationError::NonFinite {
                        field: field.to_string(),
                    });
                }
            }
        }

        if let Some(code) = self.delta_mode {
            if code > 2 {
                return Err(ValidationError::UnknownDeltaMode(code));
            }
        }

        if self.classify().is_none() {
            return Err(ValidationError::NoDeltaFields);
        }

        Ok(())
    }
}

/// Validation errors for raw wheel events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Event carries none of the recognized delta fields")]
    NoDeltaFields,

    #[error("Field {field} is not a finite number")]
    NonFinite { field: String },

    #[error("Unknown deltaMode {0} (expected 0, 1 or 2)")]
    UnknownDeltaMode(u32),

    #[error("Pointer record is missing pointerX/pointerY")]
    MissingPointer,
}
