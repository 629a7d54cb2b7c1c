//! Core types for the Wheel Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: element and handler identity, cached geometry, normalized events,
//! and the outcome reported back to the caller of a dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an element that wheel listeners are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl From<u64> for ElementId {
    fn from(id: u64) -> Self {
        ElementId(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a handler registered on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Unit a native delta is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaMode {
    #[default]
    Pixel,
    Line,
    Page,
}

impl DeltaMode {
    /// Map the numeric `deltaMode` reported by the platform.
    ///
    /// Unknown codes are treated as pixels, so no conversion happens.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => DeltaMode::Line,
            2 => DeltaMode::Page,
            _ => DeltaMode::Pixel,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            DeltaMode::Pixel => 0,
            DeltaMode::Line => 1,
            DeltaMode::Page => 2,
        }
    }
}

/// Line and page heights captured for an element at setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementGeometry {
    /// Pixels per line, used for `deltaMode = line`
    pub line_height_px: f64,
    /// Pixels per page, used for `deltaMode = page`
    pub page_height_px: f64,
}

impl ElementGeometry {
    pub fn new(line_height_px: f64, page_height_px: f64) -> Self {
        Self {
            line_height_px,
            page_height_px,
        }
    }
}

/// A wheel event in calibrated, unit-consistent deltas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Horizontal steps (positive = right)
    pub delta_x: i64,
    /// Vertical steps (positive = down)
    pub delta_y: i64,
    /// Calibrated size of one step in pixels
    pub delta_factor: f64,
    /// Always [`DeltaMode::Pixel`] once normalized
    pub delta_mode: DeltaMode,
}

/// What a registered callback receives: the normalized event followed by any
/// extra arguments passed to `trigger`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelEvent {
    pub element: ElementId,
    /// Handler being invoked, filled in at delivery
    pub handler: HandlerId,
    /// Virtual time of delivery in milliseconds, filled in at delivery
    pub at_ms: u64,
    pub event: NormalizedEvent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

/// Result of dispatching one raw event through an element's handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// The normalized event, or `None` when both deltas were zero
    pub normalized: Option<NormalizedEvent>,
    /// Callbacks invoked synchronously during this dispatch
    pub delivered: usize,
    /// Handlers that captured the event for a later, timer-driven delivery
    pub deferred: usize,
    /// Handlers whose gate or rate window swallowed the event
    pub swallowed: usize,
    /// Some handler asked for the native default action to be cancelled
    pub default_prevented: bool,
    /// Some handler asked for propagation to stop
    pub propagation_stopped: bool,
}

impl DispatchOutcome {
    pub fn suppressed() -> Self {
        Self::default()
    }

    pub fn is_suppressed(&self) -> bool {
        self.normalized.is_none()
    }
}

/// A delivered event stamped with the virtual time it reached its callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Milliseconds since the start of the session
    pub at_ms: u64,
    pub element: ElementId,
    pub handler: HandlerId,
    pub delta_x: i64,
    pub delta_y: i64,
    pub delta_factor: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

impl From<&WheelEvent> for DeliveryRecord {
    fn from(event: &WheelEvent) -> Self {
        Self {
            at_ms: event.at_ms,
            element: event.element,
            handler: event.handler,
            delta_x: event.event.delta_x,
            delta_y: event.event.delta_y,
            delta_factor: event.event.delta_factor,
            args: event.args.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_mode_codes() {
        assert_eq!(DeltaMode::from_code(0), DeltaMode::Pixel);
        assert_eq!(DeltaMode::from_code(1), DeltaMode::Line);
        assert_eq!(DeltaMode::from_code(2), DeltaMode::Page);
        assert_eq!(DeltaMode::from_code(7), DeltaMode::Pixel);
        assert_eq!(DeltaMode::Page.code(), 2);
    }

    #[test]
    fn test_normalized_event_serialization() {
        let event = NormalizedEvent {
            delta_x: 0,
            delta_y: -1,
            delta_factor: 3.0,
            delta_mode: DeltaMode::Pixel,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"delta_mode\":\"pixel\""));
        assert!(json.contains("\"delta_y\":-1"));
    }

    #[test]
    fn test_outcome_suppressed() {
        let outcome = DispatchOutcome::suppressed();
        assert!(outcome.is_suppressed());
        assert_eq!(outcome.delivered, 0);
    }

    #[test]
    fn test_element_display() {
        assert_eq!(ElementId(4).to_string(), "#4");
        assert_eq!(HandlerId(2).to_string(), "h2");
    }
}
