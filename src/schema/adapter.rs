//! Replay timeline parsing
//!
//! A timeline is a list of [`ReplayRecord`]s, each a wheel or pointer event
//! stamped with a wall-clock time. The adapter parses JSON / NDJSON input,
//! validates records and turns timestamps into millisecond offsets that the
//! processor's virtual clock understands.

use crate::error::WheelError;
use crate::schema::raw_event::{RawWheelEvent, ValidationError};
use crate::types::ElementId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replay timeline schema version
pub const SCHEMA_VERSION: &str = "wheel.replay.v1";

/// Element used by records that do not name one
pub const DEFAULT_ELEMENT: ElementId = ElementId(1);

fn default_element() -> ElementId {
    DEFAULT_ELEMENT
}

/// Kind of input a record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[default]
    Wheel,
    PointerEnter,
    PointerMove,
    PointerLeave,
}

/// One timeline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Optional identifier echoed in validation reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// When the platform reported the event
    pub timestamp: DateTime<Utc>,
    /// Target element
    #[serde(default = "default_element")]
    pub element: ElementId,
    #[serde(default)]
    pub kind: RecordKind,
    /// Native fields
    #[serde(flatten)]
    pub event: RawWheelEvent,
    /// Extra arguments forwarded to callbacks with wheel events
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

impl ReplayRecord {
    pub fn wheel(timestamp: DateTime<Utc>, event: RawWheelEvent) -> Self {
        Self {
            event_id: None,
            timestamp,
            element: DEFAULT_ELEMENT,
            kind: RecordKind::Wheel,
            event,
            args: Vec::new(),
        }
    }

    pub fn pointer(timestamp: DateTime<Utc>, kind: RecordKind, x: f64, y: f64) -> Self {
        Self {
            event_id: None,
            timestamp,
            element: DEFAULT_ELEMENT,
            kind,
            event: RawWheelEvent::default().with_pointer(x, y),
            args: Vec::new(),
        }
    }

    pub fn on_element(mut self, element: ElementId) -> Self {
        self.element = element;
        self
    }

    /// Pointer position, if both coordinates are present
    pub fn pointer_position(&self) -> Option<(f64, f64)> {
        Some((self.event.pointer_x?, self.event.pointer_y?))
    }

    /// Validate the record against its kind
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.kind {
            RecordKind::Wheel => self.event.validate(),
            RecordKind::PointerEnter | RecordKind::PointerMove => {
                match self.pointer_position() {
                    Some((x, y)) if x.is_finite() && y.is_finite() => Ok(()),
                    Some(_) => Err(ValidationError::NonFinite {
                        field: "pointerX/pointerY".to_string(),
                    }),
                    None => Err(ValidationError::MissingPointer),
                }
            }
            RecordKind::PointerLeave => Ok(()),
        }
    }
}

/// Adapter for reading replay timelines
pub struct RawEventAdapter;

impl RawEventAdapter {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<ReplayRecord>, WheelError> {
        let records: Vec<ReplayRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<ReplayRecord>, WheelError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ReplayRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(WheelError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Sort records by timestamp (stable) and pair each with its offset in
    /// milliseconds from the earliest record.
    pub fn to_offsets(records: &[ReplayRecord]) -> Vec<(u64, ReplayRecord)> {
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.timestamp);

        let Some(origin) = sorted.first().map(|r| r.timestamp) else {
            return Vec::new();
        };

        sorted
            .into_iter()
            .map(|record| {
                let offset = (record.timestamp - origin).num_milliseconds().max(0) as u64;
                (offset, record)
            })
            .collect()
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[ReplayRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .map(|(idx, record)| ValidationResult {
                index: idx,
                event_id: record.event_id.clone(),
                result: record.validate().err(),
            })
            .filter(|r| r.result.is_some())
            .collect()
    }
}

/// Result of record validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub event_id: Option<String>,
    pub result: Option<ValidationError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn test_parse_ndjson_flattened_fields() {
        let ndjson = r#"
{"timestamp": "2024-01-15T08:30:00.000Z", "deltaY": 4, "deltaMode": 0}
{"timestamp": "2024-01-15T08:30:00.050Z", "element": 7, "kind": "pointer_enter", "pointerX": 10, "pointerY": 20}

{"timestamp": "2024-01-15T08:30:00.100Z", "wheelDelta": -120, "args": ["page"]}
"#;
        let records = RawEventAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].kind, RecordKind::Wheel);
        assert_eq!(records[0].element, DEFAULT_ELEMENT);
        assert_eq!(records[0].event.delta_y, Some(4.0));

        assert_eq!(records[1].kind, RecordKind::PointerEnter);
        assert_eq!(records[1].element, ElementId(7));
        assert_eq!(records[1].pointer_position(), Some((10.0, 20.0)));

        assert_eq!(records[2].event.wheel_delta, Some(-120.0));
        assert_eq!(records[2].args, vec![serde_json::json!("page")]);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"timestamp\": \"2024-01-15T08:30:00Z\"}\nnot json\n";
        let err = RawEventAdapter::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[{"timestamp": "2024-01-15T08:30:00Z", "detail": 3}]"#;
        let records = RawEventAdapter::parse_array(json).unwrap();
        assert_eq!(records[0].event.detail, Some(3.0));
    }

    #[test]
    fn test_offsets_sorted_from_origin() {
        let records = vec![
            ReplayRecord::wheel(t(250), RawWheelEvent::detail(1.0)),
            ReplayRecord::wheel(t(100), RawWheelEvent::detail(2.0)),
            ReplayRecord::wheel(t(130), RawWheelEvent::detail(3.0)),
        ];
        let offsets: Vec<u64> = RawEventAdapter::to_offsets(&records)
            .into_iter()
            .map(|(offset, _)| offset)
            .collect();
        assert_eq!(offsets, vec![0, 30, 150]);
        assert!(RawEventAdapter::to_offsets(&[]).is_empty());
    }

    #[test]
    fn test_validate_records() {
        let records = vec![
            ReplayRecord::wheel(t(0), RawWheelEvent::detail(1.0)),
            ReplayRecord::wheel(t(10), RawWheelEvent::default()),
            ReplayRecord {
                event: RawWheelEvent::default(),
                ..ReplayRecord::pointer(t(20), RecordKind::PointerMove, 0.0, 0.0)
            },
            ReplayRecord::pointer(t(30), RecordKind::PointerLeave, 0.0, 0.0),
        ];
        let failures = RawEventAdapter::validate_records(&records);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].result, Some(ValidationError::NoDeltaFields));
        assert_eq!(failures[1].result, Some(ValidationError::MissingPointer));
    }
}
