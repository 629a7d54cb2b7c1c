//! Error types for Wheel Flux

use crate::types::{ElementId, HandlerId};
use thiserror::Error;

/// Errors surfaced to callers of the processor, CLI and FFI layers.
///
/// Events that normalize to nothing are not errors; they come back as a
/// suppressed [`DispatchOutcome`](crate::types::DispatchOutcome).
#[derive(Debug, Error)]
pub enum WheelError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Element {0} has not been set up")]
    UnknownElement(ElementId),

    #[error("Handler {handler} is not registered on element {element}")]
    UnknownHandler {
        element: ElementId,
        handler: HandlerId,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
