//! Wheel Flux - Wheel-scroll normalization and input shaping
//!
//! Flux turns the inconsistent wheel events reported by different platforms
//! and devices into calibrated, unit-consistent step counts through a
//! deterministic pipeline: delta resolution → unit conversion → adaptive
//! calibration → intent gating → rate shaping → delivery.
//!
//! ## Modules
//!
//! - **Normalization**: resolve legacy and modern delta fields, convert units
//!   and calibrate against the smallest step seen in the current burst
//! - **Shaping**: per-handler scroll-intent detection and throttle/debounce
//! - **Replay**: feed recorded timelines through a processor on virtual time

pub mod calibrator;
pub mod config;
pub mod error;
pub mod host;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod shaping;
pub mod timer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use calibrator::Calibrator;
pub use config::{DelayConfig, HandlerConfig, IntentConfig, WheelConfig};
pub use error::WheelError;
pub use host::{ElementHost, StaticHost};
pub use normalizer::DeltaNormalizer;
pub use pipeline::{replay_timeline, ReplayReport, WheelProcessor};

// Schema exports
pub use schema::{RawEventAdapter, RawWheelEvent, ReplayRecord, SCHEMA_VERSION};

pub use types::{DispatchOutcome, ElementId, HandlerId, NormalizedEvent, WheelEvent};

/// Flux version embedded in replay reports
pub const WHEEL_FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for replay reports
pub const PRODUCER_NAME: &str = "wheel-flux";
