//! Input schema
//!
//! This module defines the native wheel event surface and the replay
//! timeline format used by the CLI and FFI layers.

mod raw_event;
mod adapter;

pub use raw_event::*;
pub use adapter::*;
