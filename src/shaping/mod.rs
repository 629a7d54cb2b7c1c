//! Input shaping around registered callbacks
//!
//! Handlers can be wrapped in an intent gate and a rate shaper.
//!
//! Pipeline: wheel event → IntentFilter → RateShaper → callback

pub mod intent;
pub mod rate;

pub use intent::{IntentFilter, IntentState, PointerTrack};
pub use rate::{RateDecision, RateShaper};

use serde::{Deserialize, Serialize};

/// Side effects a shaping stage applies to the native event at call time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapingFlags {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl ShapingFlags {
    pub fn merge(self, other: ShapingFlags) -> ShapingFlags {
        ShapingFlags {
            prevent_default: self.prevent_default || other.prevent_default,
            stop_propagation: self.stop_propagation || other.stop_propagation,
        }
    }
}
