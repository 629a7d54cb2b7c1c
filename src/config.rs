//! Processor and handler configuration
//!
//! All configuration is plain serde data so it can be loaded from JSON files
//! (CLI), JSON strings (FFI) or built in code.

use serde::{Deserialize, Serialize};

/// Default rate-shaping delay in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 100;

/// Default intent sampling interval in milliseconds
pub const DEFAULT_INTENT_INTERVAL_MS: u64 = 100;

/// Default intent sensitivity (Manhattan distance in pixels)
pub const DEFAULT_INTENT_SENSITIVITY: f64 = 7.0;

/// Default inactivity window after which calibration resets
pub const DEFAULT_DECAY_MS: u64 = 200;

/// Magnitude legacy wheels report for one notch
pub const LEGACY_NOTCH_DELTA: f64 = 120.0;

/// Divisor applied to deltas once legacy scaling is detected
pub const LEGACY_DIVISOR: f64 = 40.0;

/// Calibration tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Inactivity window before `lowest_delta` and legacy mode reset
    pub decay_ms: u64,
    /// Lowest magnitude that switches on legacy scaling
    pub legacy_notch: f64,
    /// Legacy scaling divisor
    pub legacy_divisor: f64,
}

impl CalibrationConfig {
    /// Legacy scaling needs a positive notch and divisor
    pub fn validate(&self) -> Result<(), String> {
        if !(self.legacy_divisor.is_finite() && self.legacy_divisor > 0.0) {
            return Err(format!(
                "legacy_divisor must be positive, got {}",
                self.legacy_divisor
            ));
        }
        if !(self.legacy_notch.is_finite() && self.legacy_notch > 0.0) {
            return Err(format!(
                "legacy_notch must be positive, got {}",
                self.legacy_notch
            ));
        }
        Ok(())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            decay_ms: DEFAULT_DECAY_MS,
            legacy_notch: LEGACY_NOTCH_DELTA,
            legacy_divisor: LEGACY_DIVISOR,
        }
    }
}

/// Processor-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub calibration: CalibrationConfig,
}

impl WheelConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values that would make calibration meaningless
    pub fn validate(&self) -> Result<(), String> {
        self.calibration.validate()
    }
}

/// Throttle or debounce settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Window length in milliseconds; `0` means the default
    pub delay_ms: u64,
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl DelayConfig {
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Default::default()
        }
    }

    pub fn effective_delay_ms(&self) -> u64 {
        if self.delay_ms == 0 {
            DEFAULT_DELAY_MS
        } else {
            self.delay_ms
        }
    }
}

/// Intent detection settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Sampling interval in milliseconds; `0` means the default
    pub interval_ms: u64,
    /// Manhattan distance below which the pointer counts as settled; `0` means the default
    pub sensitivity: f64,
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl IntentConfig {
    pub fn new(interval_ms: u64, sensitivity: f64) -> Self {
        Self {
            interval_ms,
            sensitivity,
            ..Default::default()
        }
    }

    pub fn effective_interval_ms(&self) -> u64 {
        if self.interval_ms == 0 {
            DEFAULT_INTENT_INTERVAL_MS
        } else {
            self.interval_ms
        }
    }

    pub fn effective_sensitivity(&self) -> f64 {
        if self.sensitivity > 0.0 && self.sensitivity.is_finite() {
            self.sensitivity
        } else {
            DEFAULT_INTENT_SENSITIVITY
        }
    }
}

/// How a rate shaper treats calls arriving inside its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    /// Keep the first call of each window
    Throttle,
    /// Keep the last call once the input goes quiet
    Debounce,
}

/// Per-handler shaping configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<DelayConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce: Option<DelayConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentConfig>,
}

impl HandlerConfig {
    pub fn throttled(delay_ms: u64) -> Self {
        Self {
            throttle: Some(DelayConfig::with_delay(delay_ms)),
            ..Default::default()
        }
    }

    pub fn debounced(delay_ms: u64) -> Self {
        Self {
            debounce: Some(DelayConfig::with_delay(delay_ms)),
            ..Default::default()
        }
    }

    pub fn with_intent(mut self, intent: IntentConfig) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Rate shaping to apply, if any. Throttle wins when both are present.
    pub fn rate(&self) -> Option<(RateMode, DelayConfig)> {
        match (self.throttle, self.debounce) {
            (Some(settings), _) => Some((RateMode::Throttle, settings)),
            (None, Some(settings)) => Some((RateMode::Debounce, settings)),
            (None, None) => None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = WheelConfig::default();
        assert_eq!(config.calibration.decay_ms, 200);
        assert_eq!(config.calibration.legacy_notch, 120.0);
        assert_eq!(config.calibration.legacy_divisor, 40.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        assert_eq!(DelayConfig::default().effective_delay_ms(), 100);
        let intent = IntentConfig::default();
        assert_eq!(intent.effective_interval_ms(), 100);
        assert_eq!(intent.effective_sensitivity(), 7.0);
    }

    #[test]
    fn test_throttle_wins_over_debounce() {
        let config = HandlerConfig {
            throttle: Some(DelayConfig::with_delay(50)),
            debounce: Some(DelayConfig::with_delay(300)),
            intent: None,
        };
        let (mode, settings) = config.rate().unwrap();
        assert_eq!(mode, RateMode::Throttle);
        assert_eq!(settings.delay_ms, 50);

        assert_eq!(HandlerConfig::default().rate(), None);
    }

    #[test]
    fn test_handler_config_from_json() {
        let config = HandlerConfig::from_json(
            r#"{"debounce": {"delay_ms": 250, "prevent_default": true},
                "intent": {"sensitivity": 4}}"#,
        )
        .unwrap();

        let (mode, settings) = config.rate().unwrap();
        assert_eq!(mode, RateMode::Debounce);
        assert_eq!(settings.delay_ms, 250);
        assert!(settings.prevent_default);
        assert!(!settings.stop_propagation);

        let intent = config.intent.unwrap();
        assert_eq!(intent.effective_sensitivity(), 4.0);
        assert_eq!(intent.effective_interval_ms(), 100);
    }

    #[test]
    fn test_wheel_config_partial_json() {
        let config = WheelConfig::from_json(r#"{"calibration": {"decay_ms": 500}}"#).unwrap();
        assert_eq!(config.calibration.decay_ms, 500);
        assert_eq!(config.calibration.legacy_notch, 120.0);

        let bad = WheelConfig::from_json(r#"{"calibration": {"legacy_divisor": 0}}"#).unwrap();
        assert!(bad.validate().is_err());
    }
}
