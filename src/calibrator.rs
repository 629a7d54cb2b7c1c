//! Adaptive delta calibration
//!
//! Devices disagree on what one scroll step is worth: trackpads report a few
//! pixels, notched wheels report 120 per notch. The calibrator tracks the
//! smallest magnitude seen in the current burst of input and uses it as the
//! size of one step. A burst ends after a period of inactivity, at which point
//! the state resets so the next device calibrates from scratch.

use crate::config::CalibrationConfig;
use crate::timer::{TimerId, TimerQueue};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Calibration state shared by every element of a processor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Calibrator {
    #[serde(default)]
    config: CalibrationConfig,
    /// Smallest magnitude seen since the last reset (after legacy rescaling)
    lowest_delta: Option<f64>,
    /// Legacy 120-per-notch scaling is active
    legacy_mode: bool,
    #[serde(skip)]
    decay: Option<TimerId>,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            lowest_delta: None,
            legacy_mode: false,
            decay: None,
        }
    }

    pub fn lowest_delta(&self) -> Option<f64> {
        self.lowest_delta
    }

    pub fn legacy_mode(&self) -> bool {
        self.legacy_mode
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Pre-seed the state, e.g. to resume a session deterministically
    pub fn seed(&mut self, lowest_delta: Option<f64>, legacy_mode: bool) {
        self.lowest_delta = lowest_delta;
        self.legacy_mode = legacy_mode;
    }

    /// Record a magnitude and return the calibrated step size.
    ///
    /// Legacy mode switches on only at the moment `lowest_delta` is set to
    /// exactly the legacy notch; a later event of that magnitude does nothing
    /// once a smaller step has been seen.
    pub fn observe(&mut self, abs_delta: f64) -> f64 {
        let lower = match self.lowest_delta {
            None => true,
            Some(lowest) => abs_delta < lowest,
        };

        if lower {
            let mut lowest = abs_delta;
            if lowest == self.config.legacy_notch {
                self.legacy_mode = true;
                lowest /= self.config.legacy_divisor;
                debug!(lowest_delta = lowest, "legacy wheel scaling detected");
            } else {
                trace!(lowest_delta = lowest, "calibration lowered");
            }
            self.lowest_delta = Some(lowest);
        }

        // `lower` is always true when unset, so this is set by now.
        self.lowest_delta.unwrap_or(abs_delta)
    }

    /// Apply legacy scaling to a delta
    pub fn scale(&self, delta: f64) -> f64 {
        if self.legacy_mode {
            delta / self.config.legacy_divisor
        } else {
            delta
        }
    }

    /// Forget everything learned in the current burst
    pub fn reset(&mut self) {
        if self.lowest_delta.is_some() || self.legacy_mode {
            debug!("calibration decayed");
        }
        self.lowest_delta = None;
        self.legacy_mode = false;
    }

    /// Restart the inactivity window
    pub fn arm_decay<T>(&mut self, timers: &mut TimerQueue<T>, task: T) {
        self.disarm_decay(timers);
        self.decay = Some(timers.schedule(self.config.decay_ms, task));
    }

    /// Cancel a pending decay without touching the learned state
    pub fn disarm_decay<T>(&mut self, timers: &mut TimerQueue<T>) {
        if let Some(previous) = self.decay.take() {
            timers.cancel(previous);
        }
    }

    /// Handle a fired decay timer. Stale ids are ignored.
    pub fn on_decay(&mut self, id: TimerId) -> bool {
        if self.decay == Some(id) {
            self.decay = None;
            self.reset();
            true
        } else {
            false
        }
    }

    /// Check a loaded state before it is used for scaling
    pub fn validate(&self) -> Result<(), String> {
        self.config.validate()?;
        if let Some(lowest) = self.lowest_delta {
            if !(lowest.is_finite() && lowest > 0.0) {
                return Err(format!("lowest_delta must be positive, got {}", lowest));
            }
        }
        Ok(())
    }

    /// Load calibrator state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize calibrator state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_sets_lowest() {
        let mut calibrator = Calibrator::default();
        assert_eq!(calibrator.observe(4.0), 4.0);
        assert_eq!(calibrator.lowest_delta(), Some(4.0));
        assert!(!calibrator.legacy_mode());
    }

    #[test]
    fn test_lowest_is_non_increasing() {
        let mut calibrator = Calibrator::default();
        calibrator.observe(10.0);
        calibrator.observe(3.0);
        calibrator.observe(25.0);
        assert_eq!(calibrator.lowest_delta(), Some(3.0));
    }

    #[test]
    fn test_legacy_notch_rescales() {
        let mut calibrator = Calibrator::default();
        assert_eq!(calibrator.observe(120.0), 3.0);
        assert!(calibrator.legacy_mode());
        assert_eq!(calibrator.scale(-120.0), -3.0);

        // Stays on for the rest of the burst.
        calibrator.observe(240.0);
        assert!(calibrator.legacy_mode());
    }

    #[test]
    fn test_legacy_detection_is_one_shot() {
        let mut calibrator = Calibrator::default();
        calibrator.observe(100.0);
        calibrator.observe(120.0);
        assert!(!calibrator.legacy_mode());
        assert_eq!(calibrator.lowest_delta(), Some(100.0));
    }

    #[test]
    fn test_decay_resets_state() {
        let mut timers = TimerQueue::new();
        let mut calibrator = Calibrator::default();
        calibrator.observe(120.0);
        calibrator.arm_decay(&mut timers, ());

        let (id, _) = timers.pop_due(200).unwrap();
        assert!(calibrator.on_decay(id));
        assert_eq!(calibrator.lowest_delta(), None);
        assert!(!calibrator.legacy_mode());
    }

    #[test]
    fn test_rearm_cancels_previous_decay() {
        let mut timers = TimerQueue::new();
        let mut calibrator = Calibrator::default();
        calibrator.observe(5.0);
        calibrator.arm_decay(&mut timers, ());
        assert!(timers.pop_due(150).is_none());
        calibrator.arm_decay(&mut timers, ());

        assert_eq!(timers.len(), 1);
        assert!(timers.pop_due(349).is_none());
        let (id, _) = timers.pop_due(350).unwrap();
        assert!(calibrator.on_decay(id));
    }

    #[test]
    fn test_disarm_leaves_state_in_place() {
        let mut timers = TimerQueue::new();
        let mut calibrator = Calibrator::default();
        calibrator.observe(5.0);
        calibrator.arm_decay(&mut timers, ());
        calibrator.disarm_decay(&mut timers);

        assert!(timers.is_empty());
        assert!(timers.pop_due(1_000).is_none());
        assert_eq!(calibrator.lowest_delta(), Some(5.0));
    }

    #[test]
    fn test_validate_rejects_degenerate_state() {
        let mut calibrator = Calibrator::default();
        assert!(calibrator.validate().is_ok());

        for lowest in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            calibrator.seed(Some(lowest), false);
            assert!(calibrator.validate().is_err(), "lowest {}", lowest);
        }

        let zero_divisor = Calibrator::new(CalibrationConfig {
            legacy_divisor: 0.0,
            ..Default::default()
        });
        assert!(zero_divisor.validate().is_err());
    }

    #[test]
    fn test_serialization_round_trip_keeps_state() {
        let mut calibrator = Calibrator::default();
        calibrator.observe(120.0);

        let json = calibrator.to_json().unwrap();
        let loaded = Calibrator::from_json(&json).unwrap();
        assert_eq!(loaded.lowest_delta(), Some(3.0));
        assert!(loaded.legacy_mode());
        assert_eq!(loaded.config().decay_ms, 200);
    }
}
