//! Scroll intent detection
//!
//! A pointer sweeping across an element should not scroll it. The intent
//! filter samples the pointer while it is over the element and only lets wheel
//! events through once the pointer has settled: two samples one interval apart
//! closer than `sensitivity` (Manhattan distance).
//!
//! States: `Idle` (pointer outside), `Tracking` (sampling), `Confirmed`
//! (wheel events pass). Leaving the element returns to `Idle` from anywhere.

use crate::config::IntentConfig;
use crate::shaping::ShapingFlags;
use crate::timer::{TimerId, TimerQueue};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Idle,
    Tracking,
    Confirmed,
}

/// Pointer samples while tracking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerTrack {
    /// Position at the previous comparison (or at entry)
    pub reference: (f64, f64),
    /// Most recent sample
    pub current: (f64, f64),
    /// Pending comparison tick
    pub tick: TimerId,
}

impl PointerTrack {
    fn distance(&self) -> f64 {
        (self.reference.0 - self.current.0).abs() + (self.reference.1 - self.current.1).abs()
    }
}

/// Per-handler intent gate
#[derive(Debug)]
pub struct IntentFilter {
    settings: IntentConfig,
    track: Option<PointerTrack>,
    confirmed: bool,
}

impl IntentFilter {
    pub fn new(settings: IntentConfig) -> Self {
        Self {
            settings,
            track: None,
            confirmed: false,
        }
    }

    pub fn state(&self) -> IntentState {
        if self.confirmed {
            IntentState::Confirmed
        } else if self.track.is_some() {
            IntentState::Tracking
        } else {
            IntentState::Idle
        }
    }

    pub fn track(&self) -> Option<&PointerTrack> {
        self.track.as_ref()
    }

    /// Wheel events may reach the wrapped callback
    pub fn allows(&self) -> bool {
        self.confirmed
    }

    pub fn flags(&self) -> ShapingFlags {
        ShapingFlags {
            prevent_default: self.settings.prevent_default,
            stop_propagation: self.settings.stop_propagation,
        }
    }

    /// Pointer entered the element: start tracking from `(x, y)`.
    ///
    /// Entering again without a leave restarts tracking.
    pub fn pointer_enter<T>(&mut self, x: f64, y: f64, timers: &mut TimerQueue<T>, task: T) {
        self.stop(timers);
        let tick = timers.schedule(self.settings.effective_interval_ms(), task);
        self.track = Some(PointerTrack {
            reference: (x, y),
            current: (x, y),
            tick,
        });
        trace!(x, y, "intent tracking started");
    }

    /// Record a pointer sample. Ignored unless tracking.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let Some(track) = self.track.as_mut() {
            track.current = (x, y);
        }
    }

    /// Compare samples when a tick fires. Returns the state after the tick.
    /// Stale tick ids leave the state unchanged.
    pub fn on_tick<T>(&mut self, tick: TimerId, timers: &mut TimerQueue<T>, task: T) -> IntentState {
        let Some(track) = self.track.as_mut() else {
            return self.state();
        };
        if track.tick != tick {
            return self.state();
        }

        let distance = track.distance();
        if distance < self.settings.effective_sensitivity() {
            self.track = None;
            self.confirmed = true;
            debug!(distance, "scroll intent confirmed");
        } else {
            track.reference = track.current;
            track.tick = timers.schedule(self.settings.effective_interval_ms(), task);
            trace!(distance, "pointer still moving");
        }
        self.state()
    }

    /// Pointer left the element: back to idle
    pub fn pointer_leave<T>(&mut self, timers: &mut TimerQueue<T>) {
        self.stop(timers);
        self.confirmed = false;
    }

    fn stop<T>(&mut self, timers: &mut TimerQueue<T>) {
        if let Some(track) = self.track.take() {
            timers.cancel(track.tick);
        }
        self.confirmed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> IntentFilter {
        IntentFilter::new(IntentConfig::new(100, 7.0))
    }

    /// Fire every tick due up to `until`
    fn run_ticks(filter: &mut IntentFilter, timers: &mut TimerQueue<()>, until: u64) {
        while let Some((id, ())) = timers.pop_due(until) {
            filter.on_tick(id, timers, ());
        }
    }

    #[test]
    fn test_starts_idle_and_blocks() {
        let filter = filter();
        assert_eq!(filter.state(), IntentState::Idle);
        assert!(!filter.allows());
    }

    #[test]
    fn test_settled_pointer_confirms() {
        let mut timers = TimerQueue::new();
        let mut filter = filter();
        filter.pointer_enter(100.0, 100.0, &mut timers, ());
        assert_eq!(filter.state(), IntentState::Tracking);

        // jitter inside a 5px box
        timers.pop_due(40);
        filter.pointer_move(103.0, 101.0);
        timers.pop_due(80);
        filter.pointer_move(102.0, 104.0);

        run_ticks(&mut filter, &mut timers, 100);
        // |100-102| + |100-104| = 6 < 7
        assert_eq!(filter.state(), IntentState::Confirmed);
        assert!(filter.allows());
        assert!(timers.is_empty());
    }

    #[test]
    fn test_moving_pointer_never_confirms() {
        let mut timers = TimerQueue::new();
        let mut filter = filter();
        filter.pointer_enter(0.0, 0.0, &mut timers, ());

        for step in 1..=20u64 {
            timers.pop_due(step * 100 - 50);
            filter.pointer_move(step as f64 * 8.0, 0.0);
            run_ticks(&mut filter, &mut timers, step * 100);
            assert_eq!(filter.state(), IntentState::Tracking);
        }
        assert!(!filter.allows());
    }

    #[test]
    fn test_moves_after_confirmation_are_ignored() {
        let mut timers = TimerQueue::new();
        let mut filter = filter();
        filter.pointer_enter(0.0, 0.0, &mut timers, ());
        run_ticks(&mut filter, &mut timers, 100);
        assert_eq!(filter.state(), IntentState::Confirmed);

        filter.pointer_move(500.0, 500.0);
        assert!(filter.track().is_none());
        assert!(filter.allows());
    }

    #[test]
    fn test_leave_resets_and_cancels_tick() {
        let mut timers = TimerQueue::new();
        let mut filter = filter();
        filter.pointer_enter(0.0, 0.0, &mut timers, ());
        assert_eq!(timers.len(), 1);

        filter.pointer_leave(&mut timers);
        assert_eq!(filter.state(), IntentState::Idle);
        assert!(timers.is_empty());

        // leaving twice is harmless
        filter.pointer_leave(&mut timers);
        assert_eq!(filter.state(), IntentState::Idle);
    }

    #[test]
    fn test_leave_after_confirmation_blocks_again() {
        let mut timers = TimerQueue::new();
        let mut filter = filter();
        filter.pointer_enter(0.0, 0.0, &mut timers, ());
        run_ticks(&mut filter, &mut timers, 100);
        assert!(filter.allows());

        filter.pointer_leave(&mut timers);
        assert!(!filter.allows());
    }

    #[test]
    fn test_reference_follows_pointer_between_ticks() {
        let mut timers = TimerQueue::new();
        let mut filter = filter();
        filter.pointer_enter(0.0, 0.0, &mut timers, ());
        filter.pointer_move(50.0, 0.0);
        run_ticks(&mut filter, &mut timers, 100);

        let track = filter.track().unwrap();
        assert_eq!(track.reference, (50.0, 0.0));

        // pointer stops; next tick compares against the new reference
        run_ticks(&mut filter, &mut timers, 200);
        assert_eq!(filter.state(), IntentState::Confirmed);
    }
}
