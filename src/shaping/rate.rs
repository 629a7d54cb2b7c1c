//! Throttle and debounce
//!
//! A rate shaper sits in front of a callback and decides when, if at all, a
//! call reaches it. Delivery is always deferred through the timer queue:
//! - throttle: the first call opens a window and is delivered when it closes;
//!   calls inside the window are dropped
//! - debounce: every call restarts the window; the last call is delivered once
//!   the input has been quiet for the whole window

use crate::config::{DelayConfig, RateMode};
use crate::shaping::ShapingFlags;
use crate::timer::{TimerId, TimerQueue};
use crate::types::WheelEvent;
use tracing::trace;

/// What happened to a call offered to the shaper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// A new window was opened with this call's arguments
    Scheduled,
    /// The pending call was replaced and its window restarted (debounce)
    Rescheduled,
    /// A window is already open; the call is discarded (throttle)
    Dropped,
}

#[derive(Debug)]
struct PendingCall {
    timer: TimerId,
    event: WheelEvent,
}

/// Per-handler rate shaping state
#[derive(Debug)]
pub struct RateShaper {
    mode: RateMode,
    settings: DelayConfig,
    pending: Option<PendingCall>,
}

impl RateShaper {
    pub fn new(mode: RateMode, settings: DelayConfig) -> Self {
        Self {
            mode,
            settings,
            pending: None,
        }
    }

    pub fn mode(&self) -> RateMode {
        self.mode
    }

    pub fn delay_ms(&self) -> u64 {
        self.settings.effective_delay_ms()
    }

    /// Flags applied to the native event on every call, delivered or not
    pub fn flags(&self) -> ShapingFlags {
        ShapingFlags {
            prevent_default: self.settings.prevent_default,
            stop_propagation: self.settings.stop_propagation,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Offer a call. `task` is what the queue hands back when the window closes.
    pub fn offer<T>(
        &mut self,
        event: WheelEvent,
        timers: &mut TimerQueue<T>,
        task: T,
    ) -> RateDecision {
        match self.mode {
            RateMode::Throttle => {
                if self.pending.is_some() {
                    trace!("throttle window open, dropping call");
                    return RateDecision::Dropped;
                }
                let timer = timers.schedule(self.delay_ms(), task);
                self.pending = Some(PendingCall { timer, event });
                RateDecision::Scheduled
            }
            RateMode::Debounce => {
                let decision = match self.pending.take() {
                    Some(previous) => {
                        timers.cancel(previous.timer);
                        RateDecision::Rescheduled
                    }
                    None => RateDecision::Scheduled,
                };
                let timer = timers.schedule(self.delay_ms(), task);
                self.pending = Some(PendingCall { timer, event });
                decision
            }
        }
    }

    /// Take the captured call when its timer fires. Stale ids yield nothing.
    pub fn fire(&mut self, timer: TimerId) -> Option<WheelEvent> {
        match &self.pending {
            Some(pending) if pending.timer == timer => {
                self.pending.take().map(|pending| pending.event)
            }
            _ => None,
        }
    }

    /// Cancel any pending delivery
    pub fn cancel<T>(&mut self, timers: &mut TimerQueue<T>) -> bool {
        match self.pending.take() {
            Some(pending) => {
                timers.cancel(pending.timer);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeltaMode, ElementId, HandlerId, NormalizedEvent};

    fn call(n: i64) -> WheelEvent {
        WheelEvent {
            element: ElementId(1),
            handler: HandlerId(0),
            at_ms: 0,
            event: NormalizedEvent {
                delta_x: 0,
                delta_y: n,
                delta_factor: 1.0,
                delta_mode: DeltaMode::Pixel,
            },
            args: vec![serde_json::json!(n)],
        }
    }

    /// Offer five calls 10ms apart, then run the clock out to `until`.
    fn burst(shaper: &mut RateShaper, until: u64) -> Vec<(u64, i64)> {
        let mut timers = TimerQueue::new();
        let mut delivered = Vec::new();
        for n in 1..=5 {
            let at = (n as u64 - 1) * 10;
            while let Some((id, ())) = timers.pop_due(at) {
                if let Some(event) = shaper.fire(id) {
                    delivered.push((timers.now(), event.event.delta_y));
                }
            }
            shaper.offer(call(n), &mut timers, ());
        }
        while let Some((id, ())) = timers.pop_due(until) {
            if let Some(event) = shaper.fire(id) {
                delivered.push((timers.now(), event.event.delta_y));
            }
        }
        delivered
    }

    #[test]
    fn test_throttle_delivers_first_call_once() {
        let mut shaper = RateShaper::new(RateMode::Throttle, DelayConfig::with_delay(100));
        let delivered = burst(&mut shaper, 500);
        assert_eq!(delivered, vec![(100, 1)]);
        assert!(!shaper.is_pending());
    }

    #[test]
    fn test_debounce_delivers_last_call_after_quiet() {
        let mut shaper = RateShaper::new(RateMode::Debounce, DelayConfig::with_delay(100));
        let delivered = burst(&mut shaper, 500);
        // last call at 40ms
        assert_eq!(delivered, vec![(140, 5)]);
    }

    #[test]
    fn test_decisions() {
        let mut timers = TimerQueue::new();
        let mut throttle = RateShaper::new(RateMode::Throttle, DelayConfig::with_delay(50));
        assert_eq!(throttle.offer(call(1), &mut timers, ()), RateDecision::Scheduled);
        assert_eq!(throttle.offer(call(2), &mut timers, ()), RateDecision::Dropped);

        let mut debounce = RateShaper::new(RateMode::Debounce, DelayConfig::with_delay(50));
        assert_eq!(debounce.offer(call(1), &mut timers, ()), RateDecision::Scheduled);
        assert_eq!(debounce.offer(call(2), &mut timers, ()), RateDecision::Rescheduled);
        // one throttle timer + one live debounce timer
        assert_eq!(timers.len(), 2);
    }

    #[test]
    fn test_throttle_opens_new_window_after_delivery() {
        let mut timers = TimerQueue::new();
        let mut shaper = RateShaper::new(RateMode::Throttle, DelayConfig::with_delay(100));
        shaper.offer(call(1), &mut timers, ());
        let (id, ()) = timers.pop_due(100).unwrap();
        assert_eq!(shaper.fire(id).map(|e| e.event.delta_y), Some(1));
        assert_eq!(shaper.offer(call(2), &mut timers, ()), RateDecision::Scheduled);
    }

    #[test]
    fn test_cancel_prevents_delivery() {
        let mut timers = TimerQueue::new();
        let mut shaper = RateShaper::new(RateMode::Debounce, DelayConfig::with_delay(100));
        shaper.offer(call(1), &mut timers, ());
        assert!(shaper.cancel(&mut timers));
        assert!(!shaper.cancel(&mut timers));
        assert!(timers.pop_due(1_000).is_none());
    }

    #[test]
    fn test_zero_delay_uses_default() {
        let shaper = RateShaper::new(RateMode::Throttle, DelayConfig::default());
        assert_eq!(shaper.delay_ms(), 100);
    }
}
