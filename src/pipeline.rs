//! Pipeline orchestration
//!
//! This module provides the public API for Wheel Flux. A [`WheelProcessor`]
//! owns the calibrator, the timer queue and a registry of elements with their
//! handlers, and runs every raw event through:
//!
//! 1. DeltaNormalizer - resolve, convert and calibrate the deltas
//! 2. IntentFilter - per handler, if configured
//! 3. RateShaper - per handler, if configured
//! 4. the registered callback

use crate::calibrator::Calibrator;
use crate::config::{HandlerConfig, WheelConfig};
use crate::error::WheelError;
use crate::host::{ElementHost, StaticHost};
use crate::normalizer::DeltaNormalizer;
use crate::schema::{RawEventAdapter, RawWheelEvent, RecordKind, ReplayRecord};
use crate::shaping::{IntentFilter, IntentState, RateDecision, RateShaper, ShapingFlags};
use crate::timer::{TimerId, TimerQueue};
use crate::types::{
    DeliveryRecord, DispatchOutcome, ElementGeometry, ElementId, HandlerId, WheelEvent,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Application callback invoked with each delivered event
pub type Callback = Box<dyn FnMut(&WheelEvent)>;

/// Work the timer queue hands back to the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerTask {
    CalibrationDecay,
    RateDelivery {
        element: ElementId,
        handler: HandlerId,
    },
    IntentTick {
        element: ElementId,
        handler: HandlerId,
    },
}

struct Registration {
    id: HandlerId,
    callback: Callback,
    intent: Option<IntentFilter>,
    rate: Option<RateShaper>,
}

impl Registration {
    fn deliver(&mut self, mut event: WheelEvent, now: u64) {
        event.handler = self.id;
        event.at_ms = now;
        (self.callback)(&event);
    }

    fn cancel_timers(&mut self, timers: &mut TimerQueue<TimerTask>) {
        if let Some(rate) = self.rate.as_mut() {
            rate.cancel(timers);
        }
        if let Some(intent) = self.intent.as_mut() {
            intent.pointer_leave(timers);
        }
    }
}

struct ElementState {
    geometry: ElementGeometry,
    listeners: &'static [&'static str],
    handlers: Vec<Registration>,
}

/// Stateful processor for a set of elements sharing one calibration.
pub struct WheelProcessor<H: ElementHost = StaticHost> {
    instance_id: String,
    host: H,
    calibrator: Calibrator,
    timers: TimerQueue<TimerTask>,
    elements: BTreeMap<ElementId, ElementState>,
    next_handler: u64,
}

impl Default for WheelProcessor<StaticHost> {
    fn default() -> Self {
        Self::new(StaticHost::default())
    }
}

impl<H: ElementHost> WheelProcessor<H> {
    /// Create a processor with default settings
    pub fn new(host: H) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            host,
            calibrator: Calibrator::default(),
            timers: TimerQueue::new(),
            elements: BTreeMap::new(),
            next_handler: 0,
        }
    }

    /// Create a processor with explicit configuration
    pub fn with_config(host: H, config: &WheelConfig) -> Result<Self, WheelError> {
        config.validate().map_err(WheelError::InvalidConfig)?;
        let mut processor = Self::new(host);
        processor.calibrator = Calibrator::new(config.calibration);
        Ok(processor)
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    /// Number of timers waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_setup(&self, element: ElementId) -> bool {
        self.elements.contains_key(&element)
    }

    /// Geometry captured for an element at setup
    pub fn geometry(&self, element: ElementId) -> Option<ElementGeometry> {
        self.elements.get(&element).map(|state| state.geometry)
    }

    /// Save calibrator state to JSON
    pub fn save_calibration(&self) -> Result<String, WheelError> {
        self.calibrator
            .to_json()
            .map_err(|e| WheelError::EncodingError(e.to_string()))
    }

    /// Load calibrator state from JSON.
    ///
    /// The loaded state replaces the current one only if it is valid. Any
    /// pending decay is cancelled and a learned state gets a fresh window.
    pub fn load_calibration(&mut self, json: &str) -> Result<(), WheelError> {
        let loaded =
            Calibrator::from_json(json).map_err(|e| WheelError::ParseError(e.to_string()))?;
        loaded.validate().map_err(WheelError::InvalidConfig)?;

        self.calibrator.disarm_decay(&mut self.timers);
        self.calibrator = loaded;
        if self.calibrator.lowest_delta().is_some() {
            self.calibrator
                .arm_decay(&mut self.timers, TimerTask::CalibrationDecay);
        }
        debug!(
            lowest_delta = ?self.calibrator.lowest_delta(),
            legacy_mode = self.calibrator.legacy_mode(),
            "calibration loaded"
        );
        Ok(())
    }

    /// Bind native listeners on an element and capture its geometry.
    /// Setting up an element twice keeps the first capture.
    pub fn setup(&mut self, element: ElementId) {
        if self.elements.contains_key(&element) {
            return;
        }

        let listeners = self.host.event_names();
        for name in listeners {
            self.host.add_listener(element, name);
        }

        let geometry = ElementGeometry::new(
            self.host.line_height(element),
            self.host.page_height(element),
        );
        debug!(
            instance = %self.instance_id,
            %element,
            line_height = geometry.line_height_px,
            page_height = geometry.page_height_px,
            "element set up"
        );

        self.elements.insert(
            element,
            ElementState {
                geometry,
                listeners,
                handlers: Vec::new(),
            },
        );
    }

    /// Unbind listeners, drop handlers and cancel every timer tied to the
    /// element. Returns whether the element was set up; calling it again is a
    /// no-op.
    pub fn teardown(&mut self, element: ElementId) -> bool {
        let Some(mut state) = self.elements.remove(&element) else {
            return false;
        };

        for registration in state.handlers.iter_mut() {
            registration.cancel_timers(&mut self.timers);
        }
        for name in state.listeners {
            self.host.remove_listener(element, name);
        }
        debug!(instance = %self.instance_id, %element, "element torn down");
        true
    }

    /// Register a callback on an element, wrapped per `config`.
    /// The element is set up on first use.
    pub fn add_handler<F>(
        &mut self,
        element: ElementId,
        callback: F,
        config: &HandlerConfig,
    ) -> HandlerId
    where
        F: FnMut(&WheelEvent) + 'static,
    {
        self.setup(element);

        let id = HandlerId(self.next_handler);
        self.next_handler += 1;

        let registration = Registration {
            id,
            callback: Box::new(callback),
            intent: config.intent.map(IntentFilter::new),
            rate: config
                .rate()
                .map(|(mode, settings)| RateShaper::new(mode, settings)),
        };

        if let Some(state) = self.elements.get_mut(&element) {
            state.handlers.push(registration);
        }
        debug!(%element, handler = %id, ?config, "handler added");
        id
    }

    /// Remove one handler, cancelling its pending timers
    pub fn remove_handler(
        &mut self,
        element: ElementId,
        handler: HandlerId,
    ) -> Result<(), WheelError> {
        let state = self
            .elements
            .get_mut(&element)
            .ok_or(WheelError::UnknownElement(element))?;
        let index = state
            .handlers
            .iter()
            .position(|r| r.id == handler)
            .ok_or(WheelError::UnknownHandler { element, handler })?;

        let mut registration = state.handlers.remove(index);
        registration.cancel_timers(&mut self.timers);
        Ok(())
    }

    /// Intent state of a handler, if it has an intent filter
    pub fn intent_state(&self, element: ElementId, handler: HandlerId) -> Option<IntentState> {
        self.elements
            .get(&element)?
            .handlers
            .iter()
            .find(|r| r.id == handler)?
            .intent
            .as_ref()
            .map(IntentFilter::state)
    }

    /// Run a raw event through normalization and every handler of the element.
    pub fn trigger(
        &mut self,
        element: ElementId,
        raw: &RawWheelEvent,
        args: Vec<serde_json::Value>,
    ) -> Result<DispatchOutcome, WheelError> {
        let state = self
            .elements
            .get_mut(&element)
            .ok_or(WheelError::UnknownElement(element))?;

        let calibrated = self.calibrator.lowest_delta();
        let Some(normalized) =
            DeltaNormalizer::normalize(raw, &state.geometry, &mut self.calibrator)
        else {
            if self.calibrator.lowest_delta() != calibrated {
                self.calibrator
                    .arm_decay(&mut self.timers, TimerTask::CalibrationDecay);
            }
            trace!(%element, "no movement, event suppressed");
            return Ok(DispatchOutcome::suppressed());
        };

        self.calibrator
            .arm_decay(&mut self.timers, TimerTask::CalibrationDecay);

        let now = self.timers.now();
        let event = WheelEvent {
            element,
            handler: HandlerId(0),
            at_ms: now,
            event: normalized,
            args,
        };

        let mut outcome = DispatchOutcome {
            normalized: Some(normalized),
            ..Default::default()
        };
        let mut flags = ShapingFlags::default();

        for registration in state.handlers.iter_mut() {
            if let Some(intent) = registration.intent.as_ref() {
                flags = flags.merge(intent.flags());
                if !intent.allows() {
                    outcome.swallowed += 1;
                    continue;
                }
            }

            let handler = registration.id;
            match registration.rate.as_mut() {
                Some(rate) => {
                    flags = flags.merge(rate.flags());
                    let task = TimerTask::RateDelivery { element, handler };
                    match rate.offer(event.clone(), &mut self.timers, task) {
                        RateDecision::Dropped => outcome.swallowed += 1,
                        RateDecision::Scheduled | RateDecision::Rescheduled => {
                            outcome.deferred += 1
                        }
                    }
                }
                None => {
                    registration.deliver(event.clone(), now);
                    outcome.delivered += 1;
                }
            }
        }

        outcome.default_prevented = flags.prevent_default;
        outcome.propagation_stopped = flags.stop_propagation;
        Ok(outcome)
    }

    /// Pointer entered an element: start intent tracking on its handlers
    pub fn pointer_enter(&mut self, element: ElementId, x: f64, y: f64) -> Result<(), WheelError> {
        let state = self
            .elements
            .get_mut(&element)
            .ok_or(WheelError::UnknownElement(element))?;
        for registration in state.handlers.iter_mut() {
            let handler = registration.id;
            if let Some(intent) = registration.intent.as_mut() {
                intent.pointer_enter(
                    x,
                    y,
                    &mut self.timers,
                    TimerTask::IntentTick { element, handler },
                );
            }
        }
        Ok(())
    }

    /// Pointer moved over an element
    pub fn pointer_move(&mut self, element: ElementId, x: f64, y: f64) -> Result<(), WheelError> {
        let state = self
            .elements
            .get_mut(&element)
            .ok_or(WheelError::UnknownElement(element))?;
        for intent in state.handlers.iter_mut().filter_map(|r| r.intent.as_mut()) {
            intent.pointer_move(x, y);
        }
        Ok(())
    }

    /// Pointer left an element: intent gates close again
    pub fn pointer_leave(&mut self, element: ElementId) -> Result<(), WheelError> {
        let state = self
            .elements
            .get_mut(&element)
            .ok_or(WheelError::UnknownElement(element))?;
        for intent in state.handlers.iter_mut().filter_map(|r| r.intent.as_mut()) {
            intent.pointer_leave(&mut self.timers);
        }
        Ok(())
    }

    /// Move the clock forward to `now_ms`, firing every timer due on the way
    pub fn advance_to(&mut self, now_ms: u64) {
        while let Some((id, task)) = self.timers.pop_due(now_ms) {
            self.run_task(id, task);
        }
    }

    /// Move the clock forward by `delta_ms`
    pub fn advance_by(&mut self, delta_ms: u64) {
        let target = self.timers.now().saturating_add(delta_ms);
        self.advance_to(target);
    }

    fn run_task(&mut self, id: TimerId, task: TimerTask) {
        match task {
            TimerTask::CalibrationDecay => {
                self.calibrator.on_decay(id);
            }
            TimerTask::RateDelivery { element, handler } => {
                let now = self.timers.now();
                if let Some(registration) = self.registration_mut(element, handler) {
                    let fired = registration.rate.as_mut().and_then(|rate| rate.fire(id));
                    if let Some(event) = fired {
                        registration.deliver(event, now);
                    }
                }
            }
            TimerTask::IntentTick { element, handler } => {
                let Some(state) = self.elements.get_mut(&element) else {
                    return;
                };
                let intent = state
                    .handlers
                    .iter_mut()
                    .find(|r| r.id == handler)
                    .and_then(|r| r.intent.as_mut());
                if let Some(intent) = intent {
                    intent.on_tick(id, &mut self.timers, task);
                }
            }
        }
    }

    fn registration_mut(
        &mut self,
        element: ElementId,
        handler: HandlerId,
    ) -> Option<&mut Registration> {
        self.elements
            .get_mut(&element)?
            .handlers
            .iter_mut()
            .find(|r| r.id == handler)
    }
}

/// Summary of a replayed timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Processor instance that produced the deliveries
    pub instance_id: String,
    /// Wheel records fed to the processor
    pub wheel_events: usize,
    /// Wheel records that normalized to nothing
    pub suppressed: usize,
    /// Wheel records whose native default action would be cancelled
    pub default_prevented: usize,
    pub deliveries: Vec<DeliveryRecord>,
}

/// Replay a recorded timeline through a fresh processor.
///
/// Every element named in the timeline gets one handler configured with
/// `handler_config`. After the last record the clock runs on for `settle_ms`
/// so pending deliveries can fire.
pub fn replay_timeline(
    records: &[ReplayRecord],
    config: &WheelConfig,
    handler_config: &HandlerConfig,
    host: StaticHost,
    settle_ms: u64,
) -> Result<ReplayReport, WheelError> {
    let mut processor = WheelProcessor::with_config(host, config)?;
    let deliveries: Rc<RefCell<Vec<DeliveryRecord>>> = Rc::new(RefCell::new(Vec::new()));

    let mut report = ReplayReport {
        instance_id: processor.instance_id().to_string(),
        wheel_events: 0,
        suppressed: 0,
        default_prevented: 0,
        deliveries: Vec::new(),
    };

    for (offset, record) in RawEventAdapter::to_offsets(records) {
        record
            .validate()
            .map_err(|e| WheelError::InvalidEvent(e.to_string()))?;

        processor.advance_to(offset);

        let element = record.element;
        if !processor.is_setup(element) {
            let sink = Rc::clone(&deliveries);
            processor.add_handler(
                element,
                move |event: &WheelEvent| sink.borrow_mut().push(DeliveryRecord::from(event)),
                handler_config,
            );
        }

        match record.kind {
            RecordKind::Wheel => {
                let outcome = processor.trigger(element, &record.event, record.args)?;
                report.wheel_events += 1;
                if outcome.is_suppressed() {
                    report.suppressed += 1;
                }
                if outcome.default_prevented {
                    report.default_prevented += 1;
                }
            }
            RecordKind::PointerEnter | RecordKind::PointerMove => {
                let (x, y) = record.pointer_position().ok_or_else(|| {
                    WheelError::InvalidEvent("pointer record without position".to_string())
                })?;
                if record.kind == RecordKind::PointerEnter {
                    processor.pointer_enter(element, x, y)?;
                } else {
                    processor.pointer_move(element, x, y)?;
                }
            }
            RecordKind::PointerLeave => processor.pointer_leave(element)?,
        }
    }

    processor.advance_by(settle_ms);

    report.deliveries = deliveries.take();
    Ok(report)
}
