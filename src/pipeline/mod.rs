//! A [`Bin`] that additionally owns a clock and a bus and coordinates
//! global stream time (spec §3/§4.4 Pipeline).

pub mod bus;
pub mod state;

use crate::bin::Bin;
use crate::clock::{Clock, ClockTime};
use crate::element::{Element, State, StateChange, StateChangeReturn};
use crate::error::{CoreError, ErrorDomain, Result};
use crate::message::MessageKind;
use bus::Bus;
use state::{ClockMode, PipelineExtras};
use std::sync::Arc;

pub struct Pipeline {
    bin: Bin,
    bus: Arc<Bus>,
    extras: Arc<PipelineExtras>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        let bin = Bin::new(name);
        let bus = Arc::new(Bus::new());
        bin.element().set_bus(Some(bus.clone()));
        let extras = Arc::new(PipelineExtras::new());
        let hook_extras = extras.clone();
        bin.element()
            .set_seek_done_hook(Some(Arc::new(move || hook_extras.handle_flushing_seek_done())));
        Self { bin, bus, extras }
    }

    pub fn bin(&self) -> &Bin {
        &self.bin
    }

    pub fn element(&self) -> &Element {
        self.bin.element()
    }

    pub fn bus(&self) -> Arc<Bus> {
        self.bus.clone()
    }

    pub fn add(&self, element: Element) -> Result<()> {
        self.bin.add(element)
    }

    pub fn add_many(&self, elements: impl IntoIterator<Item = Element>) -> Result<()> {
        self.bin.add_many(elements)
    }

    pub fn state(&self) -> State {
        self.bin.state()
    }

    pub fn set_clock(&self, clock: Arc<Clock>) {
        *self.extras.clock_mode.lock() = ClockMode::Fixed(clock);
    }

    pub fn auto_clock(&self) {
        *self.extras.clock_mode.lock() = ClockMode::Auto;
    }

    pub fn use_no_clock(&self) {
        *self.extras.clock_mode.lock() = ClockMode::Disabled;
    }

    pub fn set_new_stream_time(&self, time: Option<ClockTime>) {
        *self.extras.new_stream_time.lock() = time;
    }

    pub fn set_delay(&self, delay: ClockTime) {
        *self.extras.delay.lock() = delay;
    }

    pub fn set_auto_flush_bus(&self, enabled: bool) {
        self.extras
            .auto_flush_bus
            .store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn stream_time(&self) -> ClockTime {
        *self.extras.stream_time.lock()
    }

    /// `pipeline_set_state` / `element_set_state` on the pipeline itself
    /// (spec §6). Single-steps like [`Element::set_state`], interleaving
    /// the pipeline-only hooks from spec §4.4 "Pipeline extras" around
    /// each step.
    pub fn set_state(&self, target: State) -> Result<StateChangeReturn> {
        let mut overall = StateChangeReturn::Success;
        loop {
            let current = self.bin.state();
            let Some((from, next)) = current.step_towards(target) else {
                break;
            };
            let transition = StateChange::between(from, next).expect("adjacent states map to a transition");

            if let Err(e) = self.pre_step_hook(transition) {
                self.element().post_error(ErrorDomain::Clock, "clock-selection", e.to_string());
                return Ok(StateChangeReturn::Failure);
            }

            let ret = self.bin.set_state(next)?;
            if ret == StateChangeReturn::Failure {
                return Ok(StateChangeReturn::Failure);
            }
            if ret == StateChangeReturn::Async {
                overall = StateChangeReturn::Async;
            } else if ret == StateChangeReturn::NoPreroll && overall == StateChangeReturn::Success {
                overall = StateChangeReturn::NoPreroll;
            }

            if next == State::Null && self.extras.auto_flush_bus.load(std::sync::atomic::Ordering::SeqCst) {
                self.bus.flush();
            }

            if self.bin.state() == target {
                break;
            }
        }
        Ok(overall)
    }

    fn pre_step_hook(&self, transition: StateChange) -> Result<()> {
        match transition {
            StateChange::ReadyToPaused => {
                *self.extras.stream_time.lock() = ClockTime::ZERO;
            }
            StateChange::PausedToPlaying => {
                self.distribute_clock()?;
            }
            StateChange::PlayingToPaused => {
                if let Some(clock) = self.extras.selected_clock.lock().clone() {
                    let base_time = self.element().base_time();
                    *self.extras.stream_time.lock() = clock.now().saturating_sub(base_time);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn distribute_clock(&self) -> Result<()> {
        if !self.extras.stream_time_management_enabled() {
            return Ok(());
        }
        let mode = self.extras.clock_mode.lock().clone();
        let selected = match mode {
            ClockMode::Disabled => return Ok(()),
            ClockMode::Fixed(c) => c,
            ClockMode::Auto => {
                let from_child = self.bin.children().into_iter().find_map(|c| c.clock());
                from_child.unwrap_or_else(|| Arc::new(Clock::new("system")))
            }
        };

        let stream_time = *self.extras.stream_time.lock();
        let delay = *self.extras.delay.lock();
        let base_time = selected.now().saturating_sub(stream_time).saturating_add(delay);

        *self.extras.selected_clock.lock() = Some(selected.clone());
        self.element().set_clock(Some(selected.clone()));
        self.element().set_base_time(base_time);

        for child in self.bin.children() {
            if !child.set_clock(Some(selected.clone())) {
                return Err(CoreError::Clock(format!("{} refused the pipeline clock", child.name())));
            }
            child.set_base_time(base_time);
        }
        Ok(())
    }

    /// Called once a flushing seek issued through this pipeline has been
    /// fully acknowledged (spec §4.4 "on a successful flushing seek,
    /// stream_time is reset to 0"). `NONE` stream-time management
    /// suppresses the reset (spec §9).
    pub fn notify_flushing_seek_done(&self) {
        self.extras.handle_flushing_seek_done();
    }

    /// Poll the bus for an EOS message without consuming non-EOS ones
    /// (used by tests/demo code driving the pipeline to completion).
    pub fn wait_for_eos(&self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(msg) = self.bus.timed_pop(std::time::Duration::from_millis(20)) {
                if msg.is_eos() {
                    return true;
                }
                if matches!(msg.kind, MessageKind::Error(_)) {
                    return false;
                }
            }
            if std::time::Instant::now() >= deadline {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_to_paused_zeroes_stream_time() {
        let pipeline = Pipeline::new("p");
        pipeline.set_state(State::Paused).unwrap();
        assert_eq!(pipeline.stream_time(), ClockTime::ZERO);
    }

    #[test]
    fn playing_reaches_target_state_with_success() {
        let pipeline = Pipeline::new("p");
        let ret = pipeline.set_state(State::Playing).unwrap();
        assert_eq!(ret, StateChangeReturn::Success);
        assert_eq!(pipeline.state(), State::Playing);
        assert!(pipeline.element().pending_state().is_none());
    }

    #[test]
    fn auto_flush_bus_clears_on_null() {
        let pipeline = Pipeline::new("p");
        pipeline.element().post_error(ErrorDomain::Core, "x", "boom");
        assert!(!pipeline.bus.is_empty());
        pipeline.set_state(State::Playing).unwrap();
        pipeline.set_state(State::Null).unwrap();
        assert!(pipeline.bus.is_empty());
    }
}
