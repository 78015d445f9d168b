//! Pipeline-specific state extras: clock selection, base-time and
//! stream-time bookkeeping (spec §3/§4.4 "Pipeline extras").

use crate::clock::{Clock, ClockTime};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub enum ClockMode {
    /// Pick whichever clock the pipeline or its elements provide.
    Auto,
    /// Always use this specific clock.
    Fixed(Arc<Clock>),
    /// No clock at all: base-time is never distributed (spec §9 third
    /// open question — `pipeline_use_clock(None)`/`new_stream_time(None)`
    /// disables base-time management entirely).
    Disabled,
}

pub(crate) struct PipelineExtras {
    pub(crate) clock_mode: Mutex<ClockMode>,
    pub(crate) selected_clock: Mutex<Option<Arc<Clock>>>,
    pub(crate) stream_time: Mutex<ClockTime>,
    /// `None` disables automatic base-time management and suppresses the
    /// stream-time reset on a flushing seek (spec §9 resolution).
    pub(crate) new_stream_time: Mutex<Option<ClockTime>>,
    pub(crate) delay: Mutex<ClockTime>,
    pub(crate) auto_flush_bus: AtomicBool,
}

impl PipelineExtras {
    pub(crate) fn new() -> Self {
        Self {
            clock_mode: Mutex::new(ClockMode::Auto),
            selected_clock: Mutex::new(None),
            stream_time: Mutex::new(ClockTime::ZERO),
            new_stream_time: Mutex::new(Some(ClockTime::ZERO)),
            delay: Mutex::new(ClockTime::ZERO),
            auto_flush_bus: AtomicBool::new(true),
        }
    }

    pub(crate) fn stream_time_management_enabled(&self) -> bool {
        self.new_stream_time.lock().is_some()
    }

    /// spec §4.4/§9: a successful flushing seek resets stream-time to 0,
    /// unless `NONE` stream-time management is in effect.
    pub(crate) fn handle_flushing_seek_done(&self) {
        if self.stream_time_management_enabled() {
            *self.stream_time.lock() = ClockTime::ZERO;
        }
    }
}
