//! Reusable template for source elements: push/pull activation, segment
//! clipping, live-source gating, flushing-seek handling (spec §4.6/§4.7).
//!
//! A concrete source plugs in a [`BaseSourceOps`] impl; the template owns
//! activation, the loop thread, and the seek protocol the same way every
//! subclass hook in spec §4.6 is listed against one shared state machine.

use crate::clock::{ClockId, ClockTime, ClockWaitResult};
use crate::element::{Element, ElementImpl, StateChange, StateChangeReturn};
use crate::error::{ErrorDomain, Result};
use crate::event::{Event, EventKind, SeekFlags, SeekType};
use crate::message::MessageKind;
use crate::pad::{FlowReturn, Pad, PadDirection, PadFunctions, PullResult, SetCapsReturn};
use crate::query::Query;
use crate::scheduler::{IterateResult, LoopTask};
use crate::segment::{Segment, SegmentFormat};
use crate::{Buffer, Caps};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// `get_range(offset, length)` result, reusing [`FlowReturn`] for the
/// non-buffer outcomes (spec §4.7).
pub type GetRangeResult = std::result::Result<Buffer, FlowReturn>;

/// Subclass hooks (spec §4.6). Every method has a core default so a
/// minimal source only needs to override `create`.
pub trait BaseSourceOps: Send + Sync {
    fn start(&self, _src: &BaseSource) -> Result<()> {
        Ok(())
    }

    fn stop(&self, _src: &BaseSource) -> Result<()> {
        Ok(())
    }

    fn create(&self, src: &BaseSource, offset: i64, length: i64) -> GetRangeResult;

    fn get_size(&self, _src: &BaseSource) -> Option<i64> {
        None
    }

    fn is_seekable(&self, _src: &BaseSource) -> bool {
        false
    }

    /// Default: BYTES format seeks to an absolute position; any format
    /// seeking back to 0 resets to origin (spec §4.6 "Default do_seek").
    fn do_seek(&self, _src: &BaseSource, segment: &mut Segment) -> bool {
        if segment.format == SegmentFormat::Bytes {
            segment.position = segment.start;
            segment.time = segment.start;
            return true;
        }
        if segment.start == 0 {
            segment.reset_to_origin();
            return true;
        }
        false
    }

    /// Random access requires BYTES format and seekability.
    fn check_get_range(&self, src: &BaseSource) -> bool {
        self.is_seekable(src) && src.segment().format == SegmentFormat::Bytes
    }

    fn get_times(&self, _src: &BaseSource, _buffer: &Buffer) -> (ClockTime, ClockTime) {
        (ClockTime::NONE, ClockTime::NONE)
    }

    fn event(&self, _src: &BaseSource, _event: &Event) -> bool {
        false
    }

    fn query(&self, src: &BaseSource, query: &mut Query) -> bool {
        src.default_query(query)
    }

    fn unlock(&self, _src: &BaseSource) {}

    fn get_caps(&self, _src: &BaseSource) -> Caps {
        Caps::new_any()
    }

    fn set_caps(&self, _src: &BaseSource, _caps: &Caps) -> bool {
        true
    }

    fn negotiate(&self, src: &BaseSource) -> bool {
        let caps = self.get_caps(src);
        let fixed = caps.fixate();
        matches!(
            src.srcpad().try_set_caps(&fixed),
            SetCapsReturn::Ok | SetCapsReturn::Done
        )
    }
}

struct LiveState {
    running: Mutex<bool>,
    cond: Condvar,
}

pub(crate) struct BaseSourceShared {
    element: Element,
    srcpad: Pad,
    ops: RwLock<Arc<dyn BaseSourceOps>>,
    segment: Mutex<Segment>,
    num_buffers_left: Mutex<Option<i64>>,
    blocksize: AtomicI64,
    is_live: AtomicBool,
    live: LiveState,
    last_sent_eos: AtomicBool,
    discont: AtomicBool,
    stream_lock: Mutex<()>,
    loop_task: Mutex<Option<LoopTask>>,
    current_wait: Mutex<Option<ClockId>>,
    unlock_requested: AtomicBool,
    pending_close_segment: Mutex<Option<Event>>,
    pending_start_segment: Mutex<Option<Event>>,
}

struct BaseSourceImpl {
    shared: Weak<BaseSourceShared>,
}

impl ElementImpl for BaseSourceImpl {
    fn change_state(&self, _element: &Element, transition: StateChange) -> Result<StateChangeReturn> {
        let Some(shared) = self.shared.upgrade() else {
            return Ok(StateChangeReturn::Success);
        };
        let src = BaseSource { shared };

        match transition {
            StateChange::ReadyToPaused => {
                src.activate()?;
                if src.is_live() {
                    *src.shared.live.running.lock() = false;
                    return Ok(StateChangeReturn::NoPreroll);
                }
            }
            StateChange::PausedToPlaying => {
                if src.is_live() {
                    *src.shared.live.running.lock() = true;
                    src.shared.live.cond.notify_all();
                }
            }
            StateChange::PlayingToPaused => {
                if src.is_live() {
                    *src.shared.live.running.lock() = false;
                }
            }
            StateChange::PausedToReady => {
                src.deactivate();
            }
            StateChange::NullToReady | StateChange::ReadyToNull => {}
        }
        Ok(StateChangeReturn::Success)
    }
}

/// A source [`Element`] plus one source pad driven by [`BaseSourceOps`].
#[derive(Clone)]
pub struct BaseSource {
    pub(crate) shared: Arc<BaseSourceShared>,
}

impl BaseSource {
    pub fn new(name: impl Into<String>, ops: Arc<dyn BaseSourceOps>) -> Self {
        let element = Element::new(name);
        let srcpad = Pad::new("src", PadDirection::Source);
        let shared = Arc::new(BaseSourceShared {
            element: element.clone(),
            srcpad: srcpad.clone(),
            ops: RwLock::new(ops),
            segment: Mutex::new(Segment::new(SegmentFormat::Bytes)),
            num_buffers_left: Mutex::new(None),
            blocksize: AtomicI64::new(4096),
            is_live: AtomicBool::new(false),
            live: LiveState {
                running: Mutex::new(false),
                cond: Condvar::new(),
            },
            last_sent_eos: AtomicBool::new(false),
            discont: AtomicBool::new(true),
            stream_lock: Mutex::new(()),
            loop_task: Mutex::new(None),
            current_wait: Mutex::new(None),
            unlock_requested: AtomicBool::new(false),
            pending_close_segment: Mutex::new(None),
            pending_start_segment: Mutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        element.set_impl(Arc::new(BaseSourceImpl { shared: weak.clone() }));
        element.add_pad(srcpad).expect("fresh element has no pad named \"src\" yet");

        Self::wire_pad(&shared, &weak);
        Self { shared }
    }

    fn wire_pad(shared: &Arc<BaseSourceShared>, weak: &Weak<BaseSourceShared>) {
        let w1 = weak.clone();
        let w2 = weak.clone();
        let w3 = weak.clone();
        let w4 = weak.clone();
        shared.srcpad.set_functions(PadFunctions {
            get: Some(Arc::new(move |_pad| match w1.upgrade() {
                Some(s) => BaseSource { shared: s }.pull_one(),
                None => PullResult::Error(FlowReturn::Error),
            })),
            event: Some(Arc::new(move |_pad, event| match w2.upgrade() {
                Some(s) => BaseSource { shared: s }.handle_event(event),
                None => false,
            })),
            getcaps: Some(Arc::new(move |_pad| match w3.upgrade() {
                Some(s) => {
                    let src = BaseSource { shared: s };
                    let ops = src.shared.ops.read().clone();
                    ops.get_caps(&src)
                }
                None => Caps::new_any(),
            })),
            link_notify: Some(Arc::new(move |_pad, caps, _is_src| match w4.upgrade() {
                Some(s) => {
                    let src = BaseSource { shared: s };
                    let ops = src.shared.ops.read().clone();
                    if ops.set_caps(&src, caps) {
                        SetCapsReturn::Ok
                    } else {
                        SetCapsReturn::Refused
                    }
                }
                None => SetCapsReturn::Refused,
            })),
            chain: None,
            query: None,
        });
    }

    pub fn element(&self) -> &Element {
        &self.shared.element
    }

    pub fn srcpad(&self) -> &Pad {
        &self.shared.srcpad
    }

    pub fn set_live(&self, live: bool) {
        self.shared.is_live.store(live, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.shared.is_live.load(Ordering::SeqCst)
    }

    pub fn set_num_buffers(&self, count: Option<i64>) {
        *self.shared.num_buffers_left.lock() = count;
    }

    pub fn set_blocksize(&self, size: i64) {
        self.shared.blocksize.store(size, Ordering::SeqCst);
    }

    pub fn blocksize(&self) -> i64 {
        self.shared.blocksize.load(Ordering::SeqCst)
    }

    pub fn segment(&self) -> Segment {
        self.shared.segment.lock().clone()
    }

    pub fn set_segment_format(&self, format: SegmentFormat) {
        *self.shared.segment.lock() = Segment::new(format);
    }

    fn ops(&self) -> Arc<dyn BaseSourceOps> {
        self.shared.ops.read().clone()
    }

    // ---- activation (spec §4.6 "Activation") ----

    fn activate(&self) -> Result<()> {
        self.ops().start(self)?;
        self.shared.last_sent_eos.store(false, Ordering::SeqCst);
        self.shared.discont.store(true, Ordering::SeqCst);
        self.srcpad().set_active(true, crate::pad::PadMode::Push);

        let me = self.clone();
        let task = LoopTask::start(move || me.loop_step());
        *self.shared.loop_task.lock() = Some(task);
        Ok(())
    }

    fn deactivate(&self) {
        if let Some(task) = self.shared.loop_task.lock().take() {
            task.stop();
        }
        self.srcpad().set_active(false, crate::pad::PadMode::Inactive);
        let _ = self.ops().stop(self);
    }

    /// Pull-mode activation: verifies random access is possible and never
    /// spawns a loop task (spec §4.6 "downstream element calls pull").
    pub fn activate_pull(&self) -> bool {
        if !self.ops().check_get_range(self) {
            return false;
        }
        self.srcpad().set_active(true, crate::pad::PadMode::Pull);
        true
    }

    // ---- §4.6 get_range ----

    pub fn get_range(&self, offset: i64, length: i64) -> GetRangeResult {
        if self.is_live() {
            let mut running = self.shared.live.running.lock();
            while !*running {
                if self.srcpad().is_flushing() {
                    return Err(FlowReturn::WrongState);
                }
                self.shared.live.cond.wait_for(&mut running, Duration::from_millis(100));
            }
        }
        if self.shared.unlock_requested.load(Ordering::SeqCst) {
            return Err(FlowReturn::WrongState);
        }

        {
            let mut left = self.shared.num_buffers_left.lock();
            if let Some(n) = *left {
                if n == 0 {
                    return Err(FlowReturn::Unexpected);
                }
                *left = Some(n - 1);
            }
        }

        let segment = self.segment();
        let size = self.ops().get_size(self);
        let clipped = match segment.clip_length(offset, length, size) {
            Some(len) => len,
            None => return Err(FlowReturn::Unexpected),
        };

        let mut buffer = self.ops().create(self, offset, clipped)?;
        if buffer.timestamp().is_none() && offset == 0 && segment.time == 0 {
            buffer.set_timestamp(Some(0));
        }

        let (start, _end) = self.ops().get_times(self, &buffer);
        if !start.is_none() {
            if let Some(clock) = self.element().clock() {
                let target = self.element().base_time().saturating_add(start);
                let id = clock.new_single_shot_id(target);
                *self.shared.current_wait.lock() = Some(id.clone());
                let result = clock.wait(&id);
                *self.shared.current_wait.lock() = None;
                if matches!(result, ClockWaitResult::Unscheduled) {
                    return Err(FlowReturn::WrongState);
                }
            }
        }

        if self.shared.discont.swap(false, Ordering::SeqCst) {
            buffer.set_discont(true);
        }

        Ok(buffer)
    }

    /// Single-shot pull used by the pad's `get` function: runs the same
    /// offset-selection logic as one push-mode loop iteration, but returns
    /// the result to the caller instead of pushing it (spec §4.3 `pad_pull`
    /// is parameterless, so offset/length tracking lives here).
    fn pull_one(&self) -> PullResult {
        let segment = self.segment();
        let offset = if segment.format == SegmentFormat::Bytes {
            segment.position
        } else {
            -1
        };
        match self.get_range(offset, self.blocksize()) {
            Ok(buffer) => {
                self.shared.segment.lock().advance_position(buffer.len() as i64);
                PullResult::Buffer(buffer)
            }
            Err(FlowReturn::Unexpected) => PullResult::Event(Event::new(EventKind::Eos)),
            Err(e) => PullResult::Error(e),
        }
    }

    /// One push-mode loop iteration (spec §4.6 "Loop step").
    fn loop_step(&self) -> IterateResult {
        if let Some(ev) = self.shared.pending_close_segment.lock().take() {
            self.srcpad().push_event(ev);
        }
        if let Some(ev) = self.shared.pending_start_segment.lock().take() {
            self.srcpad().push_event(ev);
        }

        let segment = self.segment();
        let offset = if segment.format == SegmentFormat::Bytes {
            segment.position
        } else {
            -1
        };

        match self.get_range(offset, self.blocksize()) {
            Ok(buffer) => {
                let size = buffer.len() as i64;
                let ret = self.srcpad().push(buffer);
                if !ret.is_ok() {
                    return self.handle_push_failure(ret);
                }
                self.shared.segment.lock().advance_position(size);
                if self.shared.segment.lock().at_stop() {
                    return self.emit_end_of_stream();
                }
                IterateResult::Running
            }
            Err(FlowReturn::Unexpected) => self.emit_end_of_stream(),
            Err(FlowReturn::WrongState) => IterateResult::Running,
            Err(other) => self.fail(other),
        }
    }

    fn handle_push_failure(&self, ret: FlowReturn) -> IterateResult {
        match ret {
            FlowReturn::NotLinked | FlowReturn::WrongState => IterateResult::Running,
            other => self.fail(other),
        }
    }

    /// UNEXPECTED handling (spec §4.7): a SEGMENT-flagged run posts
    /// segment-done instead of EOS; otherwise EOS fires once.
    fn emit_end_of_stream(&self) -> IterateResult {
        let segment = self.segment();
        if segment.flags.segment {
            self.element().post_message(MessageKind::SegmentDone { position: segment.position });
            return IterateResult::Stopped;
        }
        if !self.shared.last_sent_eos.swap(true, Ordering::SeqCst) {
            self.srcpad().push_event(Event::new(EventKind::Eos));
        }
        IterateResult::Stopped
    }

    fn fail(&self, ret: FlowReturn) -> IterateResult {
        self.element()
            .post_error(ErrorDomain::Stream, "create-failed", format!("get_range failed: {ret:?}"));
        if !self.shared.last_sent_eos.swap(true, Ordering::SeqCst) {
            self.srcpad().push_event(Event::new(EventKind::Eos));
        }
        IterateResult::Error
    }

    fn handle_event(&self, event: Event) -> bool {
        if let EventKind::Seek { .. } = event.kind() {
            return self.perform_seek(&event);
        }
        self.ops().event(self, &event)
    }

    // ---- §4.6 default query ----

    pub fn default_query(&self, query: &mut Query) -> bool {
        let segment = self.segment();
        match query {
            Query::Position { format, result } => {
                if *format == segment.format {
                    *result = Some(segment.position);
                    true
                } else {
                    false
                }
            }
            Query::Duration { format, result } => {
                if *format == segment.format {
                    *result = self.ops().get_size(self);
                    true
                } else {
                    false
                }
            }
            Query::Seeking {
                seekable,
                segment_start,
                segment_end,
                ..
            } => {
                *seekable = self.ops().is_seekable(self);
                *segment_start = segment.start;
                *segment_end = segment.stop;
                true
            }
            Query::Segment { rate, format, start, stop } => {
                *rate = segment.rate;
                *format = segment.format;
                *start = segment.start + segment.time;
                *stop = segment.stop.map(|s| s + segment.time);
                true
            }
            Query::Formats { formats } => {
                *formats = vec![SegmentFormat::Bytes, SegmentFormat::Time];
                true
            }
            Query::Convert {
                src_format,
                src_value,
                dest_format,
                result,
            } => {
                if *src_format == *dest_format {
                    *result = Some(*src_value);
                    true
                } else {
                    false
                }
            }
        }
    }

    // ---- §4.6 perform_seek ----

    pub fn perform_seek(&self, event: &Event) -> bool {
        let EventKind::Seek {
            format,
            flags,
            start_type,
            start,
            ..
        } = event.kind().clone()
        else {
            return false;
        };

        let flushing = flags.contains(SeekFlags::FLUSH);
        let was_running = self.shared.loop_task.lock().is_some();

        if flushing {
            self.srcpad().push_event(Event::new(EventKind::FlushStart));
            self.ops().unlock(self);
        } else if was_running {
            if let Some(task) = self.shared.loop_task.lock().as_ref() {
                task.pause();
            }
        }

        let _stream_guard = self.shared.stream_lock.lock();

        let mut seek_segment = self.segment();
        if let SeekType::Set = start_type {
            seek_segment.start = start;
        }
        seek_segment.format = format;

        let committed = self.ops().do_seek(self, &mut seek_segment);
        let final_segment = if committed { seek_segment } else { self.segment() };

        if flushing {
            self.srcpad().push_event(Event::new(EventKind::FlushStop));
        } else if was_running {
            let (consumed_start, consumed_position) = self.segment().consumed_range();
            *self.shared.pending_close_segment.lock() = Some(Event::new(EventKind::NewSegment {
                update: true,
                rate: final_segment.rate,
                applied_rate: final_segment.applied_rate,
                format: final_segment.format,
                start: consumed_start,
                stop: Some(consumed_position),
                time: final_segment.time,
            }));
        }

        *self.shared.segment.lock() = final_segment.clone();
        *self.shared.pending_start_segment.lock() = Some(Event::new(EventKind::NewSegment {
            update: false,
            rate: final_segment.rate,
            applied_rate: final_segment.applied_rate,
            format: final_segment.format,
            start: final_segment.start,
            stop: final_segment.stop,
            time: final_segment.time,
        }));

        self.shared.discont.store(true, Ordering::SeqCst);
        self.shared.last_sent_eos.store(false, Ordering::SeqCst);
        self.shared.unlock_requested.store(false, Ordering::SeqCst);
        if let Some(task) = self.shared.loop_task.lock().as_ref() {
            task.resume();
        }

        if flushing {
            self.element().notify_flushing_seek_done();
        }

        true
    }

    pub fn unlock(&self) {
        self.shared.unlock_requested.store(true, Ordering::SeqCst);
        if let Some(id) = self.shared.current_wait.lock().take() {
            id.unschedule();
        }
        self.ops().unlock(self);
    }

    pub fn unlock_stop(&self) {
        self.shared.unlock_requested.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64 as AI64;

    struct CountingSrc {
        blocksize: i64,
        emitted: AI64,
    }

    impl BaseSourceOps for CountingSrc {
        fn create(&self, _src: &BaseSource, offset: i64, length: i64) -> GetRangeResult {
            self.emitted.fetch_add(1, Ordering::SeqCst);
            let mut data = vec![0u8; length as usize];
            data[0] = (offset % 256) as u8;
            let mut buf = Buffer::from_vec(data);
            buf.set_offsets(Some(offset as u64), Some((offset + length) as u64));
            Ok(buf)
        }

        fn is_seekable(&self, _src: &BaseSource) -> bool {
            true
        }

        fn get_size(&self, _src: &BaseSource) -> Option<i64> {
            Some(48)
        }
    }

    fn new_counting(name: &str, blocksize: i64) -> BaseSource {
        let src = BaseSource::new(
            name,
            Arc::new(CountingSrc {
                blocksize,
                emitted: AI64::new(0),
            }),
        );
        src.set_blocksize(blocksize);
        src.set_num_buffers(Some(3));
        src
    }

    #[test]
    fn get_range_produces_expected_number_of_buffers_then_eos() {
        let src = new_counting("fakesrc", 16);
        for expected_offset in [0i64, 16, 32] {
            let buf = src.get_range(expected_offset, 16).expect("buffer");
            assert_eq!(buf.len(), 16);
        }
        assert!(matches!(src.get_range(48, 16), Err(FlowReturn::Unexpected)));
    }

    #[test]
    fn clip_length_truncates_final_buffer_at_size() {
        let src = BaseSource::new(
            "bytesrc",
            Arc::new(CountingSrc {
                blocksize: 30,
                emitted: AI64::new(0),
            }),
        );
        src.set_num_buffers(None);
        let buf = src.get_range(80, 30).expect("buffer");
        assert_eq!(buf.len(), 20); // clipped to size=48
    }

    #[test]
    fn perform_seek_resets_segment_to_requested_byte() {
        let src = BaseSource::new(
            "seekable",
            Arc::new(CountingSrc {
                blocksize: 30,
                emitted: AI64::new(0),
            }),
        );
        src.set_segment_format(SegmentFormat::Bytes);
        let ev = Event::new(EventKind::Seek {
            rate: 1.0,
            format: SegmentFormat::Bytes,
            flags: SeekFlags::FLUSH,
            start_type: SeekType::Set,
            start: 50,
            stop_type: SeekType::None,
            stop: 0,
        });
        assert!(src.perform_seek(&ev));
        assert_eq!(src.segment().position, 50);
        assert_eq!(src.segment().time, 50);
    }

    #[test]
    fn live_source_blocks_until_running() {
        let src = BaseSource::new(
            "live",
            Arc::new(CountingSrc {
                blocksize: 16,
                emitted: AI64::new(0),
            }),
        );
        src.set_live(true);
        src.set_num_buffers(None);
        let handle = {
            let s = src.clone();
            std::thread::spawn(move || s.get_range(0, 16))
        };
        std::thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        *src.shared.live.running.lock() = true;
        src.shared.live.cond.notify_all();
        let result = handle.join().unwrap();
        assert!(result.is_ok());
    }
}
