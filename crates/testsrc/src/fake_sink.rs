//! Minimal consumer: counts and discards buffers, and turns an
//! end-of-stream event into an EOS message on the pipeline bus (the
//! counterpart the `FakeSrc`/`FileByteSrc`/`LiveSrc` family pushes into
//! for the end-to-end scenarios in SPEC_FULL.md §8).

use corestream::element::{Element, ElementImpl, StateChange, StateChangeReturn};
use corestream::error::Result;
use corestream::event::EventKind;
use corestream::message::MessageKind;
use corestream::pad::{FlowReturn, Pad, PadDirection, PadFunctions, PadMode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

struct FakeSinkShared {
    element: Element,
    sinkpad: Pad,
    buffers_received: AtomicU64,
    bytes_received: AtomicU64,
    last_buffer: Mutex<Option<Vec<u8>>>,
    event_log: Mutex<Vec<&'static str>>,
}

/// Short, stable label for an event kind, so tests can assert on the
/// order events are delivered in without matching full event payloads.
fn event_tag(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Seek { .. } => "seek",
        EventKind::FlushStart => "flush-start",
        EventKind::FlushStop => "flush-stop",
        EventKind::NewSegment { .. } => "new-segment",
        EventKind::Eos => "eos",
        EventKind::Discont { .. } => "discont",
        EventKind::Tag(_) => "tag",
        EventKind::Qos => "qos",
        EventKind::Navigation => "navigation",
        EventKind::BufferSize { .. } => "buffer-size",
    }
}

struct FakeSinkImpl {
    shared: Weak<FakeSinkShared>,
}

impl ElementImpl for FakeSinkImpl {
    fn change_state(&self, _element: &Element, transition: StateChange) -> Result<StateChangeReturn> {
        let Some(shared) = self.shared.upgrade() else {
            return Ok(StateChangeReturn::Success);
        };
        match transition {
            StateChange::ReadyToPaused => shared.sinkpad.set_active(true, PadMode::Push),
            StateChange::PausedToReady => shared.sinkpad.set_active(false, PadMode::Inactive),
            _ => {}
        }
        Ok(StateChangeReturn::Success)
    }
}

/// A sink [`Element`] plus one sink pad, analogous to [`corestream::base_src::BaseSource`]
/// but without a reusable template of its own — the core only specifies
/// a base class for sources (SPEC_FULL.md §1), so the sink side is a
/// plain `Element` wired up by hand, as the teacher's own `fakesink`-style
/// elements do for anything the base classes don't cover.
#[derive(Clone)]
pub struct FakeSink {
    shared: Arc<FakeSinkShared>,
}

impl FakeSink {
    pub fn new(name: impl Into<String>) -> Self {
        let element = Element::new(name);
        let sinkpad = Pad::new("sink", PadDirection::Sink);
        let shared = Arc::new(FakeSinkShared {
            element: element.clone(),
            sinkpad: sinkpad.clone(),
            buffers_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            last_buffer: Mutex::new(None),
            event_log: Mutex::new(Vec::new()),
        });
        let weak = Arc::downgrade(&shared);
        element.set_impl(Arc::new(FakeSinkImpl { shared: weak.clone() }));
        element.add_pad(sinkpad).expect("fresh element has no pad named \"sink\" yet");
        Self::wire_pad(&shared, &weak);
        Self { shared }
    }

    fn wire_pad(shared: &Arc<FakeSinkShared>, weak: &Weak<FakeSinkShared>) {
        let w1 = weak.clone();
        let w2 = weak.clone();
        shared.sinkpad.set_functions(PadFunctions {
            chain: Some(Arc::new(move |_pad, buffer| match w1.upgrade() {
                Some(s) => {
                    s.buffers_received.fetch_add(1, Ordering::SeqCst);
                    s.bytes_received.fetch_add(buffer.len() as u64, Ordering::SeqCst);
                    *s.last_buffer.lock() = Some(buffer.data().to_vec());
                    FlowReturn::Ok
                }
                None => FlowReturn::Error,
            })),
            event: Some(Arc::new(move |_pad, event| match w2.upgrade() {
                Some(s) => {
                    s.event_log.lock().push(event_tag(event.kind()));
                    if matches!(event.kind(), EventKind::Eos) {
                        s.element.post_message(MessageKind::Eos);
                    }
                    true
                }
                None => false,
            })),
            get: None,
            query: None,
            link_notify: None,
            getcaps: None,
        });
    }

    pub fn element(&self) -> &Element {
        &self.shared.element
    }

    pub fn sinkpad(&self) -> &Pad {
        &self.shared.sinkpad
    }

    pub fn buffers_received(&self) -> u64 {
        self.shared.buffers_received.load(Ordering::SeqCst)
    }

    pub fn bytes_received(&self) -> u64 {
        self.shared.bytes_received.load(Ordering::SeqCst)
    }

    pub fn last_buffer(&self) -> Option<Vec<u8>> {
        self.shared.last_buffer.lock().clone()
    }

    /// Event kinds delivered to this sink's pad, in arrival order.
    pub fn event_log(&self) -> Vec<&'static str> {
        self.shared.event_log.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corestream::element::State;
    use corestream::Buffer;

    #[test]
    fn counts_pushed_buffers_and_latches_eos() {
        let upstream = Element::new("upstream");
        let srcpad = Pad::new("src", PadDirection::Source);
        srcpad.set_element(&upstream);
        upstream.add_pad(srcpad.clone()).unwrap();

        let sink = FakeSink::new("fakesink0");
        Pad::link(&srcpad, sink.sinkpad(), None).unwrap();
        sink.element().set_state(State::Playing).unwrap();

        assert_eq!(srcpad.push(Buffer::from_vec(vec![1, 2, 3])), FlowReturn::Ok);
        assert_eq!(sink.buffers_received(), 1);
        assert_eq!(sink.bytes_received(), 3);
        assert_eq!(sink.last_buffer(), Some(vec![1, 2, 3]));
    }
}
