//! End-to-end scenarios exercising a `FakeSrc`/`FileByteSrc`/`LiveSrc`
//! pushed into a `FakeSink` through a real `Pipeline` (spec §8 scenarios
//! 1-3; the caps-negotiation and bin-rollback scenarios are covered as
//! unit tests in `corestream`'s own `caps`/`bin` modules, and the
//! two-scheduler bridge scenario lives in `corestream`'s `tests/`).

use corestream::element::State;
use corestream::pad::Pad;
use corestream::Pipeline;
use std::time::Duration;
use testsrc::fake_sink::FakeSink;
use testsrc::fake_src::{FakeSrc, FillPattern};
use testsrc::file_byte_src::FileByteSrc;
use testsrc::live_src::LiveSrc;

fn link_and_add(pipeline: &Pipeline, src_element: corestream::Element, sink: &FakeSink) {
    let srcpad = src_element.get_pad("src").unwrap();
    Pad::link(&srcpad, sink.sinkpad(), None).unwrap();
    pipeline.add(src_element).unwrap();
    pipeline.add(sink.element().clone()).unwrap();
}

#[test]
fn fake_source_emits_three_buffers_then_eos() {
    let pipeline = Pipeline::new("p1");
    let sink = FakeSink::new("sink");
    let src = FakeSrc::element("src", FillPattern::Counter, None);
    src.set_num_buffers(Some(3));
    src.set_blocksize(16);
    link_and_add(&pipeline, src.element().clone(), &sink);

    pipeline.set_state(State::Playing).unwrap();
    assert!(pipeline.wait_for_eos(Duration::from_secs(2)));
    pipeline.set_state(State::Null).unwrap();

    assert_eq!(sink.buffers_received(), 3);
    assert_eq!(sink.bytes_received(), 48);
}

#[test]
fn live_source_no_prerolls_then_streams_once_playing() {
    let pipeline = Pipeline::new("p2");
    let sink = FakeSink::new("sink");
    let src = LiveSrc::element("src", Duration::from_millis(5), 8);
    link_and_add(&pipeline, src.element().clone(), &sink);

    let ret = pipeline.set_state(State::Paused).unwrap();
    assert_eq!(ret, corestream::element::StateChangeReturn::NoPreroll);
    assert_eq!(sink.buffers_received(), 0);

    pipeline.set_state(State::Playing).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(sink.buffers_received() > 0);

    pipeline.set_state(State::Null).unwrap();
}

#[test]
fn byte_source_flushing_seek_resumes_from_requested_offset() {
    let data: Vec<u8> = (0..64u32).map(|i| i as u8).collect();
    let src = FileByteSrc::element("src", data);
    src.set_blocksize(16);
    src.set_num_buffers(None);

    let first = src.get_range(0, 16).unwrap();
    assert_eq!(first.data()[0], 0);

    let seek = corestream::event::Event::new(corestream::event::EventKind::Seek {
        rate: 1.0,
        format: corestream::segment::SegmentFormat::Bytes,
        flags: corestream::event::SeekFlags::FLUSH,
        start_type: corestream::event::SeekType::Set,
        start: 50,
        stop_type: corestream::event::SeekType::None,
        stop: 0,
    });
    assert!(src.perform_seek(&seek));
    assert_eq!(src.segment().position, 50);

    let after_seek = src.get_range(50, 14).unwrap();
    assert_eq!(after_seek.data()[0], 50);
    assert_eq!(after_seek.len(), 14);
}

/// Drives a flushing mid-stream seek through a real `Pipeline`/`FakeSink`
/// (rather than calling `perform_seek` on a bare `BaseSource`) and checks
/// that FLUSH_START, FLUSH_STOP and NEW_SEGMENT actually arrive at the
/// downstream sink, in that order (spec §8 scenario 3, spec.md:224's
/// delivery-order requirement).
#[test]
fn byte_source_flushing_seek_delivers_flush_and_segment_events_in_order() {
    let pipeline = Pipeline::new("p3");
    let sink = FakeSink::new("sink");
    let data: Vec<u8> = (0..64u32).map(|i| i as u8).collect();
    let src = FileByteSrc::element("src", data);
    src.set_blocksize(8);
    src.set_num_buffers(None);
    link_and_add(&pipeline, src.element().clone(), &sink);

    pipeline.set_state(State::Playing).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while sink.buffers_received() == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(sink.buffers_received() > 0, "pipeline should have pushed at least one buffer");

    use corestream::event::{SeekFlags, SeekType};
    use corestream::segment::SegmentFormat;
    assert!(src.element().seek(1.0, SegmentFormat::Bytes, SeekFlags::FLUSH, SeekType::Set, 50, SeekType::None, 0));

    assert!(pipeline.wait_for_eos(Duration::from_secs(2)));
    pipeline.set_state(State::Null).unwrap();

    let log = sink.event_log();
    let flush_start = log.iter().position(|e| *e == "flush-start").expect("flush-start delivered");
    let flush_stop = log.iter().position(|e| *e == "flush-stop").expect("flush-stop delivered");
    let new_segment = log.iter().position(|e| *e == "new-segment").expect("new-segment delivered");
    assert!(flush_start < flush_stop, "flush-start must precede flush-stop: {log:?}");
    assert!(flush_stop < new_segment, "flush-stop must precede new-segment: {log:?}");
}
