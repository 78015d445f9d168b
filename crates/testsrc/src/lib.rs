//! Synthetic source/sink elements and a small assembling CLI, the
//! `testsrc` analogue of the teacher's `source-videos` crate: no real
//! codec or demuxer, just enough dataflow to exercise `corestream`
//! end to end.

pub mod fake_sink;
pub mod fake_src;
pub mod file_byte_src;
pub mod live_src;

use corestream::pad::PadTemplate;
use corestream::registry::{ElementFactory, Registry};
use corestream::{Caps, Element};
use fake_src::FillPattern;
use std::sync::Arc;

/// Register the elements this crate provides with the process-wide
/// registry, mirroring `element_register` calls a real plugin's
/// `plugin_init` would make (spec §6).
pub fn register_all() {
    let registry = Registry::global();
    registry.register(ElementFactory::new(
        "fakesrc",
        0,
        vec![PadTemplate::new("src", corestream::PadDirection::Source, corestream::pad::Presence::Always, Caps::new_any())
            .expect("static template is well-formed")],
        Arc::new(|name: &str| fake_src::FakeSrc::element(name, FillPattern::Zero, None).element().clone()),
    ));
    registry.register(ElementFactory::new(
        "fakesink",
        0,
        vec![PadTemplate::new("sink", corestream::PadDirection::Sink, corestream::pad::Presence::Always, Caps::new_any())
            .expect("static template is well-formed")],
        Arc::new(|name: &str| -> Element { fake_sink::FakeSink::new(name).element().clone() }),
    ));
}
