//! Linking across two scheduler groups is only allowed through a
//! decoupled element (spec §4.2/§4.5 "a decoupled element bridges
//! scheduling groups").

use corestream::element::Element;
use corestream::pad::{Pad, PadDirection};
use corestream::scheduler::Scheduler;

fn linked_pads(dir_a: PadDirection) -> (Element, Pad) {
    let element = Element::new(format!("e-{:?}", dir_a));
    let pad = Pad::new("p", dir_a);
    pad.set_element(&element);
    element.add_pad(pad.clone()).unwrap();
    (element, pad)
}

#[test]
fn direct_link_across_scheduler_groups_is_refused() {
    let group_a = Scheduler::new("a");
    let group_b = Scheduler::new("b");

    let (upstream, srcpad) = linked_pads(PadDirection::Source);
    upstream.set_scheduler(Some(group_a.clone()));

    let (downstream, sinkpad) = linked_pads(PadDirection::Sink);
    downstream.set_scheduler(Some(group_b.clone()));

    assert!(Pad::can_link(&srcpad, &sinkpad).is_err());
}

#[test]
fn decoupled_bridge_links_across_scheduler_groups() {
    let group_a = Scheduler::new("a");
    let group_b = Scheduler::new("b");

    let (upstream, up_srcpad) = linked_pads(PadDirection::Source);
    upstream.set_scheduler(Some(group_a.clone()));

    let bridge = Element::new("bridge");
    bridge.set_decoupled(true);
    let bridge_sink = Pad::new("sink", PadDirection::Sink);
    bridge_sink.set_element(&bridge);
    bridge.add_pad(bridge_sink.clone()).unwrap();
    let bridge_src = Pad::new("src", PadDirection::Source);
    bridge_src.set_element(&bridge);
    bridge.add_pad(bridge_src.clone()).unwrap();

    let (downstream, down_sinkpad) = linked_pads(PadDirection::Sink);
    downstream.set_scheduler(Some(group_b.clone()));

    assert!(Pad::can_link(&up_srcpad, &bridge_sink).is_ok());
    assert!(Pad::can_link(&bridge_src, &down_sinkpad).is_ok());

    Pad::link(&up_srcpad, &bridge_sink, None).unwrap();
    Pad::link(&bridge_src, &down_sinkpad, None).unwrap();

    assert!(up_srcpad.is_linked());
    assert!(down_sinkpad.is_linked());
}
