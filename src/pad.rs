//! A directional endpoint on an element (spec §3/§4.2/§4.3 Pad).
//!
//! Per spec §9's re-architecture guidance, a pad is an arena-style node
//! keyed by a stable [`PadId`]; the peer reference is non-owning (a
//! `Weak` pointer) so a dropped peer simply reads back as unlinked rather
//! than as a dangling pointer.

use crate::buffer::Buffer;
use crate::caps::Caps;
use crate::element::Element;
use crate::event::{Event, EventKind};
use crate::query::Query;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_PAD_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PadId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadDirection {
    Source,
    Sink,
}

impl PadDirection {
    pub fn opposite(self) -> PadDirection {
        match self {
            PadDirection::Source => PadDirection::Sink,
            PadDirection::Sink => PadDirection::Source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadMode {
    Inactive,
    Push,
    Pull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Always,
    Sometimes,
    Request,
}

/// A pattern used to instantiate pads (spec §3 PadTemplate). ALWAYS
/// templates forbid a "%d"/"%s" placeholder.
#[derive(Debug, Clone)]
pub struct PadTemplate {
    pub name_template: String,
    pub direction: PadDirection,
    pub presence: Presence,
    pub caps: Caps,
}

impl PadTemplate {
    pub fn new(
        name_template: impl Into<String>,
        direction: PadDirection,
        presence: Presence,
        caps: Caps,
    ) -> Result<Self, String> {
        let name_template = name_template.into();
        let placeholders = name_template.matches("%d").count() + name_template.matches("%s").count();
        if placeholders > 1 {
            return Err(format!(
                "pad template {name_template:?} has more than one placeholder"
            ));
        }
        if presence == Presence::Always && placeholders != 0 {
            return Err(format!("ALWAYS template {name_template:?} may not contain a placeholder"));
        }
        Ok(Self {
            name_template,
            direction,
            presence,
            caps,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowReturn {
    Ok,
    NotLinked,
    WrongState,
    Unexpected,
    Error,
    NotNegotiated,
}

impl FlowReturn {
    pub fn is_ok(self) -> bool {
        matches!(self, FlowReturn::Ok)
    }
}

/// Outcome of a pull (`pad_pull`): either a buffer, a forwarded event, or
/// a flow error (spec §4.3 / §9 "interaction between pull and events").
#[derive(Debug, Clone)]
pub enum PullResult {
    Buffer(Buffer),
    Event(Event),
    Error(FlowReturn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCapsReturn {
    Refused,
    Delayed,
    Ok,
    Done,
}

pub type ChainFn = Arc<dyn Fn(&Pad, Buffer) -> FlowReturn + Send + Sync>;
pub type GetFn = Arc<dyn Fn(&Pad) -> PullResult + Send + Sync>;
pub type EventFn = Arc<dyn Fn(&Pad, Event) -> bool + Send + Sync>;
pub type QueryFn = Arc<dyn Fn(&Pad, &mut Query) -> bool + Send + Sync>;
pub type LinkNotifyFn = Arc<dyn Fn(&Pad, &Caps, bool) -> SetCapsReturn + Send + Sync>;
pub type GetCapsFn = Arc<dyn Fn(&Pad) -> Caps + Send + Sync>;
/// Called whenever a probe wants a chance to veto a buffer before it is
/// handed to the peer's chain function (spec §4.3 push-mode dispatch).
pub type ProbeFn = Arc<dyn Fn(&Pad, &Buffer) -> bool + Send + Sync>;

#[derive(Default)]
pub struct PadFunctions {
    pub chain: Option<ChainFn>,
    pub get: Option<GetFn>,
    pub event: Option<EventFn>,
    pub query: Option<QueryFn>,
    pub link_notify: Option<LinkNotifyFn>,
    pub getcaps: Option<GetCapsFn>,
}

struct PadShared {
    id: PadId,
    name: String,
    direction: PadDirection,
    template: Option<PadTemplate>,
    element: Mutex<Option<Weak<crate::element::ElementShared>>>,
    peer: Mutex<Option<Weak<PadShared>>>,
    mode: Mutex<PadMode>,
    caps: RwLock<Option<Caps>>,
    filter_caps: Mutex<Option<Caps>>,
    functions: RwLock<PadFunctions>,
    probes: Mutex<Vec<ProbeFn>>,
    flushing: std::sync::atomic::AtomicBool,
}

/// A pad handle. Cloning shares the same underlying node (the clone and
/// the original are the same pad, identified by [`PadId`]).
#[derive(Clone)]
pub struct Pad {
    inner: Arc<PadShared>,
}

impl std::fmt::Debug for Pad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pad")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("direction", &self.inner.direction)
            .finish()
    }
}

impl PartialEq for Pad {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}
impl Eq for Pad {}

impl Pad {
    pub fn new(name: impl Into<String>, direction: PadDirection) -> Self {
        Self {
            inner: Arc::new(PadShared {
                id: PadId(NEXT_PAD_ID.fetch_add(1, Ordering::Relaxed)),
                name: name.into(),
                direction,
                template: None,
                element: Mutex::new(None),
                peer: Mutex::new(None),
                mode: Mutex::new(PadMode::Inactive),
                caps: RwLock::new(None),
                filter_caps: Mutex::new(None),
                functions: RwLock::new(PadFunctions::default()),
                probes: Mutex::new(Vec::new()),
                flushing: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    pub fn from_template(name: impl Into<String>, template: PadTemplate) -> Self {
        Self {
            inner: Arc::new(PadShared {
                id: PadId(NEXT_PAD_ID.fetch_add(1, Ordering::Relaxed)),
                name: name.into(),
                direction: template.direction,
                template: Some(template),
                element: Mutex::new(None),
                peer: Mutex::new(None),
                mode: Mutex::new(PadMode::Inactive),
                caps: RwLock::new(None),
                filter_caps: Mutex::new(None),
                functions: RwLock::new(PadFunctions::default()),
                probes: Mutex::new(Vec::new()),
                flushing: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> PadId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn direction(&self) -> PadDirection {
        self.inner.direction
    }

    pub fn template(&self) -> Option<&PadTemplate> {
        self.inner.template.as_ref()
    }

    pub fn mode(&self) -> PadMode {
        *self.inner.mode.lock()
    }

    pub fn set_mode(&self, mode: PadMode) {
        *self.inner.mode.lock() = mode;
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.mode(), PadMode::Inactive)
    }

    pub fn set_active(&self, active: bool, mode: PadMode) {
        if active {
            self.set_mode(mode);
        } else {
            self.set_mode(PadMode::Inactive);
        }
    }

    pub fn set_element(&self, element: &Element) {
        *self.inner.element.lock() = Some(Arc::downgrade(&element.shared));
    }

    pub fn element(&self) -> Option<Element> {
        self.inner
            .element
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|shared| Element { shared })
    }

    pub fn peer(&self) -> Option<Pad> {
        self.inner
            .peer
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Pad { inner })
    }

    pub fn is_linked(&self) -> bool {
        self.peer().is_some()
    }

    pub fn caps(&self) -> Option<Caps> {
        self.inner.caps.read().clone()
    }

    fn set_caps_internal(&self, caps: Option<Caps>) {
        *self.inner.caps.write() = caps;
    }

    pub fn filter_caps(&self) -> Option<Caps> {
        self.inner.filter_caps.lock().clone()
    }

    pub fn set_functions(&self, functions: PadFunctions) {
        *self.inner.functions.write() = functions;
    }

    pub fn add_probe(&self, probe: ProbeFn) {
        self.inner.probes.lock().push(probe);
    }

    pub fn set_flushing(&self, flushing: bool) {
        self.inner.flushing.store(flushing, Ordering::SeqCst);
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.load(Ordering::SeqCst)
    }

    /// Default `getcaps`: the pad's negotiated caps if any, else the
    /// template caps, else `Caps::Any`.
    pub fn query_caps(&self) -> Caps {
        if let Some(f) = self.inner.functions.read().getcaps.clone() {
            return f(self);
        }
        if let Some(caps) = self.caps() {
            return caps;
        }
        self.inner
            .template
            .as_ref()
            .map(|t| t.caps.clone())
            .unwrap_or(Caps::Any)
    }

    // ---- §4.2 linking & negotiation ----

    /// `can_link(src, sink)` (spec §4.2): both unlinked, opposite
    /// directions, parents exist, schedulers compatible.
    pub fn can_link(src: &Pad, sink: &Pad) -> Result<(), String> {
        if src.direction() != PadDirection::Source || sink.direction() != PadDirection::Sink {
            return Err("directions must be opposite (src -> sink)".into());
        }
        if src.is_linked() || sink.is_linked() {
            return Err("one of the pads is already linked".into());
        }
        let src_elem = src.element().ok_or("src pad has no parent element")?;
        let sink_elem = sink.element().ok_or("sink pad has no parent element")?;
        schedulers_compatible(&src_elem, &sink_elem)?;
        Ok(())
    }

    /// `link(src, sink, filter?)` (spec §4.2), three-phased.
    pub fn link(src: &Pad, sink: &Pad, filter: Option<&Caps>) -> Result<SetCapsReturn, String> {
        Pad::can_link(src, sink)?;

        // Phase 1: record peers symmetrically.
        *src.inner.peer.lock() = Some(Arc::downgrade(&sink.inner));
        *sink.inner.peer.lock() = Some(Arc::downgrade(&src.inner));

        // Phase 2: compute allowed caps.
        let allowed = src.query_caps().intersect(&sink.query_caps());
        let filtered = match filter {
            Some(f) => allowed.intersect(f),
            None => allowed,
        };
        if filtered.is_empty() {
            // Undo step 1.
            *src.inner.peer.lock() = None;
            *sink.inner.peer.lock() = None;
            return Err("NEGOTIATION: empty caps intersection".into());
        }

        // Phase 3: perform_negotiate.
        let result = perform_negotiate(src, sink, &filtered, filter);

        if let (Some(src_elem), Some(sink_elem)) = (src.element(), sink.element()) {
            if let (Some(src_sched), Some(sink_sched)) = (src_elem.scheduler(), sink_elem.scheduler()) {
                if Arc::ptr_eq(&src_sched, &sink_sched) {
                    src_sched.notify_pad_linked(src, sink);
                }
            }
        }

        Ok(result)
    }

    /// `unlink` (spec §4.2): clears peers on both sides, drops the shared
    /// filter, notifies the scheduler.
    pub fn unlink(src: &Pad, sink: &Pad) {
        *src.inner.peer.lock() = None;
        *sink.inner.peer.lock() = None;
        *src.inner.filter_caps.lock() = None;
        *sink.inner.filter_caps.lock() = None;
        src.set_caps_internal(None);
        sink.set_caps_internal(None);

        if let (Some(src_elem), Some(sink_elem)) = (src.element(), sink.element()) {
            if let (Some(src_sched), Some(sink_sched)) = (src_elem.scheduler(), sink_elem.scheduler()) {
                if Arc::ptr_eq(&src_sched, &sink_sched) {
                    src_sched.notify_pad_unlinked(src, sink);
                }
            }
        }
    }

    /// `try_set_caps` (spec §4.2).
    pub fn try_set_caps(&self, caps: &Caps) -> SetCapsReturn {
        self.try_set_caps_inner(caps, true)
    }

    fn try_set_caps_inner(&self, caps: &Caps, notify_peer: bool) -> SetCapsReturn {
        if !caps.is_fixed() {
            return SetCapsReturn::Delayed;
        }
        if notify_peer {
            if let Some(peer) = self.peer() {
                let peer_fn = peer.inner.functions.read().link_notify.clone();
                if let Some(f) = peer_fn {
                    match f(&peer, caps, false) {
                        SetCapsReturn::Refused => return SetCapsReturn::Refused,
                        SetCapsReturn::Done => {
                            self.set_caps_internal(Some(caps.clone()));
                            return SetCapsReturn::Done;
                        }
                        _ => {}
                    }
                }
            }
        }
        let own_fn = self.inner.functions.read().link_notify.clone();
        if let Some(f) = own_fn {
            if let SetCapsReturn::Refused = f(self, caps, true) {
                return SetCapsReturn::Refused;
            }
        }
        self.set_caps_internal(Some(caps.clone()));
        SetCapsReturn::Ok
    }

    // ---- §4.3 data transport ----

    /// `push(src_pad, buffer)` (spec §4.3): runs probes, then the peer's
    /// chain function. Refused if the peer isn't active.
    pub fn push(&self, buffer: Buffer) -> FlowReturn {
        debug_assert_eq!(self.direction(), PadDirection::Source);
        for probe in self.inner.probes.lock().iter() {
            if !probe(self, &buffer) {
                return FlowReturn::Ok; // vetoed: buffer silently dropped
            }
        }
        let Some(peer) = self.peer() else {
            return FlowReturn::NotLinked;
        };
        if !peer.is_active() {
            return FlowReturn::WrongState;
        }
        let chain = peer.inner.functions.read().chain.clone();
        match chain {
            Some(f) => f(&peer, buffer),
            None => FlowReturn::Error,
        }
    }

    /// `pull(sink_pad) -> buffer` (spec §4.3).
    pub fn pull(&self) -> PullResult {
        debug_assert_eq!(self.direction(), PadDirection::Sink);
        let Some(peer) = self.peer() else {
            return PullResult::Error(FlowReturn::NotLinked);
        };
        if !peer.is_active() {
            return PullResult::Error(FlowReturn::WrongState);
        }
        let get = peer.inner.functions.read().get.clone();
        match get {
            Some(f) => f(&peer),
            None => PullResult::Error(FlowReturn::Error),
        }
    }

    /// Pushes an event to this source pad's peer, the event-stream
    /// counterpart of [`Pad::push`]. Unlike [`Pad::send_event`], this does
    /// not run this pad's own event function first — it's for an element
    /// emitting an event on its own src pad, not for delivering one that
    /// arrived at this pad.
    pub fn push_event(&self, event: Event) -> bool {
        debug_assert_eq!(self.direction(), PadDirection::Source);
        if matches!(event.kind(), EventKind::FlushStart) {
            self.set_flushing(true);
        }
        if matches!(event.kind(), EventKind::FlushStop) {
            self.set_flushing(false);
        }
        let Some(peer) = self.peer() else {
            return false;
        };
        let delivered = peer.send_event(event.clone());
        if matches!(event.kind(), EventKind::Eos) {
            if let Some(element) = self.element() {
                element.set_eos(true);
            }
        }
        delivered
    }

    /// `send_event` (spec §4.3): deliver `event` as though it arrived at
    /// this pad. Runs this pad's own event function if set; otherwise
    /// forwards downstream to all opposite-direction linked pads on a
    /// source pad, or upstream via the peer on a sink pad.
    pub fn send_event(&self, event: Event) -> bool {
        if matches!(event.kind(), EventKind::FlushStart) {
            self.set_flushing(true);
        }
        if matches!(event.kind(), EventKind::FlushStop) {
            self.set_flushing(false);
        }

        let custom = self.inner.functions.read().event.clone();
        if let Some(f) = custom {
            return f(self, event);
        }

        match self.direction() {
            PadDirection::Sink => {
                if let Some(peer) = self.peer() {
                    peer.send_event(event)
                } else {
                    false
                }
            }
            PadDirection::Source => {
                let Some(element) = self.element() else {
                    return false;
                };
                let mut any = false;
                for p in element.pads_with_direction(self.direction().opposite()) {
                    any |= p.send_event(event.clone());
                }
                if matches!(event.kind(), EventKind::Eos) {
                    element.set_eos(true);
                }
                any
            }
        }
    }

    pub fn query(&self, query: &mut Query) -> bool {
        let custom = self.inner.functions.read().query.clone();
        if let Some(f) = custom {
            return f(self, query);
        }
        false
    }
}

/// Two elements' schedulers must be equal, or exactly one side must be
/// decoupled (spec §4.2/§4.5).
fn schedulers_compatible(a: &Element, b: &Element) -> Result<(), String> {
    if a.is_decoupled() || b.is_decoupled() {
        return Ok(());
    }
    match (a.scheduler(), b.scheduler()) {
        (Some(sa), Some(sb)) if Arc::ptr_eq(&sa, &sb) => Ok(()),
        (None, _) | (_, None) => Ok(()),
        _ => Err("link requires a decoupled element to bridge different scheduler groups".into()),
    }
}

fn perform_negotiate(src: &Pad, sink: &Pad, filtered: &Caps, filter: Option<&Caps>) -> SetCapsReturn {
    if filtered.is_fixed() {
        let src_result = src.try_set_caps_inner(filtered, false);
        let sink_result = sink.try_set_caps_inner(filtered, false);
        if matches!(src_result, SetCapsReturn::Refused) || matches!(sink_result, SetCapsReturn::Refused) {
            return SetCapsReturn::Refused;
        }
        SetCapsReturn::Ok
    } else {
        *src.inner.filter_caps.lock() = filter.cloned();
        *sink.inner.filter_caps.lock() = filter.cloned();
        SetCapsReturn::Delayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::Structure;
    use crate::element::Element;

    fn raw_caps() -> Caps {
        Caps::single(Structure::new("audio/x-raw-int"))
    }

    #[test]
    fn link_sets_symmetric_peers() {
        let src_elem = Element::new("src-elem");
        let sink_elem = Element::new("sink-elem");
        let src = Pad::new("src", PadDirection::Source);
        let sink = Pad::new("sink", PadDirection::Sink);
        src.set_element(&src_elem);
        sink.set_element(&sink_elem);
        src.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| raw_caps())),
            ..Default::default()
        });
        sink.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| raw_caps())),
            ..Default::default()
        });

        let result = Pad::link(&src, &sink, None).unwrap();
        assert_eq!(result, SetCapsReturn::Ok);
        assert_eq!(src.peer().unwrap().id(), sink.id());
        assert_eq!(sink.peer().unwrap().id(), src.id());
        assert_ne!(src.direction(), sink.direction());
    }

    #[test]
    fn unlink_restores_empty_state() {
        let src_elem = Element::new("src-elem");
        let sink_elem = Element::new("sink-elem");
        let src = Pad::new("src", PadDirection::Source);
        let sink = Pad::new("sink", PadDirection::Sink);
        src.set_element(&src_elem);
        sink.set_element(&sink_elem);
        src.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| raw_caps())),
            ..Default::default()
        });
        sink.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| raw_caps())),
            ..Default::default()
        });
        Pad::link(&src, &sink, None).unwrap();
        Pad::unlink(&src, &sink);
        assert!(src.peer().is_none());
        assert!(sink.peer().is_none());
        assert!(src.caps().is_none());
        assert!(sink.caps().is_none());
    }

    #[test]
    fn link_fails_on_empty_intersection() {
        let src_elem = Element::new("src-elem");
        let sink_elem = Element::new("sink-elem");
        let src = Pad::new("src", PadDirection::Source);
        let sink = Pad::new("sink", PadDirection::Sink);
        src.set_element(&src_elem);
        sink.set_element(&sink_elem);
        src.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| Caps::single(Structure::new("audio/x-raw-int")))),
            ..Default::default()
        });
        sink.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| Caps::single(Structure::new("video/x-raw")))),
            ..Default::default()
        });
        assert!(Pad::link(&src, &sink, None).is_err());
    }

    #[test]
    fn push_to_inactive_peer_is_refused() {
        let src_elem = Element::new("src-elem");
        let sink_elem = Element::new("sink-elem");
        let src = Pad::new("src", PadDirection::Source);
        let sink = Pad::new("sink", PadDirection::Sink);
        src.set_element(&src_elem);
        sink.set_element(&sink_elem);
        src.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| raw_caps())),
            ..Default::default()
        });
        sink.set_functions(PadFunctions {
            getcaps: Some(Arc::new(|_| raw_caps())),
            chain: Some(Arc::new(|_, _| FlowReturn::Ok)),
            ..Default::default()
        });
        Pad::link(&src, &sink, None).unwrap();
        // sink pad left Inactive on purpose.
        let ret = src.push(Buffer::from_vec(vec![0; 4]));
        assert_eq!(ret, FlowReturn::WrongState);
    }
}
