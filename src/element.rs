//! A named node holding pads, a state, and an owning scheduler reference
//! (spec §3/§4.4 Element).

use crate::clock::{Clock, ClockTime};
use crate::error::{CoreError, ErrorDomain, ErrorMessage, Result};
use crate::event::{Event, EventKind, SeekFlags, SeekType};
use crate::message::{Message, MessageKind};
use crate::pad::{Pad, PadDirection};
use crate::pipeline::bus::Bus;
use crate::query::Query;
use crate::scheduler::Scheduler;
use crate::segment::SegmentFormat;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// States ordered `Null < Ready < Paused < Playing` (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Null,
    Ready,
    Paused,
    Playing,
}

impl State {
    pub fn step_towards(self, target: State) -> Option<(State, State)> {
        if self == target {
            return None;
        }
        let next = if target > self {
            match self {
                State::Null => State::Ready,
                State::Ready => State::Paused,
                State::Paused => State::Playing,
                State::Playing => unreachable!(),
            }
        } else {
            match self {
                State::Playing => State::Paused,
                State::Paused => State::Ready,
                State::Ready => State::Null,
                State::Null => unreachable!(),
            }
        };
        Some((self, next))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    NullToReady,
    ReadyToPaused,
    PausedToPlaying,
    PlayingToPaused,
    PausedToReady,
    ReadyToNull,
}

impl StateChange {
    pub fn between(from: State, to: State) -> Option<StateChange> {
        use State::*;
        Some(match (from, to) {
            (Null, Ready) => StateChange::NullToReady,
            (Ready, Paused) => StateChange::ReadyToPaused,
            (Paused, Playing) => StateChange::PausedToPlaying,
            (Playing, Paused) => StateChange::PlayingToPaused,
            (Paused, Ready) => StateChange::PausedToReady,
            (Ready, Null) => StateChange::ReadyToNull,
            _ => return None,
        })
    }

    pub fn target(self) -> State {
        match self {
            StateChange::NullToReady => State::Ready,
            StateChange::ReadyToPaused => State::Paused,
            StateChange::PausedToPlaying => State::Playing,
            StateChange::PlayingToPaused => State::Paused,
            StateChange::PausedToReady => State::Ready,
            StateChange::ReadyToNull => State::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeReturn {
    Failure,
    Success,
    Async,
    NoPreroll,
}

/// The virtual-dispatch hook an element class overrides (spec §9: "traits
/// at the seams"). The default core behavior matches spec §4.4.
pub trait ElementImpl: Send + Sync {
    fn change_state(&self, _element: &Element, _transition: StateChange) -> Result<StateChangeReturn> {
        Ok(StateChangeReturn::Success)
    }
}

pub struct DefaultElementImpl;
impl ElementImpl for DefaultElementImpl {}

/// Implemented by `Bin` so `Element::set_state` can propagate to children
/// without `Element` depending on `Bin` directly (composition, per
/// spec §9).
pub trait BinOps: Send + Sync {
    /// Propagate `target` to children not in LOCKED_STATE and report back
    /// the aggregate result plus the bin's own resulting state: the
    /// highest state `s` such that at least one child reports it
    /// (spec §4.4 "Bin state propagation").
    fn propagate_state(&self, target: State) -> (StateChangeReturn, State);
}

pub(crate) struct ElementShared {
    pub(crate) id: ElementId,
    pub(crate) name: Mutex<String>,
    pub(crate) parent: Mutex<Option<Weak<ElementShared>>>,
    pub(crate) pads: RwLock<Vec<Pad>>,
    pub(crate) pad_cookie: AtomicU64,
    pub(crate) current_state: Mutex<State>,
    pub(crate) pending_state: Mutex<Option<State>>,
    pub(crate) state_cond: Condvar,
    pub(crate) scheduler: Mutex<Option<Arc<Scheduler>>>,
    pub(crate) clock: Mutex<Option<Arc<Clock>>>,
    pub(crate) base_time: Mutex<ClockTime>,
    pub(crate) bus: Mutex<Option<Arc<Bus>>>,
    pub(crate) seek_done_hook: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    pub(crate) decoupled: AtomicBool,
    pub(crate) locked_state: AtomicBool,
    pub(crate) error: AtomicBool,
    pub(crate) eos: AtomicBool,
    pub(crate) impl_: RwLock<Arc<dyn ElementImpl>>,
    pub(crate) bin_ops: Mutex<Option<Arc<dyn BinOps>>>,
}

/// A node in the graph. Cloning shares the same underlying element.
#[derive(Clone)]
pub struct Element {
    pub(crate) shared: Arc<ElementShared>,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name())
            .field("state", &self.current_state())
            .finish()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}
impl Eq for Element {}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_impl(name, Arc::new(DefaultElementImpl))
    }

    pub fn with_impl(name: impl Into<String>, impl_: Arc<dyn ElementImpl>) -> Self {
        Self {
            shared: Arc::new(ElementShared {
                id: ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed)),
                name: Mutex::new(name.into()),
                parent: Mutex::new(None),
                pads: RwLock::new(Vec::new()),
                pad_cookie: AtomicU64::new(0),
                current_state: Mutex::new(State::Null),
                pending_state: Mutex::new(None),
                state_cond: Condvar::new(),
                scheduler: Mutex::new(None),
                clock: Mutex::new(None),
                base_time: Mutex::new(ClockTime::ZERO),
                bus: Mutex::new(None),
                seek_done_hook: Mutex::new(None),
                decoupled: AtomicBool::new(false),
                locked_state: AtomicBool::new(false),
                error: AtomicBool::new(false),
                eos: AtomicBool::new(false),
                impl_: RwLock::new(impl_),
                bin_ops: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> ElementId {
        self.shared.id
    }

    pub fn name(&self) -> String {
        self.shared.name.lock().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.shared.name.lock() = name.into();
    }

    pub(crate) fn set_parent(&self, parent: Option<Weak<ElementShared>>) {
        *self.shared.parent.lock() = parent;
    }

    pub(crate) fn set_bin_ops(&self, ops: Arc<dyn BinOps>) {
        *self.shared.bin_ops.lock() = Some(ops);
    }

    /// Swap in the virtual-dispatch hook after construction, so a subclass
    /// struct can wire itself up once its own `Arc` exists (spec §9
    /// "composition rather than inheritance").
    pub(crate) fn set_impl(&self, impl_: Arc<dyn ElementImpl>) {
        *self.shared.impl_.write() = impl_;
    }

    pub fn set_decoupled(&self, decoupled: bool) {
        self.shared.decoupled.store(decoupled, Ordering::SeqCst);
    }

    pub fn is_decoupled(&self) -> bool {
        self.shared.decoupled.load(Ordering::SeqCst)
    }

    pub fn set_locked_state(&self, locked: bool) {
        self.shared.locked_state.store(locked, Ordering::SeqCst);
    }

    pub fn is_locked_state(&self) -> bool {
        self.shared.locked_state.load(Ordering::SeqCst)
    }

    pub fn set_eos(&self, eos: bool) {
        self.shared.eos.store(eos, Ordering::SeqCst);
    }

    pub fn has_eos(&self) -> bool {
        self.shared.eos.load(Ordering::SeqCst)
    }

    pub fn has_error(&self) -> bool {
        self.shared.error.load(Ordering::SeqCst)
    }

    // ---- pads ----

    /// `element_add_pad` (spec §6). Bumps the membership cookie so
    /// outstanding iterators re-sync (spec §5).
    pub fn add_pad(&self, pad: Pad) -> Result<()> {
        let mut pads = self.shared.pads.write();
        if pads.iter().any(|p| p.name() == pad.name()) {
            return Err(CoreError::NameInUse(pad.name().to_string()));
        }
        pad.set_element(self);
        pads.push(pad);
        self.shared.pad_cookie.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn remove_pad(&self, pad: &Pad) -> Result<()> {
        let mut pads = self.shared.pads.write();
        let before = pads.len();
        pads.retain(|p| p.id() != pad.id());
        if pads.len() == before {
            return Err(CoreError::PadNotFound {
                element: self.name(),
                pad: pad.name().to_string(),
            });
        }
        self.shared.pad_cookie.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn get_pad(&self, name: &str) -> Option<Pad> {
        self.shared.pads.read().iter().find(|p| p.name() == name).cloned()
    }

    pub fn pads(&self) -> Vec<Pad> {
        self.shared.pads.read().clone()
    }

    pub fn pads_with_direction(&self, direction: PadDirection) -> Vec<Pad> {
        self.shared
            .pads
            .read()
            .iter()
            .filter(|p| p.direction() == direction)
            .cloned()
            .collect()
    }

    pub fn pad_cookie(&self) -> u64 {
        self.shared.pad_cookie.load(Ordering::SeqCst)
    }

    // ---- scheduler / clock ----

    pub fn set_scheduler(&self, scheduler: Option<Arc<Scheduler>>) {
        *self.shared.scheduler.lock() = scheduler;
    }

    pub fn scheduler(&self) -> Option<Arc<Scheduler>> {
        self.shared.scheduler.lock().clone()
    }

    pub fn set_clock(&self, clock: Option<Arc<Clock>>) -> bool {
        *self.shared.clock.lock() = clock;
        true
    }

    pub fn clock(&self) -> Option<Arc<Clock>> {
        self.shared.clock.lock().clone()
    }

    pub fn set_base_time(&self, time: ClockTime) {
        *self.shared.base_time.lock() = time;
    }

    pub fn base_time(&self) -> ClockTime {
        *self.shared.base_time.lock()
    }

    pub(crate) fn set_bus(&self, bus: Option<Arc<Bus>>) {
        *self.shared.bus.lock() = bus;
    }

    pub fn bus(&self) -> Option<Arc<Bus>> {
        self.shared.bus.lock().clone()
    }

    /// Installed by the owning [`crate::Pipeline`] and propagated to every
    /// child added through a [`crate::Bin`], the same way the bus is
    /// (spec §4.4 "Pipeline extras").
    pub(crate) fn set_seek_done_hook(&self, hook: Option<Arc<dyn Fn() + Send + Sync>>) {
        *self.shared.seek_done_hook.lock() = hook;
    }

    pub(crate) fn seek_done_hook(&self) -> Option<Arc<dyn Fn() + Send + Sync>> {
        self.shared.seek_done_hook.lock().clone()
    }

    /// Call once a flushing seek this element originated has been fully
    /// acknowledged (spec §4.4/§9), so the owning pipeline can reset
    /// stream-time. A no-op outside a pipeline.
    pub fn notify_flushing_seek_done(&self) {
        if let Some(hook) = self.seek_done_hook() {
            hook();
        }
    }

    /// Post an ERROR message (spec §6 "Exit / error reporting").
    pub fn post_error(&self, domain: ErrorDomain, code: impl Into<String>, message: impl Into<String>) {
        self.shared.error.store(true, Ordering::SeqCst);
        let err = ErrorMessage::new(domain, code, message, self.name());
        log::error!(target: "corestream::element", "{err}");
        if let Some(bus) = self.bus() {
            bus.post(Message::new(self.name(), MessageKind::Error(err)));
        }
    }

    pub fn post_message(&self, kind: MessageKind) {
        if let Some(bus) = self.bus() {
            bus.post(Message::new(self.name(), kind));
        }
    }

    // ---- state machine (spec §4.4) ----

    pub fn current_state(&self) -> State {
        *self.shared.current_state.lock()
    }

    pub fn pending_state(&self) -> Option<State> {
        *self.shared.pending_state.lock()
    }

    /// Drive the element from its current state to `target`, one
    /// single-step transition at a time (spec §4.4: "State transitions
    /// are always single-step; multi-step is achieved by repeated
    /// single-steps.").
    pub fn set_state(&self, target: State) -> Result<StateChangeReturn> {
        let mut overall = StateChangeReturn::Success;
        loop {
            let current = self.current_state();
            let Some((from, next)) = current.step_towards(target) else {
                break;
            };
            let transition = StateChange::between(from, next).expect("adjacent states always map to a transition");
            *self.shared.pending_state.lock() = Some(next);

            let impl_ = self.shared.impl_.read().clone();
            let result = impl_.change_state(self, transition);

            let ret = match result {
                Ok(r) => r,
                Err(e) => {
                    log::error!(target: "corestream::element", "{}: state change {:?} failed: {e}", self.name(), transition);
                    *self.shared.pending_state.lock() = None;
                    self.post_error(ErrorDomain::Core, "state-change", e.to_string());
                    self.shared.state_cond.notify_all();
                    return Ok(StateChangeReturn::Failure);
                }
            };

            if ret == StateChangeReturn::Failure {
                *self.shared.pending_state.lock() = None;
                self.shared.state_cond.notify_all();
                return Ok(StateChangeReturn::Failure);
            }

            let mut resolved_state = next;
            if let Some(bin_ops) = self.shared.bin_ops.lock().clone() {
                let (child_ret, aggregate) = bin_ops.propagate_state(next);
                if child_ret == StateChangeReturn::Failure {
                    *self.shared.pending_state.lock() = None;
                    self.shared.state_cond.notify_all();
                    return Ok(StateChangeReturn::Failure);
                }
                if child_ret == StateChangeReturn::Async {
                    overall = StateChangeReturn::Async;
                }
                resolved_state = aggregate;
            }

            *self.shared.current_state.lock() = resolved_state;
            *self.shared.pending_state.lock() = None;
            self.shared.state_cond.notify_all();

            self.post_message(MessageKind::StateChanged {
                old: from,
                current: next,
                pending: State::Null,
            });

            if ret == StateChangeReturn::Async {
                overall = StateChangeReturn::Async;
            } else if ret == StateChangeReturn::NoPreroll && overall == StateChangeReturn::Success {
                overall = StateChangeReturn::NoPreroll;
            }

            if resolved_state == target {
                break;
            }
        }
        Ok(overall)
    }

    /// Block until the pending state change resolves, per spec §5's
    /// "changes signal the cond" (used by the scheduler to observe an
    /// ASYNC transition's completion).
    pub fn get_state(&self, timeout: Option<std::time::Duration>) -> (State, Option<State>) {
        let mut guard = self.shared.current_state.lock();
        if self.shared.pending_state.lock().is_some() {
            match timeout {
                Some(t) => {
                    self.shared.state_cond.wait_for(&mut guard, t);
                }
                None => {
                    self.shared.state_cond.wait(&mut guard);
                }
            }
        }
        (*guard, *self.shared.pending_state.lock())
    }

    pub fn send_event(&self, event: Event) -> bool {
        for pad in self.pads_with_direction(PadDirection::Sink) {
            if pad.send_event(event.clone()) {
                return true;
            }
        }
        for pad in self.pads_with_direction(PadDirection::Source) {
            if pad.send_event(event.clone()) {
                return true;
            }
        }
        false
    }

    /// `element_query` (spec §6): try each pad in turn, sink pads first,
    /// same order as [`Element::send_event`], stopping at the first one
    /// that answers.
    pub fn query(&self, query: &mut Query) -> bool {
        for pad in self.pads_with_direction(PadDirection::Sink) {
            if pad.query(query) {
                return true;
            }
        }
        for pad in self.pads_with_direction(PadDirection::Source) {
            if pad.query(query) {
                return true;
            }
        }
        false
    }

    /// `element_seek` (spec §6): builds a `Seek` event and broadcasts it
    /// the way `send_event` does. A source's own src pad answers this
    /// directly through its registered event function (e.g.
    /// `BaseSource::perform_seek`); a sink forwards it upstream through
    /// its peer.
    #[allow(clippy::too_many_arguments)]
    pub fn seek(
        &self,
        rate: f64,
        format: SegmentFormat,
        flags: SeekFlags,
        start_type: SeekType,
        start: i64,
        stop_type: SeekType,
        stop: i64,
    ) -> bool {
        let event = Event::new(EventKind::Seek {
            rate,
            format,
            flags,
            start_type,
            start,
            stop_type,
            stop,
        });
        self.send_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_state_steps_through_intermediate_states() {
        let e = Element::new("e");
        let ret = e.set_state(State::Playing).unwrap();
        assert_eq!(ret, StateChangeReturn::Success);
        assert_eq!(e.current_state(), State::Playing);
        assert!(e.pending_state().is_none());
    }

    #[test]
    fn set_state_downward_also_steps() {
        let e = Element::new("e");
        e.set_state(State::Playing).unwrap();
        e.set_state(State::Null).unwrap();
        assert_eq!(e.current_state(), State::Null);
    }

    struct FailingImpl;
    impl ElementImpl for FailingImpl {
        fn change_state(&self, _element: &Element, transition: StateChange) -> Result<StateChangeReturn> {
            if transition == StateChange::ReadyToPaused {
                return Ok(StateChangeReturn::Failure);
            }
            Ok(StateChangeReturn::Success)
        }
    }

    #[test]
    fn failed_transition_reports_failure_and_keeps_state() {
        let e = Element::with_impl("e", Arc::new(FailingImpl));
        let ret = e.set_state(State::Playing).unwrap();
        assert_eq!(ret, StateChangeReturn::Failure);
        assert_eq!(e.current_state(), State::Ready);
    }
}
