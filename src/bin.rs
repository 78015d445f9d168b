//! A container element whose state propagates to its children (spec §3/§4.4 Bin).

use crate::element::{BinOps, Element, ElementImpl, State, StateChange, StateChangeReturn};
use crate::error::{CoreError, Result};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

struct BinData {
    children: RwLock<Vec<Element>>,
    /// Called whenever a child's state settles, mirroring the teacher's
    /// `child-state-change callback` (spec §3 Bin attributes).
    child_state_change: RwLock<Option<Arc<dyn Fn(&Element, State) + Send + Sync>>>,
}

struct BinOpsImpl {
    data: Weak<BinData>,
}

impl BinOps for BinOpsImpl {
    fn propagate_state(&self, target: State) -> (StateChangeReturn, State) {
        let Some(data) = self.data.upgrade() else {
            return (StateChangeReturn::Success, target);
        };
        // Snapshot so concurrent add/remove during iteration doesn't race
        // the loop itself (spec §4.4 "holding a snapshot copy").
        let children: Vec<Element> = data.children.read().clone();

        let mut counts = [0usize; 4]; // indexed by State as usize
        let mut overall = StateChangeReturn::Success;
        let mut failure = false;

        for child in &children {
            if child.is_locked_state() {
                counts[child.current_state() as usize] += 1;
                continue;
            }
            let ret = child.set_state(target).unwrap_or(StateChangeReturn::Failure);
            if let Some(cb) = data.child_state_change.read().clone() {
                cb(child, child.current_state());
            }
            match ret {
                StateChangeReturn::Failure => failure = true,
                StateChangeReturn::Async => {
                    if overall == StateChangeReturn::Success {
                        overall = StateChangeReturn::Async;
                    }
                }
                StateChangeReturn::NoPreroll => {
                    if overall == StateChangeReturn::Success {
                        overall = StateChangeReturn::NoPreroll;
                    }
                }
                StateChangeReturn::Success => {}
            }
            counts[child.current_state() as usize] += 1;
        }

        if failure {
            // Roll back the children that did transition: spec §8
            // scenario 5 requires their states return to the step's
            // starting state once one sibling reports FAILURE.
            for child in &children {
                if child.is_locked_state() {
                    continue;
                }
                if child.current_state() == target {
                    // This child did transition; step it back down one level.
                    if let Some(rolled_back) = lower_neighbour(target) {
                        let _ = child.set_state(rolled_back);
                    }
                }
            }
            return (StateChangeReturn::Failure, aggregate_state(&counts));
        }

        (overall, aggregate_state(&counts))
    }
}

fn lower_neighbour(s: State) -> Option<State> {
    match s {
        State::Playing => Some(State::Paused),
        State::Paused => Some(State::Ready),
        State::Ready => Some(State::Null),
        State::Null => None,
    }
}

/// Highest state `s` such that `count[s] > 0`, walking from highest to
/// lowest (spec §4.4).
fn aggregate_state(counts: &[usize; 4]) -> State {
    for (idx, count) in counts.iter().enumerate().rev() {
        if *count > 0 {
            return index_to_state(idx);
        }
    }
    State::Null
}

fn index_to_state(idx: usize) -> State {
    match idx {
        0 => State::Null,
        1 => State::Ready,
        2 => State::Paused,
        _ => State::Playing,
    }
}

/// A container [`Element`] plus an ordered list of children.
#[derive(Clone)]
pub struct Bin {
    element: Element,
    data: Arc<BinData>,
}

impl Bin {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_impl(name, Arc::new(crate::element::DefaultElementImpl))
    }

    pub fn with_impl(name: impl Into<String>, impl_: Arc<dyn ElementImpl>) -> Self {
        let element = Element::with_impl(name, impl_);
        let data = Arc::new(BinData {
            children: RwLock::new(Vec::new()),
            child_state_change: RwLock::new(None),
        });
        let ops = Arc::new(BinOpsImpl {
            data: Arc::downgrade(&data),
        });
        element.set_bin_ops(ops);
        Self { element, data }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn set_child_state_change_callback(&self, cb: Arc<dyn Fn(&Element, State) + Send + Sync>) {
        *self.data.child_state_change.write() = Some(cb);
    }

    /// `bin_add` (spec §6): invariant is that the child's parent becomes
    /// this bin.
    pub fn add(&self, child: Element) -> Result<()> {
        let mut children = self.data.children.write();
        if children.iter().any(|c| c.name() == child.name()) {
            return Err(CoreError::NameInUse(child.name()));
        }
        child.set_parent(Some(Arc::downgrade(&self.element.shared)));
        if child.scheduler().is_none() {
            child.set_scheduler(self.element.scheduler());
        }
        if let Some(bus) = self.element.bus() {
            child.set_bus(Some(bus));
        }
        if let Some(hook) = self.element.seek_done_hook() {
            child.set_seek_done_hook(Some(hook));
        }
        children.push(child);
        Ok(())
    }

    pub fn add_many(&self, children: impl IntoIterator<Item = Element>) -> Result<()> {
        for child in children {
            self.add(child)?;
        }
        Ok(())
    }

    /// `bin_remove` (spec §6): unparents and drops the bin's reference.
    pub fn remove(&self, child: &Element) -> Result<()> {
        let mut children = self.data.children.write();
        let before = children.len();
        children.retain(|c| c.id() != child.id());
        if children.len() == before {
            return Err(CoreError::ElementNotFound(child.name()));
        }
        child.set_parent(None);
        Ok(())
    }

    pub fn children(&self) -> Vec<Element> {
        self.data.children.read().clone()
    }

    pub fn num_children(&self) -> usize {
        self.data.children.read().len()
    }

    /// `bin_get_by_name` (spec §6): non-recursive lookup among direct
    /// children; recurses into child bins if present.
    pub fn get_by_name(&self, name: &str) -> Option<Element> {
        for child in self.children() {
            if child.name() == name {
                return Some(child);
            }
        }
        None
    }

    /// Recursive lookup, matching spec §6's `bin_get_by_name_recurse_up`
    /// intent but descending instead (the common direction bins search
    /// when locating a named element anywhere in the graph).
    pub fn get_by_name_recursive(&self, name: &str, sub_bins: &[Bin]) -> Option<Element> {
        if let Some(e) = self.get_by_name(name) {
            return Some(e);
        }
        for bin in sub_bins {
            if let Some(e) = bin.get_by_name_recursive(name, &[]) {
                return Some(e);
            }
        }
        None
    }

    pub fn state(&self) -> State {
        self.element.current_state()
    }

    pub fn set_state(&self, target: State) -> Result<StateChangeReturn> {
        self.element.set_state(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn bin_state_is_max_across_children() {
        let bin = Bin::new("bin");
        let a = Element::new("a");
        let b = Element::new("b");
        bin.add(a.clone()).unwrap();
        bin.add(b.clone()).unwrap();

        let ret = bin.set_state(State::Paused).unwrap();
        assert_eq!(ret, StateChangeReturn::Success);
        assert_eq!(bin.state(), State::Paused);
        assert_eq!(a.current_state(), State::Paused);
        assert_eq!(b.current_state(), State::Paused);
    }

    struct FailsAtPaused;
    impl ElementImpl for FailsAtPaused {
        fn change_state(&self, _e: &Element, t: StateChange) -> Result<StateChangeReturn> {
            if t == StateChange::ReadyToPaused {
                return Ok(StateChangeReturn::Failure);
            }
            Ok(StateChangeReturn::Success)
        }
    }

    #[test]
    fn one_failing_child_fails_the_bin_and_rolls_back_others() {
        // spec §8 scenario 5
        let bin = Bin::new("bin");
        let a = Element::new("a");
        let b = Element::new("b");
        let c = Element::with_impl("c", Arc::new(FailsAtPaused));
        bin.add(a.clone()).unwrap();
        bin.add(b.clone()).unwrap();
        bin.add(c.clone()).unwrap();

        let ret = bin.set_state(State::Paused).unwrap();
        assert_eq!(ret, StateChangeReturn::Failure);
        assert_eq!(a.current_state(), State::Ready);
        assert_eq!(b.current_state(), State::Ready);
        assert_eq!(c.current_state(), State::Ready);
    }

    #[test]
    fn duplicate_child_name_rejected() {
        let bin = Bin::new("bin");
        bin.add(Element::new("x")).unwrap();
        let err = bin.add(Element::new("x")).unwrap_err();
        assert!(matches!(err, CoreError::NameInUse(_)));
    }
}
