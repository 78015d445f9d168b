//! Drives elements: assigns scheduler groups, runs loop/chain functions,
//! propagates pad link/unlink notifications (spec §4.5).

use crate::pad::Pad;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterateResult {
    Running,
    Stopped,
    Error,
}

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

/// One scheduler group: the set of non-decoupled elements driven by the
/// same worker set (spec §4.5/§5).
pub struct Scheduler {
    id: u64,
    name: String,
    stopped: AtomicBool,
}

impl Scheduler {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Told of a direct pad link within this group (spec §4.2 "Notify the
    /// scheduler so it can reconcile scheduling groups").
    pub fn notify_pad_linked(&self, src: &Pad, sink: &Pad) {
        log::debug!(
            target: "corestream::scheduler",
            "scheduler {} sees new link {}:{} -> {}:{}",
            self.name,
            src.element().map(|e| e.name()).unwrap_or_default(),
            src.name(),
            sink.element().map(|e| e.name()).unwrap_or_default(),
            sink.name(),
        );
    }

    pub fn notify_pad_unlinked(&self, src: &Pad, sink: &Pad) {
        log::debug!(
            target: "corestream::scheduler",
            "scheduler {} sees link removed {}:{} -> {}:{}",
            self.name,
            src.element().map(|e| e.name()).unwrap_or_default(),
            src.name(),
            sink.element().map(|e| e.name()).unwrap_or_default(),
            sink.name(),
        );
    }

    /// A scheduler iteration advances the graph one unit of work (spec
    /// §4.5). The core scheduler itself does no autonomous pumping beyond
    /// running `LoopTask`s spawned by sources; `iterate` exists so a
    /// `Pipeline`'s own loop (§4.5) has something to call for pull-mode
    /// graphs without a live source loop.
    pub fn iterate(&self) -> IterateResult {
        if self.stopped.load(Ordering::SeqCst) {
            IterateResult::Stopped
        } else {
            IterateResult::Running
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// One-thread-per-active-loop model (spec §9). A `LoopTask` repeatedly
/// invokes a step closure until it reports `Stopped`/`Error`, and can be
/// paused/resumed without tearing the thread down — used by
/// [`crate::base_src::BaseSource`] across a seek (spec §4.6 `perform_seek`
/// step 2 "pause the loop task" / step 8 "restart the loop task").
pub struct LoopTask {
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<LoopState>,
}

struct LoopState {
    paused: Mutex<bool>,
    stop: AtomicBool,
    cond: Condvar,
}

impl LoopTask {
    pub fn start<F>(mut step: F) -> Self
    where
        F: FnMut() -> IterateResult + Send + 'static,
    {
        let state = Arc::new(LoopState {
            paused: Mutex::new(false),
            stop: AtomicBool::new(false),
            cond: Condvar::new(),
        });
        let thread_state = state.clone();
        let handle = std::thread::spawn(move || loop {
            {
                let mut paused = thread_state.paused.lock();
                while *paused && !thread_state.stop.load(Ordering::SeqCst) {
                    thread_state.cond.wait_for(&mut paused, Duration::from_millis(50));
                }
            }
            if thread_state.stop.load(Ordering::SeqCst) {
                break;
            }
            match step() {
                IterateResult::Running => {}
                IterateResult::Stopped | IterateResult::Error => break,
            }
        });
        Self {
            handle: Mutex::new(Some(handle)),
            state,
        }
    }

    pub fn pause(&self) {
        *self.state.paused.lock() = true;
    }

    pub fn resume(&self) {
        *self.state.paused.lock() = false;
        self.state.cond.notify_all();
    }

    pub fn stop(&self) {
        self.state.stop.store(true, Ordering::SeqCst);
        *self.state.paused.lock() = false;
        self.state.cond.notify_all();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LoopTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Block the calling thread until any of `pads` is active and not
/// flushing, polling at `interval` (spec §4.5 `pad_select`). This is a
/// deliberately simple readiness poll rather than a full async reactor:
/// the core has no event loop of its own, only per-pad flushing/active
/// flags a chain/get function can observe.
pub fn pad_select(pads: &[Pad], timeout: Duration, interval: Duration) -> Option<Pad> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        for pad in pads {
            if pad.is_active() && !pad.is_flushing() {
                return Some(pad.clone());
            }
        }
        if std::time::Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn loop_task_runs_until_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = LoopTask::start(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            if n >= 3 {
                IterateResult::Stopped
            } else {
                IterateResult::Running
            }
        });
        std::thread::sleep(Duration::from_millis(100));
        task.stop();
        assert!(counter.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn loop_task_pause_halts_progress() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = LoopTask::start(move || {
            c.fetch_add(1, Ordering::SeqCst);
            IterateResult::Running
        });
        std::thread::sleep(Duration::from_millis(20));
        task.pause();
        let after_pause = counter.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(80));
        let later = counter.load(Ordering::SeqCst);
        assert!(later - after_pause <= 1, "paused loop should not keep advancing");
        task.stop();
    }
}
