//! MPSC message queue owned by a pipeline (spec §5 "Bus messages").
//!
//! Producer side (elements posting) is thread-safe and lock-free-ish via a
//! mutex-guarded `VecDeque`; the consumer drains on the application thread,
//! the way the teacher's `pipeline/bus.rs` drains via `timed_pop` in a
//! watcher thread.

use crate::message::Message;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

pub struct Bus {
    queue: Mutex<VecDeque<Message>>,
    cond: Condvar,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }

    pub fn post(&self, message: Message) {
        log::debug!(target: "corestream::bus", "posting message from {}", message.src);
        self.queue.lock().push_back(message);
        self.cond.notify_all();
    }

    pub fn pop(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    pub fn timed_pop(&self, timeout: Duration) -> Option<Message> {
        let mut guard = self.queue.lock();
        if guard.is_empty() {
            let _ = self.cond.wait_for(&mut guard, timeout);
        }
        guard.pop_front()
    }

    /// Drop all pending messages (spec §5: "on READY→NULL the bus is
    /// flushed unless auto-flush-bus is disabled").
    pub fn flush(&self) {
        self.queue.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    #[test]
    fn post_then_pop_is_fifo() {
        let bus = Bus::new();
        bus.post(Message::new("a", MessageKind::Eos));
        bus.post(Message::new("b", MessageKind::Eos));
        assert_eq!(bus.pop().unwrap().src, "a");
        assert_eq!(bus.pop().unwrap().src, "b");
        assert!(bus.pop().is_none());
    }

    #[test]
    fn flush_drops_pending_messages() {
        let bus = Bus::new();
        bus.post(Message::new("a", MessageKind::Eos));
        bus.flush();
        assert!(bus.is_empty());
    }
}
