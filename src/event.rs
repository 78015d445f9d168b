//! Tagged, refcounted event objects (spec §3/§4.3).

use crate::segment::SegmentFormat;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekType {
    None,
    Set,
    End,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeekFlags: u32 {
        const NONE = 0;
        const FLUSH = 1 << 0;
        const ACCURATE = 1 << 1;
        const KEY_UNIT = 1 << 2;
        const SEGMENT = 1 << 3;
    }
}

#[derive(Debug, Clone)]
pub enum EventKind {
    Seek {
        rate: f64,
        format: SegmentFormat,
        flags: SeekFlags,
        start_type: SeekType,
        start: i64,
        stop_type: SeekType,
        stop: i64,
    },
    FlushStart,
    FlushStop,
    NewSegment {
        update: bool,
        rate: f64,
        applied_rate: f64,
        format: SegmentFormat,
        start: i64,
        stop: Option<i64>,
        time: i64,
    },
    Eos,
    Discont {
        time: Option<i64>,
    },
    Tag(String),
    Qos,
    Navigation,
    BufferSize {
        min: i64,
        max: i64,
    },
}

/// A tagged event, refcounted via `Arc` (spec §3: "Refcounted; source
/// element recorded").
#[derive(Debug, Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

#[derive(Debug)]
struct EventInner {
    kind: EventKind,
    src_element: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            inner: Arc::new(EventInner {
                kind,
                src_element: None,
            }),
        }
    }

    pub fn with_source(kind: EventKind, src_element: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                kind,
                src_element: Some(src_element.into()),
            }),
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.inner.kind
    }

    pub fn src_element(&self) -> Option<&str> {
        self.inner.src_element.as_deref()
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self.inner.kind, EventKind::Seek { .. } | EventKind::Qos | EventKind::Navigation)
    }

    pub fn is_downstream(&self) -> bool {
        !self.is_upstream()
    }

    pub fn is_serialized(&self) -> bool {
        !matches!(self.inner.kind, EventKind::FlushStart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_flags_contains() {
        let f = SeekFlags::FLUSH | SeekFlags::ACCURATE;
        assert!(f.contains(SeekFlags::FLUSH));
        assert!(!f.contains(SeekFlags::KEY_UNIT));
    }

    #[test]
    fn event_clone_shares_refcount() {
        let e = Event::new(EventKind::Eos);
        let e2 = e.clone();
        assert!(matches!(e2.kind(), EventKind::Eos));
    }
}
