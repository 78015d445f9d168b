//! Bus messages: out-of-band, element-to-application, distinct from the
//! in-band [`crate::event::Event`] stream (SPEC_FULL §3 ADDED).

use crate::error::ErrorMessage;

#[derive(Debug, Clone)]
pub enum MessageKind {
    Error(ErrorMessage),
    Warning(ErrorMessage),
    Info(ErrorMessage),
    Eos,
    SegmentDone { position: i64 },
    StateChanged { old: crate::element::State, current: crate::element::State, pending: crate::element::State },
    ClockLost,
    Latency,
    Application(String),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub src: String,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(src: impl Into<String>, kind: MessageKind) -> Self {
        Self { src: src.into(), kind }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, MessageKind::Error(_))
    }

    pub fn is_eos(&self) -> bool {
        matches!(self.kind, MessageKind::Eos)
    }
}
