//! Crate-wide error taxonomy, grounded on the domain/code/message/debug
//! shape that elements post to the bus (spec §6/§7).

use thiserror::Error;

/// Top-level error domain, following spec §7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDomain {
    Core,
    Stream,
    Resource,
    Negotiation,
    Clock,
}

impl std::fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorDomain::Core => "core",
            ErrorDomain::Stream => "stream",
            ErrorDomain::Resource => "resource",
            ErrorDomain::Negotiation => "negotiation",
            ErrorDomain::Clock => "clock",
        };
        write!(f, "{s}")
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("internal invariant violation: {0}")]
    Failed(String),

    #[error("pad not found: {element}::{pad}")]
    PadNotFound { element: String, pad: String },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("name already in use: {0}")]
    NameInUse(String),

    #[error("pad link failed: {0}")]
    LinkFailed(String),

    #[error("caps negotiation failed: {0}")]
    Negotiation(String),

    #[error("state change failed: {0}")]
    StateChange(String),

    #[error("clock error: {0}")]
    Clock(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not negotiated")]
    NotNegotiated,

    #[error("wrong state")]
    WrongState,

    #[error("not linked")]
    NotLinked,

    #[error("unexpected (eos)")]
    Unexpected,
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// The (domain, code, message, debug, source) tuple posted on the bus,
/// matching spec §6's "Exit / error reporting".
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    pub domain: ErrorDomain,
    pub code: String,
    pub message: String,
    pub debug: Option<String>,
    pub src_element: String,
}

impl ErrorMessage {
    pub fn new(
        domain: ErrorDomain,
        code: impl Into<String>,
        message: impl Into<String>,
        src_element: impl Into<String>,
    ) -> Self {
        Self {
            domain,
            code: code.into(),
            message: message.into(),
            debug: None,
            src_element: src_element.into(),
        }
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }
}

impl std::fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} from {}: {}",
            self.domain, self.code, self.src_element, self.message
        )
    }
}
