//! Error types for the gpioirq engine

use crate::id::LineId;
use core::fmt;
use nix::errno::Errno;

/// Result type for engine operations
pub type GpioResult<T> = Result<T, GpioError>;

/// What a user callback returns
///
/// `Err` stops the dispatcher; the engine never looks at the payload
/// beyond logging it.
pub type CallbackResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Errors that can occur in engine operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioError {
    /// Open/read/write/wait failure on a handle (fatal to the dispatcher)
    Resource(ResourceError),

    /// The indefinite wait came back with nothing ready
    ProtocolViolation,

    /// A user callback failed or panicked
    Callback(CallbackError),

    /// Duplicate registration, unknown line, full wait set
    Registry(RegistryError),

    /// The dispatcher thread could not be started
    Spawn(String),

    /// Invalid configuration
    Config(&'static str),

    /// The engine was shut down; no further registrations are accepted
    ShutDown,
}

impl GpioError {
    /// Errors after which the dispatcher must not keep running
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GpioError::Resource(_) | GpioError::ProtocolViolation | GpioError::Callback(_)
        )
    }
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::Resource(e) => write!(f, "resource error: {}", e),
            GpioError::ProtocolViolation => write!(f, "protocol violation: indefinite wait timed out"),
            GpioError::Callback(e) => write!(f, "callback error: {}", e),
            GpioError::Registry(e) => write!(f, "registry error: {}", e),
            GpioError::Spawn(msg) => write!(f, "failed to start dispatcher: {}", msg),
            GpioError::Config(msg) => write!(f, "invalid config: {}", msg),
            GpioError::ShutDown => write!(f, "engine is shut down"),
        }
    }
}

impl std::error::Error for GpioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpioError::Resource(e) => Some(e),
            GpioError::Callback(e) => Some(e),
            GpioError::Registry(e) => Some(e),
            _ => None,
        }
    }
}

/// The operation that failed on a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOp {
    Open,
    Read,
    Write,
    Wait,
    Wake,
}

impl ResourceOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceOp::Open => "open",
            ResourceOp::Read => "read",
            ResourceOp::Write => "write",
            ResourceOp::Wait => "wait",
            ResourceOp::Wake => "wake",
        }
    }
}

/// I/O failure on a line's value stream or on the wait primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceError {
    pub op: ResourceOp,
    /// Line the handle belongs to; `None` for the wait set as a whole
    pub line: Option<LineId>,
    pub errno: Errno,
}

impl ResourceError {
    pub const fn new(op: ResourceOp, line: Option<LineId>, errno: Errno) -> Self {
        Self { op, line, errno }
    }

    /// Capture `errno` of the calling thread
    pub fn last(op: ResourceOp, line: Option<LineId>) -> Self {
        Self::new(op, line, Errno::last())
    }

    /// Convert a std I/O error, falling back to `EIO` when it carries no errno
    pub fn from_io(op: ResourceOp, line: Option<LineId>, err: &std::io::Error) -> Self {
        let errno = err.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO);
        Self::new(op, line, errno)
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} on {} failed: {}", self.op.as_str(), line, self.errno),
            None => write!(f, "{} failed: {}", self.op.as_str(), self.errno),
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ResourceError> for GpioError {
    fn from(e: ResourceError) -> Self {
        GpioError::Resource(e)
    }
}

/// Synchronous registry failures, reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The line (or its handle) already has a callback
    AlreadyWatched(LineId),

    /// The line has no callback registered
    NotWatched(LineId),

    /// The wait set is at capacity
    Full { capacity: usize },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyWatched(line) => write!(f, "{} is already watched", line),
            RegistryError::NotWatched(line) => write!(f, "{} is not watched", line),
            RegistryError::Full { capacity } => write!(f, "wait set full ({} lines)", capacity),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RegistryError> for GpioError {
    fn from(e: RegistryError) -> Self {
        GpioError::Registry(e)
    }
}

/// A user callback that did not return `Ok`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The callback returned `Err`
    Failed { line: LineId, message: String },

    /// The callback panicked; the panic was caught on the dispatcher thread
    Panicked { line: LineId, message: String },
}

impl CallbackError {
    pub fn line(&self) -> LineId {
        match self {
            CallbackError::Failed { line, .. } | CallbackError::Panicked { line, .. } => *line,
        }
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackError::Failed { line, message } => {
                write!(f, "callback for {} failed: {}", line, message)
            }
            CallbackError::Panicked { line, message } => {
                write!(f, "callback for {} panicked: {}", line, message)
            }
        }
    }
}

impl std::error::Error for CallbackError {}

impl From<CallbackError> for GpioError {
    fn from(e: CallbackError) -> Self {
        GpioError::Callback(e)
    }
}
