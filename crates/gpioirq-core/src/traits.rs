//! Seams between the dispatch engine and the operating system
//!
//! The engine only needs two capabilities from the outside world:
//! a per-line value stream it can read one byte from, and a wait
//! primitive that blocks on many such streams at once.

use crate::error::GpioResult;
use crate::id::LineId;
use nix::poll::PollFlags;
use std::os::unix::io::RawFd;
use std::sync::Arc;

/// A line's value stream, as handed to the engine by the sysfs layer
///
/// Closing the stream is `Drop`.
pub trait ValueStream: Send + Sync {
    /// Line this stream belongs to
    fn line(&self) -> LineId;

    /// Descriptor the multiplexer waits on
    fn handle(&self) -> RawFd;

    /// Read exactly one byte from offset 0
    ///
    /// Must not depend on the stream's current file position. Anything
    /// other than one byte read is an error.
    fn reset_and_read_byte(&self) -> GpioResult<u8>;
}

/// One slot of the dense wait set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitEntry {
    pub handle: RawFd,
    /// Events requested from the kernel
    pub interest: PollFlags,
    /// Events the kernel reported for the last wait
    pub ready: PollFlags,
}

impl WaitEntry {
    /// Interest used for GPIO value files: edges show up as `POLLPRI`,
    /// with `POLLERR` set alongside it by sysfs.
    pub const EDGE_INTEREST: PollFlags = PollFlags::POLLPRI.union(PollFlags::POLLERR);

    pub const fn edge(handle: RawFd) -> Self {
        Self {
            handle,
            interest: Self::EDGE_INTEREST,
            ready: PollFlags::empty(),
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        !self.ready.is_empty()
    }
}

/// Blocking multiplex-wait over a set of handles
///
/// **Contract:**
/// - `wait()` blocks with no timeout until at least one entry is ready
///   or `wake()` is called from another thread.
/// - On return every entry's `ready` field reflects this wait only.
/// - `Ok(0)` means the wait was ended by `wake()`, not by a handle.
/// - A wait that returns with nothing ready and no wake pending is a
///   `GpioError::ProtocolViolation`.
/// - `wake()` must never block; wakes issued before the next `wait()`
///   are coalesced into one early return.
pub trait Multiplexer: Send + Sync {
    /// Block until entries become ready; returns how many did.
    fn wait(&self, set: &mut [WaitEntry]) -> GpioResult<usize>;

    /// Kick a blocked (or the next) `wait()` out early.
    fn wake(&self) -> GpioResult<()>;

    /// Backend name (for logging)
    fn name(&self) -> &'static str;
}

impl<M: Multiplexer + ?Sized> Multiplexer for Arc<M> {
    fn wait(&self, set: &mut [WaitEntry]) -> GpioResult<usize> {
        (**self).wait(set)
    }

    fn wake(&self) -> GpioResult<()> {
        (**self).wake()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
