//! Wake-up handle for the dispatcher's wait set
//!
//! The poll multiplexer keeps this handle's read side in slot 0 of
//! every `poll(2)` call, so registrations, deregistrations and shutdown
//! can end a wait that no GPIO edge would ever end.

use gpioirq_core::GpioResult;
use std::os::unix::io::RawFd;

/// A pollable, coalescing wake signal
///
/// **Contract:**
/// - `wake()` must never block.
/// - Several `wake()` calls before a `drain()` leave one readable
///   condition; one `drain()` clears it.
/// - `fd()` becomes `POLLIN`-readable after `wake()`.
pub trait Waker: Send + Sync {
    /// Descriptor to poll for `POLLIN`
    fn fd(&self) -> RawFd;

    /// Make `fd()` readable.
    fn wake(&self) -> GpioResult<()>;

    /// Consume pending wakes.
    fn drain(&self) -> GpioResult<()>;
}

mod pipe;
pub use pipe::PipeWaker;

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod eventfd_linux;
        pub use eventfd_linux::EventFdWaker;
        pub use eventfd_linux::EventFdWaker as PlatformWaker;
    } else {
        pub use pipe::PipeWaker as PlatformWaker;
    }
}

/// Create the platform-appropriate wake-up handle
pub fn new_waker() -> GpioResult<Box<dyn Waker>> {
    Ok(Box::new(PlatformWaker::create()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::poll::PollFlags;

    fn readable(fd: RawFd) -> bool {
        let mut pfd = libc::pollfd {
            fd,
            events: PollFlags::POLLIN.bits(),
            revents: 0,
        };
        let n = unsafe { libc::poll(&mut pfd, 1, 0) };
        n == 1 && PollFlags::from_bits_truncate(pfd.revents).contains(PollFlags::POLLIN)
    }

    fn exercise(waker: &dyn Waker) {
        assert!(!readable(waker.fd()));

        waker.wake().unwrap();
        waker.wake().unwrap();
        assert!(readable(waker.fd()));

        waker.drain().unwrap();
        assert!(!readable(waker.fd()));

        // Draining with nothing pending is fine.
        waker.drain().unwrap();
    }

    #[test]
    fn test_platform_waker() {
        let waker = new_waker().unwrap();
        exercise(waker.as_ref());
    }

    #[test]
    fn test_pipe_waker() {
        let waker = PipeWaker::create().unwrap();
        exercise(&waker);
    }
}
