//! PollMultiplexer - `poll(2)` over the wait set plus the wake-up handle
//!
//! Slot 0 of every poll call is the waker's read side (`POLLIN`); the
//! caller's entries follow in wait-set order. The timeout is infinite:
//! the call returns on an edge, on a hang-up or error on a handle, or
//! because another thread called `wake()`.

use crate::waker::{new_waker, Waker};
use gpioirq_core::{GpioError, GpioResult, Multiplexer, ResourceError, ResourceOp, WaitEntry};
use nix::errno::Errno;
use nix::poll::PollFlags;

pub struct PollMultiplexer {
    waker: Box<dyn Waker>,
}

impl PollMultiplexer {
    pub fn new() -> GpioResult<Self> {
        Ok(Self { waker: new_waker()? })
    }

    /// Use a specific wake-up handle
    pub fn with_waker(waker: Box<dyn Waker>) -> Self {
        Self { waker }
    }
}

impl Multiplexer for PollMultiplexer {
    fn wait(&self, set: &mut [WaitEntry]) -> GpioResult<usize> {
        let mut pfds: Vec<libc::pollfd> = Vec::with_capacity(set.len() + 1);
        pfds.push(libc::pollfd {
            fd: self.waker.fd(),
            events: PollFlags::POLLIN.bits(),
            revents: 0,
        });
        pfds.extend(set.iter().map(|e| libc::pollfd {
            fd: e.handle,
            events: e.interest.bits(),
            revents: 0,
        }));

        let n = loop {
            let ret = unsafe { libc::poll(pfds.as_mut_ptr(), pfds.len() as libc::nfds_t, -1) };
            if ret >= 0 {
                break ret;
            }
            let errno = Errno::last();
            if errno != Errno::EINTR {
                return Err(ResourceError::new(ResourceOp::Wait, None, errno).into());
            }
        };

        if n == 0 {
            return Err(GpioError::ProtocolViolation);
        }

        let woken = pfds[0].revents != 0;
        if woken {
            self.waker.drain()?;
        }

        let mut ready = 0;
        for (entry, pfd) in set.iter_mut().zip(&pfds[1..]) {
            entry.ready = PollFlags::from_bits_truncate(pfd.revents);
            if entry.is_ready() {
                ready += 1;
            }
        }

        if ready == 0 && !woken {
            return Err(GpioError::ProtocolViolation);
        }
        Ok(ready)
    }

    fn wake(&self) -> GpioResult<()> {
        self.waker.wake()
    }

    fn name(&self) -> &'static str {
        "poll"
    }
}

impl std::fmt::Debug for PollMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollMultiplexer")
            .field("waker_fd", &self.waker.fd())
            .finish()
    }
}
