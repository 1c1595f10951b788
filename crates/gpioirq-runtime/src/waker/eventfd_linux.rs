//! `EventFdWaker` - Linux wake-up handle
//!
//! An eventfd counter: `wake()` adds 1, `drain()` reads and resets it.
//! Any number of wakes before a drain is one readable condition.

use super::Waker;
use gpioirq_core::{GpioResult, ResourceError, ResourceOp};
use nix::errno::Errno;
use std::os::unix::io::RawFd;

pub struct EventFdWaker {
    fd: RawFd,
}

impl EventFdWaker {
    /// Create a non-blocking, close-on-exec eventfd
    pub fn create() -> GpioResult<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(ResourceError::last(ResourceOp::Open, None).into());
        }
        Ok(Self { fd })
    }
}

impl Waker for EventFdWaker {
    fn fd(&self) -> RawFd {
        self.fd
    }

    fn wake(&self) -> GpioResult<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = Errno::last();
            // Counter saturated: a wake is already pending.
            if errno == Errno::EAGAIN {
                return Ok(());
            }
            return Err(ResourceError::new(ResourceOp::Wake, None, errno).into());
        }
        Ok(())
    }

    fn drain(&self) -> GpioResult<()> {
        let mut val: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = Errno::last();
            if errno == Errno::EAGAIN {
                return Ok(());
            }
            return Err(ResourceError::new(ResourceOp::Read, None, errno).into());
        }
        Ok(())
    }
}

impl Drop for EventFdWaker {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd); }
            self.fd = -1;
        }
    }
}
