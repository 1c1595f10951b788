//! `PipeWaker` - portable self-pipe wake-up handle
//!
//! Used where eventfd does not exist. Both ends are non-blocking, so a
//! full pipe on `wake()` just means a wake is already pending.

use super::Waker;
use gpioirq_core::{GpioResult, ResourceError, ResourceOp};
use nix::errno::Errno;
use std::os::unix::io::RawFd;

pub struct PipeWaker {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl PipeWaker {
    pub fn create() -> GpioResult<Self> {
        let mut fds = [-1 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
            return Err(ResourceError::last(ResourceOp::Open, None).into());
        }
        let waker = Self { read_fd: fds[0], write_fd: fds[1] };
        for fd in fds {
            set_nonblock_cloexec(fd)?;
        }
        Ok(waker)
    }
}

fn set_nonblock_cloexec(fd: RawFd) -> GpioResult<()> {
    unsafe {
        let fl = libc::fcntl(fd, libc::F_GETFL);
        if fl < 0 || libc::fcntl(fd, libc::F_SETFL, fl | libc::O_NONBLOCK) < 0 {
            return Err(ResourceError::last(ResourceOp::Open, None).into());
        }
        let fd_fl = libc::fcntl(fd, libc::F_GETFD);
        if fd_fl < 0 || libc::fcntl(fd, libc::F_SETFD, fd_fl | libc::FD_CLOEXEC) < 0 {
            return Err(ResourceError::last(ResourceOp::Open, None).into());
        }
    }
    Ok(())
}

impl Waker for PipeWaker {
    fn fd(&self) -> RawFd {
        self.read_fd
    }

    fn wake(&self) -> GpioResult<()> {
        let byte = 1u8;
        let ret = unsafe { libc::write(self.write_fd, &byte as *const u8 as *const libc::c_void, 1) };
        if ret < 0 {
            let errno = Errno::last();
            if errno == Errno::EAGAIN {
                return Ok(());
            }
            return Err(ResourceError::new(ResourceOp::Wake, None, errno).into());
        }
        Ok(())
    }

    fn drain(&self) -> GpioResult<()> {
        let mut buf = [0u8; 64];
        loop {
            let ret = unsafe {
                libc::read(self.read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
            };
            if ret > 0 {
                continue;
            }
            if ret == 0 {
                return Ok(());
            }
            let errno = Errno::last();
            if errno == Errno::EAGAIN {
                return Ok(());
            }
            if errno != Errno::EINTR {
                return Err(ResourceError::new(ResourceOp::Read, None, errno).into());
            }
        }
    }
}

impl Drop for PipeWaker {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}
