//! In-memory value streams and a scripted multiplexer for tests
//!
//! `ScriptedMux::wait` consumes one queued step per call. With nothing
//! queued it blocks until a step is pushed or `wake()` is called, like a
//! real indefinite wait. A `Ready` step naming no handle of the current
//! set is discarded.

use crate::registry::EdgeCallback;
use gpioirq_core::{
    GpioError, GpioResult, LineId, Multiplexer, ResourceError, ResourceOp, ValueStream, WaitEntry,
};
use nix::errno::Errno;
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct FakeStream {
    line: LineId,
    fd: RawFd,
    value: AtomicU8,
    reads: AtomicUsize,
    fail: AtomicBool,
}

impl FakeStream {
    pub fn new(line: u32, fd: RawFd, byte: u8) -> Arc<FakeStream> {
        Arc::new(FakeStream {
            line: LineId::new(line),
            fd,
            value: AtomicU8::new(byte),
            reads: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set(&self, byte: u8) {
        self.value.store(byte, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl ValueStream for FakeStream {
    fn line(&self) -> LineId {
        self.line
    }

    fn handle(&self) -> RawFd {
        self.fd
    }

    fn reset_and_read_byte(&self) -> GpioResult<u8> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ResourceError::new(ResourceOp::Read, Some(self.line), Errno::EIO).into());
        }
        Ok(self.value.load(Ordering::SeqCst))
    }
}

pub fn noop_callback() -> EdgeCallback {
    Arc::new(|_| Ok(()))
}

pub enum Step {
    /// Mark these descriptors ready
    Ready(Vec<RawFd>),
    /// Fail the wait with this errno
    Fail(Errno),
    /// Return with nothing ready
    Silent,
}

#[derive(Default)]
struct MuxState {
    steps: VecDeque<Step>,
    woken: bool,
}

#[derive(Default)]
pub struct ScriptedMux {
    state: Mutex<MuxState>,
    cond: Condvar,
}

impl ScriptedMux {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, step: Step) {
        self.state.lock().unwrap().steps.push_back(step);
        self.cond.notify_all();
    }

    /// Queue an edge on the given descriptors
    pub fn fire(&self, fds: &[RawFd]) {
        self.push(Step::Ready(fds.to_vec()));
    }
}

impl Multiplexer for ScriptedMux {
    fn wait(&self, set: &mut [WaitEntry]) -> GpioResult<usize> {
        let mut state = self.state.lock().unwrap();

        loop {
            for entry in set.iter_mut() {
                entry.ready = nix::poll::PollFlags::empty();
            }

            // A pending wake means the caller's set is stale: let it
            // re-snapshot before any queued edge is matched against it.
            if state.woken {
                state.woken = false;
                return Ok(0);
            }

            match state.steps.pop_front() {
                Some(Step::Ready(fds)) => {
                    let mut count = 0;
                    for entry in set.iter_mut() {
                        if fds.contains(&entry.handle) {
                            entry.ready = WaitEntry::EDGE_INTEREST;
                            count += 1;
                        }
                    }
                    if count > 0 {
                        return Ok(count);
                    }
                    // None of these handles are watched any more.
                }
                Some(Step::Fail(errno)) => {
                    return Err(ResourceError::new(ResourceOp::Wait, None, errno).into());
                }
                Some(Step::Silent) => return Err(GpioError::ProtocolViolation),
                None => state = self.cond.wait(state).unwrap(),
            }
        }
    }

    fn wake(&self) -> GpioResult<()> {
        self.state.lock().unwrap().woken = true;
        self.cond.notify_all();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Fresh directory laid out like `/sys/class/gpio` with one `gpioN/value`
/// file per line, each holding `'0'`
pub fn temp_root(lines: &[u32]) -> std::path::PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let root = std::env::temp_dir().join(format!(
        "gpioirq-test-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    ));
    for line in lines {
        let dir = root.join(format!("gpio{}", line));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("value"), b"0").unwrap();
        std::fs::write(dir.join("direction"), b"in").unwrap();
        std::fs::write(dir.join("edge"), b"none").unwrap();
    }
    root
}
