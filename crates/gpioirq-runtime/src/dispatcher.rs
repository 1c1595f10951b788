//! Dispatcher - the one background loop that waits for edges
//!
//! ```text
//! loop {
//!     lock registry
//!         shutdown requested or registry empty → retire, exit
//!         snapshot wait set
//!     unlock
//!     wait (no timeout)
//!     for each ready slot, in slot order:
//!         still registered? (same handle, same stream)  else skip
//!         pread 1 byte at offset 0 → 0 / 1
//!         callback(value)
//! }
//! ```
//!
//! A line removed while the dispatcher is blocked is skipped on wake:
//! removal takes effect immediately. The snapshot keeps the removed
//! stream open until the cycle ends, so its descriptor cannot be reused
//! by a new registration inside the same cycle.
//!
//! Any wait or read failure, a wait that reports nothing, and a failing
//! or panicking callback stop the loop. The remaining ready slots of that
//! cycle are not serviced and the lifecycle moves to `Faulted`.

use crate::engine::{lock, EngineShared};
use crate::registry::{EdgeCallback, WaitSnapshot};
use gpioirq_core::{
    decode_value, kdebug, kerror, ktrace, CallbackError, GpioError, GpioResult, LineId,
    ResourceError, ResourceOp,
};
use nix::errno::Errno;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Why a dispatcher thread returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchExit {
    /// The registry became empty
    Drained,
    /// `shutdown()` was requested
    Shutdown,
    /// A fatal error stopped the loop
    Failed(GpioError),
}

/// Counters shared by every dispatcher generation of one engine
#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    cycles: AtomicU64,
    wakeups: AtomicU64,
    events: AtomicU64,
    skipped: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time dispatcher statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Waits entered
    pub cycles: u64,
    /// Waits ended by the wake-up handle
    pub wakeups: u64,
    /// Callbacks that returned `Ok`
    pub events: u64,
    /// Ready slots dropped because the line was removed mid-cycle
    pub skipped: u64,
}

/// Dispatcher thread body
pub(crate) fn run(shared: Arc<EngineShared>, generation: u64) -> DispatchExit {
    kdebug!("dispatcher {} started on {}", generation, shared.mux.name());

    loop {
        let mut snapshot = {
            let reg = lock(&shared.registry);
            if shared.shutdown.load(Ordering::Acquire) {
                shared.lifecycle.retire();
                kdebug!("dispatcher {} stopped: shutdown", generation);
                return DispatchExit::Shutdown;
            }
            if reg.is_empty() {
                shared.lifecycle.retire();
                kdebug!("dispatcher {} stopped: no watched lines", generation);
                return DispatchExit::Drained;
            }
            reg.snapshot()
        };

        shared.stats.cycles.fetch_add(1, Ordering::Relaxed);
        let ready = match shared.mux.wait(snapshot.set_mut()) {
            Ok(n) => n,
            Err(e) => return fail(&shared, generation, e),
        };

        if ready == 0 {
            shared.stats.wakeups.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        ktrace!("dispatcher {}: {} ready", generation, ready);
        if let Err(e) = dispatch_ready(&shared, &snapshot) {
            return fail(&shared, generation, e);
        }
    }
}

fn dispatch_ready(shared: &EngineShared, snapshot: &WaitSnapshot) -> GpioResult<()> {
    for (_, stream) in snapshot.ready() {
        let callback = {
            let reg = lock(&shared.registry);
            match reg.lookup(stream.handle()) {
                Some(entry) if Arc::ptr_eq(entry.stream(), stream) => entry.callback().clone(),
                _ => {
                    shared.stats.skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            }
        };

        let line = stream.line();
        let byte = stream.reset_and_read_byte()?;
        let value = decode_value(byte)
            .ok_or(ResourceError::new(ResourceOp::Read, Some(line), Errno::EINVAL))?;

        invoke(line, &callback, value)?;
        shared.stats.events.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

/// Run one callback, turning `Err` and panics into `CallbackError`
pub(crate) fn invoke(line: LineId, callback: &EdgeCallback, value: u8) -> Result<(), CallbackError> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CallbackError::Failed { line, message: e.to_string() }),
        Err(payload) => Err(CallbackError::Panicked { line, message: panic_message(&*payload) }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn fail(shared: &EngineShared, generation: u64, err: GpioError) -> DispatchExit {
    debug_assert!(err.is_fatal(), "non-fatal error stopped dispatch: {}", err);
    {
        let _reg = lock(&shared.registry);
        shared.lifecycle.fault();
        *lock(&shared.last_error) = Some(err.clone());
    }
    kerror!("dispatcher {} stopped: {}", generation, err);
    DispatchExit::Failed(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpioirq_core::CallbackResult;

    #[test]
    fn test_invoke_ok_and_err() {
        let line = LineId::new(4);
        let ok: EdgeCallback = Arc::new(|v| {
            assert_eq!(v, 1);
            Ok(())
        });
        assert!(invoke(line, &ok, 1).is_ok());

        let err: EdgeCallback = Arc::new(|_: u8| -> CallbackResult { Err("sensor offline".into()) });
        let e = invoke(line, &err, 0).unwrap_err();
        assert_eq!(
            e,
            CallbackError::Failed { line, message: "sensor offline".into() }
        );
    }

    #[test]
    fn test_invoke_catches_panic() {
        let line = LineId::new(9);
        let boom: EdgeCallback = Arc::new(|v| panic!("bad value {}", v));
        let e = invoke(line, &boom, 1).unwrap_err();
        assert_eq!(e, CallbackError::Panicked { line, message: "bad value 1".into() });

        let boom: EdgeCallback = Arc::new(|_| panic!("static"));
        let e = invoke(line, &boom, 0).unwrap_err();
        assert!(matches!(e, CallbackError::Panicked { message, .. } if message == "static"));
    }

    #[test]
    fn test_stats_snapshot() {
        let c = DispatchCounters::default();
        c.cycles.fetch_add(3, Ordering::Relaxed);
        c.events.fetch_add(2, Ordering::Relaxed);
        let s = c.snapshot();
        assert_eq!(s, DispatchStats { cycles: 3, wakeups: 0, events: 2, skipped: 0 });
    }
}
