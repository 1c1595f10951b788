//! # gpioirq - GPIO edge events without busy-polling
//!
//! Register a callback per sysfs GPIO line; one background dispatcher
//! blocks in `poll(2)` on every watched `value` file and calls the
//! line's callback with the freshly read level (0 or 1) when the kernel
//! reports an edge.
//!
//! ## Quick Start
//!
//! ```ignore
//! use gpioirq::{Edge, SysfsLine};
//!
//! let line = SysfsLine::open("/sys/class/gpio", 17u32)?;
//! line.set_edge(Edge::Both)?;
//!
//! gpioirq::register(17u32, |value| {
//!     println!("gpio17 -> {}", value);
//!     Ok(())
//! })?;
//! // ...
//! gpioirq::deregister(17u32)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       User Code                          │
//! │          register(), deregister(), replace()             │
//! └──────────────────────────────────────────────────────────┘
//!                 │ registry lock             ▲ callback(value)
//!                 ▼                           │
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │    CallbackRegistry      │◀──│       Dispatcher         │
//! │  dense wait set + slots  │   │  one thread, generation  │
//! └──────────────────────────┘   └──────────────────────────┘
//!                 │ wake()                    │ wait()
//!                 ▼                           ▼
//!    ┌─────────────────────────────────────────────────────┐
//!    │   PollMultiplexer: [waker] + gpioN/value fds         │
//!    │        POLLPRI | POLLERR, no timeout                 │
//!    └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Environment
//!
//! - `GPIO_LOG_LEVEL` - off, error, warn, info, debug, trace
//! - `GPIO_FLUSH_EPRINT=1` - flush every log line
//! - `GPIO_SYSFS_ROOT`, `GPIO_MAX_LINES`, `GPIO_DISPATCHER_NAME`,
//!   `GPIO_DISPATCHER_STACK` - configuration of the global engine

// Re-export core types
pub use gpioirq_core::{
    LineId,
    Edge,
    Direction,
    GpioError,
    GpioResult,
    CallbackResult,
    CallbackError,
    RegistryError,
    ResourceError,
    ResourceOp,
    ValueStream,
    Multiplexer,
    WaitEntry,
};

// Re-export kprint macros for logging
pub use gpioirq_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use gpioirq_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use gpioirq_core::{env_get, env_get_bool, env_get_opt, env_get_str};

// Re-export runtime types
pub use gpioirq_runtime::{
    EngineConfig,
    InterruptEngine,
    CallbackRegistry,
    EdgeCallback,
    LifecycleController,
    RunState,
    PollMultiplexer,
    DispatchExit,
    DispatchStats,
    SysfsLine,
    SysfsValueStream,
    EdgeEvent,
    EdgeQueue,
};

/// The process-wide engine, created from `GPIO_*` variables on first use
pub fn engine() -> GpioResult<&'static InterruptEngine> {
    gpioirq_runtime::global()
}

/// Watch `line` on the global engine
///
/// The first registration starts the dispatcher thread; it stops again
/// once the last line is deregistered.
pub fn register<F>(line: impl Into<LineId>, callback: F) -> GpioResult<()>
where
    F: Fn(u8) -> CallbackResult + Send + Sync + 'static,
{
    engine()?.register(line, callback)
}

/// Stop watching `line` on the global engine
pub fn deregister(line: impl Into<LineId>) -> GpioResult<()> {
    engine()?.deregister(line)
}

/// Whether `line` is watched by the global engine
pub fn is_watched(line: impl Into<LineId>) -> bool {
    match engine() {
        Ok(engine) => engine.is_watched(line),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_engine_is_shared() {
        let a = engine().unwrap() as *const InterruptEngine;
        let b = engine().unwrap() as *const InterruptEngine;
        assert_eq!(a, b);
    }

    #[test]
    fn test_global_unknown_line() {
        // Nothing is registered on the global engine by these tests.
        assert!(!is_watched(4000u32));
        let err = deregister(4000u32).unwrap_err();
        assert_eq!(err, GpioError::Registry(RegistryError::NotWatched(LineId::new(4000))));
    }
}
