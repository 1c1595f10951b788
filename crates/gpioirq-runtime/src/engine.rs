//! InterruptEngine - registration front end and dispatcher owner
//!
//! The engine owns the registry, the lifecycle controller and the
//! multiplexer. Registration and deregistration run on the caller's
//! thread; they take the registry lock, mutate, decide the lifecycle
//! transition under the same lock, and kick the multiplexer afterwards
//! so a blocked dispatcher sees the new wait set.

use crate::config::EngineConfig;
use crate::dispatcher::{self, DispatchCounters, DispatchExit, DispatchStats};
use crate::lifecycle::{LifecycleController, RunState};
use crate::poller::PollMultiplexer;
use crate::registry::{CallbackRegistry, EdgeCallback};
use crate::sysfs::SysfsValueStream;
use gpioirq_core::{
    kdebug, kerror, kinfo, kwarn, CallbackResult, GpioError, GpioResult, LineId, Multiplexer,
    RegistryError, ValueStream,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

/// Lock, recovering the guard if a holder panicked
///
/// Callbacks never run under these locks, so a poisoned lock only means
/// a panic elsewhere; the protected data is still consistent.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the engine handle and its dispatcher thread
pub(crate) struct EngineShared {
    pub(crate) config: EngineConfig,
    pub(crate) registry: Mutex<CallbackRegistry>,
    pub(crate) lifecycle: LifecycleController,
    pub(crate) mux: Box<dyn Multiplexer>,
    pub(crate) shutdown: AtomicBool,
    pub(crate) stats: DispatchCounters,
    pub(crate) last_error: Mutex<Option<GpioError>>,
    thread: Mutex<Option<JoinHandle<DispatchExit>>>,
}

/// GPIO edge-event engine
///
/// Dropping the engine shuts the dispatcher down and joins it.
pub struct InterruptEngine {
    shared: Arc<EngineShared>,
}

impl InterruptEngine {
    /// Create an engine using `poll(2)` and sysfs value files
    pub fn new(config: EngineConfig) -> GpioResult<Self> {
        let mux = PollMultiplexer::new()?;
        Self::with_multiplexer(config, Box::new(mux))
    }

    /// Create an engine on a custom wait primitive
    pub fn with_multiplexer(config: EngineConfig, mux: Box<dyn Multiplexer>) -> GpioResult<Self> {
        config.validate().map_err(GpioError::Config)?;
        kdebug!(
            "engine: root={} max_lines={} mux={}",
            config.sysfs_root.display(),
            config.max_lines,
            mux.name()
        );
        let shared = EngineShared {
            registry: Mutex::new(CallbackRegistry::new(config.max_lines)),
            lifecycle: LifecycleController::new(),
            mux,
            shutdown: AtomicBool::new(false),
            stats: DispatchCounters::default(),
            last_error: Mutex::new(None),
            thread: Mutex::new(None),
            config,
        };
        Ok(Self { shared: Arc::new(shared) })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Watch `line` for edges, calling `callback` with each fresh value
    ///
    /// Opens `<sysfs_root>/gpio<N>/value`. The line must already be
    /// exported with its edge configured.
    pub fn register<F>(&self, line: impl Into<LineId>, callback: F) -> GpioResult<()>
    where
        F: Fn(u8) -> CallbackResult + Send + Sync + 'static,
    {
        self.register_callback(line.into(), Arc::new(callback))
    }

    /// Like `register`, with a shared callback
    ///
    /// Registering the callback a line already has is a no-op; a
    /// different callback is `RegistryError::AlreadyWatched`.
    pub fn register_callback(&self, line: LineId, callback: EdgeCallback) -> GpioResult<()> {
        if let Some(current) = self.callback(line) {
            if Arc::ptr_eq(&current, &callback) {
                return Ok(());
            }
            return Err(RegistryError::AlreadyWatched(line).into());
        }
        let stream = SysfsValueStream::open(&self.shared.config.sysfs_root, line)?;
        self.register_stream(Arc::new(stream), callback)
    }

    /// Watch an already opened value stream
    pub fn register_stream(
        &self,
        stream: Arc<dyn ValueStream>,
        callback: EdgeCallback,
    ) -> GpioResult<()> {
        let shared = &self.shared;
        let line = stream.line();

        let (needs_wake, previous) = {
            let mut reg = lock(&shared.registry);
            if shared.shutdown.load(Ordering::Acquire) {
                return Err(GpioError::ShutDown);
            }
            if let Some(entry) = reg.find_line(line) {
                if Arc::ptr_eq(entry.callback(), &callback) {
                    return Ok(());
                }
            }

            let slot = reg.add(stream, callback)?;
            kdebug!("watching {} in slot {} ({} lines)", line, slot, reg.size());

            match shared.lifecycle.activate() {
                Some(generation) => match self.spawn(generation) {
                    Ok(previous) => (false, previous),
                    Err(e) => {
                        shared.lifecycle.abort_activation();
                        reg.remove_line(line);
                        return Err(e);
                    }
                },
                None => (shared.lifecycle.is_active(), None),
            }
        };

        reap(previous);
        if needs_wake {
            shared.mux.wake()?;
        }
        Ok(())
    }

    /// Stop watching `line`
    ///
    /// Takes effect immediately: an edge already reported for the line
    /// but not yet dispatched is dropped. Closing the value stream may be
    /// deferred until the dispatcher finishes its current cycle.
    pub fn deregister(&self, line: impl Into<LineId>) -> GpioResult<()> {
        let line = line.into();
        let (removed, needs_wake) = {
            let mut reg = lock(&self.shared.registry);
            let removed = reg.remove_line(line);
            if removed.is_some() {
                kdebug!("unwatched {} ({} lines)", line, reg.size());
            }
            (removed, self.shared.lifecycle.is_active())
        };

        if removed.is_none() {
            return Err(RegistryError::NotWatched(line).into());
        }
        if needs_wake {
            self.shared.mux.wake()?;
        }
        Ok(())
    }

    /// Swap the callback of a watched line; returns the previous one
    pub fn replace<F>(&self, line: impl Into<LineId>, callback: F) -> GpioResult<EdgeCallback>
    where
        F: Fn(u8) -> CallbackResult + Send + Sync + 'static,
    {
        self.replace_callback(line.into(), Arc::new(callback))
    }

    pub fn replace_callback(&self, line: LineId, callback: EdgeCallback) -> GpioResult<EdgeCallback> {
        let old = lock(&self.shared.registry).replace_callback(line, callback)?;
        Ok(old)
    }

    /// Current callback of `line`
    pub fn callback(&self, line: impl Into<LineId>) -> Option<EdgeCallback> {
        let line = line.into();
        lock(&self.shared.registry)
            .find_line(line)
            .map(|e| e.callback().clone())
    }

    pub fn is_watched(&self, line: impl Into<LineId>) -> bool {
        let line = line.into();
        lock(&self.shared.registry).find_line(line).is_some()
    }

    /// Watched lines in wait-set slot order
    pub fn watched(&self) -> Vec<LineId> {
        lock(&self.shared.registry).iter().map(|e| e.line()).collect()
    }

    /// Number of watched lines
    pub fn size(&self) -> usize {
        lock(&self.shared.registry).size()
    }

    /// Run `f` with the registry locked
    ///
    /// `f` must not call back into the engine.
    pub fn with_registry<R>(&self, f: impl FnOnce(&CallbackRegistry) -> R) -> R {
        f(&lock(&self.shared.registry))
    }

    pub fn state(&self) -> RunState {
        self.shared.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.shared.lifecycle
    }

    pub fn stats(&self) -> DispatchStats {
        self.shared.stats.snapshot()
    }

    /// Error that stopped the most recent faulted dispatcher
    pub fn last_error(&self) -> Option<GpioError> {
        lock(&self.shared.last_error).clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Leave the `Faulted` state
    ///
    /// Starts a new dispatcher if lines are still watched. Returns
    /// `false` if the engine was not faulted.
    pub fn clear_fault(&self) -> GpioResult<bool> {
        let shared = &self.shared;
        let previous = {
            let reg = lock(&shared.registry);
            if !shared.lifecycle.clear_fault() {
                return Ok(false);
            }
            kinfo!("engine: fault cleared ({} lines watched)", reg.size());
            if reg.is_empty() || shared.shutdown.load(Ordering::Acquire) {
                None
            } else {
                match shared.lifecycle.activate() {
                    Some(generation) => match self.spawn(generation) {
                        Ok(previous) => previous,
                        Err(e) => {
                            shared.lifecycle.abort_activation();
                            return Err(e);
                        }
                    },
                    None => None,
                }
            }
        };
        reap(previous);
        Ok(true)
    }

    /// Stop the dispatcher and refuse further registrations
    ///
    /// Watched lines stay registered until the engine is dropped.
    /// Returns how the dispatcher exited, if one was running.
    pub fn shutdown(&self) -> Option<DispatchExit> {
        {
            let _reg = lock(&self.shared.registry);
            self.shared.shutdown.store(true, Ordering::Release);
        }
        if let Err(e) = self.shared.mux.wake() {
            kwarn!("engine: shutdown wake failed: {}", e);
        }
        self.join()
    }

    /// Wait for the current dispatcher thread to exit
    ///
    /// Returns `None` if no dispatcher was started since the last join,
    /// or when called from the dispatcher itself.
    pub fn join(&self) -> Option<DispatchExit> {
        let handle = lock(&self.shared.thread).take()?;
        if handle.thread().id() == thread::current().id() {
            return None;
        }
        match handle.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                kerror!("engine: dispatcher thread panicked");
                None
            }
        }
    }

    /// Start a dispatcher for `generation`; caller holds the registry lock
    ///
    /// Returns the handle of the previous (already retired) dispatcher.
    fn spawn(&self, generation: u64) -> GpioResult<Option<JoinHandle<DispatchExit>>> {
        let config = &self.shared.config;
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name, generation));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let shared = self.shared.clone();
        let handle = builder
            .spawn(move || dispatcher::run(shared, generation))
            .map_err(|e| GpioError::Spawn(e.to_string()))?;

        Ok(lock(&self.shared.thread).replace(handle))
    }
}

/// Join a retired dispatcher outside the registry lock
fn reap(previous: Option<JoinHandle<DispatchExit>>) {
    if let Some(handle) = previous {
        if handle.join().is_err() {
            kerror!("engine: dispatcher thread panicked");
        }
    }
}

impl Drop for InterruptEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for InterruptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptEngine")
            .field("state", &self.state())
            .field("mux", &self.shared.mux.name())
            .field("registry", &*lock(&self.shared.registry))
            .field("stats", &self.stats())
            .finish()
    }
}

static GLOBAL: OnceLock<InterruptEngine> = OnceLock::new();

/// Process-wide engine, configured from `GPIO_*` environment variables
/// on first use
pub fn global() -> GpioResult<&'static InterruptEngine> {
    if let Some(engine) = GLOBAL.get() {
        return Ok(engine);
    }
    let engine = InterruptEngine::new(EngineConfig::from_env())?;
    Ok(GLOBAL.get_or_init(|| engine))
}
