//! # gpioirq-runtime
//!
//! Linux implementation of the gpioirq edge-event engine.
//!
//! This crate provides:
//! - The callback registry and its dense wait set
//! - The lifecycle controller that starts and retires the dispatcher
//! - The dispatcher thread (`poll(2)` on `POLLPRI | POLLERR`)
//! - A wake-up handle kept in every wait set (eventfd, or a self-pipe)
//! - Sysfs value streams and line attribute writes
//! - A queue handoff for callers that want events on their own thread

pub mod config;
pub mod registry;
pub mod lifecycle;
pub mod waker;
pub mod poller;
pub mod dispatcher;
pub mod engine;
pub mod sysfs;
pub mod queue;

#[cfg(test)]
mod mock;

// Re-exports
pub use config::EngineConfig;
pub use registry::{CallbackRegistry, EdgeCallback, WaitSnapshot, WatchedHandle};
pub use lifecycle::{LifecycleController, RunState};
pub use poller::PollMultiplexer;
pub use dispatcher::{DispatchExit, DispatchStats};
pub use engine::{global, InterruptEngine};
pub use waker::{new_waker, Waker};
pub use sysfs::{SysfsLine, SysfsValueStream};
pub use queue::{EdgeEvent, EdgeQueue};
