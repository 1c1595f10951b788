//! Engine configuration

use gpioirq_core::constants::{DEFAULT_MAX_LINES, DEFAULT_SYSFS_ROOT, DISPATCHER_THREAD_NAME};
use gpioirq_core::env::{env_get, env_get_opt, env_get_str};
use std::path::PathBuf;

/// Smallest dispatcher stack we accept; callbacks run on it.
const MIN_STACK_SIZE: usize = 16 * 1024;

/// Configuration for an `InterruptEngine`
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the `gpioN` line directories (default: /sys/class/gpio)
    pub sysfs_root: PathBuf,

    /// Maximum number of simultaneously watched lines (default: 64)
    pub max_lines: usize,

    /// Dispatcher thread name prefix; the generation is appended (default: "gpio-dispatch")
    pub thread_name: String,

    /// Stack size for the dispatcher thread (None = system default)
    pub stack_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            max_lines: DEFAULT_MAX_LINES,
            thread_name: DISPATCHER_THREAD_NAME.into(),
            stack_size: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by environment variables
    ///
    /// - `GPIO_SYSFS_ROOT` - sysfs GPIO class directory
    /// - `GPIO_MAX_LINES` - wait set capacity
    /// - `GPIO_DISPATCHER_NAME` - dispatcher thread name prefix
    /// - `GPIO_DISPATCHER_STACK` - dispatcher stack size in bytes
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sysfs_root: PathBuf::from(env_get_str("GPIO_SYSFS_ROOT", DEFAULT_SYSFS_ROOT)),
            max_lines: env_get("GPIO_MAX_LINES", defaults.max_lines),
            thread_name: env_get_str("GPIO_DISPATCHER_NAME", DISPATCHER_THREAD_NAME),
            stack_size: env_get_opt("GPIO_DISPATCHER_STACK"),
        }
    }

    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    pub fn max_lines(mut self, n: usize) -> Self {
        self.max_lines = n;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_lines == 0 {
            return Err("max_lines must be at least 1");
        }
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty");
        }
        if self.thread_name.contains('\0') {
            return Err("thread_name must not contain NUL");
        }
        if matches!(self.stack_size, Some(s) if s < MIN_STACK_SIZE) {
            return Err("stack_size below 16 KiB");
        }
        Ok(())
    }
}
