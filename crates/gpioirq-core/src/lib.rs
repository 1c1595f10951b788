//! # gpioirq-core
//!
//! Core types and traits for the gpioirq edge-event engine.
//!
//! Nothing in here touches a GPIO line directly. The runtime crate
//! provides the Linux implementations of the traits below.
//!
//! ## Modules
//!
//! - `id` - GPIO line identifier
//! - `edge` - Edge-trigger and direction keywords, value byte decoding
//! - `error` - Error types
//! - `traits` - Value stream and multiplexer seams
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod edge;
pub mod error;
pub mod traits;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::LineId;
pub use edge::{Direction, Edge, decode_value};
pub use error::{
    CallbackError, CallbackResult, GpioError, GpioResult, RegistryError, ResourceError, ResourceOp,
};
pub use traits::{Multiplexer, ValueStream, WaitEntry};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};

/// Well-known constants
pub mod constants {
    /// Default sysfs GPIO class directory
    pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

    /// Default cap on simultaneously watched lines
    pub const DEFAULT_MAX_LINES: usize = 64;

    /// Default dispatcher thread name
    pub const DISPATCHER_THREAD_NAME: &str = "gpio-dispatch";

    /// Byte the kernel reports for a low line
    pub const VALUE_LOW: u8 = b'0';

    /// Byte the kernel reports for a high line
    pub const VALUE_HIGH: u8 = b'1';
}
