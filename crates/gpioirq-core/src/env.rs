//! Environment variable utilities
//!
//! Every `GPIO_*` knob read by the engine goes through these helpers.
//!
//! ```ignore
//! use gpioirq_core::env::{env_get, env_get_str};
//!
//! let max_lines: usize = env_get("GPIO_MAX_LINES", 64);
//! let root = env_get_str("GPIO_SYSFS_ROOT", "/sys/class/gpio");
//! ```

use std::str::FromStr;

/// Get environment variable parsed as `T`, or `default` if unset or unparsable
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (any case) are true; any other set value is
/// false. Unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as `Some(T)` if set and parsable
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or `default`
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name; tests run in parallel.

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__GPIOIRQ_UNSET_1__", 42);
        assert_eq!(val, 42);
        assert_eq!(env_get_str("__GPIOIRQ_UNSET_1__", "x"), "x");
        assert!(env_get_opt::<u32>("__GPIOIRQ_UNSET_1__").is_none());
    }

    #[test]
    fn test_env_get_set_var() {
        std::env::set_var("__GPIOIRQ_NUM__", " 17 ");
        let val: u32 = env_get("__GPIOIRQ_NUM__", 0);
        assert_eq!(val, 17);
        std::env::remove_var("__GPIOIRQ_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__GPIOIRQ_BAD__", "seventeen");
        let val: u32 = env_get("__GPIOIRQ_BAD__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__GPIOIRQ_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for (raw, expected) in [("1", true), ("TRUE", true), ("on", true), ("0", false), ("nope", false)] {
            std::env::set_var("__GPIOIRQ_BOOL__", raw);
            assert_eq!(env_get_bool("__GPIOIRQ_BOOL__", !expected), expected, "{}", raw);
        }
        std::env::remove_var("__GPIOIRQ_BOOL__");
        assert!(env_get_bool("__GPIOIRQ_BOOL__", true));
    }
}
