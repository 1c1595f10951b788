//! GPIO line identifier type

use core::fmt;

/// Kernel number of a GPIO line (the `N` in `/sys/class/gpio/gpioN`)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct LineId(u32);

impl LineId {
    /// Create a new LineId from a raw line number
    #[inline]
    pub const fn new(line: u32) -> Self {
        LineId(line)
    }

    /// Get the raw line number
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Name of the line's sysfs directory, e.g. `gpio17`
    pub fn dir_name(self) -> String {
        format!("gpio{}", self.0)
    }
}

impl From<u32> for LineId {
    #[inline]
    fn from(line: u32) -> Self {
        LineId(line)
    }
}

impl From<LineId> for u32 {
    #[inline]
    fn from(line: LineId) -> Self {
        line.0
    }
}

impl fmt::Debug for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineId({})", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}
