//! Edge-trigger and direction keywords
//!
//! These are the exact strings the kernel accepts in the `edge` and
//! `direction` attribute files. Only the write side is modelled; the
//! attribute text is never parsed back.

use crate::constants::{VALUE_HIGH, VALUE_LOW};
use core::fmt;

/// Interrupt trigger configured in a line's `edge` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// No interrupts
    None,
    /// Low-to-high transitions
    Rising,
    /// High-to-low transitions
    Falling,
    /// Both transitions
    Both,
}

impl Edge {
    /// Keyword written to the `edge` file
    pub const fn as_str(self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }

    /// Whether this trigger produces edge events at all
    pub const fn is_armed(self) -> bool {
        !matches!(self, Edge::None)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line direction configured in a line's `direction` file
///
/// `Low` and `High` configure an output and set its initial level in
/// one glitch-free write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
    Low,
    High,
}

impl Direction {
    /// Keyword written to the `direction` file
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Low => "low",
            Direction::High => "high",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode the single byte read from a `value` file into 0 or 1
///
/// Returns `None` for anything but ASCII `'0'` / `'1'`.
#[inline]
pub const fn decode_value(byte: u8) -> Option<u8> {
    match byte {
        VALUE_LOW => Some(0),
        VALUE_HIGH => Some(1),
        _ => None,
    }
}

/// Encode a level as the byte written to a `value` file
#[inline]
pub const fn encode_value(high: bool) -> u8 {
    if high { VALUE_HIGH } else { VALUE_LOW }
}
