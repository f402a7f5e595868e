// value.rs - Fixed-width bit vectors
//
// Every value carried by the hardware model has an explicit width between 1
// and 64 bits. The bits above the width are always zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest value the model supports
pub const MAX_WIDTH: u32 = 64;

/// A bit vector of `width` bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value {
    width: u32,
    bits: u64,
}

fn mask(width: u32) -> u64 {
    if width >= MAX_WIDTH {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Is `width` representable?
pub fn valid_width(width: u32) -> bool {
    (1..=MAX_WIDTH).contains(&width)
}

impl Value {
    /// Build a value, truncating `bits` to `width`. Widths outside 1..=64 are
    /// clamped into range.
    pub fn new(width: u32, bits: u64) -> Self {
        let width = width.clamp(1, MAX_WIDTH);
        Value {
            width,
            bits: bits & mask(width),
        }
    }

    pub fn zero(width: u32) -> Self {
        Value::new(width, 0)
    }

    /// 32-bit value from a signed immediate
    pub fn from_i32(n: i32) -> Self {
        Value::new(32, n as u32 as u64)
    }

    pub fn from_bool(b: bool) -> Self {
        Value::new(1, b as u64)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// Two's complement interpretation
    pub fn signed(&self) -> i64 {
        let shift = MAX_WIDTH - self.width;
        ((self.bits << shift) as i64) >> shift
    }

    pub fn is_true(&self) -> bool {
        self.bits != 0
    }

    /// Zero-extend or truncate to `width`
    pub fn zext(&self, width: u32) -> Self {
        Value::new(width, self.bits)
    }

    /// Sign-extend or truncate to `width`
    pub fn sext(&self, width: u32) -> Self {
        Value::new(width, self.signed() as u64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'d{}", self.width, self.bits)
    }
}
