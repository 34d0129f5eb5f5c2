//! Bit width and signedness of hardware values.

use kiln_common::bits_for;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The bit width and two's-complement signedness of a value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Shape {
    /// Number of bits.
    pub width: u32,
    /// Whether the bits are interpreted as two's complement.
    pub signed: bool,
}

impl Shape {
    /// An unsigned shape of `width` bits.
    pub const fn unsigned(width: u32) -> Self {
        Self {
            width,
            signed: false,
        }
    }

    /// A signed shape of `width` bits.
    pub const fn signed(width: u32) -> Self {
        Self {
            width,
            signed: true,
        }
    }

    /// The smallest shape holding every integer in `min..max`.
    ///
    /// The shape is signed iff `min` is negative. An empty range is treated
    /// as the single value `min`.
    pub fn from_range(min: impl Into<BigInt>, max: impl Into<BigInt>) -> Self {
        let min = min.into();
        let max = max.into();
        let max_incl = if max > min { max - 1 } else { min.clone() };
        let signed = min.sign() == num_bigint::Sign::Minus;
        let width = bits_for(&min, signed).max(bits_for(&max_incl, signed));
        Self { width, signed }
    }

    /// The smallest shape holding `value`; negative values are signed.
    pub fn for_value(value: &BigInt) -> Self {
        let signed = value.sign() == num_bigint::Sign::Minus;
        Self {
            width: bits_for(value, false),
            signed,
        }
    }
}

impl From<u32> for Shape {
    fn from(width: u32) -> Self {
        Shape::unsigned(width)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signed {
            write!(f, "signed({})", self.width)
        } else {
            write!(f, "unsigned({})", self.width)
        }
    }
}
