//! Two's-complement helpers for arbitrary-precision integers.
//!
//! Width inference, Verilog literal printing and the simulator all agree on
//! these definitions, so they live here rather than in any one of them.

use num_bigint::{BigInt, Sign};
use num_traits::{One, Zero};

/// Returns the minimum number of bits needed to represent `n`.
///
/// Non-positive values always need a sign bit. Zero needs one bit. With
/// `require_sign_bit`, positive values get one extra bit so that they stay
/// positive when interpreted as signed.
pub fn bits_for(n: &BigInt, require_sign_bit: bool) -> u32 {
    if n.sign() == Sign::Plus {
        let r = n.bits() as u32;
        if require_sign_bit {
            r + 1
        } else {
            r
        }
    } else if n.is_zero() {
        1
    } else {
        let magnitude_minus_one: BigInt = -n - BigInt::one();
        magnitude_minus_one.bits() as u32 + 1
    }
}

/// Returns `2^width - 1`.
pub fn mask(width: u32) -> BigInt {
    (BigInt::one() << width as usize) - BigInt::one()
}

/// Truncates `value` to `width` bits and reinterprets the result.
///
/// The result lies in `[0, 2^width)` when unsigned and in
/// `[-2^(width-1), 2^(width-1))` when signed. A zero width yields zero.
pub fn wrap(value: &BigInt, width: u32, signed: bool) -> BigInt {
    if width == 0 {
        return BigInt::zero();
    }
    let raw = to_bits(value, width);
    if signed && raw.bit(u64::from(width - 1)) {
        raw - (BigInt::one() << width as usize)
    } else {
        raw
    }
}

/// Returns the two's-complement bit pattern of `value` truncated to `width`
/// bits, as a non-negative integer.
pub fn to_bits(value: &BigInt, width: u32) -> BigInt {
    let modulus = BigInt::one() << width as usize;
    let r = value % &modulus;
    if r.sign() == Sign::Minus {
        r + modulus
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(n: i64) -> BigInt {
        BigInt::from(n)
    }

    #[test]
    fn bits_for_unsigned() {
        assert_eq!(bits_for(&b(0), false), 1);
        assert_eq!(bits_for(&b(1), false), 1);
        assert_eq!(bits_for(&b(7), false), 3);
        assert_eq!(bits_for(&b(8), false), 4);
        assert_eq!(bits_for(&b(255), false), 8);
    }

    #[test]
    fn bits_for_negative() {
        assert_eq!(bits_for(&b(-1), false), 1);
        assert_eq!(bits_for(&b(-2), false), 2);
        assert_eq!(bits_for(&b(-3), false), 3);
        assert_eq!(bits_for(&b(-4), false), 3);
        assert_eq!(bits_for(&b(-5), false), 4);
    }

    #[test]
    fn bits_for_with_sign_bit() {
        assert_eq!(bits_for(&b(7), true), 4);
        assert_eq!(bits_for(&b(0), true), 1);
        assert_eq!(bits_for(&b(-8), true), 4);
    }

    #[test]
    fn mask_values() {
        assert_eq!(mask(0), b(0));
        assert_eq!(mask(4), b(15));
        assert_eq!(mask(8), b(255));
    }

    #[test]
    fn wrap_unsigned() {
        assert_eq!(wrap(&b(16), 4, false), b(0));
        assert_eq!(wrap(&b(17), 4, false), b(1));
        assert_eq!(wrap(&b(-1), 4, false), b(15));
    }

    #[test]
    fn wrap_signed() {
        assert_eq!(wrap(&b(7), 4, true), b(7));
        assert_eq!(wrap(&b(8), 4, true), b(-8));
        assert_eq!(wrap(&b(15), 4, true), b(-1));
        assert_eq!(wrap(&b(-9), 4, true), b(7));
    }

    #[test]
    fn wrap_zero_width() {
        assert_eq!(wrap(&b(5), 0, false), b(0));
    }

    #[test]
    fn to_bits_negative() {
        assert_eq!(to_bits(&b(-1), 8), b(255));
        assert_eq!(to_bits(&b(-128), 8), b(128));
        assert_eq!(to_bits(&b(300), 8), b(44));
    }
}
