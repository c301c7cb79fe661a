// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_traits::{NumCast, PrimInt};

use crate::error::{Error, Result};

/// Computes `ceil(a / b)` in the integer type of `a`.
///
/// `b` is converted to `T` first; the conversion fails instead of truncating
/// if `b` does not fit. Negative operands, a zero divisor and overflow of the
/// intermediate sum are all reported as [`Error::ArithmeticOverflow`].
/// ```
/// # use jxl_jpeg::util::div_ceil;
/// assert_eq!(div_ceil(17u32, 8u8)?, 3);
/// assert_eq!(div_ceil(16i64, 8i32)?, 2);
/// assert!(div_ceil(1u8, 256u32).is_err());
/// # Ok::<(), jxl_jpeg::error::Error>(())
/// ```
pub fn div_ceil<T: PrimInt, D: PrimInt>(a: T, b: D) -> Result<T> {
    let b = <T as NumCast>::from(b).ok_or(Error::ArithmeticOverflow)?;
    if a < T::zero() || b <= T::zero() {
        return Err(Error::ArithmeticOverflow);
    }
    let biased = a
        .checked_add(&(b - T::one()))
        .ok_or(Error::ArithmeticOverflow)?;
    Ok(biased / b)
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn matches_float_ceil() {
        arbtest::arbtest(|u| {
            let a = u.int_in_range(0..=1u32 << 20)?;
            let b = u.int_in_range(1..=1u16 << 12)?;
            let expected = (a as f64 / b as f64).ceil() as u32;
            assert_eq!(div_ceil(a, b).unwrap(), expected);
            Ok(())
        });
    }

    #[test]
    fn exact_division() {
        assert_eq!(div_ceil(64usize, 8usize).unwrap(), 8);
        assert_eq!(div_ceil(0i32, 8i32).unwrap(), 0);
        assert_eq!(div_ceil(65i64, 8u8).unwrap(), 9);
    }

    #[test]
    fn rejects_narrowing_divisor() {
        assert!(matches!(
            div_ceil(10u8, 300u16),
            Err(Error::ArithmeticOverflow)
        ));
        assert!(matches!(div_ceil(10i32, -3i32), Err(Error::ArithmeticOverflow)));
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            div_ceil(u32::MAX, 2u32),
            Err(Error::ArithmeticOverflow)
        ));
        assert!(matches!(div_ceil(5u32, 0u32), Err(Error::ArithmeticOverflow)));
        assert_eq!(div_ceil(u32::MAX, 1u32).unwrap(), u32::MAX);
    }
}
