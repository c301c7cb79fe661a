// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::jpeg::DCT_BLOCK_SIZE;

/// Natural (raster) position of each zig-zag index.
///
/// The 16 trailing entries repeat the last position so that a decoder
/// running a few coefficients past the end of a block stays in bounds.
pub const JPEG_NATURAL_ORDER: [u32; DCT_BLOCK_SIZE + 16] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63, //
    63, 63, 63, 63, 63, 63, 63, 63, //
    63, 63, 63, 63, 63, 63, 63, 63, //
];

/// Zig-zag index of each natural (raster) position.
pub const JPEG_ZIGZAG_ORDER: [u32; DCT_BLOCK_SIZE] = [
    0, 1, 5, 6, 14, 15, 27, 28, //
    2, 4, 7, 13, 16, 26, 29, 42, //
    3, 8, 12, 17, 25, 30, 41, 43, //
    9, 11, 18, 24, 31, 40, 44, 53, //
    10, 19, 23, 32, 39, 45, 52, 54, //
    20, 22, 33, 38, 46, 51, 55, 60, //
    21, 34, 37, 47, 50, 56, 59, 61, //
    35, 36, 48, 49, 57, 58, 62, 63, //
];

/// Natural position of the coefficient at zig-zag index `zigzag`.
/// Indices in the padding range map to the last coefficient.
#[inline]
pub fn natural_position(zigzag: usize) -> usize {
    JPEG_NATURAL_ORDER[zigzag] as usize
}

/// Zig-zag index of the coefficient at natural position `natural`.
#[inline]
pub fn zigzag_position(natural: usize) -> usize {
    JPEG_ZIGZAG_ORDER[natural] as usize
}

fn is_permutation(table: &[u32]) -> bool {
    let mut seen = [false; DCT_BLOCK_SIZE];
    for &v in table {
        match seen.get_mut(v as usize) {
            Some(s) if !*s => *s = true,
            _ => return false,
        }
    }
    seen.iter().all(|&s| s)
}

fn find_problem() -> Option<&'static str> {
    let (natural, padding) = JPEG_NATURAL_ORDER.split_at(DCT_BLOCK_SIZE);
    if !is_permutation(natural) {
        return Some("natural order is not a permutation of 0..64");
    }
    if padding.iter().any(|&v| v as usize != DCT_BLOCK_SIZE - 1) {
        return Some("natural order padding must repeat the last position");
    }
    if !is_permutation(&JPEG_ZIGZAG_ORDER) {
        return Some("zig-zag order is not a permutation of 0..64");
    }
    if (0..DCT_BLOCK_SIZE).any(|i| natural_position(zigzag_position(i)) != i) {
        return Some("natural and zig-zag orders are not inverse");
    }
    None
}

/// Verifies the fixed tables. The result is computed once per process.
pub fn check_coeff_orders() -> Result<()> {
    static PROBLEM: OnceLock<Option<&'static str>> = OnceLock::new();
    match *PROBLEM.get_or_init(find_problem) {
        Some(problem) => Err(Error::InvalidCoeffOrder(problem)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    #[test]
    fn tables_are_valid() {
        check_coeff_orders().unwrap();
    }

    #[test]
    fn inverse_both_ways() {
        for i in 0..DCT_BLOCK_SIZE {
            assert_eq!(natural_position(zigzag_position(i)), i);
            assert_eq!(zigzag_position(natural_position(i)), i);
        }
    }

    #[test]
    fn known_positions() {
        assert_eq!(natural_position(0), 0);
        assert_eq!(natural_position(2), 8);
        assert_eq!(zigzag_position(8), 2);
        assert_eq!(natural_position(63), 63);
        for i in DCT_BLOCK_SIZE..JPEG_NATURAL_ORDER.len() {
            assert_eq!(natural_position(i), 63);
        }
    }

    #[test]
    fn permutation_check_rejects_duplicates() {
        let mut table = JPEG_ZIGZAG_ORDER;
        table[5] = table[6];
        assert!(!is_permutation(&table));
        assert!(!is_permutation(&[64]));
    }
}
