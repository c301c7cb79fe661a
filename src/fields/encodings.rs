// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::error::{Error, Result};

/// Distribution of a `u32` value for one selector: either a power of two sized
/// range starting at an offset, or a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum U32 {
    Bits(usize),
    BitsOffset { n: usize, off: u32 },
    Val(u32),
}

fn fits_in_bits(value: u32, n: usize) -> bool {
    n >= 32 || value >> n == 0
}

impl U32 {
    pub fn read(&self, br: &mut BitReader) -> Result<u32> {
        match *self {
            U32::Bits(n) => Ok(br.read(n)? as u32),
            U32::BitsOffset { n, off } => (br.read(n)? as u32)
                .checked_add(off)
                .ok_or(Error::ValueOverflow),
            U32::Val(val) => Ok(val),
        }
    }

    /// Number of extra bits needed to signal `value`, or `None` if this
    /// distribution cannot represent it.
    pub fn cost(&self, value: u32) -> Option<usize> {
        match *self {
            U32::Bits(n) => fits_in_bits(value, n).then_some(n),
            U32::BitsOffset { n, off } => value
                .checked_sub(off)
                .filter(|v| fits_in_bits(*v, n))
                .map(|_| n),
            U32::Val(val) => (val == value).then_some(0),
        }
    }

    pub fn write(&self, bw: &mut BitWriter, value: u32) -> Result<()> {
        if self.cost(value).is_none() {
            return Err(Error::ValueNotRepresentable(value));
        }
        match *self {
            U32::Bits(n) => bw.write(n, value as u64),
            U32::BitsOffset { n, off } => bw.write(n, (value - off) as u64),
            U32::Val(_) => {}
        }
        Ok(())
    }

    /// Largest value this distribution can produce.
    pub fn max_value(&self) -> u64 {
        match *self {
            U32::Bits(n) => (1u64 << n) - 1,
            U32::BitsOffset { n, off } => off as u64 + (1u64 << n) - 1,
            U32::Val(val) => val as u64,
        }
    }
}

/// How a `u32` field is signaled: a single distribution, or four
/// distributions chosen by a 2-bit selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum U32Coder {
    Direct(U32),
    Select(U32, U32, U32, U32),
}

impl U32Coder {
    pub fn read(&self, br: &mut BitReader) -> Result<u32> {
        match self {
            U32Coder::Direct(u) => u.read(br),
            U32Coder::Select(u0, u1, u2, u3) => {
                let selector = br.read(2)?;
                match selector {
                    0 => u0.read(br),
                    1 => u1.read(br),
                    2 => u2.read(br),
                    _ => u3.read(br),
                }
            }
        }
    }

    /// Picks the cheapest selector able to represent `value`. Ties go to the
    /// lowest selector.
    pub fn choose_selector(&self, value: u32) -> Option<(u64, U32)> {
        match *self {
            U32Coder::Direct(u) => u.cost(value).map(|_| (0, u)),
            U32Coder::Select(u0, u1, u2, u3) => [u0, u1, u2, u3]
                .into_iter()
                .enumerate()
                .filter_map(|(s, u)| u.cost(value).map(|cost| (cost, s as u64, u)))
                .min_by_key(|&(cost, s, _)| (cost, s))
                .map(|(_, s, u)| (s, u)),
        }
    }

    pub fn write(&self, bw: &mut BitWriter, value: u32) -> Result<()> {
        let (selector, u) = self
            .choose_selector(value)
            .ok_or(Error::ValueNotRepresentable(value))?;
        if let U32Coder::Select(..) = self {
            bw.write(2, selector);
        }
        u.write(bw, value)
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    const SIZE_CODER: U32Coder = U32Coder::Select(
        U32::Val(0),
        U32::BitsOffset { n: 4, off: 1 },
        U32::BitsOffset { n: 8, off: 17 },
        U32::BitsOffset { n: 12, off: 273 },
    );

    #[test]
    fn selects_cheapest_distribution() {
        assert_eq!(SIZE_CODER.choose_selector(0), Some((0, U32::Val(0))));
        assert_eq!(SIZE_CODER.choose_selector(16).map(|x| x.0), Some(1));
        assert_eq!(SIZE_CODER.choose_selector(17).map(|x| x.0), Some(2));
        assert_eq!(SIZE_CODER.choose_selector(4368).map(|x| x.0), Some(3));
        assert_eq!(SIZE_CODER.choose_selector(4369), None);
    }

    #[test]
    fn overlapping_ranges_prefer_fewer_bits() {
        let coder = U32Coder::Select(
            U32::Bits(8),
            U32::Val(3),
            U32::Bits(2),
            U32::Val(200),
        );
        assert_eq!(coder.choose_selector(3), Some((1, U32::Val(3))));
        assert_eq!(coder.choose_selector(2), Some((2, U32::Bits(2))));
        assert_eq!(coder.choose_selector(200), Some((3, U32::Val(200))));
        assert_eq!(coder.choose_selector(100), Some((0, U32::Bits(8))));
    }

    #[test]
    fn direct_bits_32() {
        let coder = U32Coder::Direct(U32::Bits(32));
        let mut bw = BitWriter::new();
        coder.write(&mut bw, u32::MAX).unwrap();
        let bytes = bw.finalize();
        assert_eq!(bytes, vec![0xff; 4]);
        assert_eq!(coder.read(&mut BitReader::new(&bytes)).unwrap(), u32::MAX);
    }

    #[test]
    fn offset_overflow_is_an_error() {
        let u = U32::BitsOffset {
            n: 8,
            off: u32::MAX - 10,
        };
        assert!(matches!(
            u.read(&mut BitReader::new(&[0xff])),
            Err(Error::ValueOverflow)
        ));
        assert_eq!(u.cost(u32::MAX), Some(8));
    }
}
