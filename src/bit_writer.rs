// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use byteorder::{ByteOrder, LittleEndian};

use crate::bit_reader::MAX_BITS_PER_CALL;

/// Writes bits in the same order in which [`BitReader`](crate::bit_reader::BitReader)
/// reads them: least significant bit first.
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_buf: u64,
    bits_in_buf: usize,
}

impl BitWriter {
    pub fn new() -> BitWriter {
        BitWriter::default()
    }

    /// Appends the low `num` bits of `value`.
    /// ```
    /// # use jxl_jpeg::bit_writer::BitWriter;
    /// let mut bw = BitWriter::new();
    /// bw.write(8, 0);
    /// bw.write(4, 1);
    /// bw.write(4, 0);
    /// assert_eq!(bw.total_bits_written(), 16);
    /// assert_eq!(bw.finalize(), vec![0, 1]);
    /// ```
    pub fn write(&mut self, num: usize, value: u64) {
        debug_assert!(num <= MAX_BITS_PER_CALL);
        debug_assert!(value >> num == 0);
        self.bit_buf |= value << self.bits_in_buf;
        self.bits_in_buf += num;
        if self.bits_in_buf >= 8 {
            self.flush_bytes();
        }
    }

    pub fn total_bits_written(&self) -> usize {
        self.data.len() * 8 + self.bits_in_buf
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn zero_pad_to_byte(&mut self) {
        let padding = (8 - self.bits_in_buf % 8) % 8;
        self.write(padding, 0);
    }

    /// Returns the written bytes, zero-padding the last partial byte.
    pub fn finalize(mut self) -> Vec<u8> {
        self.zero_pad_to_byte();
        self.data
    }

    fn flush_bytes(&mut self) {
        let num_bytes = self.bits_in_buf / 8;
        let mut bytes = [0u8; 8];
        LittleEndian::write_u64(&mut bytes, self.bit_buf);
        self.data.extend_from_slice(&bytes[..num_bytes]);
        self.bit_buf >>= num_bytes * 8;
        self.bits_in_buf -= num_bytes * 8;
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::bit_reader::BitReader;

    #[test]
    fn write_then_read() {
        arbtest::arbtest(|u| {
            let num_values = u.int_in_range(0..=64)?;
            let mut values = Vec::with_capacity(num_values);
            let mut bw = BitWriter::new();
            for _ in 0..num_values {
                let nbits = u.int_in_range(0..=MAX_BITS_PER_CALL)?;
                let value = u.int_in_range(0..=u64::MAX)? & ((1u64 << nbits) - 1);
                bw.write(nbits, value);
                values.push((nbits, value));
            }
            let total = bw.total_bits_written();
            let bytes = bw.finalize();
            assert_eq!(bytes.len(), total.div_ceil(8));
            let mut br = BitReader::new(&bytes);
            for (nbits, value) in values {
                assert_eq!(br.read(nbits).unwrap(), value);
            }
            br.jump_to_byte_boundary().unwrap();
            Ok(())
        });
    }

    #[test]
    fn pads_with_zeros() {
        let mut bw = BitWriter::new();
        bw.write(3, 0b101);
        assert_eq!(bw.total_bits_written(), 3);
        assert_eq!(bw.finalize(), vec![0b101]);
    }
}
