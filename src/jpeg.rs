// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! JPEG bitstream reconstruction data.
//!
//! A JPEG file recompressed into JPEG XL keeps its DCT coefficients in the
//! codestream and everything else needed to rebuild the exact original bytes
//! in the `jbrd` box. [`JpegData`] holds that information: tables, scan
//! layout, marker order, raw metadata segments and the bytes in between.

pub mod app_markers;
pub mod coeff_order;
mod data;
mod geometry;
pub mod markers;
mod visit;

pub use app_markers::{
    extract_icc_profile, set_exif_from_blob, set_icc_from_profile, set_xmp_from_blob,
    split_icc_profile, ICC_HEADER_SIZE,
};
pub use data::*;
pub use markers::HuffmanSlots;

pub const DCT_BLOCK_SIZE: usize = 64;
pub const MAX_COMPONENTS: usize = 4;
pub const MAX_QUANT_TABLES: usize = 4;
pub const MAX_HUFFMAN_CODES: usize = 512;
/// DC and AC tables each have slots 0 to 3.
pub const NUM_HUFFMAN_SLOTS: u32 = 4;
pub const MAX_DIM_PIXELS: u32 = 65535;
pub const MAX_MARKERS: usize = 16384;
pub const MAX_TAIL_DATA: u32 = 4260096;
pub const MAX_NUM_PASSES: u32 = 11;

pub const JPEG_HUFFMAN_MAX_BIT_LENGTH: usize = 16;
pub const JPEG_HUFFMAN_ALPHABET_SIZE: usize = 256;
