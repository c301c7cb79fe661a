// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::BTreeMap;

use num_derive::FromPrimitive;

use crate::error::{Error, Result};
use crate::fields::Fields;
use crate::jpeg::{
    coeff_order::check_coeff_orders, DCT_BLOCK_SIZE, JPEG_HUFFMAN_ALPHABET_SIZE,
    JPEG_HUFFMAN_MAX_BIT_LENGTH, MAX_COMPONENTS, MAX_DIM_PIXELS, MAX_HUFFMAN_CODES,
    MAX_NUM_PASSES, MAX_QUANT_TABLES, NUM_HUFFMAN_SLOTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum AppMarkerType {
    #[default]
    Unknown = 0,
    Icc = 1,
    Exif = 2,
    Xmp = 3,
}

/// How component ids are coded in `jbrd`. Anything but `Custom` implies a
/// fixed list of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum JpegComponentType {
    Gray = 0,
    YCbCr = 1,
    Rgb = 2,
    Custom = 3,
}

impl JpegComponentType {
    pub fn ids(&self) -> &'static [u32] {
        match self {
            JpegComponentType::Gray => &[1],
            JpegComponentType::YCbCr => &[1, 2, 3],
            JpegComponentType::Rgb => &[b'R' as u32, b'G' as u32, b'B' as u32],
            JpegComponentType::Custom => &[],
        }
    }

    pub fn of(components: &[JpegComponent]) -> JpegComponentType {
        let ids = components.iter().map(|c| c.id);
        [
            JpegComponentType::Gray,
            JpegComponentType::YCbCr,
            JpegComponentType::Rgb,
        ]
        .into_iter()
        .find(|t| ids.clone().eq(t.ids().iter().copied()))
        .unwrap_or(JpegComponentType::Custom)
    }
}

#[derive(Fields, Debug, Clone, PartialEq)]
pub struct JpegQuantTable {
    /// 0 for 8-bit values, 1 for 16-bit values.
    #[coder(Bits(1))]
    pub precision: u32,
    /// Table slot (0-3) this table was defined in.
    #[coder(Bits(2))]
    pub index: u32,
    /// Whether this is the last table of its DQT marker.
    #[default(true)]
    pub is_last: bool,
    /// Quantization values in zig-zag order.
    #[skip]
    #[default([0; DCT_BLOCK_SIZE])]
    pub values: [i32; DCT_BLOCK_SIZE],
}

#[derive(Debug, Clone, PartialEq)]
pub struct JpegHuffmanCode {
    /// `counts[i]` is the number of symbols with an `i`-bit code.
    pub counts: [u32; JPEG_HUFFMAN_MAX_BIT_LENGTH + 1],
    /// Symbols ordered by code length, ending with the sentinel symbol 256.
    pub values: Vec<u32>,
    pub is_ac: bool,
    /// Table slot (0-3) within its class.
    pub id: u32,
    /// Whether this is the last code of its DHT marker.
    pub is_last: bool,
}

impl JpegHuffmanCode {
    pub fn new() -> JpegHuffmanCode {
        JpegHuffmanCode {
            counts: [0; JPEG_HUFFMAN_MAX_BIT_LENGTH + 1],
            values: Vec::new(),
            is_ac: false,
            id: 0,
            is_last: true,
        }
    }

    /// The slot as written in the DHT marker: the class in bit 4, the id
    /// in the low bits.
    pub fn slot_id(&self) -> u32 {
        ((self.is_ac as u32) << 4) | self.id
    }

    pub fn num_symbols(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }
}

impl Default for JpegHuffmanCode {
    fn default() -> JpegHuffmanCode {
        JpegHuffmanCode::new()
    }
}

#[derive(Fields, Debug, Clone, PartialEq)]
pub struct JpegComponent {
    #[skip]
    pub id: u32,
    #[skip]
    #[default(1)]
    pub h_samp_factor: u32,
    #[skip]
    #[default(1)]
    pub v_samp_factor: u32,
    #[coder(u2S(0, 1, 2, 3))]
    pub quant_idx: u32,
    #[skip]
    pub width_in_blocks: u32,
    #[skip]
    pub height_in_blocks: u32,
    /// Quantized coefficients, one block of 64 after the other in raster
    /// order of blocks.
    #[skip]
    pub coeffs: Vec<i16>,
}

impl JpegComponent {
    pub fn num_blocks(&self) -> usize {
        self.width_in_blocks as usize * self.height_in_blocks as usize
    }

    fn block_range(&self, bx: usize, by: usize) -> Option<std::ops::Range<usize>> {
        if bx >= self.width_in_blocks as usize || by >= self.height_in_blocks as usize {
            return None;
        }
        let start = (by * self.width_in_blocks as usize + bx) * DCT_BLOCK_SIZE;
        Some(start..start + DCT_BLOCK_SIZE)
    }

    /// Coefficients of the block at (`bx`, `by`), or `None` if the block is
    /// outside the component or not allocated.
    pub fn block(&self, bx: usize, by: usize) -> Option<&[i16]> {
        self.coeffs.get(self.block_range(bx, by)?)
    }

    pub fn block_mut(&mut self, bx: usize, by: usize) -> Option<&mut [i16]> {
        let range = self.block_range(bx, by)?;
        self.coeffs.get_mut(range)
    }
}

#[derive(Fields, Debug, Clone, Copy, PartialEq)]
pub struct JpegComponentScanInfo {
    #[coder(Bits(2))]
    pub comp_idx: u32,
    #[coder(Bits(2))]
    pub ac_tbl_idx: u32,
    #[coder(Bits(2))]
    pub dc_tbl_idx: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JpegScanInfo {
    pub ss: u32,
    pub se: u32,
    pub ah: u32,
    pub al: u32,
    pub num_components: u32,
    pub components: [JpegComponentScanInfo; MAX_COMPONENTS],
    /// Last codestream pass that contributes to this scan.
    pub last_needed_pass: u32,
    /// Block indices, strictly increasing, before which the encoder
    /// flushed its end-of-band run.
    pub reset_points: Vec<u32>,
    /// Block index to the number of redundant ZRL (0xF0) symbols emitted
    /// in that block.
    pub extra_zero_runs: BTreeMap<u32, u32>,
}

impl JpegScanInfo {
    pub fn new() -> JpegScanInfo {
        JpegScanInfo {
            ss: 0,
            se: 63,
            ah: 0,
            al: 0,
            num_components: 1,
            components: array_init::array_init(|_| JpegComponentScanInfo::new()),
            last_needed_pass: MAX_NUM_PASSES - 1,
            reset_points: Vec::new(),
            extra_zero_runs: BTreeMap::new(),
        }
    }

    /// The components this scan actually covers.
    pub fn components(&self) -> &[JpegComponentScanInfo] {
        let n = (self.num_components as usize).min(MAX_COMPONENTS);
        &self.components[..n]
    }

    pub fn is_interleaved(&self) -> bool {
        self.num_components > 1
    }
}

impl Default for JpegScanInfo {
    fn default() -> JpegScanInfo {
        JpegScanInfo::new()
    }
}

/// Everything needed to rebuild a JPEG file byte for byte, except for the
/// coefficient values, which live in the codestream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JpegData {
    pub width: u32,
    pub height: u32,
    pub restart_interval: u32,
    /// Complete APPn segments: marker byte, big-endian length, payload.
    pub app_data: Vec<Vec<u8>>,
    /// Classification of each entry of `app_data`.
    pub app_marker_type: Vec<AppMarkerType>,
    /// Complete COM segments, laid out like `app_data`.
    pub com_data: Vec<Vec<u8>>,
    pub quant: Vec<JpegQuantTable>,
    pub huffman_code: Vec<JpegHuffmanCode>,
    pub components: Vec<JpegComponent>,
    pub scan_info: Vec<JpegScanInfo>,
    /// Marker bytes in file order; 0xFF stands for inter-marker data.
    pub marker_order: Vec<u8>,
    pub inter_marker_data: Vec<Vec<u8>>,
    pub tail_data: Vec<u8>,
    /// Set when the encoder padded the last byte of some entropy-coded
    /// segment with bits that are not all 1. In that case `padding_bits`
    /// records every padding bit (0 or 1) in file order. When unset, all
    /// padding is the usual 1 bits and `padding_bits` is empty.
    pub has_zero_padding_bit: bool,
    pub padding_bits: Vec<u8>,
}

impl JpegData {
    pub fn new() -> JpegData {
        JpegData::default()
    }

    /// Appends a complete APPn segment together with its classification.
    pub fn push_app_marker(&mut self, segment: Vec<u8>) {
        self.app_marker_type.push(AppMarkerType::classify(&segment));
        self.app_data.push(segment);
    }

    /// Validates the cross-references between the parts of this model.
    pub fn check(&self) -> Result<()> {
        check_coeff_orders()?;
        if self.components.is_empty() || self.components.len() > MAX_COMPONENTS {
            return Err(Error::InvalidJpegData(format!(
                "{} components, expected 1 to {MAX_COMPONENTS}",
                self.components.len()
            )));
        }
        if self.quant.len() > MAX_QUANT_TABLES {
            return Err(Error::InvalidJpegData(format!(
                "too many quantization tables: {}",
                self.quant.len()
            )));
        }
        if self.huffman_code.len() > MAX_HUFFMAN_CODES {
            return Err(Error::InvalidJpegData(format!(
                "too many Huffman codes: {}",
                self.huffman_code.len()
            )));
        }
        if self.width == 0
            || self.height == 0
            || self.width > MAX_DIM_PIXELS
            || self.height > MAX_DIM_PIXELS
        {
            return Err(Error::InvalidJpegData(format!(
                "image size {}x{} outside 1..={MAX_DIM_PIXELS}",
                self.width, self.height
            )));
        }
        for (i, component) in self.components.iter().enumerate() {
            if component.quant_idx as usize >= self.quant.len() {
                return Err(Error::InvalidJpegData(format!(
                    "component {i} uses missing quantization table {}",
                    component.quant_idx
                )));
            }
        }
        for (i, code) in self.huffman_code.iter().enumerate() {
            if code.num_symbols() != code.values.len()
                || code.values.len() > JPEG_HUFFMAN_ALPHABET_SIZE + 1
            {
                return Err(Error::InvalidJpegData(format!(
                    "Huffman code {i}: counts add up to {}, {} values",
                    code.num_symbols(),
                    code.values.len()
                )));
            }
        }
        for (i, scan) in self.scan_info.iter().enumerate() {
            if scan.num_components == 0 || scan.num_components as usize > MAX_COMPONENTS {
                return Err(Error::InvalidJpegData(format!(
                    "scan {i} has {} components",
                    scan.num_components
                )));
            }
            if let Some(c) = scan
                .components()
                .iter()
                .find(|c| c.comp_idx as usize >= self.components.len())
            {
                return Err(Error::InvalidJpegData(format!(
                    "scan {i} references missing component {}",
                    c.comp_idx
                )));
            }
            if let Some(c) = scan.components().iter().find(|c| {
                c.dc_tbl_idx >= NUM_HUFFMAN_SLOTS || c.ac_tbl_idx >= NUM_HUFFMAN_SLOTS
            }) {
                return Err(Error::InvalidJpegData(format!(
                    "scan {i} uses Huffman tables {} (DC) and {} (AC)",
                    c.dc_tbl_idx, c.ac_tbl_idx
                )));
            }
        }
        if self.app_data.len() != self.app_marker_type.len() {
            return Err(Error::InvalidJpegData(format!(
                "{} APP markers but {} classifications",
                self.app_data.len(),
                self.app_marker_type.len()
            )));
        }
        for (i, (data, &marker_type)) in self
            .app_data
            .iter()
            .zip(self.app_marker_type.iter())
            .enumerate()
        {
            if AppMarkerType::classify(data) != marker_type {
                return Err(Error::InvalidAppMarker(i));
            }
        }
        if self.padding_bits.iter().any(|&b| b > 1) {
            return Err(Error::InvalidJpegData("padding bits must be 0 or 1".into()));
        }
        self.check_marker_order()
    }
}
