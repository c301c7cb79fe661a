// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Coding of [`JpegData`] as the `jbrd` bundle.
//!
//! Only sizes and structure are coded here. Segment contents and tail bytes
//! are stored elsewhere, so reading a bundle leaves them zero-filled.

use num_traits::FromPrimitive;

use crate::error::{Error, Result};
use crate::fields::encodings::{U32Coder, U32};
use crate::fields::{Fields, Visitor};
use crate::jpeg::markers::{MarkerCounts, EOI};
use crate::jpeg::{
    AppMarkerType, JpegComponent, JpegComponentType, JpegData, JpegHuffmanCode,
    JpegQuantTable, JpegScanInfo, JPEG_HUFFMAN_ALPHABET_SIZE, MAX_MARKERS, MAX_NUM_PASSES,
};
use crate::util::tracing_wrappers::*;

const ONE_TO_FOUR: U32Coder = U32Coder::Select(U32::Val(1), U32::Val(2), U32::Val(3), U32::Val(4));

const APP_MARKER_TYPE: U32Coder = U32Coder::Select(
    U32::Val(0),
    U32::Val(1),
    U32::BitsOffset { n: 1, off: 2 },
    U32::BitsOffset { n: 2, off: 4 },
);

const NUM_HUFFMAN_CODES: U32Coder = U32Coder::Select(
    U32::Val(4),
    U32::BitsOffset { n: 3, off: 2 },
    U32::BitsOffset { n: 4, off: 10 },
    U32::BitsOffset { n: 6, off: 26 },
);

const HUFFMAN_COUNT: U32Coder = U32Coder::Select(
    U32::Val(0),
    U32::Val(1),
    U32::BitsOffset { n: 3, off: 2 },
    U32::Bits(8),
);

const HUFFMAN_VALUE: U32Coder = U32Coder::Select(
    U32::Bits(2),
    U32::BitsOffset { n: 2, off: 4 },
    U32::BitsOffset { n: 4, off: 8 },
    U32::BitsOffset { n: 8, off: 1 },
);

const LAST_NEEDED_PASS: U32Coder = U32Coder::Select(
    U32::Val(0),
    U32::Val(1),
    U32::Val(2),
    U32::BitsOffset { n: 3, off: 3 },
);

const NUM_BLOCK_ENTRIES: U32Coder = U32Coder::Select(
    U32::Val(0),
    U32::BitsOffset { n: 2, off: 1 },
    U32::BitsOffset { n: 4, off: 4 },
    U32::BitsOffset { n: 16, off: 20 },
);

const BLOCK_DELTA: U32Coder = U32Coder::Select(
    U32::Val(0),
    U32::BitsOffset { n: 3, off: 1 },
    U32::BitsOffset { n: 5, off: 9 },
    U32::BitsOffset { n: 28, off: 41 },
);

const NUM_EXTRA_ZERO_RUNS: U32Coder = U32Coder::Select(
    U32::Val(1),
    U32::BitsOffset { n: 2, off: 2 },
    U32::BitsOffset { n: 4, off: 5 },
    U32::BitsOffset { n: 8, off: 20 },
);

const TAIL_DATA_LEN: U32Coder = U32Coder::Select(
    U32::Val(0),
    U32::BitsOffset { n: 8, off: 1 },
    U32::BitsOffset { n: 16, off: 257 },
    U32::BitsOffset { n: 22, off: 65793 },
);

/// Block indices are bounded by the largest image a JPEG can describe.
const MAX_BLOCK_INDEX: u32 = 3 << 26;

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidJpegData(msg.into())
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::ArithmeticOverflow)
}

fn zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, T::default());
    Ok(v)
}

/// Codes the size of a marker segment that starts with its marker byte.
fn visit_segment_size<V: Visitor>(
    visitor: &mut V,
    field: &'static str,
    segment: &mut Vec<u8>,
) -> Result<()> {
    let mut size_minus_one = len_u32(segment.len().saturating_sub(1))?;
    visitor.bits(field, 16, 0, &mut size_minus_one)?;
    if visitor.is_reading() {
        *segment = zeroed(size_minus_one as usize + 1)?;
    }
    if segment.len() < 3 {
        return Err(invalid(format!("{field}: segment of {} bytes", segment.len())));
    }
    Ok(())
}

/// Codes `block_idx` as a delta from the block after `last`.
fn visit_block_index<V: Visitor>(
    visitor: &mut V,
    field: &'static str,
    last: &mut Option<u32>,
    block_idx: &mut u32,
) -> Result<()> {
    let base = last.map_or(0, |l| l + 1);
    let mut delta = if visitor.is_reading() {
        0
    } else {
        block_idx
            .checked_sub(base)
            .ok_or_else(|| invalid(format!("{field}: block indices must increase")))?
    };
    visitor.u32(field, &BLOCK_DELTA, 0, &mut delta)?;
    *block_idx = base.checked_add(delta).ok_or(Error::ArithmeticOverflow)?;
    if *block_idx >= MAX_BLOCK_INDEX {
        return Err(invalid(format!("{field}: block index {block_idx} too large")));
    }
    *last = Some(*block_idx);
    Ok(())
}

impl Fields for JpegHuffmanCode {
    fn visit_fields<V: Visitor>(&mut self, visitor: &mut V) -> Result<()> {
        visitor.bool("is_ac", false, &mut self.is_ac)?;
        visitor.bits("id", 2, 0, &mut self.id)?;
        visitor.bool("is_last", true, &mut self.is_last)?;
        let mut num_symbols = 0;
        for count in self.counts.iter_mut() {
            visitor.u32("count", &HUFFMAN_COUNT, 0, count)?;
            num_symbols += *count as usize;
        }
        if num_symbols == 0 || num_symbols > JPEG_HUFFMAN_ALPHABET_SIZE + 1 {
            return Err(invalid(format!("Huffman code with {num_symbols} symbols")));
        }
        if visitor.is_reading() {
            self.values = zeroed(num_symbols)?;
        } else if self.values.len() != num_symbols {
            return Err(invalid(format!(
                "Huffman counts add up to {num_symbols}, found {} values",
                self.values.len()
            )));
        }
        let mut seen = [false; JPEG_HUFFMAN_ALPHABET_SIZE + 1];
        for value in self.values.iter_mut() {
            visitor.u32("value", &HUFFMAN_VALUE, 0, value)?;
            // At most 256 once coded.
            let slot = &mut seen[*value as usize];
            if *slot {
                return Err(invalid(format!("duplicate Huffman symbol {value}")));
            }
            *slot = true;
        }
        if self.values.last() != Some(&(JPEG_HUFFMAN_ALPHABET_SIZE as u32)) {
            return Err(invalid("Huffman code does not end with the sentinel symbol"));
        }
        Ok(())
    }
}

impl Fields for JpegScanInfo {
    fn visit_fields<V: Visitor>(&mut self, visitor: &mut V) -> Result<()> {
        visitor.u32("num_components", &ONE_TO_FOUR, 1, &mut self.num_components)?;
        visitor.bits("ss", 6, 0, &mut self.ss)?;
        visitor.bits("se", 6, 63, &mut self.se)?;
        visitor.bits("al", 4, 0, &mut self.al)?;
        visitor.bits("ah", 4, 0, &mut self.ah)?;
        let num_components = self.num_components as usize;
        for component in self.components.iter_mut().take(num_components) {
            visitor.visit(component)?;
        }
        visitor.u32(
            "last_needed_pass",
            &LAST_NEEDED_PASS,
            MAX_NUM_PASSES - 1,
            &mut self.last_needed_pass,
        )
    }
}

impl JpegScanInfo {
    /// Reset points and extra zero runs, coded after all scan headers.
    fn visit_block_data<V: Visitor>(&mut self, visitor: &mut V) -> Result<()> {
        let mut num_reset_points = len_u32(self.reset_points.len())?;
        visitor.u32("num_reset_points", &NUM_BLOCK_ENTRIES, 0, &mut num_reset_points)?;
        if visitor.is_reading() {
            self.reset_points = zeroed(num_reset_points as usize)?;
        }
        let mut last = None;
        for block_idx in self.reset_points.iter_mut() {
            visit_block_index(visitor, "reset_point", &mut last, block_idx)?;
        }

        let mut runs: Vec<(u32, u32)> = if visitor.is_reading() {
            Vec::new()
        } else {
            self.extra_zero_runs.iter().map(|(&b, &n)| (b, n)).collect()
        };
        let mut num_runs = len_u32(runs.len())?;
        visitor.u32("num_extra_zero_runs", &NUM_BLOCK_ENTRIES, 0, &mut num_runs)?;
        if visitor.is_reading() {
            runs = zeroed(num_runs as usize)?;
        }
        let mut last = None;
        for (block_idx, num) in runs.iter_mut() {
            visitor.u32("extra_zero_run_length", &NUM_EXTRA_ZERO_RUNS, 1, num)?;
            visit_block_index(visitor, "extra_zero_run_block", &mut last, block_idx)?;
        }
        if visitor.is_reading() {
            self.extra_zero_runs = runs.into_iter().collect();
        }
        Ok(())
    }
}

impl JpegData {
    fn visit_marker_order<V: Visitor>(&mut self, visitor: &mut V) -> Result<()> {
        if visitor.is_reading() {
            self.marker_order.clear();
            while self.marker_order.last() != Some(&EOI) {
                if self.marker_order.len() >= MAX_MARKERS {
                    return Err(Error::TooManyMarkers);
                }
                let mut marker = 0;
                visitor.bits("marker", 6, 0, &mut marker)?;
                self.marker_order.push(0xC0 + marker as u8);
            }
            return Ok(());
        }
        if self.marker_order.len() > MAX_MARKERS {
            return Err(Error::TooManyMarkers);
        }
        if self.marker_order.iter().position(|&m| m == EOI)
            != self.marker_order.len().checked_sub(1)
        {
            return Err(invalid("marker order must end with its only EOI"));
        }
        for &marker in self.marker_order.iter() {
            let mut code = (marker as u32)
                .checked_sub(0xC0)
                .ok_or_else(|| invalid(format!("marker {marker:#04x} cannot be coded")))?;
            visitor.bits("marker", 6, 0, &mut code)?;
        }
        Ok(())
    }

    fn visit_components<V: Visitor>(&mut self, visitor: &mut V, is_gray: bool) -> Result<()> {
        let mut component_type = JpegComponentType::of(&self.components) as u32;
        visitor.bits(
            "component_type",
            2,
            JpegComponentType::YCbCr as u32,
            &mut component_type,
        )?;
        let component_type = JpegComponentType::from_u32(component_type)
            .ok_or_else(|| Error::InvalidEnum(component_type, "JpegComponentType".into()))?;
        let mut num_components = match component_type {
            JpegComponentType::Custom => len_u32(self.components.len())?,
            fixed => fixed.ids().len() as u32,
        };
        if component_type == JpegComponentType::Custom {
            visitor.u32("num_components", &ONE_TO_FOUR, 3, &mut num_components)?;
        }
        if visitor.is_reading() {
            self.components = (0..num_components).map(|_| JpegComponent::new()).collect();
            for (component, &id) in self.components.iter_mut().zip(component_type.ids()) {
                component.id = id;
            }
        }
        if component_type == JpegComponentType::Custom {
            for component in self.components.iter_mut() {
                visitor.bits("component_id", 8, 0, &mut component.id)?;
            }
        }
        if is_gray != (self.components.len() == 1) {
            return Err(invalid(format!(
                "is_gray set for {} components",
                self.components.len()
            )));
        }
        for component in self.components.iter_mut() {
            visitor.visit(component)?;
            if component.quant_idx as usize >= self.quant.len() {
                return Err(invalid(format!(
                    "quantization table {} does not exist",
                    component.quant_idx
                )));
            }
        }
        Ok(())
    }
}

impl Fields for JpegData {
    fn visit_fields<V: Visitor>(&mut self, visitor: &mut V) -> Result<()> {
        let mut is_gray = self.components.len() == 1;
        visitor.bool("is_gray", false, &mut is_gray)?;

        self.visit_marker_order(visitor)?;
        let counts = MarkerCounts::from_marker_order(&self.marker_order);
        debug!(?counts, "marker order");
        if visitor.is_reading() {
            self.app_data = zeroed(counts.num_app)?;
            self.app_marker_type = zeroed(counts.num_app)?;
            self.com_data = zeroed(counts.num_com)?;
            self.scan_info = (0..counts.num_scans).map(|_| JpegScanInfo::new()).collect();
            self.inter_marker_data = zeroed(counts.num_inter_marker_data)?;
        } else if self.app_data.len() != counts.num_app
            || self.app_marker_type.len() != counts.num_app
            || self.com_data.len() != counts.num_com
            || self.scan_info.len() != counts.num_scans
            || self.inter_marker_data.len() != counts.num_inter_marker_data
        {
            return Err(invalid("marker order does not match the stored segments"));
        }

        for (marker_type, segment) in self
            .app_marker_type
            .iter_mut()
            .zip(self.app_data.iter_mut())
        {
            let mut ty = *marker_type as u32;
            visitor.u32("app_marker_type", &APP_MARKER_TYPE, 0, &mut ty)?;
            *marker_type = AppMarkerType::from_u32(ty)
                .ok_or_else(|| Error::InvalidEnum(ty, "AppMarkerType".into()))?;
            visit_segment_size(visitor, "app_marker_size", segment)?;
        }
        for segment in self.com_data.iter_mut() {
            visit_segment_size(visitor, "com_marker_size", segment)?;
        }

        let mut num_quant = len_u32(self.quant.len())?;
        visitor.u32("num_quant", &ONE_TO_FOUR, 2, &mut num_quant)?;
        if visitor.is_reading() {
            self.quant = (0..num_quant).map(|_| JpegQuantTable::new()).collect();
        }
        for table in self.quant.iter_mut() {
            visitor.visit(table)?;
        }

        self.visit_components(visitor, is_gray)?;

        let mut num_huff = len_u32(self.huffman_code.len())?;
        visitor.u32("num_huff", &NUM_HUFFMAN_CODES, 4, &mut num_huff)?;
        if visitor.is_reading() {
            self.huffman_code = (0..num_huff).map(|_| JpegHuffmanCode::new()).collect();
        }
        for code in self.huffman_code.iter_mut() {
            visitor.visit(code)?;
        }
        debug!(
            num_quant,
            num_components = self.components.len(),
            num_huff,
            num_scans = self.scan_info.len(),
            "tables"
        );

        for scan in self.scan_info.iter_mut() {
            visitor.visit(scan)?;
        }
        for (i, scan) in self.scan_info.iter().enumerate() {
            if let Some(c) = scan
                .components()
                .iter()
                .find(|c| c.comp_idx as usize >= self.components.len())
            {
                return Err(invalid(format!(
                    "scan {i} references missing component {}",
                    c.comp_idx
                )));
            }
        }

        if counts.has_dri {
            visitor.bits("restart_interval", 16, 0, &mut self.restart_interval)?;
        } else if visitor.is_reading() {
            self.restart_interval = 0;
        }

        for scan in self.scan_info.iter_mut() {
            scan.visit_block_data(visitor)?;
        }

        for data in self.inter_marker_data.iter_mut() {
            let mut len = len_u32(data.len())?;
            visitor.bits("inter_marker_data_size", 16, 0, &mut len)?;
            if visitor.is_reading() {
                *data = zeroed(len as usize)?;
            }
        }

        let mut tail_len = len_u32(self.tail_data.len())?;
        visitor.u32("tail_data_size", &TAIL_DATA_LEN, 0, &mut tail_len)?;
        if visitor.is_reading() {
            self.tail_data = zeroed(tail_len as usize)?;
        }

        visitor.bool("has_zero_padding_bit", false, &mut self.has_zero_padding_bit)?;
        if self.has_zero_padding_bit {
            let mut num_bits = len_u32(self.padding_bits.len())?;
            visitor.bits("num_padding_bits", 24, 0, &mut num_bits)?;
            if visitor.is_reading() {
                self.padding_bits = zeroed(num_bits as usize)?;
            }
            for bit in self.padding_bits.iter_mut() {
                let mut value = *bit as u32;
                visitor.bits("padding_bit", 1, 0, &mut value)?;
                *bit = value as u8;
            }
        } else if visitor.is_reading() {
            self.padding_bits.clear();
        } else if !self.padding_bits.is_empty() {
            return Err(invalid("padding bits without has_zero_padding_bit"));
        }
        debug!(tail_len, num_padding_bits = self.padding_bits.len(), "trailing data");

        self.check_marker_order()
    }
}
