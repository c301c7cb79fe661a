// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};
use crate::jpeg::{JpegData, JpegScanInfo, DCT_BLOCK_SIZE, MAX_COMPONENTS};
use crate::util::tracing_wrappers::*;
use crate::util::*;

impl JpegData {
    /// Largest horizontal and vertical sampling factors over all components.
    pub fn max_sampling_factors(&self) -> Result<(u32, u32)> {
        if self.components.is_empty() {
            return Err(Error::InvalidGeometryPrecondition("image has no components"));
        }
        let mut max_h = 1;
        let mut max_v = 1;
        for c in self.components.iter() {
            if c.h_samp_factor == 0 || c.v_samp_factor == 0 {
                return Err(Error::InvalidGeometryPrecondition("sampling factor is zero"));
            }
            max_h = max_h.max(c.h_samp_factor);
            max_v = max_v.max(c.v_samp_factor);
        }
        Ok((max_h, max_v))
    }

    /// Returns `(mcus_per_row, mcu_rows)` for `scan`.
    ///
    /// An interleaved scan covers whole MCUs of the image. A scan with a
    /// single component covers that component's blocks one at a time, so
    /// its MCU grid is scaled by the component's own sampling factors.
    pub fn calculate_mcu_size(&self, scan: &JpegScanInfo) -> Result<(usize, usize)> {
        if self.components.is_empty() {
            return Err(Error::InvalidGeometryPrecondition("image has no components"));
        }
        if scan.num_components == 0 || scan.num_components as usize > MAX_COMPONENTS {
            return Err(Error::InvalidGeometryPrecondition(
                "scan must have between 1 and 4 components",
            ));
        }
        if scan
            .components()
            .iter()
            .any(|c| c.comp_idx as usize >= self.components.len())
        {
            return Err(Error::InvalidGeometryPrecondition(
                "scan references a missing component",
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidGeometryPrecondition("image is empty"));
        }
        let (max_h, max_v) = self.max_sampling_factors()?;
        let (h_group, v_group) = if scan.is_interleaved() {
            (1, 1)
        } else {
            let base = &self.components[scan.components[0].comp_idx as usize];
            (base.h_samp_factor, base.v_samp_factor)
        };
        let mcus_per_row = div_ceil(self.width as u64 * h_group as u64, 8 * max_h as u64)?;
        let mcu_rows = div_ceil(self.height as u64 * v_group as u64, 8 * max_v as u64)?;
        let to_usize = |v: u64| usize::try_from(v).map_err(|_| Error::ArithmeticOverflow);
        Ok((to_usize(mcus_per_row)?, to_usize(mcu_rows)?))
    }

    /// Sets the block dimensions of every component from the interleaved
    /// MCU grid. Components are padded to whole MCUs.
    pub fn compute_block_dimensions(&mut self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidGeometryPrecondition("image is empty"));
        }
        let (max_h, max_v) = self.max_sampling_factors()?;
        let mcu_cols = div_ceil(self.width as u64, 8 * max_h as u64)?;
        let mcu_rows = div_ceil(self.height as u64, 8 * max_v as u64)?;
        // Both are at most the image dimensions.
        let (mcu_cols, mcu_rows) = (mcu_cols as u32, mcu_rows as u32);
        debug!(mcu_cols, mcu_rows, max_h, max_v, "MCU grid");
        for c in self.components.iter_mut() {
            c.width_in_blocks = mcu_cols
                .checked_mul(c.h_samp_factor)
                .ok_or(Error::ArithmeticOverflow)?;
            c.height_in_blocks = mcu_rows
                .checked_mul(c.v_samp_factor)
                .ok_or(Error::ArithmeticOverflow)?;
        }
        Ok(())
    }

    /// Allocates zeroed coefficient storage for the block dimensions of
    /// every component.
    pub fn allocate_coefficients(&mut self) -> Result<()> {
        for c in self.components.iter_mut() {
            let len = c
                .num_blocks()
                .checked_mul(DCT_BLOCK_SIZE)
                .ok_or(Error::ArithmeticOverflow)?;
            c.coeffs.clear();
            c.coeffs.try_reserve_exact(len)?;
            c.coeffs.resize(len, 0);
        }
        Ok(())
    }
}
