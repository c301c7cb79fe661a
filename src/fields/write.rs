// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_writer::BitWriter;
use crate::error::Result;
use crate::fields::encodings::U32Coder;
use crate::fields::Visitor;

/// Emits fields to a bit sink.
#[derive(Debug)]
pub struct FieldWriter<'a> {
    bw: &'a mut BitWriter,
}

impl<'a> FieldWriter<'a> {
    pub fn new(bw: &'a mut BitWriter) -> FieldWriter<'a> {
        FieldWriter { bw }
    }
}

impl Visitor for FieldWriter<'_> {
    fn is_reading(&self) -> bool {
        false
    }

    fn bool(&mut self, _field: &'static str, _default: bool, value: &mut bool) -> Result<()> {
        self.bw.write(1, *value as u64);
        Ok(())
    }

    fn u32(
        &mut self,
        field: &'static str,
        coder: &U32Coder,
        _default: u32,
        value: &mut u32,
    ) -> Result<()> {
        coder.write(self.bw, *value).map_err(|e| e.in_field(field))
    }
}
