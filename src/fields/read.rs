// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::Result;
use crate::fields::encodings::U32Coder;
use crate::fields::Visitor;
use crate::util::tracing_wrappers::*;

/// Populates fields from a bit source.
#[derive(Debug)]
pub struct FieldReader<'a, 'b> {
    br: &'a mut BitReader<'b>,
}

impl<'a, 'b> FieldReader<'a, 'b> {
    pub fn new(br: &'a mut BitReader<'b>) -> FieldReader<'a, 'b> {
        FieldReader { br }
    }
}

impl Visitor for FieldReader<'_, '_> {
    fn is_reading(&self) -> bool {
        true
    }

    fn bool(&mut self, field: &'static str, _default: bool, value: &mut bool) -> Result<()> {
        *value = self.br.read(1).map_err(|e| e.in_field(field))? != 0;
        trace!(field, value = *value, "read bool");
        Ok(())
    }

    fn u32(
        &mut self,
        field: &'static str,
        coder: &U32Coder,
        _default: u32,
        value: &mut u32,
    ) -> Result<()> {
        *value = coder.read(self.br).map_err(|e| e.in_field(field))?;
        trace!(field, value = *value, "read u32");
        Ok(())
    }
}
