// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Field visitor protocol.
//!
//! Every bundle lists its fields once, in [`Fields::visit_fields`], together
//! with each field's coder and default value. The same list is then used to
//! read a bundle with [`FieldReader`] and to write it with [`FieldWriter`].
//! Simple bundles get their implementation from `#[derive(Fields)]`.

pub mod encodings;
mod read;
mod write;

pub use jxl_jpeg_derive::Fields;
pub use read::FieldReader;
pub use write::FieldWriter;

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::error::Result;
use encodings::{U32Coder, U32};

pub trait Fields {
    /// Presents every field, in declaration order, to `visitor`.
    fn visit_fields<V: Visitor>(&mut self, visitor: &mut V) -> Result<()>;

    /// Whether every coded field currently holds its default value.
    fn is_default(&self) -> bool {
        false
    }
}

/// The operations a bundle can perform on a visitor. Implemented by
/// [`FieldReader`] and [`FieldWriter`] only.
pub trait Visitor: Sized {
    fn is_reading(&self) -> bool;

    fn bool(&mut self, field: &'static str, default: bool, value: &mut bool) -> Result<()>;

    fn u32(
        &mut self,
        field: &'static str,
        coder: &U32Coder,
        default: u32,
        value: &mut u32,
    ) -> Result<()>;

    fn bits(
        &mut self,
        field: &'static str,
        num: usize,
        default: u32,
        value: &mut u32,
    ) -> Result<()> {
        self.u32(field, &U32Coder::Direct(U32::Bits(num)), default, value)
    }

    fn visit<F: Fields>(&mut self, fields: &mut F) -> Result<()> {
        fields.visit_fields(self)
    }
}

/// Reads `fields` and the zero padding that ends them on a byte boundary.
pub fn read_fields<F: Fields>(br: &mut BitReader, fields: &mut F) -> Result<()> {
    FieldReader::new(br).visit(fields)?;
    br.jump_to_byte_boundary()
}

/// Writes `fields` and returns the zero-padded bytes.
pub fn write_fields<F: Fields>(fields: &mut F) -> Result<Vec<u8>> {
    let mut bw = BitWriter::new();
    FieldWriter::new(&mut bw).visit(fields)?;
    Ok(bw.finalize())
}
