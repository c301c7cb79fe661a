// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Read out of bounds")]
    OutOfBounds,
    #[error("Non-zero padding bits")]
    NonZeroPadding,
    #[error("Invalid enum value {0} for {1}")]
    InvalidEnum(u32, String),
    #[error("Cannot code field {field}: {source}")]
    FieldDecode {
        field: &'static str,
        #[source]
        source: Box<Error>,
    },
    #[error("Value {0} is not representable by any distribution of the coder")]
    ValueNotRepresentable(u32),
    #[error("Decoded value does not fit in 32 bits")]
    ValueOverflow,
    #[error("Payload is shorter than its APP markers: requested {requested} more bytes, {available} available")]
    TruncatedProfile { requested: usize, available: usize },
    #[error("Payload is longer than its APP markers: {used} of {total} bytes used")]
    OversizedProfile { used: usize, total: usize },
    #[error("Invalid APP marker {0}")]
    InvalidAppMarker(usize),
    #[error("Invalid MCU geometry: {0}")]
    InvalidGeometryPrecondition(&'static str),
    #[error("Invalid JPEG reconstruction data: {0}")]
    InvalidJpegData(String),
    #[error("Scan {scan} references undefined Huffman table slot {slot:#x}")]
    MissingHuffmanTable { scan: usize, slot: u32 },
    #[error("Too many markers in JPEG marker order")]
    TooManyMarkers,
    #[error("Invalid coefficient order table: {0}")]
    InvalidCoeffOrder(&'static str),
    // Generic arithmetic overflow. Prefer using other errors if possible.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

impl Error {
    /// Attaches the identity of the field that was being coded.
    pub(crate) fn in_field(self, field: &'static str) -> Error {
        match self {
            e @ Error::FieldDecode { .. } => e,
            e => Error::FieldDecode {
                field,
                source: Box::new(e),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
