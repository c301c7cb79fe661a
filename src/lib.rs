// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]

pub mod bit_reader;
pub mod bit_writer;
pub mod error;
pub mod fields;
pub mod jpeg;
pub mod util;
