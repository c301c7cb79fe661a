// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod div_ceil;
pub mod tracing_wrappers;

pub use div_ceil::*;
