// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Metadata carried in APPn markers.
//!
//! An ICC profile that does not fit in one marker segment is split across
//! several APP2 segments, each with this layout:
//!
//! | bytes | content                                   |
//! |-------|-------------------------------------------|
//! | 1     | marker byte (0xE2)                        |
//! | 2     | big-endian segment length                 |
//! | 12    | `"ICC_PROFILE\0"`                         |
//! | 1     | 1-based sequence number of this segment   |
//! | 1     | total number of ICC segments              |
//! | rest  | profile fragment                          |
//!
//! The codestream stores the profile once, so reconstruction copies it back
//! into the segments after their headers.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::jpeg::{AppMarkerType, JpegData};
use crate::util::tracing_wrappers::*;

pub const APP1: u8 = 0xE1;
pub const APP2: u8 = 0xE2;

/// Marker byte followed by the two length bytes.
pub const APP_MARKER_HEADER_SIZE: usize = 3;

pub const ICC_PROFILE_TAG: &[u8; 12] = b"ICC_PROFILE\0";
pub const EXIF_TAG: &[u8; 6] = b"Exif\0\0";
pub const XMP_TAG: &[u8; 29] = b"http://ns.adobe.com/xap/1.0/\0";

pub const ICC_HEADER_SIZE: usize = APP_MARKER_HEADER_SIZE + ICC_PROFILE_TAG.len() + 2;
pub const EXIF_HEADER_SIZE: usize = APP_MARKER_HEADER_SIZE + EXIF_TAG.len();
pub const XMP_HEADER_SIZE: usize = APP_MARKER_HEADER_SIZE + XMP_TAG.len();

/// Largest fragment that still fits in one segment.
pub const MAX_ICC_FRAGMENT_SIZE: usize = 0xFFFF - (ICC_HEADER_SIZE - 1);
pub const MAX_ICC_SEGMENTS: usize = 255;

const ICC_SIGNATURE: &[u8] = b"ICC_PROFILE";
const EXIF_SIGNATURE: &[u8] = b"Exif\0";
const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/";

impl AppMarkerType {
    /// Classifies a complete APPn segment by its marker byte and the
    /// signature at the start of its payload.
    pub fn classify(segment: &[u8]) -> AppMarkerType {
        let (Some(&marker), Some(payload)) =
            (segment.first(), segment.get(APP_MARKER_HEADER_SIZE..))
        else {
            return AppMarkerType::Unknown;
        };
        match marker {
            APP2 if payload.starts_with(ICC_SIGNATURE) => AppMarkerType::Icc,
            APP1 if payload.starts_with(EXIF_SIGNATURE) => AppMarkerType::Exif,
            APP1 if payload.starts_with(XMP_SIGNATURE) => AppMarkerType::Xmp,
            _ => AppMarkerType::Unknown,
        }
    }

    fn header_size(&self) -> usize {
        match self {
            AppMarkerType::Unknown => APP_MARKER_HEADER_SIZE,
            AppMarkerType::Icc => ICC_HEADER_SIZE,
            AppMarkerType::Exif => EXIF_HEADER_SIZE,
            AppMarkerType::Xmp => XMP_HEADER_SIZE,
        }
    }
}

/// Copies `blob` into the payloads of every `marker_type` segment, in
/// order. The segments must have room for exactly `blob.len()` bytes;
/// otherwise nothing is written.
fn fill_payloads(blob: &[u8], marker_type: AppMarkerType, jpeg_data: &mut JpegData) -> Result<()> {
    let header_size = marker_type.header_size();
    let mut capacity = 0;
    for (i, segment) in jpeg_data.app_data.iter().enumerate() {
        if jpeg_data.app_marker_type.get(i) != Some(&marker_type) {
            continue;
        }
        let len = segment.len().checked_sub(header_size).ok_or(Error::InvalidAppMarker(i))?;
        let available = blob.len().saturating_sub(capacity);
        if len > available {
            return Err(Error::TruncatedProfile {
                requested: len,
                available,
            });
        }
        capacity += len;
    }
    if capacity != blob.len() {
        return Err(Error::OversizedProfile {
            used: capacity,
            total: blob.len(),
        });
    }

    let mut pos = 0;
    for (i, segment) in jpeg_data.app_data.iter_mut().enumerate() {
        if jpeg_data.app_marker_type.get(i) != Some(&marker_type) {
            continue;
        }
        let payload = &mut segment[header_size..];
        payload.copy_from_slice(&blob[pos..pos + payload.len()]);
        trace!(marker = i, pos, len = payload.len(), "copied payload fragment");
        pos += payload.len();
    }
    Ok(())
}

/// Writes `icc` back into the ICC segments of `jpeg_data`.
///
/// Each ICC segment receives as many profile bytes as its size leaves room
/// for after the header. Fails if the profile runs out before the last
/// segment is filled or has bytes left afterwards.
pub fn set_icc_from_profile(icc: &[u8], jpeg_data: &mut JpegData) -> Result<()> {
    fill_payloads(icc, AppMarkerType::Icc, jpeg_data)
}

pub fn set_exif_from_blob(exif: &[u8], jpeg_data: &mut JpegData) -> Result<()> {
    fill_payloads(exif, AppMarkerType::Exif, jpeg_data)
}

pub fn set_xmp_from_blob(xmp: &[u8], jpeg_data: &mut JpegData) -> Result<()> {
    fill_payloads(xmp, AppMarkerType::Xmp, jpeg_data)
}

/// Splits `icc` into complete APP2 segments carrying at most
/// `fragment_size` profile bytes each.
pub fn split_icc_profile(icc: &[u8], fragment_size: usize) -> Result<Vec<Vec<u8>>> {
    if fragment_size == 0 || fragment_size > MAX_ICC_FRAGMENT_SIZE {
        return Err(Error::InvalidJpegData(format!(
            "ICC fragment size {fragment_size} out of range"
        )));
    }
    let num_segments = icc.len().div_ceil(fragment_size);
    if num_segments > MAX_ICC_SEGMENTS {
        return Err(Error::InvalidJpegData(format!(
            "ICC profile needs {num_segments} segments"
        )));
    }
    let mut segments = Vec::new();
    segments.try_reserve_exact(num_segments)?;
    for (i, fragment) in icc.chunks(fragment_size).enumerate() {
        let mut segment = vec![0; ICC_HEADER_SIZE];
        segment.try_reserve_exact(fragment.len())?;
        segment.extend_from_slice(fragment);
        write_icc_header(&mut segment, i + 1, num_segments);
        segments.push(segment);
    }
    Ok(segments)
}

/// Concatenates the profile fragments of all ICC segments, checking that
/// their sequence numbers count up from 1 and agree on the total.
pub fn extract_icc_profile(jpeg_data: &JpegData) -> Result<Vec<u8>> {
    let icc_segments: Vec<(usize, &Vec<u8>)> = jpeg_data
        .app_data
        .iter()
        .enumerate()
        .filter(|(i, _)| jpeg_data.app_marker_type.get(*i) == Some(&AppMarkerType::Icc))
        .collect();
    let mut icc = Vec::new();
    for (seq, &(i, segment)) in icc_segments.iter().enumerate() {
        if segment.len() < ICC_HEADER_SIZE
            || segment[ICC_HEADER_SIZE - 2] as usize != seq + 1
            || segment[ICC_HEADER_SIZE - 1] as usize != icc_segments.len()
        {
            return Err(Error::InvalidAppMarker(i));
        }
        icc.try_reserve(segment.len() - ICC_HEADER_SIZE)?;
        icc.extend_from_slice(&segment[ICC_HEADER_SIZE..]);
    }
    Ok(icc)
}

fn write_segment_length(segment: &mut [u8], index: usize) -> Result<()> {
    let len = u16::try_from(segment.len() - 1).map_err(|_| Error::InvalidAppMarker(index))?;
    BigEndian::write_u16(&mut segment[1..APP_MARKER_HEADER_SIZE], len);
    Ok(())
}

fn write_icc_header(segment: &mut [u8], seq: usize, count: usize) {
    segment[0] = APP2;
    let len = (segment.len() - 1) as u16;
    BigEndian::write_u16(&mut segment[1..APP_MARKER_HEADER_SIZE], len);
    segment[APP_MARKER_HEADER_SIZE..ICC_HEADER_SIZE - 2].copy_from_slice(ICC_PROFILE_TAG);
    segment[ICC_HEADER_SIZE - 2] = seq as u8;
    segment[ICC_HEADER_SIZE - 1] = count as u8;
}

impl JpegData {
    /// Rebuilds the headers of all classified APP segments from their
    /// classification and size. Unknown segments only get their length.
    pub fn restore_app_marker_headers(&mut self) -> Result<()> {
        let num_icc = self
            .app_marker_type
            .iter()
            .filter(|&&t| t == AppMarkerType::Icc)
            .count();
        if num_icc > MAX_ICC_SEGMENTS {
            return Err(Error::InvalidJpegData(format!("{num_icc} ICC segments")));
        }
        let mut icc_seq = 0;
        for (i, segment) in self.app_data.iter_mut().enumerate() {
            let marker_type = self
                .app_marker_type
                .get(i)
                .copied()
                .ok_or(Error::InvalidAppMarker(i))?;
            if segment.len() < marker_type.header_size() {
                return Err(Error::InvalidAppMarker(i));
            }
            write_segment_length(segment, i)?;
            match marker_type {
                AppMarkerType::Unknown => {}
                AppMarkerType::Icc => {
                    icc_seq += 1;
                    write_icc_header(segment, icc_seq, num_icc);
                }
                AppMarkerType::Exif => {
                    segment[0] = APP1;
                    segment[APP_MARKER_HEADER_SIZE..EXIF_HEADER_SIZE].copy_from_slice(EXIF_TAG);
                }
                AppMarkerType::Xmp => {
                    segment[0] = APP1;
                    segment[APP_MARKER_HEADER_SIZE..XMP_HEADER_SIZE].copy_from_slice(XMP_TAG);
                }
            }
        }
        debug!(num_icc, "restored APP marker headers");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use test_log::test;

    use super::*;

    const FRAGMENT: usize = 1000;

    fn random_profile(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = XorShiftRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random()).collect()
    }

    fn with_segments(segments: &[Vec<u8>]) -> JpegData {
        let mut data = JpegData::new();
        data.push_app_marker(b"\xE0\x00\x10JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00".to_vec());
        for segment in segments {
            data.push_app_marker(segment.clone());
        }
        data
    }

    /// Replaces every ICC payload with zeros, as after reading sizes only.
    fn blank_icc_payloads(data: &mut JpegData) {
        for (segment, t) in data.app_data.iter_mut().zip(data.app_marker_type.iter()) {
            if *t == AppMarkerType::Icc {
                segment[ICC_HEADER_SIZE..].fill(0);
            }
        }
    }

    #[test]
    fn header_size_is_17() {
        assert_eq!(ICC_HEADER_SIZE, 17);
        assert_eq!(EXIF_HEADER_SIZE, 9);
        assert_eq!(XMP_HEADER_SIZE, 32);
    }

    #[test]
    fn layout_of_a_real_segment() {
        // Second of two APP2 segments carrying the bytes 0xde 0xad 0xbe 0xef.
        let segment = b"\xE2\x00\x14ICC_PROFILE\x00\x02\x02\xde\xad\xbe\xef".to_vec();
        assert_eq!(segment.len(), 21);
        assert_eq!(BigEndian::read_u16(&segment[1..3]) as usize, segment.len() - 1);
        assert_eq!(AppMarkerType::classify(&segment), AppMarkerType::Icc);
        assert_eq!(&segment[ICC_HEADER_SIZE..], &[0xde, 0xad, 0xbe, 0xef]);

        let mut first = b"\xE2\x00\x12ICC_PROFILE\x00\x01\x02\x00\x00".to_vec();
        let mut data = with_segments(&[first.clone(), segment.clone()]);
        blank_icc_payloads(&mut data);
        set_icc_from_profile(&[1, 2, 0xde, 0xad, 0xbe, 0xef], &mut data).unwrap();
        first[ICC_HEADER_SIZE..].copy_from_slice(&[1, 2]);
        assert_eq!(data.app_data[1], first);
        assert_eq!(data.app_data[2], segment);
    }

    #[test]
    fn classify() {
        assert_eq!(AppMarkerType::classify(&[]), AppMarkerType::Unknown);
        assert_eq!(AppMarkerType::classify(&[APP2, 0]), AppMarkerType::Unknown);
        assert_eq!(
            AppMarkerType::classify(b"\xE1\x00\x08Exif\x00\x00"),
            AppMarkerType::Exif
        );
        assert_eq!(
            AppMarkerType::classify(b"\xE1\x00\x1fhttp://ns.adobe.com/xap/1.0/\x00"),
            AppMarkerType::Xmp
        );
        // ICC signature on the wrong marker.
        assert_eq!(
            AppMarkerType::classify(b"\xE1\x00\x10ICC_PROFILE\x00\x01\x01"),
            AppMarkerType::Unknown
        );
    }

    macro_rules! split_round_trip_tests {
        ($($name:ident: $len:expr,)*) => {
            $(
                paste::paste! {
                    #[test]
                    fn [<split_round_trip_ $name>]() {
                        let len: usize = $len;
                        let icc = random_profile(len, len as u64);
                        let segments = split_icc_profile(&icc, FRAGMENT).unwrap();
                        assert_eq!(segments.len(), icc.len().div_ceil(FRAGMENT));
                        let mut data = with_segments(&segments);
                        assert!(data.app_marker_type[1..]
                            .iter()
                            .all(|&t| t == AppMarkerType::Icc));
                        assert_eq!(extract_icc_profile(&data).unwrap(), icc);

                        blank_icc_payloads(&mut data);
                        set_icc_from_profile(&icc, &mut data).unwrap();
                        assert_eq!(&data.app_data[1..], &segments[..]);
                        assert_eq!(extract_icc_profile(&data).unwrap(), icc);
                    }
                }
            )*
        };
    }

    split_round_trip_tests! {
        empty: 0,
        one: 1,
        fragment_minus_one: FRAGMENT - 1,
        fragment: FRAGMENT,
        fragment_plus_one: FRAGMENT + 1,
        ten_fragments: 10 * FRAGMENT,
    }

    #[test]
    fn truncated_profile() {
        let icc = random_profile(2500, 1);
        let mut data = with_segments(&split_icc_profile(&icc, FRAGMENT).unwrap());
        assert!(matches!(
            set_icc_from_profile(&icc[..icc.len() - 1], &mut data),
            Err(Error::TruncatedProfile {
                requested: 500,
                available: 499
            })
        ));
    }

    #[test]
    fn failed_fill_leaves_segments_untouched() {
        let icc = random_profile(2500, 6);
        let mut data = with_segments(&split_icc_profile(&icc, FRAGMENT).unwrap());
        blank_icc_payloads(&mut data);
        let before = data.clone();
        assert!(matches!(
            set_icc_from_profile(&icc[..icc.len() - 1], &mut data),
            Err(Error::TruncatedProfile { .. })
        ));
        assert_eq!(data, before);

        let mut longer = icc.clone();
        longer.push(0);
        assert!(matches!(
            set_icc_from_profile(&longer, &mut data),
            Err(Error::OversizedProfile { .. })
        ));
        assert_eq!(data, before);
    }

    #[test]
    fn oversized_profile() {
        let mut icc = random_profile(2500, 2);
        let mut data = with_segments(&split_icc_profile(&icc, FRAGMENT).unwrap());
        icc.push(0);
        assert!(matches!(
            set_icc_from_profile(&icc, &mut data),
            Err(Error::OversizedProfile {
                used: 2500,
                total: 2501
            })
        ));
    }

    #[test]
    fn no_icc_segments() {
        let mut data = with_segments(&[]);
        let before = data.clone();
        set_icc_from_profile(&[], &mut data).unwrap();
        assert_eq!(data, before);
        assert!(matches!(
            set_icc_from_profile(&[1, 2, 3], &mut data),
            Err(Error::OversizedProfile { used: 0, total: 3 })
        ));
    }

    #[test]
    fn segment_shorter_than_header() {
        let mut data = JpegData::new();
        data.app_data.push(b"\xE2\x00\x0eICC_PROFILE\x00".to_vec());
        data.app_marker_type.push(AppMarkerType::Icc);
        assert!(matches!(
            set_icc_from_profile(&[], &mut data),
            Err(Error::InvalidAppMarker(0))
        ));
    }

    #[test]
    fn split_limits() {
        assert!(split_icc_profile(&[0; 10], 0).is_err());
        assert!(split_icc_profile(&[0; 10], MAX_ICC_FRAGMENT_SIZE + 1).is_err());
        assert!(split_icc_profile(&[0; 256], 1).is_err());
        let segments = split_icc_profile(&[0; 10], MAX_ICC_FRAGMENT_SIZE).unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn extract_rejects_bad_sequence() {
        let icc = random_profile(3000, 3);
        let mut data = with_segments(&split_icc_profile(&icc, FRAGMENT).unwrap());
        data.app_data.swap(1, 2);
        assert!(matches!(
            extract_icc_profile(&data),
            Err(Error::InvalidAppMarker(1))
        ));
    }

    #[test]
    fn exif_and_xmp() {
        let exif = random_profile(40, 4);
        let xmp = b"<x:xmpmeta/>".to_vec();
        let mut data = JpegData::new();
        data.app_data.push(vec![0; EXIF_HEADER_SIZE + exif.len()]);
        data.app_marker_type.push(AppMarkerType::Exif);
        data.app_data.push(vec![0; XMP_HEADER_SIZE + xmp.len()]);
        data.app_marker_type.push(AppMarkerType::Xmp);
        data.restore_app_marker_headers().unwrap();
        set_exif_from_blob(&exif, &mut data).unwrap();
        set_xmp_from_blob(&xmp, &mut data).unwrap();

        assert_eq!(AppMarkerType::classify(&data.app_data[0]), AppMarkerType::Exif);
        assert_eq!(&data.app_data[0][EXIF_HEADER_SIZE..], &exif[..]);
        assert_eq!(AppMarkerType::classify(&data.app_data[1]), AppMarkerType::Xmp);
        assert_eq!(&data.app_data[1][XMP_HEADER_SIZE..], &xmp[..]);
        assert_eq!(
            BigEndian::read_u16(&data.app_data[1][1..3]) as usize,
            data.app_data[1].len() - 1
        );

        assert!(matches!(
            set_exif_from_blob(&exif[1..], &mut data),
            Err(Error::TruncatedProfile { .. })
        ));
    }

    #[test]
    fn restore_icc_headers() {
        let icc = random_profile(2100, 5);
        let segments = split_icc_profile(&icc, FRAGMENT).unwrap();
        let mut data = JpegData::new();
        for segment in segments.iter() {
            data.app_data.push(vec![0; segment.len()]);
            data.app_marker_type.push(AppMarkerType::Icc);
        }
        data.restore_app_marker_headers().unwrap();
        set_icc_from_profile(&icc, &mut data).unwrap();
        assert_eq!(data.app_data, segments);
    }
}
