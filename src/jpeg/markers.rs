// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};
use crate::jpeg::{JpegData, JpegHuffmanCode, MAX_MARKERS, NUM_HUFFMAN_SLOTS};

pub const DHT: u8 = 0xC4;
pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const DQT: u8 = 0xDB;
pub const DRI: u8 = 0xDD;
pub const APP0: u8 = 0xE0;
pub const APP15: u8 = 0xEF;
pub const COM: u8 = 0xFE;
/// Not a real marker: stands for bytes found between two markers.
pub const INTER_MARKER_DATA: u8 = 0xFF;

/// How many entities of each kind a marker order refers to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MarkerCounts {
    pub num_app: usize,
    pub num_com: usize,
    pub num_scans: usize,
    pub num_dqt: usize,
    pub num_dht: usize,
    pub num_inter_marker_data: usize,
    pub has_dri: bool,
}

impl MarkerCounts {
    pub fn from_marker_order(marker_order: &[u8]) -> MarkerCounts {
        let mut counts = MarkerCounts::default();
        for &marker in marker_order {
            match marker {
                APP0..=APP15 => counts.num_app += 1,
                COM => counts.num_com += 1,
                SOS => counts.num_scans += 1,
                DQT => counts.num_dqt += 1,
                DHT => counts.num_dht += 1,
                DRI => counts.has_dri = true,
                INTER_MARKER_DATA => counts.num_inter_marker_data += 1,
                _ => {}
            }
        }
        counts
    }
}

/// Number of marker segments a run of tables is split into, or `None` if
/// the last table does not close its segment.
fn count_segments(is_last: impl Iterator<Item = bool>) -> Option<usize> {
    let mut segments = 0;
    let mut open = false;
    for last in is_last {
        open = !last;
        if last {
            segments += 1;
        }
    }
    (!open).then_some(segments)
}

fn check_count(what: &str, in_order: usize, stored: usize) -> Result<()> {
    if in_order != stored {
        return Err(Error::InvalidJpegData(format!(
            "marker order has {in_order} {what}, found {stored}"
        )));
    }
    Ok(())
}

impl JpegData {
    /// Checks that `marker_order` ends with EOI and accounts for every
    /// stored table, segment and scan.
    pub fn check_marker_order(&self) -> Result<()> {
        if self.marker_order.len() > MAX_MARKERS {
            return Err(Error::TooManyMarkers);
        }
        let eoi = self.marker_order.iter().position(|&m| m == EOI);
        if eoi.is_none() || eoi != self.marker_order.len().checked_sub(1) {
            return Err(Error::InvalidJpegData(
                "marker order must end with its only EOI".into(),
            ));
        }
        let counts = MarkerCounts::from_marker_order(&self.marker_order);
        check_count("APP markers", counts.num_app, self.app_data.len())?;
        check_count("COM markers", counts.num_com, self.com_data.len())?;
        check_count("scans", counts.num_scans, self.scan_info.len())?;
        check_count(
            "inter-marker spans",
            counts.num_inter_marker_data,
            self.inter_marker_data.len(),
        )?;
        let dqt = count_segments(self.quant.iter().map(|q| q.is_last));
        if dqt != Some(counts.num_dqt) {
            return Err(Error::InvalidJpegData(format!(
                "{} DQT markers do not match {} quantization tables",
                counts.num_dqt,
                self.quant.len()
            )));
        }
        let dht = count_segments(self.huffman_code.iter().map(|h| h.is_last));
        if dht != Some(counts.num_dht) {
            return Err(Error::InvalidJpegData(format!(
                "{} DHT markers do not match {} Huffman codes",
                counts.num_dht,
                self.huffman_code.len()
            )));
        }
        Ok(())
    }

    /// The Huffman codes bound to each slot when scan `scan_index` starts.
    ///
    /// DHT markers may redefine a slot between scans, so bindings are
    /// replayed in marker order.
    pub fn huffman_tables_for_scan(&self, scan_index: usize) -> Result<HuffmanSlots> {
        let mut slots = HuffmanSlots::default();
        let mut next_code = 0;
        let mut scan = 0;
        for &marker in self.marker_order.iter() {
            match marker {
                DHT => loop {
                    let code = self.huffman_code.get(next_code).ok_or_else(|| {
                        Error::InvalidJpegData("DHT marker without Huffman codes".into())
                    })?;
                    slots.bind(code, next_code)?;
                    next_code += 1;
                    if code.is_last {
                        break;
                    }
                },
                SOS => {
                    if scan == scan_index {
                        return Ok(slots);
                    }
                    scan += 1;
                }
                _ => {}
            }
        }
        Err(Error::InvalidJpegData(format!(
            "scan {scan_index} is not in the marker order"
        )))
    }

    /// The DC or AC code used by the `component`-th component of scan
    /// `scan_index`.
    pub fn scan_huffman_code(
        &self,
        scan_index: usize,
        component: usize,
        is_ac: bool,
    ) -> Result<&JpegHuffmanCode> {
        let scan = self
            .scan_info
            .get(scan_index)
            .ok_or_else(|| Error::InvalidJpegData(format!("no scan {scan_index}")))?;
        let info = scan.components().get(component).ok_or_else(|| {
            Error::InvalidJpegData(format!("scan {scan_index} has no component {component}"))
        })?;
        let (table_idx, ac_bit) = if is_ac {
            (info.ac_tbl_idx, 0x10)
        } else {
            (info.dc_tbl_idx, 0)
        };
        let missing = Error::MissingHuffmanTable {
            scan: scan_index,
            slot: ac_bit | table_idx,
        };
        if table_idx >= NUM_HUFFMAN_SLOTS {
            return Err(missing);
        }
        let index = self
            .huffman_tables_for_scan(scan_index)?
            .get(ac_bit | table_idx)
            .ok_or(missing)?;
        Ok(&self.huffman_code[index])
    }
}

/// Indices into `JpegData::huffman_code` for the four DC and four AC slots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HuffmanSlots {
    dc: [Option<usize>; 4],
    ac: [Option<usize>; 4],
}

impl HuffmanSlots {
    fn bind(&mut self, code: &JpegHuffmanCode, index: usize) -> Result<()> {
        let table = if code.is_ac { &mut self.ac } else { &mut self.dc };
        let slot = table.get_mut(code.id as usize).ok_or_else(|| {
            Error::InvalidJpegData(format!("Huffman slot {:#x} out of range", code.slot_id()))
        })?;
        *slot = Some(index);
        Ok(())
    }

    /// Looks up a slot id as written in DHT markers: 0x00 to 0x03 for DC,
    /// 0x10 to 0x13 for AC. Any other id has no table.
    pub fn get(&self, slot_id: u32) -> Option<usize> {
        let (table, id) = match slot_id {
            0x00..=0x0F => (&self.dc, slot_id),
            0x10..=0x1F => (&self.ac, slot_id - 0x10),
            _ => return None,
        };
        *table.get(id as usize)?
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::jpeg::{JpegComponent, JpegQuantTable, JpegScanInfo};

    fn code(is_ac: bool, id: u32, is_last: bool) -> JpegHuffmanCode {
        let mut code = JpegHuffmanCode::new();
        code.is_ac = is_ac;
        code.id = id;
        code.is_last = is_last;
        code.counts[1] = 1;
        code.values = vec![256];
        code
    }

    /// Two scans with a DHT marker in between that redefines AC slot 0.
    fn progressive() -> JpegData {
        let mut data = JpegData::new();
        data.marker_order = vec![SOI, DQT, DHT, SOS, DHT, SOS, EOI];
        data.quant.push(JpegQuantTable::new());
        data.components.push(JpegComponent::new());
        data.huffman_code = vec![
            code(false, 0, false),
            code(true, 0, true),
            code(true, 0, false),
            code(true, 1, true),
        ];
        data.scan_info = vec![JpegScanInfo::new(), JpegScanInfo::new()];
        data
    }

    #[test]
    fn counts() {
        let counts = MarkerCounts::from_marker_order(&[
            SOI, 0xE0, 0xE2, 0xE2, COM, DQT, DRI, 0xFF, DHT, SOS, 0xFF, EOI,
        ]);
        assert_eq!(
            counts,
            MarkerCounts {
                num_app: 3,
                num_com: 1,
                num_scans: 1,
                num_dqt: 1,
                num_dht: 1,
                num_inter_marker_data: 2,
                has_dri: true,
            }
        );
    }

    #[test]
    fn segments() {
        assert_eq!(count_segments(std::iter::empty()), Some(0));
        assert_eq!(count_segments([false, true, true].into_iter()), Some(2));
        assert_eq!(count_segments([true, false].into_iter()), None);
    }

    #[test]
    fn accounting() {
        let data = progressive();
        data.check_marker_order().unwrap();

        let mut missing_eoi = progressive();
        missing_eoi.marker_order.pop();
        assert!(missing_eoi.check_marker_order().is_err());

        let mut extra_scan = progressive();
        extra_scan.scan_info.push(JpegScanInfo::new());
        assert!(extra_scan.check_marker_order().is_err());

        let mut open_dht = progressive();
        open_dht.huffman_code[3].is_last = false;
        assert!(open_dht.check_marker_order().is_err());

        let mut extra_dqt = progressive();
        extra_dqt.marker_order.insert(1, DQT);
        assert!(extra_dqt.check_marker_order().is_err());

        let mut unlisted_app = progressive();
        unlisted_app.app_data.push(vec![0xE0, 0, 2]);
        assert!(unlisted_app.check_marker_order().is_err());
    }

    #[test]
    fn later_dht_overrides_slot() {
        let data = progressive();
        let first = data.huffman_tables_for_scan(0).unwrap();
        assert_eq!(first.get(0x00), Some(0));
        assert_eq!(first.get(0x10), Some(1));
        assert_eq!(first.get(0x11), None);

        let second = data.huffman_tables_for_scan(1).unwrap();
        assert_eq!(second.get(0x00), Some(0));
        assert_eq!(second.get(0x10), Some(2));
        assert_eq!(second.get(0x11), Some(3));

        assert!(data.huffman_tables_for_scan(2).is_err());
    }

    #[test]
    fn scan_component_codes() {
        let mut data = progressive();
        data.scan_info[1].components[0].ac_tbl_idx = 1;
        assert!(std::ptr::eq(
            data.scan_huffman_code(0, 0, true).unwrap(),
            &data.huffman_code[1]
        ));
        assert!(std::ptr::eq(
            data.scan_huffman_code(1, 0, true).unwrap(),
            &data.huffman_code[3]
        ));
        data.scan_info[0].components[0].ac_tbl_idx = 1;
        assert!(matches!(
            data.scan_huffman_code(0, 0, true),
            Err(Error::MissingHuffmanTable { scan: 0, slot: 0x11 })
        ));
        assert!(data.scan_huffman_code(0, 1, false).is_err());
    }

    #[test]
    fn table_index_out_of_range() {
        let mut data = JpegData::new();
        data.marker_order = vec![SOI, DHT, SOS, EOI];
        data.huffman_code = vec![code(true, 0, true)];
        data.scan_info = vec![JpegScanInfo::new()];
        data.scan_info[0].components[0].dc_tbl_idx = 0x10;
        assert!(matches!(
            data.scan_huffman_code(0, 0, false),
            Err(Error::MissingHuffmanTable { scan: 0, slot: 0x10 })
        ));
        data.scan_info[0].components[0].ac_tbl_idx = 4;
        assert!(matches!(
            data.scan_huffman_code(0, 0, true),
            Err(Error::MissingHuffmanTable { scan: 0, slot: 0x14 })
        ));

        let slots = data.huffman_tables_for_scan(0).unwrap();
        assert_eq!(slots.get(0x10), Some(0));
        assert_eq!(slots.get(0x20), None);
        assert_eq!(slots.get(0x30), None);
    }
}
