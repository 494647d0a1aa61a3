// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VC-3 (DNxHD/DNxHR) writer helper (§4.11, component C11): every VC-3 frame carries a fixed-
//! format header whose `compression_id` field identifies the exact bitrate/resolution/bit-depth
//! variant in use. This module reads just that field so the descriptor layer (C4) can pick the
//! matching [`EssenceType`] variant without the caller needing to track it separately, and flags a
//! frame whose `compression_id` doesn't match what earlier frames on the same track established
//! (§8: a track's picture essence coding must not change mid-stream).
//!
//! The named compression IDs below are the ones a reader's constant-edit-unit-size fast path
//! switches on (see the `VC3_*` case labels it enumerates); VC-3's container format itself is not
//! otherwise bitstream-parsed here; the frame header's remaining fields (slice layout, Q-scale)
//! matter only to a decoder and are irrelevant to wrapping.

use mxf_core::errors::{inconsistent, Result};

/// Offset in bytes of the big-endian 32-bit `compression_id` field within a VC-3 frame header.
const COMPRESSION_ID_OFFSET: usize = 0x28;

/// A subset of the named VC-3/DNxHD compression IDs a writer is likely to encounter, covering
/// 1080p/1080i/720p at the bitrates a constant-edit-unit-size fast path depends on recognising.
/// Not exhaustive — an unrecognised ID is still wrapped correctly via [`VC3_HEADER_SIZE`], it's
/// just reported as [`CompressionVariant::Other`] rather than a named constant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompressionVariant {
    Vc3_1080p1235,
    Vc3_1080p1237,
    Vc3_1080p1238,
    Vc3_1080i1241,
    Vc3_1080i1242,
    Vc3_1080i1243,
    Vc3_1080i1244,
    Vc3_720p1250,
    Vc3_720p1251,
    Vc3_720p1252,
    Vc3_1080p1253,
    Vc3_720p1258,
    Vc3_1080p1259,
    Vc3_1080i1260,
    Other(u32),
}

fn classify_compression_id(cid: u32) -> CompressionVariant {
    match cid {
        1235 => CompressionVariant::Vc3_1080p1235,
        1237 => CompressionVariant::Vc3_1080p1237,
        1238 => CompressionVariant::Vc3_1080p1238,
        1241 => CompressionVariant::Vc3_1080i1241,
        1242 => CompressionVariant::Vc3_1080i1242,
        1243 => CompressionVariant::Vc3_1080i1243,
        1244 => CompressionVariant::Vc3_1080i1244,
        1250 => CompressionVariant::Vc3_720p1250,
        1251 => CompressionVariant::Vc3_720p1251,
        1252 => CompressionVariant::Vc3_720p1252,
        1253 => CompressionVariant::Vc3_1080p1253,
        1258 => CompressionVariant::Vc3_720p1258,
        1259 => CompressionVariant::Vc3_1080p1259,
        1260 => CompressionVariant::Vc3_1080i1260,
        other => CompressionVariant::Other(other),
    }
}

/// Reads the `compression_id` field from a VC-3 frame's header and classifies it (§4.11).
pub fn parse_compression_id(frame: &[u8]) -> Result<(u32, CompressionVariant)> {
    let bytes = match frame.get(COMPRESSION_ID_OFFSET..COMPRESSION_ID_OFFSET + 4) {
        Some(b) => b,
        None => return inconsistent("vc-3 frame is too short to contain a compression_id field"),
    };
    let cid = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Ok((cid, classify_compression_id(cid)))
}

/// Per-track VC-3 writer state: remembers the `compression_id` established by the first frame and
/// flags any later frame that doesn't match (§8).
#[derive(Default)]
pub struct Vc3WriterHelper {
    compression_id: Option<u32>,
}

impl Vc3WriterHelper {
    pub fn new() -> Self {
        Vc3WriterHelper { compression_id: None }
    }

    pub fn compression_id(&self) -> Option<u32> {
        self.compression_id
    }

    pub fn observe_frame(&mut self, frame: &[u8]) -> Result<CompressionVariant> {
        let (cid, variant) = parse_compression_id(frame)?;
        match self.compression_id {
            None => self.compression_id = Some(cid),
            Some(established) if established != cid => {
                return inconsistent("vc-3 compression_id changed mid-track");
            }
            Some(_) => {}
        }
        Ok(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(cid: u32) -> Vec<u8> {
        let mut data = vec![0u8; COMPRESSION_ID_OFFSET + 4];
        data[COMPRESSION_ID_OFFSET..COMPRESSION_ID_OFFSET + 4].copy_from_slice(&cid.to_be_bytes());
        data
    }

    #[test]
    fn verify_parse_compression_id_classifies_known_ids() {
        let frame = build_frame(1238);
        let (cid, variant) = parse_compression_id(&frame).unwrap();
        assert_eq!(cid, 1238);
        assert_eq!(variant, CompressionVariant::Vc3_1080p1238);
    }

    #[test]
    fn verify_parse_compression_id_reports_unknown_ids_as_other() {
        let frame = build_frame(9999);
        let (_, variant) = parse_compression_id(&frame).unwrap();
        assert_eq!(variant, CompressionVariant::Other(9999));
    }

    #[test]
    fn verify_parse_compression_id_rejects_short_frame() {
        let frame = vec![0u8; 4];
        assert!(parse_compression_id(&frame).is_err());
    }

    #[test]
    fn verify_writer_helper_detects_compression_id_change() {
        let mut helper = Vc3WriterHelper::new();
        helper.observe_frame(&build_frame(1238)).unwrap();
        assert!(helper.observe_frame(&build_frame(1241)).is_err());
    }
}
