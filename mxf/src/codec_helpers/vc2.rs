// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VC-2 writer helper (§4.11, component C11): VC-2 essence is delivered as a sequence of
//! "parse units", each introduced by a fixed 13-byte parse_info header (a 4-byte prefix, a 1-byte
//! parse code, and two 4-byte offsets to the previous/next parse unit). This engine supports the
//! two wrapping modes named in §4.11:
//!
//! - *Passthrough*: keep the parse unit stream exactly as delivered, one MXF edit unit per
//!   picture-carrying parse unit, with any sequence header/auxiliary/padding units immediately
//!   preceding a picture folded into that edit unit's essence data.
//! - *Picture-only*: extract only the coded picture payload for each frame, tracking sequence
//!   headers separately so a "complete sequence" (a sequence header, the pictures it governs, and
//!   the end-of-sequence unit) can be reconstructed on read.

use mxf_core::errors::{inconsistent, Result};

pub const PARSE_INFO_SIZE: usize = 13;
pub const PARSE_INFO_PREFIX: u32 = 0x4242_4344;

/// VC-2 parse unit classification, decoded from the parse_info header's `parse_code` byte (§4.11).
/// Mirrors the classification a VC-2 bitstream dumper performs: most codes are fixed values, but
/// any code with bit `0x08` set is some kind of picture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseUnitKind {
    SequenceHeader,
    EndOfSequence,
    AuxiliaryData,
    PaddingData,
    Picture(PictureCoding),
    /// `0x08` set but none of the four named picture codes matched — still a picture by the
    /// `parse_code & 0x08 == 0x08` rule, just not the wavelet-coding-vs-entropy-coding combination
    /// this engine names explicitly.
    UnknownPicture,
    Unknown(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PictureCoding {
    ArithmeticCoding,
    NoArithmeticCoding,
    LowDelay,
    HighQuality,
}

fn classify_parse_code(parse_code: u8) -> ParseUnitKind {
    match parse_code {
        0x00 => ParseUnitKind::SequenceHeader,
        0x10 => ParseUnitKind::EndOfSequence,
        0x20 => ParseUnitKind::AuxiliaryData,
        0x30 => ParseUnitKind::PaddingData,
        0x08 => ParseUnitKind::Picture(PictureCoding::ArithmeticCoding),
        0x48 => ParseUnitKind::Picture(PictureCoding::NoArithmeticCoding),
        0xc8 => ParseUnitKind::Picture(PictureCoding::LowDelay),
        0xe8 => ParseUnitKind::Picture(PictureCoding::HighQuality),
        _ if parse_code & 0x08 == 0x08 => ParseUnitKind::UnknownPicture,
        _ => ParseUnitKind::Unknown(parse_code),
    }
}

/// One parsed parse_info header plus the byte range (within the buffer it was parsed from) of the
/// parse unit it introduces, not including the header itself.
#[derive(Clone, Debug)]
pub struct ParseUnit {
    pub kind: ParseUnitKind,
    /// Offset of this parse unit's `parse_info` header within the source buffer.
    pub offset: usize,
    pub next_parse_offset: u32,
    pub prev_parse_offset: u32,
    /// Byte range of the payload following the 13-byte parse_info header, up to (but not
    /// including) the next parse unit's header, or to the end of the buffer if this is the last
    /// unit and `next_parse_offset` is `0` (end of sequence/stream).
    pub payload: std::ops::Range<usize>,
}

/// Scans `data` for parse units starting at offset `0` (which must itself be the start of a
/// parse_info header), returning every unit found in stream order (§4.11).
pub fn scan_parse_units(data: &[u8]) -> Result<Vec<ParseUnit>> {
    let mut units = Vec::new();
    let mut offset = 0usize;

    while offset + PARSE_INFO_SIZE <= data.len() {
        let prefix = u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]);
        if prefix != PARSE_INFO_PREFIX {
            return inconsistent("vc-2 parse unit does not begin with the expected parse_info prefix");
        }
        let parse_code = data[offset + 4];
        let next_parse_offset = u32::from_be_bytes([
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
            data[offset + 8],
        ]);
        let prev_parse_offset = u32::from_be_bytes([
            data[offset + 9],
            data[offset + 10],
            data[offset + 11],
            data[offset + 12],
        ]);

        let payload_start = offset + PARSE_INFO_SIZE;
        let payload_end = if next_parse_offset > 0 {
            let end = offset + next_parse_offset as usize;
            if end < payload_start || end > data.len() {
                return inconsistent("vc-2 next_parse_offset points outside the supplied buffer");
            }
            end
        }
        else {
            data.len()
        };

        units.push(ParseUnit {
            kind: classify_parse_code(parse_code),
            offset,
            next_parse_offset,
            prev_parse_offset,
            payload: payload_start..payload_end,
        });

        if next_parse_offset == 0 {
            break;
        }
        offset += next_parse_offset as usize;
    }

    Ok(units)
}

/// How a VC-2 track's essence is wrapped into MXF edit units (§4.11).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Vc2WrappingMode {
    /// One edit unit per input parse-unit group; bytes are carried through unchanged.
    Passthrough,
    /// One edit unit per coded picture; sequence headers are tracked separately rather than
    /// embedded in each edit unit.
    PictureOnly,
}

/// Per-track VC-2 writer state (§4.11).
pub struct Vc2WriterHelper {
    mode: Vc2WrappingMode,
    /// The most recently seen sequence header's raw bytes (parse_info header included), kept so a
    /// `PictureOnly` track can still answer "what sequence header governs this picture" without
    /// re-scanning earlier frames.
    current_sequence_header: Option<Vec<u8>>,
    sequence_count: u64,
    picture_count: u64,
}

impl Vc2WriterHelper {
    pub fn new(mode: Vc2WrappingMode) -> Self {
        Vc2WriterHelper { mode, current_sequence_header: None, sequence_count: 0, picture_count: 0 }
    }

    pub fn mode(&self) -> Vc2WrappingMode {
        self.mode
    }

    pub fn sequence_count(&self) -> u64 {
        self.sequence_count
    }

    pub fn picture_count(&self) -> u64 {
        self.picture_count
    }

    pub fn current_sequence_header(&self) -> Option<&[u8]> {
        self.current_sequence_header.as_deref()
    }

    /// Processes one chunk of VC-2 elementary stream data (which may contain a sequence header,
    /// zero or more auxiliary/padding units, and exactly one picture, mirroring how a VC-2 frame is
    /// typically delivered) and returns the essence bytes for the next MXF edit unit, per this
    /// helper's wrapping mode. Returns `Ok(None)` if the chunk carries no picture (e.g. a bare
    /// end-of-sequence marker) and so produces no edit unit on its own.
    pub fn process_chunk(&mut self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let units = scan_parse_units(data)?;
        let mut picture_range: Option<std::ops::Range<usize>> = None;
        let mut picture_header_offset: Option<usize> = None;

        for unit in &units {
            match unit.kind {
                ParseUnitKind::SequenceHeader => {
                    self.current_sequence_header = Some(data[unit.offset..unit.payload.end].to_vec());
                    self.sequence_count += 1;
                }
                ParseUnitKind::EndOfSequence => {}
                ParseUnitKind::Picture(_) | ParseUnitKind::UnknownPicture => {
                    if picture_range.is_some() {
                        return inconsistent("vc-2 chunk carries more than one picture parse unit");
                    }
                    picture_header_offset = Some(unit.offset);
                    picture_range = Some(unit.payload.clone());
                }
                ParseUnitKind::AuxiliaryData | ParseUnitKind::PaddingData | ParseUnitKind::Unknown(_) => {}
            }
        }

        let picture_range = match picture_range {
            None => return Ok(None),
            Some(r) => r,
        };
        self.picture_count += 1;

        match self.mode {
            Vc2WrappingMode::Passthrough => Ok(Some(data.to_vec())),
            Vc2WrappingMode::PictureOnly => {
                let header_offset = picture_header_offset.expect("picture_range set implies a picture unit was seen");
                Ok(Some(data[header_offset..picture_range.end].to_vec()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_info(parse_code: u8, next_parse_offset: u32, prev_parse_offset: u32) -> Vec<u8> {
        let mut out = PARSE_INFO_PREFIX.to_be_bytes().to_vec();
        out.push(parse_code);
        out.extend_from_slice(&next_parse_offset.to_be_bytes());
        out.extend_from_slice(&prev_parse_offset.to_be_bytes());
        out
    }

    #[test]
    fn verify_classify_parse_code_matches_named_variants() {
        assert_eq!(classify_parse_code(0x00), ParseUnitKind::SequenceHeader);
        assert_eq!(classify_parse_code(0x10), ParseUnitKind::EndOfSequence);
        assert_eq!(classify_parse_code(0x20), ParseUnitKind::AuxiliaryData);
        assert_eq!(classify_parse_code(0x30), ParseUnitKind::PaddingData);
        assert_eq!(classify_parse_code(0x08), ParseUnitKind::Picture(PictureCoding::ArithmeticCoding));
        assert_eq!(classify_parse_code(0x48), ParseUnitKind::Picture(PictureCoding::NoArithmeticCoding));
        assert_eq!(classify_parse_code(0xc8), ParseUnitKind::Picture(PictureCoding::LowDelay));
        assert_eq!(classify_parse_code(0xe8), ParseUnitKind::Picture(PictureCoding::HighQuality));
    }

    #[test]
    fn verify_classify_parse_code_falls_back_to_picture_bit() {
        assert_eq!(classify_parse_code(0x88), ParseUnitKind::UnknownPicture);
        assert_eq!(classify_parse_code(0x01), ParseUnitKind::Unknown(0x01));
    }

    #[test]
    fn verify_scan_parse_units_walks_a_sequence_header_then_a_picture() {
        let mut data = parse_info(0x00, PARSE_INFO_SIZE as u32 + 4, 0);
        data.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]); // fake sequence header payload
        let picture_offset = data.len();
        data.extend_from_slice(&parse_info(0xe8, 0, PARSE_INFO_SIZE as u32 + 4));
        data.extend_from_slice(&[0x11, 0x22, 0x33]); // fake picture payload

        let units = scan_parse_units(&data).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].kind, ParseUnitKind::SequenceHeader);
        assert_eq!(units[1].offset, picture_offset);
        assert_eq!(units[1].kind, ParseUnitKind::Picture(PictureCoding::HighQuality));
        assert_eq!(&data[units[1].payload.clone()], &[0x11, 0x22, 0x33]);
    }

    #[test]
    fn verify_scan_parse_units_rejects_bad_prefix() {
        let mut data = parse_info(0x00, 0, 0);
        data[0] = 0x00;
        assert!(scan_parse_units(&data).is_err());
    }

    fn build_chunk(with_sequence_header: bool) -> Vec<u8> {
        let mut data = Vec::new();
        if with_sequence_header {
            let seq = parse_info(0x00, PARSE_INFO_SIZE as u32 + 4, 0);
            data.extend_from_slice(&seq);
            data.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
        }
        let pic_offset = data.len();
        let _ = pic_offset;
        data.extend_from_slice(&parse_info(0xe8, 0, 0));
        data.extend_from_slice(&[1, 2, 3, 4, 5]);
        data
    }

    #[test]
    fn verify_passthrough_mode_returns_whole_chunk() {
        let mut helper = Vc2WriterHelper::new(Vc2WrappingMode::Passthrough);
        let chunk = build_chunk(true);
        let out = helper.process_chunk(&chunk).unwrap().unwrap();
        assert_eq!(out, chunk);
        assert_eq!(helper.picture_count(), 1);
        assert_eq!(helper.sequence_count(), 1);
    }

    #[test]
    fn verify_picture_only_mode_extracts_just_the_picture() {
        let mut helper = Vc2WriterHelper::new(Vc2WrappingMode::PictureOnly);
        let chunk = build_chunk(true);
        let out = helper.process_chunk(&chunk).unwrap().unwrap();

        let picture_start = chunk.len() - (PARSE_INFO_SIZE + 5);
        assert_eq!(out, chunk[picture_start..]);
        assert!(helper.current_sequence_header().is_some());
    }

    #[test]
    fn verify_chunk_with_only_end_of_sequence_yields_no_edit_unit() {
        let mut helper = Vc2WriterHelper::new(Vc2WrappingMode::Passthrough);
        let chunk = parse_info(0x10, 0, 0);
        let out = helper.process_chunk(&chunk).unwrap();
        assert!(out.is_none());
    }
}
