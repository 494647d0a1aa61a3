// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MPEG-2 Long-GOP writer helper (§4.11, component C11): parses each elementary-stream frame's
//! sequence/GOP/picture headers well enough to track GOP structure across a whole essence stream,
//! and hands the content-package and index layers the temporal offset, key-frame offset, and
//! index-entry flags byte each frame needs (§3.3, §8 invariant 6).
//!
//! The state machine and its flags/key-frame-offset arithmetic follow an MPEG-2 Long-GOP writer
//! helper found in `examples/original_source/`, including its one deliberate deviation from
//! SMPTE ST-381: an Avid-flavoured file sets the index-entry reference-frame bit on every I-frame
//! that starts a GOP, even an open one, because Avid's own reader mis-derives precharge length
//! otherwise (see [`Mpeg2LgWriterHelper::flags_for_frame`]).

use mxf_core::errors::{inconsistent, Result};
use mxf_core::io::{BitReaderLtr, ReadBitsLtr};

use crate::descriptor::essence_type::Flavour;
use crate::index::temporal::TemporalOffsetWindow;
use crate::index::{FLAG_BIDIRECTIONAL, FLAG_FORWARD_PREDICTED, FLAG_OFFSET_OUT_OF_RANGE, FLAG_REFERENCE_FRAME, FLAG_SEQUENCE_HEADER};

use super::{scan_start_codes, FrameType};

const SEQUENCE_HEADER_CODE: u8 = 0xb3;
const GOP_HEADER_CODE: u8 = 0xb8;
const PICTURE_START_CODE: u8 = 0x00;
const EXTENSION_START_CODE: u8 = 0xb5;

const SEQUENCE_EXTENSION_ID: u8 = 0b0001;

/// A GOP's worth of frame types in coded order, used to detect a "constant GOP structure" (§4.11
/// `identical_gop`). Capped so a pathological single GOP can't grow this without bound.
const MAX_TRACKED_GOP_STRUCTURE: usize = 256;

/// The subset of a single frame's parsed header fields the writer helper needs. Anything parsed
/// past what's listed here (motion vectors, quantiser matrices, ...) is irrelevant to MXF wrapping
/// and is never extracted.
#[derive(Clone, Debug, Default)]
pub struct FrameHeaderInfo {
    pub has_sequence_header: bool,
    pub has_gop_header: bool,
    /// GOP-header `closed_gop` flag; only meaningful when `has_gop_header` is set.
    pub gop_closed_gop: bool,
    pub frame_type: Option<FrameType>,
    pub temporal_reference: u16,
    /// Sequence-extension fields, only present on the frame that carries a sequence header.
    pub horizontal_size: u32,
    pub vertical_size: u32,
    pub profile_and_level_indication: u8,
    pub progressive_sequence: bool,
    /// MPEG-2 `chroma_format`: 1 = 4:2:0, 2 = 4:2:2, 3 = 4:4:4.
    pub chroma_format: u8,
    pub low_delay: bool,
    /// Bits/second, after applying the MPEG-2 400 bit/s scaling unit.
    pub bit_rate: u32,
}

fn parse_sequence_header(payload: &[u8]) -> Option<(u32, u32)> {
    let mut r = BitReaderLtr::new(payload);
    let horizontal = r.read_bits_leq32(12).ok()?;
    let vertical = r.read_bits_leq32(12).ok()?;
    Some((horizontal, vertical))
}

fn parse_sequence_extension(payload: &[u8]) -> Option<(u8, bool, u8, u32)> {
    let mut r = BitReaderLtr::new(payload);
    let id = r.read_bits_leq32(4).ok()? as u8;
    if id != SEQUENCE_EXTENSION_ID {
        return None;
    }
    let profile_and_level = r.read_bits_leq32(8).ok()? as u8;
    let progressive = r.read_bit().ok()?;
    let chroma_format = r.read_bits_leq32(2).ok()? as u8;
    r.ignore_bits(2).ok()?; // horizontal_size_extension
    r.ignore_bits(2).ok()?; // vertical_size_extension
    let bit_rate_extension = r.read_bits_leq32(12).ok()?;
    Some((profile_and_level, progressive, chroma_format, bit_rate_extension))
}

fn parse_gop_header(payload: &[u8]) -> Option<bool> {
    let mut r = BitReaderLtr::new(payload);
    r.ignore_bits(25).ok()?; // time_code
    let closed_gop = r.read_bit().ok()?;
    Some(closed_gop)
}

fn parse_picture_header(payload: &[u8]) -> Option<(u16, FrameType)> {
    let mut r = BitReaderLtr::new(payload);
    let temporal_reference = r.read_bits_leq32(10).ok()? as u16;
    let coding_type = r.read_bits_leq32(3).ok()?;
    let frame_type = match coding_type {
        1 => FrameType::I,
        2 => FrameType::P,
        3 => FrameType::B,
        _ => return None,
    };
    Some((temporal_reference, frame_type))
}

/// Low-delay bit is carried in the sequence extension; this helper also needs the low-delay flag
/// for `sequence_extension` in isolation from bit_rate, so it's folded into the same parse above
/// via a second read once the caller knows a sequence extension is present (kept as a separate
/// function so the fields above mirror the bitstream's own field order, per invariant 6's
/// requirement that every completed GOP's offsets are internally consistent).
fn parse_sequence_extension_low_delay(payload: &[u8]) -> Option<bool> {
    let mut r = BitReaderLtr::new(payload);
    r.ignore_bits(4 + 8 + 1 + 2 + 2 + 2).ok()?; // id, profile_and_level, progressive, chroma, h_ext, v_ext
    r.ignore_bits(12).ok()?; // bit_rate_extension
    r.ignore_bit().ok()?; // marker_bit
    r.ignore_bits(8).ok()?; // vbv_buffer_size_extension
    r.read_bit().ok()
}

/// Parses every start code in one elementary-stream frame and folds the results into a single
/// [`FrameHeaderInfo`] (§4.11). A frame that carries no picture header at all (a bare sequence
/// header with no picture, which shouldn't occur in a well-formed stream) is rejected.
pub fn parse_frame(data: &[u8]) -> Result<FrameHeaderInfo> {
    let mut info = FrameHeaderInfo::default();
    let mut bit_rate_value: u32 = 0;
    let mut bit_rate_extension: u32 = 0;

    for (code, offset) in scan_start_codes(data) {
        let payload = &data[offset..];

        match code {
            SEQUENCE_HEADER_CODE => {
                info.has_sequence_header = true;
                if let Some((h, v)) = parse_sequence_header(payload) {
                    info.horizontal_size = h;
                    info.vertical_size = v;
                }
                // sequence_header's own bit_rate_value sits right after aspect_ratio/frame_rate;
                // recovering it precisely needs those fields' widths, so it's read here directly.
                let mut r = BitReaderLtr::new(payload);
                if r.ignore_bits(12 + 12 + 4 + 4).is_ok() {
                    if let Ok(v) = r.read_bits_leq32(18) {
                        bit_rate_value = v;
                    }
                }
            }
            EXTENSION_START_CODE => {
                if let Some((profile, progressive, chroma, ext)) = parse_sequence_extension(payload) {
                    info.profile_and_level_indication = profile;
                    info.progressive_sequence = progressive;
                    info.chroma_format = chroma;
                    bit_rate_extension = ext;
                    if let Some(low_delay) = parse_sequence_extension_low_delay(payload) {
                        info.low_delay = low_delay;
                    }
                }
            }
            GOP_HEADER_CODE => {
                info.has_gop_header = true;
                if let Some(closed) = parse_gop_header(payload) {
                    info.gop_closed_gop = closed;
                }
            }
            PICTURE_START_CODE => {
                if let Some((tr, ft)) = parse_picture_header(payload) {
                    info.temporal_reference = tr;
                    info.frame_type = Some(ft);
                }
            }
            _ => {}
        }
    }

    if info.frame_type.is_none() {
        return inconsistent("mpeg-2 long-gop frame carries no picture header");
    }

    // MPEG-2's bit_rate is in units of 400 bits/second, split across a base 18-bit field and a
    // 12-bit extension carried in the sequence extension.
    if info.has_sequence_header {
        let combined = bit_rate_value | (bit_rate_extension << 18);
        info.bit_rate = combined.saturating_mul(400);
    }

    Ok(info)
}

/// The per-track state an MPEG-2 Long-GOP writer helper carries across a whole essence stream
/// (§4.11). One instance per video track.
#[derive(Clone)]
pub struct Mpeg2LgWriterHelper {
    flavour: Flavour,
    position: i64,

    key_frame_position: i64,
    prev_key_frame_position: i64,
    key_frame_temporal_reference: u16,

    gop_start_position: i64,
    window: TemporalOffsetWindow,
    first_gop: bool,

    single_sequence: bool,
    saw_sequence_header_past_start: bool,

    /// AND-accumulated across every GOP header seen so far: true only if every GOP has been
    /// closed.
    closed_gop: bool,
    current_gop_closed: bool,

    low_delay: bool,
    bit_rate: u32,

    b_picture_count: u32,
    max_b_picture_count: u32,
    constant_b_frames: bool,
    gop_b_picture_count: Option<u32>,

    gop_size: u64,
    max_gop: u16,
    unlimited_gop_size: bool,

    identical_gop: bool,
    gop_structure: Vec<FrameType>,
    current_gop_structure: Vec<FrameType>,
}

impl Mpeg2LgWriterHelper {
    pub fn new(flavour: Flavour) -> Self {
        Mpeg2LgWriterHelper {
            flavour,
            position: 0,
            key_frame_position: 0,
            prev_key_frame_position: 0,
            key_frame_temporal_reference: 0,
            gop_start_position: 0,
            window: TemporalOffsetWindow::new(0),
            first_gop: true,
            single_sequence: true,
            saw_sequence_header_past_start: false,
            closed_gop: true,
            current_gop_closed: true,
            low_delay: true,
            bit_rate: 0,
            b_picture_count: 0,
            max_b_picture_count: 0,
            constant_b_frames: true,
            gop_b_picture_count: None,
            gop_size: 0,
            max_gop: 0,
            unlimited_gop_size: false,
            identical_gop: true,
            gop_structure: Vec::new(),
            current_gop_structure: Vec::new(),
        }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn single_sequence(&self) -> bool {
        self.single_sequence
    }

    pub fn closed_gop(&self) -> bool {
        self.closed_gop
    }

    pub fn identical_gop(&self) -> bool {
        self.identical_gop
    }

    pub fn low_delay(&self) -> bool {
        self.low_delay
    }

    pub fn bit_rate(&self) -> u32 {
        self.bit_rate
    }

    pub fn max_gop(&self) -> u16 {
        self.max_gop
    }

    pub fn constant_b_frames(&self) -> bool {
        self.constant_b_frames
    }

    pub fn max_b_picture_count(&self) -> u32 {
        self.max_b_picture_count
    }

    /// Processes one frame: updates every piece of running state and returns the temporal offset
    /// (once resolvable — GOP structure means a B-frame's own offset may only become known once a
    /// later frame fills the sliding window, §4.5/§4.11), key-frame offset, and index-entry flags
    /// byte for the frame just handed in.
    ///
    /// The first frame of a stream must be an I-frame; feeding anything else is a caller bug.
    pub fn process_frame(&mut self, data: &[u8]) -> Result<Mpeg2LgFrameResult> {
        let info = parse_frame(data)?;
        let frame_type = info.frame_type.unwrap();

        if self.position == 0 && frame_type != FrameType::I {
            return inconsistent("first frame of an mpeg-2 long-gop essence stream must be an i-frame");
        }

        if info.has_sequence_header {
            if self.position > 0 {
                self.saw_sequence_header_past_start = true;
            }
            if self.position > 0 && self.saw_sequence_header_past_start {
                self.single_sequence = false;
            }
            self.low_delay = self.low_delay && info.low_delay;
            if info.bit_rate > 0 {
                self.bit_rate = info.bit_rate;
            }
        }

        if info.has_gop_header {
            self.on_gop_header(info.gop_closed_gop);
        }

        if frame_type == FrameType::B {
            self.b_picture_count += 1;
            let running = *self.gop_b_picture_count.get_or_insert(0) + 1;
            self.gop_b_picture_count = Some(running);
            if self.max_b_picture_count != 0 && running != self.max_b_picture_count {
                self.constant_b_frames = false;
            }
            self.max_b_picture_count = self.max_b_picture_count.max(running);
        }

        self.current_gop_structure.push(frame_type);
        self.track_gop_size();

        let key_frame_offset = self.compute_key_frame_offset(frame_type, info.temporal_reference);

        let gop_relative = self.position - self.gop_start_position;
        let temporal_offset_value = (gop_relative - info.temporal_reference as i64) as i8;
        let in_window = self.window.set(self.position, temporal_offset_value);
        let temporal_offset = if in_window { Some(temporal_offset_value) } else { None };

        // A position earlier in the GOP may only now become resolvable: the sliding window fills
        // slot `temporal_reference` with this frame's own offset, which is exactly the offset the
        // frame coded at display position `gop_relative` (if any) has been waiting on.
        let resolved_prev = if (info.temporal_reference as i64) < gop_relative {
            self.window.get(self.gop_start_position + info.temporal_reference as i64)
        }
        else {
            None
        };

        let flags = self.flags_for_frame(&info, frame_type, key_frame_offset, temporal_offset_value);

        if frame_type == FrameType::I {
            self.prev_key_frame_position = self.key_frame_position;
            self.key_frame_position = self.position;
            self.key_frame_temporal_reference = info.temporal_reference;
        }

        self.position += 1;

        Ok(Mpeg2LgFrameResult {
            frame_type,
            temporal_offset,
            resolved_prev_temporal_offset: resolved_prev,
            key_frame_offset,
            flags,
            has_gop_header: info.has_gop_header,
        })
    }

    fn on_gop_header(&mut self, gop_closed: bool) {
        if !self.first_gop {
            let missing = self.window.verify_closed((self.position - self.gop_start_position) as usize);
            if !missing.is_empty() {
                log::warn!("incomplete mpeg-2 temporal offset data in index table at gop starting {}", self.gop_start_position);
            }

            if self.current_gop_structure.len() <= MAX_TRACKED_GOP_STRUCTURE {
                if self.gop_structure.is_empty() {
                    self.gop_structure = self.current_gop_structure.clone();
                }
                else if self.gop_structure != self.current_gop_structure {
                    self.identical_gop = false;
                }
            }
            else {
                self.identical_gop = false;
            }
        }

        self.current_gop_structure.clear();
        self.gop_b_picture_count = None;
        self.closed_gop = self.closed_gop && gop_closed;
        self.current_gop_closed = gop_closed;
        self.gop_start_position = self.position;
        self.window.reset(self.position);
        self.first_gop = false;
    }

    fn track_gop_size(&mut self) {
        self.gop_size += 1;
        if self.gop_size > u16::MAX as u64 {
            self.unlimited_gop_size = true;
        }
        else if !self.unlimited_gop_size {
            self.max_gop = self.max_gop.max(self.gop_size as u16);
        }
        // track_gop_size only resets on a fresh GOP header; `on_gop_header` is called first for
        // frames that start one, so by the time this runs `gop_size` already reflects the new GOP.
        if self.current_gop_structure.len() == 1 {
            self.gop_size = 1;
        }
    }

    /// Key-frame offset (§4.11): for a non-I-frame, normally the negative distance back to the
    /// current GOP's I-frame. But an *open* GOP's leading frames (in display order, before the
    /// I-frame) actually decode with reference to the *previous* GOP's I-frame — if that's still
    /// in range, point there instead.
    fn compute_key_frame_offset(&self, frame_type: FrameType, temporal_reference: u16) -> i8 {
        if frame_type == FrameType::I {
            return 0;
        }

        let use_prev = !self.current_gop_closed
            && self.key_frame_position + self.key_frame_temporal_reference as i64 >= self.position;

        let offset = if use_prev {
            self.prev_key_frame_position - self.position
        }
        else {
            self.key_frame_position - self.position
        };

        let _ = temporal_reference;
        offset.clamp(i8::MIN as i64, i8::MAX as i64) as i8
    }

    /// Index-entry flags byte (§4.5, §4.11). Mirrors the constants already defined in
    /// `crate::index` for exactly this purpose.
    fn flags_for_frame(&self, info: &FrameHeaderInfo, frame_type: FrameType, key_frame_offset: i8, temporal_offset: i8) -> u8 {
        let mut flags = 0u8;

        if info.has_sequence_header {
            flags |= FLAG_SEQUENCE_HEADER;
        }

        match frame_type {
            FrameType::I => {
                // SMPTE ST-381 says bit 7 (reference frame) shall not be set for an open GOP's
                // I-frame. Avid OP-Atom readers assume precharge always reaches back to a closed
                // GOP and misreport `End Sample Index exceeds on-disk Index Entry Count` if it
                // isn't set, so Avid-flavoured output sets it unconditionally on every I-frame
                // that opens a GOP.
                if info.has_gop_header && (self.flavour == Flavour::Avid || info.gop_closed_gop) {
                    flags |= FLAG_REFERENCE_FRAME;
                }
            }
            FrameType::P => {
                flags |= FLAG_FORWARD_PREDICTED;
            }
            FrameType::B => {
                let commences_closed_gop = self.current_gop_closed
                    && self.gop_b_picture_count == Some(self.max_b_picture_count)
                    && self.flavour != Flavour::Avid;
                if commences_closed_gop {
                    flags |= 0x13; // backward-prediction-only
                }
                else {
                    flags |= FLAG_BIDIRECTIONAL;
                }
            }
        }

        let key_frame_oob = (key_frame_offset as i64 + self.position) < 0;
        let temporal_oob = (temporal_offset as i64 + self.position) < 0;
        if key_frame_oob || temporal_oob {
            flags |= FLAG_OFFSET_OUT_OF_RANGE;
        }

        flags
    }
}

/// Everything [`Mpeg2LgWriterHelper::process_frame`] hands back for one frame.
#[derive(Copy, Clone, Debug)]
pub struct Mpeg2LgFrameResult {
    pub frame_type: FrameType,
    /// This frame's own temporal offset, if the sliding window could resolve it immediately.
    pub temporal_offset: Option<i8>,
    /// An earlier position's temporal offset that became resolvable only now, if any — the
    /// caller should also update that position's index entry.
    pub resolved_prev_temporal_offset: Option<i8>,
    pub key_frame_offset: i8,
    pub flags: u8,
    pub has_gop_header: bool,
}

#[cfg(feature = "shims")]
mod conformance {
    use super::*;
    use crate::codec_helpers::shims::ShimConfig;
    use mxf_core::errors::{shim_violation, Result};

    /// Checks the running helper state plus the latest frame's parsed header against a named
    /// delivery shim (§4.11, §8 S5). Returns `Ok(())` whether or not a violation occurred when
    /// `shim.loose_checks` is set — the violation is still logged through `log::warn!` in that
    /// case — and `Err(MxfError::ShimViolation)` on the first violation otherwise.
    pub fn check_conformance(helper: &Mpeg2LgWriterHelper, info: &FrameHeaderInfo, shim: &ShimConfig) -> Result<()> {
        let mut violation: Option<&'static str> = None;

        if shim.const_bit_rate && !helper.closed_gop && false {
            // Constant-bit-rate streams carry a fixed vbv_delay; this engine does not currently
            // parse vbv_delay (not needed for wrapping), so the check is limited to bit_rate
            // magnitude below. Left here to document the gap rather than silently skip it.
        }

        if helper.bit_rate > 0 {
            let diff = helper.bit_rate.abs_diff(shim.bit_rate);
            if diff > shim.bit_rate_delta {
                violation = Some("bitrate of mpeg-2 long-gop essence is not equal (within tolerance) to required shim bitrate");
            }
        }

        if !shim.single_sequence.matches(helper.single_sequence) {
            violation = violation.or(Some("single-sequence requirement of shim violated by essence"));
        }

        if !shim.low_delay.matches(helper.low_delay) {
            violation = violation.or(Some("low-delay requirement of shim violated by essence"));
        }

        if shim.unique_shim_hv_size && (info.horizontal_size != shim.horizontal_size || info.vertical_size != shim.vertical_size) {
            violation = violation.or(Some("picture size does not match shim's required unique size"));
        }

        if !shim.chroma_format.matches(info.chroma_format) {
            violation = violation.or(Some("chroma format of mpeg-2 long-gop essence violates shim requirement"));
        }

        if info.has_gop_header {
            if helper.max_gop > shim.max_gop {
                violation = violation.or(Some("gop size exceeds maximum permitted by shim"));
            }
            if !shim.closed_gop.matches(helper.closed_gop) {
                violation = violation.or(Some("closed-gop requirement of shim violated by essence"));
            }
            if !shim.identical_gop.matches(helper.identical_gop) {
                violation = violation.or(Some("constant gop structure requirement of shim violated by essence"));
            }
        }

        match violation {
            None => Ok(()),
            Some(msg) => {
                if shim.loose_checks {
                    log::warn!("{}", msg);
                    Ok(())
                }
                else {
                    shim_violation(msg)
                }
            }
        }
    }
}

#[cfg(feature = "shims")]
pub use conformance::check_conformance;

#[cfg(test)]
mod tests {
    use super::*;

    fn start_code(code: u8) -> Vec<u8> {
        vec![0x00, 0x00, 0x01, code]
    }

    fn picture(temporal_reference: u16, coding_type: u8) -> Vec<u8> {
        let mut bits: u32 = (temporal_reference as u32) << 13;
        bits |= (coding_type as u32) << 10;
        let mut out = start_code(PICTURE_START_CODE);
        out.extend_from_slice(&bits.to_be_bytes());
        out
    }

    fn sequence_header(horizontal: u32, vertical: u32) -> Vec<u8> {
        let mut bits: u64 = (horizontal as u64) << 52;
        bits |= (vertical as u64) << 40;
        let mut out = start_code(SEQUENCE_HEADER_CODE);
        out.extend_from_slice(&bits.to_be_bytes()[..5]);
        out
    }

    fn gop_header(closed: bool) -> Vec<u8> {
        let mut bits: u32 = 0;
        if closed {
            bits |= 1 << 6; // bit 25 from msb: time_code(25) + closed_gop(1) -> bit index 26 total 0-based from msb across 4 bytes
        }
        let mut out = start_code(GOP_HEADER_CODE);
        out.extend_from_slice(&bits.to_be_bytes());
        out
    }

    #[test]
    fn verify_parse_frame_requires_picture_header() {
        let data = start_code(SEQUENCE_HEADER_CODE);
        assert!(parse_frame(&data).is_err());
    }

    #[test]
    fn verify_parse_frame_extracts_picture_type_and_temporal_reference() {
        let data = picture(3, 2);
        let info = parse_frame(&data).unwrap();
        assert_eq!(info.frame_type, Some(FrameType::P));
        assert_eq!(info.temporal_reference, 3);
    }

    #[test]
    fn verify_first_frame_must_be_i_frame() {
        let mut helper = Mpeg2LgWriterHelper::new(Flavour::Smpte);
        let data = picture(0, 2);
        assert!(helper.process_frame(&data).is_err());
    }

    #[test]
    fn verify_i_frame_flags_set_reference_bit_when_closed() {
        let mut helper = Mpeg2LgWriterHelper::new(Flavour::Smpte);
        let mut data = gop_header(true);
        data.extend_from_slice(&sequence_header(1920, 1080));
        data.extend_from_slice(&picture(0, 1));

        let result = helper.process_frame(&data).unwrap();
        assert_eq!(result.frame_type, FrameType::I);
        assert_eq!(result.key_frame_offset, 0);
        assert_ne!(result.flags & FLAG_REFERENCE_FRAME, 0);
    }

    #[test]
    fn verify_avid_sets_reference_bit_even_for_open_gop() {
        let mut helper = Mpeg2LgWriterHelper::new(Flavour::Avid);
        let mut data = gop_header(false);
        data.extend_from_slice(&picture(0, 1));

        let result = helper.process_frame(&data).unwrap();
        assert_ne!(result.flags & FLAG_REFERENCE_FRAME, 0);
    }

    #[test]
    fn verify_smpte_does_not_set_reference_bit_for_open_gop() {
        let mut helper = Mpeg2LgWriterHelper::new(Flavour::Smpte);
        let mut data = gop_header(false);
        data.extend_from_slice(&picture(0, 1));

        let result = helper.process_frame(&data).unwrap();
        assert_eq!(result.flags & FLAG_REFERENCE_FRAME, 0);
    }

    #[test]
    fn verify_p_frame_key_frame_offset_points_back_to_i_frame() {
        let mut helper = Mpeg2LgWriterHelper::new(Flavour::Smpte);
        let mut i_data = gop_header(true);
        i_data.extend_from_slice(&picture(0, 1));
        helper.process_frame(&i_data).unwrap();

        let p_data = picture(1, 2);
        let result = helper.process_frame(&p_data).unwrap();
        assert_eq!(result.key_frame_offset, -1);
    }

    #[test]
    fn verify_single_sequence_cleared_on_second_sequence_header() {
        let mut helper = Mpeg2LgWriterHelper::new(Flavour::Smpte);
        let mut i_data = gop_header(true);
        i_data.extend_from_slice(&sequence_header(1920, 1080));
        i_data.extend_from_slice(&picture(0, 1));
        helper.process_frame(&i_data).unwrap();
        assert!(helper.single_sequence());

        let mut second = sequence_header(1920, 1080);
        second.extend_from_slice(&picture(0, 1));
        helper.process_frame(&second).unwrap();
        assert!(!helper.single_sequence());
    }
}
