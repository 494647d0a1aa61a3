// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The content-package manager (§3.5, §4.7, component C7): one logical record per edit unit,
//! either frame-wrapped (a system item followed by each track's element, in data/picture/sound
//! order) or clip-wrapped (a single KLV per track spanning the whole essence container).
//!
//! This module owns the in-memory staging of a content package's element bytes and their KLV
//! framing; it knows nothing about partition packs or index-table segments beyond the numbers
//! (`stream_offset`, element sizes) it hands back to the caller to record there.

use std::collections::HashMap;

use smallvec::SmallVec;

use mxf_core::errors::{inconsistent, unsupported, Result};
use mxf_core::io::{MediaSinkStream, WriteBytes};
use mxf_core::key::Key;
use mxf_core::klv;
use mxf_core::label;

pub mod timecode;

use timecode::{encode_smpte_timecode, get_rounded_tc_base, get_system_item_cp_rate, Timecode};

const SYSTEM_ITEM_METADATA_PACK_SIZE: u64 = 7 + 16 + 17 + 17;
const SYS_META_DATA_ITEM_FLAG: u8 = 0x02;
const SYS_META_SOUND_ITEM_FLAG: u8 = 0x04;
const SYS_META_PICTURE_ITEM_FLAG: u8 = 0x08;

/// Ordering contract for a frame-wrapped content package's elements (§3.5, §4.7): data before
/// picture before sound.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementKind {
    Data,
    Picture,
    Sound,
}

impl ElementKind {
    fn system_item_flag(self) -> u8 {
        match self {
            ElementKind::Data => SYS_META_DATA_ITEM_FLAG,
            ElementKind::Picture => SYS_META_PICTURE_ITEM_FLAG,
            ElementKind::Sound => SYS_META_SOUND_ITEM_FLAG,
        }
    }
}

/// How a track's essence is carried: one element per edit unit, or one element for the entire
/// essence container (§3.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wrapping {
    Frame,
    Clip,
}

/// A registered track's static framing: its element key, KAG-alignment behaviour, and (for
/// frame-wrapped tracks with a repeating sample pattern, e.g. 1001/1000 pulldown audio) the
/// sample-sequence cycle the writer advances through (§4.7 `register_element`).
pub struct ContentPackageElement {
    track_index: u32,
    kind: ElementKind,
    key: Key,
    min_llen: u8,
    wrapping: Wrapping,
    /// Samples-per-edit-unit cycle; `[1]` for a fixed one-sample-per-frame track. Indexed modulo
    /// its own length by edit-unit position.
    sample_sequence: Vec<u32>,
    /// Fixed essence length in bytes for every edit unit of a frame-wrapped track, if constant.
    constant_essence_len: Option<u64>,
}

impl ContentPackageElement {
    pub fn new(track_index: u32, kind: ElementKind, key: Key, min_llen: u8, wrapping: Wrapping) -> Self {
        ContentPackageElement {
            track_index,
            kind,
            key,
            min_llen,
            wrapping,
            sample_sequence: vec![1],
            constant_essence_len: None,
        }
    }

    /// Sets the repeating samples-per-edit-unit cycle (e.g. `[1602, 1601, 1602, 1601, 1602]` for
    /// 48kHz audio locked to 29.97fps video). Must be non-empty.
    pub fn set_sample_sequence(&mut self, sequence: Vec<u32>) -> Result<()> {
        if sequence.is_empty() {
            return inconsistent("sample sequence must not be empty");
        }
        self.sample_sequence = sequence;
        Ok(())
    }

    pub fn set_constant_essence_len(&mut self, len: u64) {
        self.constant_essence_len = Some(len);
    }

    pub fn num_samples(&self, position: i64) -> u32 {
        let cycle = &self.sample_sequence;
        let index = (position.rem_euclid(cycle.len() as i64)) as usize;
        cycle[index]
    }

    fn write_kl(&self, sink: &mut MediaSinkStream, len: u64) -> Result<()> {
        klv::write_key_and_length(sink, &self.key, len, self.min_llen)
    }
}

/// Replicates the exact KAG-fill arithmetic a content-package element needs: the fill keeps
/// growing in whole `kag_size` steps until it is wide enough to itself be rewritten in place
/// (`min_llen + 16` octets of key+length), not just whatever remainder closes the gap (§4.6).
fn kag_fill_size(klv_size: u64, kag_size: u32, min_llen: u8) -> u64 {
    if kag_size <= 1 {
        return 0;
    }

    let kag = u64::from(kag_size);
    let mut fill_size = if klv_size % kag == 0 { 0 } else { kag - (klv_size % kag) };
    let floor = u64::from(min_llen) + 16;

    while fill_size != 0 && fill_size < floor {
        fill_size += kag;
    }

    fill_size
}

/// The transient per-content-package buffer for one track's element (§4.7 `write_samples`).
struct ElementBuffer {
    frame_data: Vec<u8>,
    /// Absolute file offset the clip-wrapped element's placeholder KL was written at, once known.
    clip_start_pos: Option<u64>,
    clip_total_written: u64,
    num_samples_written: u32,
}

impl ElementBuffer {
    fn new() -> Self {
        ElementBuffer { frame_data: Vec::new(), clip_start_pos: None, clip_total_written: 0, num_samples_written: 0 }
    }

    fn reset(&mut self) {
        self.frame_data.clear();
        self.num_samples_written = 0;
    }

    fn is_ready(&self, element: &ContentPackageElement, position: i64) -> bool {
        match element.wrapping {
            Wrapping::Frame => self.num_samples_written >= element.num_samples(position),
            Wrapping::Clip => true,
        }
    }

    fn write_frame_samples(&mut self, element: &ContentPackageElement, position: i64, data: &[u8], num_samples: u32) -> Result<()> {
        if element.wrapping != Wrapping::Frame {
            return unsupported("clip-wrapped track cannot buffer frame samples");
        }
        if self.num_samples_written + num_samples > element.num_samples(position) {
            return inconsistent("more samples written than the edit unit's sample sequence allows");
        }
        self.frame_data.extend_from_slice(data);
        self.num_samples_written += num_samples;

        if let Some(constant_len) = element.constant_essence_len {
            if self.num_samples_written >= element.num_samples(position) && self.frame_data.len() as u64 != constant_len {
                return inconsistent("frame essence length does not match the registered constant length");
            }
        }

        Ok(())
    }

    /// Streams clip-wrapped bytes straight to `sink`, writing the placeholder KL (final length
    /// rewritten at `complete_write`) on the very first call.
    fn write_clip_samples(&mut self, element: &ContentPackageElement, sink: &mut MediaSinkStream, data: &[u8]) -> Result<()> {
        if element.wrapping != Wrapping::Clip {
            return unsupported("frame-wrapped track cannot stream clip samples");
        }
        if self.clip_start_pos.is_none() {
            self.clip_start_pos = Some(sink.pos());
            element.write_kl(sink, 0)?;
        }
        sink.write_buf(data)?;
        self.clip_total_written += data.len() as u64;
        Ok(())
    }

    fn write_frame_element(&self, sink: &mut MediaSinkStream, element: &ContentPackageElement, kag_size: u32) -> Result<u64> {
        element.write_kl(sink, self.frame_data.len() as u64)?;
        sink.write_buf(&self.frame_data)?;

        let klv_size = 16 + u64::from(mxf_core::key::Length::width_for(self.frame_data.len() as u64, element.min_llen))
            + self.frame_data.len() as u64;
        let fill_size = kag_fill_size(klv_size, kag_size, element.min_llen);
        if fill_size > 0 {
            klv::write_fill(sink, &fill_key(), fill_size, element.min_llen)?;
        }

        Ok(klv_size + fill_size)
    }

    /// Rewrites the clip-wrapped element's placeholder KL with its final length and pads to the
    /// KAG boundary. Called once, at `ContentPackageManager::complete_write`.
    fn complete_clip_element(&mut self, sink: &mut MediaSinkStream, element: &ContentPackageElement, kag_size: u32) -> Result<()> {
        let start = match self.clip_start_pos {
            Some(start) => start,
            None => return Ok(()),
        };

        let end = sink.pos();
        sink.seek_absolute(start)?;
        element.write_kl(sink, self.clip_total_written)?;
        sink.seek_absolute(end)?;

        let fill_size = kag_fill_size(end, kag_size, element.min_llen);
        if fill_size > 0 {
            klv::write_fill(sink, &fill_key(), fill_size, element.min_llen)?;
        }

        Ok(())
    }
}

fn fill_key() -> Key {
    klv::FILL_KEY_COMPLIANT
}

/// One edit unit: the system item plus every registered element's buffer, in track-registration
/// order but written in the data/picture/sound sequence `ElementKind` orders by (§3.5, §4.7).
struct ContentPackage {
    position: i64,
    elements: SmallVec<[ElementBuffer; 4]>,
}

impl ContentPackage {
    fn new(num_elements: usize) -> Self {
        let mut elements = SmallVec::with_capacity(num_elements);
        for _ in 0..num_elements {
            elements.push(ElementBuffer::new());
        }
        ContentPackage { position: 0, elements }
    }

    fn reset(&mut self) {
        for element in &mut self.elements {
            element.reset();
        }
    }
}

/// Coordinates every registered track's framing and drives the write of successive content
/// packages (§4.7 `ContentPackageManager`, grounded on the teacher's `OP1AContentPackageManager`).
pub struct ContentPackageManager {
    kag_size: u32,
    min_llen: u8,
    edit_rate: (i32, i32),
    clip_wrapped: bool,
    have_input_user_timecode: bool,
    start_timecode: Option<Timecode>,
    user_timecode: Option<Timecode>,
    elements: Vec<ContentPackageElement>,
    track_index_to_slot: HashMap<u32, usize>,
    system_item_key: Key,
    empty_package_metadata_key: Key,
    packages: std::collections::VecDeque<ContentPackage>,
    free_packages: Vec<ContentPackage>,
    next_position: i64,
    prepared: bool,
}

impl ContentPackageManager {
    pub fn new(kag_size: u32, min_llen: u8, edit_rate: (i32, i32)) -> Self {
        ContentPackageManager {
            kag_size,
            min_llen,
            edit_rate,
            clip_wrapped: false,
            have_input_user_timecode: false,
            start_timecode: None,
            user_timecode: None,
            elements: Vec::new(),
            track_index_to_slot: HashMap::new(),
            system_item_key: label::SDTI_CP_SYSTEM_PACK_KEY,
            empty_package_metadata_key: label::EMPTY_PACKAGE_METADATA_SET_KEY,
            packages: std::collections::VecDeque::new(),
            free_packages: Vec::new(),
            next_position: 0,
            prepared: false,
        }
    }

    pub fn set_clip_wrapped(&mut self, clip_wrapped: bool) {
        self.clip_wrapped = clip_wrapped;
    }

    pub fn set_have_input_user_timecode(&mut self, have: bool) {
        self.have_input_user_timecode = have;
    }

    pub fn set_start_timecode(&mut self, timecode: Timecode) {
        self.start_timecode = Some(timecode);
    }

    /// Registers a track's element. Frame-wrapped tracks default to one sample per edit unit;
    /// callers adjust via the returned index and `set_sample_sequence`/`set_constant_essence_len`
    /// before `prepare_write` (§4.7).
    pub fn register_element(&mut self, track_index: u32, kind: ElementKind, key: Key, wrapping: Wrapping) -> usize {
        let min_llen = if wrapping == Wrapping::Frame { 4 } else { self.min_llen };
        let slot = self.elements.len();
        self.elements.push(ContentPackageElement::new(track_index, kind, key, min_llen, wrapping));
        self.track_index_to_slot.insert(track_index, slot);
        slot
    }

    pub fn element_mut(&mut self, slot: usize) -> &mut ContentPackageElement {
        &mut self.elements[slot]
    }

    /// Stable-sorts the registered elements into the data/picture/sound write order and
    /// validates every sound track shares the same sample sequence, since all elements of one
    /// content package advance position together (§4.7 `PrepareWrite`).
    pub fn prepare_write(&mut self) -> Result<()> {
        self.elements.sort_by_key(|e| e.kind);
        self.track_index_to_slot.clear();
        for (slot, element) in self.elements.iter().enumerate() {
            self.track_index_to_slot.insert(element.track_index, slot);
        }

        let mut sound_sequence: Option<&[u32]> = None;
        for element in &self.elements {
            if element.kind == ElementKind::Sound {
                match sound_sequence {
                    None => sound_sequence = Some(&element.sample_sequence),
                    Some(seq) if seq == element.sample_sequence.as_slice() => {}
                    Some(_) => return inconsistent("sound tracks must share one sample sequence"),
                }
            }
        }

        if self.clip_wrapped && self.elements.len() > 1 {
            return unsupported("at most one track may be clip-wrapped per content package");
        }

        self.prepared = true;
        Ok(())
    }

    fn ensure_package(&mut self, index: usize) -> &mut ContentPackage {
        while self.packages.len() <= index {
            let position = self.next_position + self.packages.len() as i64;
            let mut package = self.free_packages.pop().unwrap_or_else(|| ContentPackage::new(self.elements.len()));
            package.position = position;
            package.reset();
            self.packages.push_back(package);
        }
        &mut self.packages[index]
    }

    /// Buffers or streams `num_samples` worth of essence bytes for the track registered under
    /// `track_index` (§4.7 `write_samples`).
    pub fn write_samples(&mut self, sink: &mut MediaSinkStream, track_index: u32, data: &[u8], num_samples: u32) -> Result<()> {
        if !self.prepared {
            return inconsistent("write_samples called before prepare_write");
        }

        let slot = *self
            .track_index_to_slot
            .get(&track_index)
            .ok_or(mxf_core::errors::MxfError::Unsupported("track not registered with content package manager"))?;
        let element = &self.elements[slot];

        if element.wrapping == Wrapping::Clip {
            let package = self.ensure_package(0);
            package.elements[slot].write_clip_samples(element, sink, data)?;
            return Ok(());
        }

        let position = self.next_position;
        let package = self.ensure_package(0);
        package.elements[slot].write_frame_samples(element, position, data, num_samples)
    }

    pub fn have_content_package(&self) -> bool {
        self.have_content_packages(1)
    }

    pub fn have_content_packages(&self, num: usize) -> bool {
        if self.clip_wrapped {
            return false;
        }

        if self.packages.len() < num {
            return false;
        }

        (0..num).all(|i| {
            let package = &self.packages[i];
            self.elements.iter().zip(package.elements.iter()).all(|(element, buf)| buf.is_ready(element, package.position))
        })
    }

    /// Writes the next ready content package's system item and elements and advances position
    /// (§4.7 `write_next_content_package`). Returns the absolute offset the package started at
    /// and each written element's size, in write order, for the caller to fold into the index
    /// table.
    pub fn write_next_content_package(&mut self, sink: &mut MediaSinkStream) -> Result<(u64, Vec<u32>)> {
        if !self.have_content_package() {
            return inconsistent("no ready content package to write");
        }

        let mut package = self.packages.pop_front().unwrap();
        let start = sink.pos();

        self.write_system_item(sink, package.position)?;

        let mut sizes = Vec::with_capacity(package.elements.len());
        for (element, buf) in self.elements.iter().zip(package.elements.iter()) {
            let size = buf.write_frame_element(sink, element, self.kag_size)?;
            sizes.push(size as u32);
        }

        self.next_position += 1;
        self.free_packages.push(package);

        Ok((start, sizes))
    }

    fn write_system_item(&mut self, sink: &mut MediaSinkStream, position: i64) -> Result<()> {
        klv::write_key_and_length(sink, &self.system_item_key, SYSTEM_ITEM_METADATA_PACK_SIZE, 4)?;

        let mut bitmap: u8 = 0x40 | 0x10;
        for element in &self.elements {
            bitmap |= element.kind.system_item_flag();
        }

        sink.write_byte(bitmap)?;
        sink.write_byte(get_system_item_cp_rate(self.edit_rate))?;
        sink.write_byte(0x00)?;
        sink.write_be_u16(0x0000)?;
        sink.write_be_u16((position & 0xffff) as u16)?;
        sink.write_uid(label::EC_MULTIPLE_WRAPPINGS.as_bytes())?;
        sink.write_buf(&[0u8; 17])?;

        let timecode = self.resolve_user_timecode(position);
        let field_mark = false;
        let mut tc_bytes = [0u8; 4];
        encode_smpte_timecode(timecode, field_mark, &mut tc_bytes);
        let mut user_tc = [0u8; 17];
        user_tc[..4].copy_from_slice(&tc_bytes);
        sink.write_buf(&user_tc)?;

        klv::write_key_and_length(sink, &self.empty_package_metadata_key, 0, 4)?;

        let written = 16 + 4 + SYSTEM_ITEM_METADATA_PACK_SIZE + 16 + 4;
        let fill_size = kag_fill_size(written, self.kag_size, self.min_llen);
        if fill_size > 0 {
            klv::write_fill(sink, &fill_key(), fill_size, self.min_llen)?;
        }

        Ok(())
    }

    fn resolve_user_timecode(&self, position: i64) -> Timecode {
        if self.have_input_user_timecode {
            if let Some(tc) = self.user_timecode {
                return tc;
            }
        }
        if let Some(start) = self.start_timecode {
            let mut tc = start;
            tc.add_offset(position);
            return tc;
        }
        Timecode::from_frame_count(self.edit_rate, false, position)
    }

    pub fn write_user_timecode(&mut self, timecode: Timecode) {
        self.user_timecode = Some(timecode);
    }

    /// Finalises every clip-wrapped element (rewriting its placeholder KL with the final length)
    /// and returns the total number of frame-wrapped content packages written, for the caller to
    /// fold into the index table via `IndexTableSegment::finalize_cbe_duration` (§4.7).
    pub fn complete_write(&mut self, sink: &mut MediaSinkStream) -> Result<i64> {
        if self.clip_wrapped {
            if let Some(mut package) = self.packages.pop_front() {
                for (element, buf) in self.elements.iter().zip(package.elements.iter_mut()) {
                    buf.complete_clip_element(sink, element, self.kag_size)?;
                }
            }
        }

        Ok(self.next_position)
    }

    pub fn get_rounded_tc_base(&self) -> u16 {
        get_rounded_tc_base(self.edit_rate)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek, SeekFrom, Write};
    use std::sync::{Arc, Mutex};

    use mxf_core::io::{MediaSink, MediaSinkStream};

    use super::*;

    struct SharedSink {
        cursor: Cursor<Vec<u8>>,
        mirror: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let written = self.cursor.write(buf)?;
            let mut mirror = self.mirror.lock().unwrap();
            let pos = self.cursor.position() as usize - written;
            if mirror.len() < pos + written {
                mirror.resize(pos + written, 0);
            }
            mirror[pos..pos + written].copy_from_slice(&buf[..written]);
            Ok(written)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for SharedSink {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.cursor.seek(pos)
        }
    }

    impl MediaSink for SharedSink {}

    fn shared_sink() -> (MediaSinkStream, Arc<Mutex<Vec<u8>>>) {
        let mirror = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink { cursor: Cursor::new(Vec::new()), mirror: mirror.clone() };
        (MediaSinkStream::new(Box::new(sink)), mirror)
    }

    fn picture_key() -> Key {
        Key::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x15, 0x01, 0x05, 0x00])
    }

    fn sound_key() -> Key {
        Key::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x16, 0x01, 0x08, 0x00])
    }

    #[test]
    fn verify_elements_sort_data_picture_sound() {
        let mut mgr = ContentPackageManager::new(0, 4, (25, 1));
        mgr.register_element(1, ElementKind::Sound, sound_key(), Wrapping::Frame);
        mgr.register_element(0, ElementKind::Picture, picture_key(), Wrapping::Frame);
        mgr.prepare_write().unwrap();

        assert_eq!(mgr.elements[0].kind, ElementKind::Picture);
        assert_eq!(mgr.elements[1].kind, ElementKind::Sound);
    }

    #[test]
    fn verify_mismatched_sound_sequences_rejected() {
        let mut mgr = ContentPackageManager::new(0, 4, (25, 1));
        let a = mgr.register_element(0, ElementKind::Sound, sound_key(), Wrapping::Frame);
        mgr.element_mut(a).set_sample_sequence(vec![1602, 1601]).unwrap();
        let b = mgr.register_element(1, ElementKind::Sound, sound_key(), Wrapping::Frame);
        mgr.element_mut(b).set_sample_sequence(vec![1602]).unwrap();

        assert!(mgr.prepare_write().is_err());
    }

    #[test]
    fn verify_write_one_content_package() {
        let mut mgr = ContentPackageManager::new(0, 4, (25, 1));
        mgr.register_element(0, ElementKind::Picture, picture_key(), Wrapping::Frame);
        mgr.prepare_write().unwrap();

        let (mut sink, mirror) = shared_sink();
        mgr.write_samples(&mut sink, 0, &[1, 2, 3, 4], 1).unwrap();
        assert!(mgr.have_content_package());

        let (start, sizes) = mgr.write_next_content_package(&mut sink).unwrap();
        assert_eq!(start, 0);
        assert_eq!(sizes.len(), 1);

        let bytes = mirror.lock().unwrap();
        assert_eq!(&bytes[0..16], label::SDTI_CP_SYSTEM_PACK_KEY.as_bytes());
        assert_eq!(&bytes[16..20], &[0x83, 0x00, 0x00, 0x39]);
        // bitmap: SMPTE UL (0x40) + user timestamp (0x10) + picture present (0x08)
        assert_eq!(bytes[20], 0x58);
    }

    #[test]
    fn verify_clip_wrapped_rewrites_length_on_complete() {
        let mut mgr = ContentPackageManager::new(0, 4, (25, 1));
        mgr.set_clip_wrapped(true);
        mgr.register_element(0, ElementKind::Sound, sound_key(), Wrapping::Clip);
        mgr.prepare_write().unwrap();

        let (mut sink, mirror) = shared_sink();
        mgr.write_samples(&mut sink, 0, &[1, 2, 3, 4], 4).unwrap();
        mgr.write_samples(&mut sink, 0, &[5, 6], 2).unwrap();
        mgr.complete_write(&mut sink).unwrap();

        let bytes = mirror.lock().unwrap();
        assert_eq!(&bytes[0..16], sound_key().as_bytes());
        assert_eq!(bytes[19], 6);
        assert_eq!(&bytes[20..26], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn verify_kag_fill_size_matches_minimum_rewrite_width() {
        assert_eq!(kag_fill_size(100, 0, 4), 0);
        let size = kag_fill_size(100, 512, 4);
        assert!(size >= 20);
        assert_eq!((100 + size) % 512, 0);
    }
}
