// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The essence reader (§4.9, component C9): per-track lazy sample reader driven by the index
//! engine (C5) and essence chunk tracker (C8). Produces one [`Frame`] per enabled track per edit
//! unit, using whichever read strategy the track's wrapping calls for.

use std::collections::HashMap;

use mxf_core::errors::{inconsistent, MxfError, Result};
use mxf_core::io::{MediaSourceStream, ReadBytes};
use mxf_core::key::Ul;
use mxf_core::klv;
use mxf_core::label;

use crate::content_package::Wrapping;
use crate::descriptor::essence_type::EssenceType;
use crate::essence_chunk::EssenceChunkTracker;
use crate::index::IndexTable;
use crate::partition::PartitionPack;

/// One track's decoded essence bytes for a single edit unit.
#[derive(Clone, Debug)]
pub struct Frame {
    pub track_index: u32,
    pub position: i64,
    pub data: Vec<u8>,
}

/// SDTI-CP system-item bytes collected alongside a content package, if the wrapping carries one.
#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    pub system_item: Option<Vec<u8>>,
}

/// A track this reader has been asked to produce samples for.
#[derive(Clone, Debug)]
struct EnabledTrack {
    track_index: u32,
    key: Ul,
    wrapping: Wrapping,
    essence_type: EssenceType,
    image_start_offset: u32,
    image_end_offset: u32,
}

/// `start`/`duration` clamped to the indexed range once it is known (§4.9).
#[derive(Copy, Clone, Debug)]
struct ReadLimits {
    start: i64,
    duration: i64,
}

/// Checks whether `key` is some partition pack's key, regardless of registry version, kind, or
/// status octet (the three bytes a partition pack key varies over, at indices 7, 13, 14).
fn is_partition_pack_key(key: &Ul) -> bool {
    const PREFIX_HEAD: [u8; 7] = [0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01];
    const PREFIX_TAIL: [u8; 5] = [0x0d, 0x01, 0x02, 0x01, 0x01];
    key.0[..7] == PREFIX_HEAD && key.0[8..13] == PREFIX_TAIL
}

/// Per-track, per-stream essence reader. One instance reads exactly one `body_sid`'s worth of
/// tracks (§4.9 "state: current edit-unit position, file position, last-key, pointer into chunk
/// list").
pub struct EssenceReader {
    edit_rate: (i32, i32),
    tracks: Vec<EnabledTrack>,
    chunks: EssenceChunkTracker,
    position: i64,
    read_limits: Option<ReadLimits>,
    first_element_key: Option<Ul>,
    pending_kl: Option<(Ul, u64)>,
    last_known_boundary: Option<(u64, i64)>,
    base_read_error: bool,
}

impl EssenceReader {
    pub fn new(body_sid: u32, edit_rate: (i32, i32)) -> Self {
        EssenceReader {
            edit_rate,
            tracks: Vec::new(),
            chunks: EssenceChunkTracker::new(body_sid),
            position: 0,
            read_limits: None,
            first_element_key: None,
            pending_kl: None,
            last_known_boundary: None,
            base_read_error: false,
        }
    }

    pub fn edit_rate(&self) -> (i32, i32) {
        self.edit_rate
    }

    pub fn enable_track(
        &mut self,
        track_index: u32,
        key: Ul,
        wrapping: Wrapping,
        essence_type: EssenceType,
        image_start_offset: u32,
        image_end_offset: u32,
    ) {
        self.tracks.push(EnabledTrack { track_index, key, wrapping, essence_type, image_start_offset, image_end_offset });
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn base_read_error(&self) -> bool {
        self.base_read_error
    }

    /// Records the read window, clamped to `indexed_duration` once it's known (§4.9). Until then
    /// the raw values are stored and re-clamped the next time this is called with a known
    /// duration.
    pub fn set_read_limits(&mut self, start: i64, duration: i64, indexed_duration: Option<i64>) {
        let (start, duration) = match indexed_duration {
            Some(total) if total > 0 => {
                let start = start.clamp(0, total);
                let duration = duration.min(total - start).max(0);
                (start, duration)
            }
            _ => (start, duration),
        };

        self.read_limits = Some(ReadLimits { start, duration });
    }

    pub fn read_limits(&self) -> Option<(i64, i64)> {
        self.read_limits.map(|l| (l.start, l.duration))
    }

    /// Called by the file-level partition walk as each partition pack is entered, so the chunk
    /// tracker and the reader's forward-walk recovery boundary stay in sync with the physical
    /// file layout (§4.8, §4.9).
    pub fn note_partition_pack(&mut self, pack: &PartitionPack, essence_start: u64, essence_start_position: i64) {
        self.chunks.enter_partition(pack, essence_start);
        self.last_known_boundary = Some((essence_start, essence_start_position));

        if pack.kind == crate::partition::PartitionKind::Footer {
            self.chunks.mark_complete();
        }
    }

    /// Closes the chunk opened by the most recent [`Self::note_partition_pack`] call.
    pub fn close_chunk(&mut self, end_file_pos: u64) -> Result<()> {
        self.chunks.update_last_chunk(end_file_pos)
    }

    /// Reads up to `num_samples` edit units starting at the current position, producing one
    /// `Frame` per enabled track per edit unit actually read. Returns fewer than requested at end
    /// of stream.
    pub fn read(
        &mut self,
        src: &mut MediaSourceStream,
        index: &IndexTable,
        num_samples: u32,
    ) -> Result<(Vec<Frame>, FrameMetadata)> {
        if self.tracks.iter().all(|t| t.wrapping == Wrapping::Clip) && !self.tracks.is_empty() {
            self.read_clip_wrapped(src, index, num_samples)
        }
        else {
            self.read_frame_wrapped(src, num_samples)
        }
    }

    /// Clip wrapping (§4.9): binary-search the largest contiguous run of constant-sized edit
    /// units starting at the current position, seek once, and read the whole run in a single
    /// call. Image start/end offsets are trimmed in place.
    fn read_clip_wrapped(
        &mut self,
        src: &mut MediaSourceStream,
        index: &IndexTable,
        num_samples: u32,
    ) -> Result<(Vec<Frame>, FrameMetadata)> {
        let first = match index.get_edit_unit(self.position) {
            Ok(info) => info,
            Err(e) => {
                self.base_read_error = true;
                return Err(e);
            }
        };

        let run = self.constant_run_length(index, first.size, num_samples as i64)?;
        let file_pos = self.chunks.get_file_position(first.container_offset)?;
        src.seek_absolute(file_pos)?;

        let track = &self.tracks[0];
        let mut frames = Vec::with_capacity(run as usize);

        for i in 0..run {
            let mut buf = vec![0u8; first.size as usize];
            if let Err(e) = src.read_buf_exact(&mut buf) {
                self.base_read_error = true;
                return Err(e);
            }
            trim_image_offsets(&mut buf, track.image_start_offset, track.image_end_offset);
            frames.push(Frame { track_index: track.track_index, position: self.position + i, data: buf });
        }

        self.position += run;
        Ok((frames, FrameMetadata::default()))
    }

    fn constant_run_length(&self, index: &IndexTable, unit_size: u64, max: i64) -> Result<i64> {
        if max <= 0 {
            return Ok(0);
        }

        let mut lo: i64 = 0;
        let mut hi: i64 = 1;

        while hi < max {
            match index.get_edit_unit(self.position + hi) {
                Ok(info) if info.size == unit_size => lo = hi,
                _ => break,
            }
            hi *= 2;
        }

        hi = hi.min(max);
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            match index.get_edit_unit(self.position + mid) {
                Ok(info) if info.size == unit_size => lo = mid,
                _ => hi = mid,
            }
        }

        Ok(lo + 1)
    }

    /// Frame wrapping (§4.9): walk essence KLVs starting from the current file offset. A key
    /// matching an enabled track is copied into that track's frame; the SDTI system-item key is
    /// passed to the metadata collector; anything else is skipped. A new content package starts
    /// when the first element key (learned on the first package) recurs, or a partition pack
    /// appears — in the latter case the key/length already read is stashed for the caller that
    /// drives the partition walk to pick up.
    fn read_frame_wrapped(&mut self, src: &mut MediaSourceStream, num_samples: u32) -> Result<(Vec<Frame>, FrameMetadata)> {
        let mut frames = Vec::new();
        let mut metadata = FrameMetadata::default();

        'outer: for _ in 0..num_samples {
            let mut package: HashMap<u32, Vec<u8>> = HashMap::new();
            let mut package_metadata = FrameMetadata::default();

            loop {
                let (key, value_len) = match self.pending_kl.take() {
                    Some(kl) => kl,
                    None => match self.read_kl(src) {
                        Ok(kl) => kl,
                        Err(e) => {
                            self.base_read_error = true;
                            return Err(e);
                        }
                    },
                };

                if is_partition_pack_key(&key) {
                    self.pending_kl = Some((key, value_len));
                    break 'outer;
                }

                if key.matches_ignoring_version(&label::SDTI_CP_SYSTEM_PACK_KEY) {
                    let buf = self.read_value(src, value_len)?;
                    package_metadata.system_item = Some(buf);
                    continue;
                }

                let is_recurrence = match self.first_element_key {
                    Some(first) => key.matches_ignoring_version(&first) && !package.is_empty(),
                    None => {
                        self.first_element_key = Some(key);
                        false
                    }
                };

                if is_recurrence {
                    self.pending_kl = Some((key, value_len));
                    break;
                }

                match self.tracks.iter().find(|t| key.matches_ignoring_version(&t.key)).cloned() {
                    Some(track) => {
                        let mut buf = self.read_value(src, value_len)?;
                        trim_image_offsets(&mut buf, track.image_start_offset, track.image_end_offset);
                        package.insert(track.track_index, buf);
                    }
                    None => {
                        if let Err(e) = src.ignore_bytes(value_len) {
                            self.base_read_error = true;
                            return Err(e);
                        }
                    }
                }

                if !self.tracks.is_empty() && package.len() == self.tracks.len() {
                    break;
                }
            }

            if package.is_empty() && package_metadata.system_item.is_none() {
                break 'outer;
            }

            for track in &self.tracks {
                if let Some(data) = package.remove(&track.track_index) {
                    frames.push(Frame { track_index: track.track_index, position: self.position, data });
                }
            }
            if package_metadata.system_item.is_some() {
                metadata = package_metadata;
            }

            self.position += 1;
        }

        Ok((frames, metadata))
    }

    fn read_kl(&self, src: &mut MediaSourceStream) -> Result<(Ul, u64)> {
        let key = klv::read_key(src)?;
        let length = klv::read_length(src)?;
        Ok((key, length.value))
    }

    fn read_value(&self, src: &mut MediaSourceStream, len: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        if let Err(e) = src.read_buf_exact(&mut buf) {
            Err(e)
        }
        else {
            Ok(buf)
        }
    }

    /// Seeks to `position`. When the index already knows this position's file offset, seeks
    /// directly; otherwise walks forward from the last known content-package boundary, updating
    /// `self.position` as it goes (§4.9).
    pub fn seek(&mut self, src: &mut MediaSourceStream, index: &IndexTable, position: i64) -> Result<()> {
        if let Ok(info) = index.get_edit_unit(position) {
            let file_pos = self.chunks.get_file_position(info.container_offset)?;
            src.seek_absolute(file_pos)?;
            self.position = position;
            self.reset_walk_state();
            return Ok(());
        }

        self.recover(src)?;

        while self.position < position {
            let (frames, _) = self.read(src, index, 1)?;
            if frames.is_empty() {
                return Err(MxfError::EndOfStream);
            }
        }

        Ok(())
    }

    /// Resets to the last known content-package boundary after an inconsistency (§4.9: "the
    /// reader resets to the last known boundary and sets `base_read_error`"). A subsequent
    /// `read`/`seek` call attempts recovery from there.
    pub fn recover(&mut self, src: &mut MediaSourceStream) -> Result<()> {
        let (file_pos, position) = self.last_known_boundary.ok_or_else(|| {
            MxfError::Inconsistent("no recovery boundary recorded for this essence stream")
        })?;

        src.seek_absolute(file_pos)?;
        self.position = position;
        self.reset_walk_state();
        self.base_read_error = false;
        Ok(())
    }

    fn reset_walk_state(&mut self) {
        self.pending_kl = None;
        self.first_element_key = None;
    }
}

/// Trims an Avid-alpha or uncompressed frame buffer by the descriptor's image start/end offsets
/// (§4.9, §4.4).
fn trim_image_offsets(buf: &mut Vec<u8>, start: u32, end: u32) {
    let start = start as usize;
    let end = end as usize;

    if start + end >= buf.len() {
        return;
    }

    if end > 0 {
        buf.truncate(buf.len() - end);
    }
    if start > 0 {
        buf.drain(..start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::essence_type::EssenceType;
    use crate::index::IndexTableSegment;
    use mxf_core::io::MediaSourceStreamOptions;
    use mxf_core::key::Key;
    use std::io::Cursor;

    fn stream_of(bytes: Vec<u8>) -> MediaSourceStream {
        MediaSourceStream::new(Box::new(Cursor::new(bytes)), MediaSourceStreamOptions::default())
    }

    fn track_key(suffix: u8) -> Key {
        Key::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x15, 0x01, 0x01, suffix])
    }

    #[test]
    fn verify_frame_wrapped_single_track_walk() {
        let key = track_key(1);
        let mut bytes = Vec::new();
        for _ in 0..3 {
            bytes.extend_from_slice(key.as_bytes());
            bytes.push(0x04); // short BER length 4
            bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        }

        let mut src = stream_of(bytes);
        let mut reader = EssenceReader::new(1, (25, 1));
        reader.enable_track(0, key, Wrapping::Frame, EssenceType::Unknown, 0, 0);

        let index = IndexTable::new();
        let (frames, _) = reader.read(&mut src, &index, 3).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data, vec![0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn verify_frame_wrapped_skips_system_item_and_unknown_keys() {
        let sys_key = label::SDTI_CP_SYSTEM_PACK_KEY;
        let track = track_key(1);
        let unknown = Key::new([0xff; 16]);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(sys_key.as_bytes());
        bytes.push(0x02);
        bytes.extend_from_slice(&[0x01, 0x02]);
        bytes.extend_from_slice(unknown.as_bytes());
        bytes.push(0x01);
        bytes.push(0x00);
        bytes.extend_from_slice(track.as_bytes());
        bytes.push(0x03);
        bytes.extend_from_slice(&[0x11, 0x22, 0x33]);

        let mut src = stream_of(bytes);
        let mut reader = EssenceReader::new(1, (25, 1));
        reader.enable_track(7, track, Wrapping::Frame, EssenceType::Unknown, 0, 0);

        let index = IndexTable::new();
        let (frames, metadata) = reader.read(&mut src, &index, 1).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].track_index, 7);
        assert_eq!(frames[0].data, vec![0x11, 0x22, 0x33]);
        assert_eq!(metadata.system_item, Some(vec![0x01, 0x02]));
    }

    #[test]
    fn verify_image_offset_trim() {
        let mut buf = vec![0, 1, 2, 3, 4, 5, 6, 7];
        trim_image_offsets(&mut buf, 2, 1);
        assert_eq!(buf, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn verify_clip_wrapped_run_reads_whole_span_in_one_seek() {
        let key = track_key(1);
        let mut segment = IndexTableSegment::new_cbe((25, 1), 1, 1, 4);
        segment.finalize_cbe_duration(4);
        let mut index = IndexTable::new();
        index.push(segment).unwrap();

        let mut reader = EssenceReader::new(1, (25, 1));
        reader.enable_track(0, key, Wrapping::Clip, EssenceType::Unknown, 0, 0);

        // Essence chunk covers logical offsets [0, 16) at file offset 100.
        let mut pack = crate::partition::PartitionPack::new(
            crate::partition::PartitionKind::Body,
            crate::partition::PartitionStatus::ClosedComplete,
            512,
            label::OP_1A,
        );
        pack.body_sid = 1;
        reader.note_partition_pack(&pack, 100, 0);
        reader.close_chunk(116).unwrap();

        let mut bytes = vec![0u8; 116];
        for (i, b) in bytes[100..116].iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut src = stream_of(bytes);

        let (frames, _) = reader.read(&mut src, &index, 4).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3].data, vec![12, 13, 14, 15]);
        assert_eq!(reader.position(), 4);
    }
}
