// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The partition engine (§3.2, §4.6, component C6): partition-pack layout, KAG alignment,
//! header/body/footer sequencing, the Random Index Pack, and the in-place rewrite that happens at
//! writer finalisation.
//!
//! Three-pass writing (§4.6): a [`PartitionEngine`] is driven by the top-level `FileWriter`
//! (`crate::writer`), which interleaves `write_partition_pack` calls with the header-metadata
//! (C3), index (C5), and content-package (C7) writes proper. The partition pack itself is the only
//! thing this module serialises; it does not know about header metadata bytes or essence bytes,
//! only where they start and how long they are.

use mxf_core::errors::{inconsistent, invalid_klv, Result};
use mxf_core::io::{MediaSinkStream, MediaSourceStream, ReadBytes, WriteBytes};
use mxf_core::key::{Key, Ul};
use mxf_core::klv;
use mxf_core::label;

/// `kk` octet of a partition pack key (§6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartitionKind {
    Header,
    Body,
    Footer,
}

impl PartitionKind {
    fn kk(self) -> u8 {
        match self {
            PartitionKind::Header => 0x02,
            PartitionKind::Body => 0x03,
            PartitionKind::Footer => 0x04,
        }
    }

    fn from_kk(kk: u8) -> Option<PartitionKind> {
        match kk {
            0x02 => Some(PartitionKind::Header),
            0x03 => Some(PartitionKind::Body),
            0x04 => Some(PartitionKind::Footer),
            _ => None,
        }
    }
}

/// `ss` octet of a partition pack key (§3.2, §6): open/closed crossed with incomplete/complete,
/// plus the generic-stream marker bmx and some Avid files emit on intermediate body partitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartitionStatus {
    OpenIncomplete,
    ClosedIncomplete,
    OpenComplete,
    ClosedComplete,
    GenericStream,
}

impl PartitionStatus {
    fn ss(self) -> u8 {
        match self {
            PartitionStatus::OpenIncomplete => 0x01,
            PartitionStatus::ClosedIncomplete => 0x02,
            PartitionStatus::OpenComplete => 0x03,
            PartitionStatus::ClosedComplete => 0x04,
            PartitionStatus::GenericStream => 0x11,
        }
    }

    fn from_ss(ss: u8) -> Option<PartitionStatus> {
        match ss {
            0x01 => Some(PartitionStatus::OpenIncomplete),
            0x02 => Some(PartitionStatus::ClosedIncomplete),
            0x03 => Some(PartitionStatus::OpenComplete),
            0x04 => Some(PartitionStatus::ClosedComplete),
            0x11 => Some(PartitionStatus::GenericStream),
            _ => None,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, PartitionStatus::ClosedIncomplete | PartitionStatus::ClosedComplete)
    }

    pub fn is_complete(self) -> bool {
        matches!(self, PartitionStatus::OpenComplete | PartitionStatus::ClosedComplete)
    }
}

/// A partition pack (§3.2). `essence_containers` lists every essence-container UL that can appear
/// in body partitions sharing this header; the writer fixes this list when the header partition is
/// first written and never changes its length afterward, so the pack's on-disk size is stable
/// across the open→finalise rewrite (§4.6).
#[derive(Clone, Debug)]
pub struct PartitionPack {
    pub kind: PartitionKind,
    pub status: PartitionStatus,
    pub registry_version: u8,
    pub major_version: u16,
    pub minor_version: u16,
    pub kag_size: u32,
    pub this_partition: u64,
    pub previous_partition: u64,
    pub footer_partition: u64,
    pub header_byte_count: u64,
    pub index_byte_count: u64,
    pub index_sid: u32,
    pub body_offset: u64,
    pub body_sid: u32,
    pub operational_pattern: Ul,
    pub essence_containers: Vec<Ul>,
}

impl PartitionPack {
    pub fn new(kind: PartitionKind, status: PartitionStatus, kag_size: u32, operational_pattern: Ul) -> Self {
        PartitionPack {
            kind,
            status,
            registry_version: 1,
            major_version: 1,
            minor_version: 2,
            kag_size,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern,
            essence_containers: Vec::new(),
        }
    }

    fn key(&self) -> Key {
        label::partition_pack_key(self.registry_version, self.kind.kk(), self.status.ss())
    }

    /// On-disk byte length of the value (everything after the length), used to size the fill that
    /// follows the pack to the next KAG boundary and to assert a rewrite doesn't change this
    /// pack's footprint (§4.6).
    pub fn value_len(&self) -> u64 {
        2 + 2 + 4 + 8 + 8 + 8 + 8 + 8 + 4 + 8 + 4 + 16 + (4 + 4 + 16 * self.essence_containers.len() as u64)
    }

    pub fn read(src: &mut MediaSourceStream) -> Result<PartitionPack> {
        let key = klv::read_key(src)?;
        let registry_version = key.as_bytes()[7];
        let kk = key.as_bytes()[13];
        let ss = key.as_bytes()[14];
        let kind = PartitionKind::from_kk(kk).ok_or(mxf_core::errors::MxfError::InvalidLabel("unrecognised partition kind octet"))?;
        let status = PartitionStatus::from_ss(ss).ok_or(mxf_core::errors::MxfError::InvalidLabel("unrecognised partition status octet"))?;

        let length = klv::read_length(src)?;
        let end = src.pos() + length.value;

        let major_version = src.read_be_u16()?;
        let minor_version = src.read_be_u16()?;
        let kag_size = src.read_be_u32()?;
        let this_partition = src.read_be_u64()?;
        let previous_partition = src.read_be_u64()?;
        let footer_partition = src.read_be_u64()?;
        let header_byte_count = src.read_be_u64()?;
        let index_byte_count = src.read_be_u64()?;
        let index_sid = src.read_be_u32()?;
        let body_offset = src.read_be_u64()?;
        let body_sid = src.read_be_u32()?;
        let operational_pattern = Ul::new(src.read_uid()?);

        let count = src.read_be_u32()?;
        let elem_len = src.read_be_u32()?;
        if elem_len != 16 {
            return invalid_klv("essence container batch element length must be 16");
        }
        let mut essence_containers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            essence_containers.push(Ul::new(src.read_uid()?));
        }

        if src.pos() != end {
            src.ignore_bytes(end - src.pos())?;
        }

        Ok(PartitionPack {
            kind,
            status,
            registry_version,
            major_version,
            minor_version,
            kag_size,
            this_partition,
            previous_partition,
            footer_partition,
            header_byte_count,
            index_byte_count,
            index_sid,
            body_offset,
            body_sid,
            operational_pattern,
            essence_containers,
        })
    }

    /// Writes the pack at the sink's current position using a fixed BER length width so the
    /// finaliser can rewrite it in place without shifting any following byte (§4.1, §4.6).
    pub fn write(&self, sink: &mut MediaSinkStream, min_llen: u8) -> Result<()> {
        klv::write_key_and_length(sink, &self.key(), self.value_len(), min_llen)?;

        sink.write_be_u16(self.major_version)?;
        sink.write_be_u16(self.minor_version)?;
        sink.write_be_u32(self.kag_size)?;
        sink.write_be_u64(self.this_partition)?;
        sink.write_be_u64(self.previous_partition)?;
        sink.write_be_u64(self.footer_partition)?;
        sink.write_be_u64(self.header_byte_count)?;
        sink.write_be_u64(self.index_byte_count)?;
        sink.write_be_u32(self.index_sid)?;
        sink.write_be_u64(self.body_offset)?;
        sink.write_be_u32(self.body_sid)?;
        sink.write_uid(self.operational_pattern.as_bytes())?;

        sink.write_be_u32(self.essence_containers.len() as u32)?;
        sink.write_be_u32(16)?;
        for ec in &self.essence_containers {
            sink.write_uid(ec.as_bytes())?;
        }

        Ok(())
    }
}

/// One `(body_sid, this_partition)` pair recorded in the Random Index Pack (§3.2, §6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RipEntry {
    pub body_sid: u32,
    pub this_partition: u64,
}

/// The Random Index Pack (§3.2, §8 invariant 7): a final directory of every partition in the file,
/// terminated by its own 4-byte length so a reader can locate it by seeking to `file_len - 4` and
/// reading that length backwards.
#[derive(Clone, Debug, Default)]
pub struct RandomIndexPack {
    pub entries: Vec<RipEntry>,
}

impl RandomIndexPack {
    pub fn new() -> Self {
        RandomIndexPack { entries: Vec::new() }
    }

    pub fn push(&mut self, body_sid: u32, this_partition: u64) {
        self.entries.push(RipEntry { body_sid, this_partition });
    }

    /// Total on-disk length: key (16) + BER length + `entries.len()` 12-byte records + trailing
    /// 4-byte length-of-pack field (§8 invariant 7: "`rip.length` equals the number of partitions
    /// + 1").
    pub fn write(&self, sink: &mut MediaSinkStream, min_llen: u8) -> Result<()> {
        let value_len = self.entries.len() as u64 * 12 + 4;
        klv::write_key_and_length(sink, &label::RANDOM_INDEX_PACK_KEY, value_len, min_llen)?;

        for entry in &self.entries {
            sink.write_be_u32(entry.body_sid)?;
            sink.write_be_u64(entry.this_partition)?;
        }

        let total_pack_len = 16 + u64::from(mxf_core::key::Length::width_for(value_len, min_llen)) + value_len;
        sink.write_be_u32(total_pack_len as u32)
    }

    pub fn read(src: &mut MediaSourceStream) -> Result<RandomIndexPack> {
        let key = klv::read_key(src)?;
        if !key.matches_ignoring_version(&label::RANDOM_INDEX_PACK_KEY) {
            return invalid_klv("expected random index pack key");
        }
        let length = klv::read_length(src)?;
        let end = src.pos() + length.value;

        let mut rip = RandomIndexPack::new();
        while src.pos() + 4 < end {
            let body_sid = src.read_be_u32()?;
            let this_partition = src.read_be_u64()?;
            rip.push(body_sid, this_partition);
        }
        let _total_pack_len = src.read_be_u32()?;

        Ok(rip)
    }
}

/// Drives three-pass partition writing (§4.6). Tracks every partition pack written so far (for the
/// RIP and for the finalisation rewrite) and computes KAG-aligned fill sizes.
pub struct PartitionEngine {
    pub kag_size: u32,
    pub min_llen: u8,
    pub fill_key: Key,
    packs: Vec<PartitionPack>,
}

impl PartitionEngine {
    pub fn new(kag_size: u32, min_llen: u8, use_legacy_fill_key: bool) -> Self {
        PartitionEngine {
            kag_size,
            min_llen,
            fill_key: if use_legacy_fill_key { klv::FILL_KEY_LEGACY } else { klv::FILL_KEY_COMPLIANT },
            packs: Vec::new(),
        }
    }

    /// Writes `pack` at the sink's current position, after fixing `this_partition` to that offset
    /// and `previous_partition` to the last pack written. Returns the byte offset the pack landed
    /// at.
    pub fn write_partition_pack(&mut self, sink: &mut MediaSinkStream, mut pack: PartitionPack) -> Result<u64> {
        let offset = sink.pos();
        pack.this_partition = offset;
        pack.previous_partition = self.packs.last().map(|p| p.this_partition).unwrap_or(0);

        pack.write(sink, self.min_llen)?;
        self.packs.push(pack);
        Ok(offset)
    }

    /// Inserts a fill KLV so the next top-level KLV starts on a KAG boundary (§4.6, §8 invariant
    /// 5). A no-op if the sink is already aligned.
    pub fn align_to_kag(&self, sink: &mut MediaSinkStream) -> Result<()> {
        let target = klv::kag_align(sink.pos(), self.kag_size);
        if target == sink.pos() {
            return Ok(());
        }
        klv::write_fill(sink, &self.fill_key, target - sink.pos(), self.min_llen)
    }

    pub fn write_random_index_pack(&self, sink: &mut MediaSinkStream) -> Result<()> {
        let mut rip = RandomIndexPack::new();
        for pack in &self.packs {
            rip.push(pack.body_sid, pack.this_partition);
        }
        rip.write(sink, self.min_llen)
    }

    /// Rewrites the partition pack at arena index `idx` in place. `new_pack` must have the same
    /// `essence_containers` length as the original (§4.6: "all partition packs use fixed-width BER
    /// so they can be rewritten"); this is asserted rather than silently producing a corrupt file.
    pub fn rewrite_partition_pack(&mut self, sink: &mut MediaSinkStream, idx: usize, new_pack: PartitionPack) -> Result<()> {
        let original = &self.packs[idx];
        if original.essence_containers.len() != new_pack.essence_containers.len() {
            return inconsistent("partition pack rewrite changed essence container count");
        }

        let offset = original.this_partition;
        sink.seek_absolute(offset)?;

        let mut pack = new_pack;
        pack.this_partition = offset;
        pack.previous_partition = original.previous_partition;
        pack.write(sink, self.min_llen)?;
        self.packs[idx] = pack;
        Ok(())
    }

    pub fn packs(&self) -> &[PartitionPack] {
        &self.packs
    }
}

/// Validates that a parsed pack's `this_partition` field agrees with the offset it was actually
/// read from (§3.2: "discovered values that disagree trigger a warning and the in-memory value is
/// corrected"). Returns the corrected pack and whether a correction was made.
pub fn reconcile_this_partition(mut pack: PartitionPack, actual_offset: u64) -> (PartitionPack, bool) {
    if pack.this_partition == actual_offset {
        (pack, false)
    }
    else {
        pack.this_partition = actual_offset;
        (pack, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn mirrored_sink() -> (MediaSinkStream, Arc<Mutex<Vec<u8>>>) {
        let mirror = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink { cursor: Cursor::new(Vec::new()), mirror: mirror.clone() };
        (MediaSinkStream::new(Box::new(sink)), mirror)
    }

    #[test]
    fn verify_partition_pack_roundtrip() {
        let (mut sink, mirror) = mirrored_sink();
        let mut pack = PartitionPack::new(PartitionKind::Header, PartitionStatus::OpenIncomplete, 512, label::OP_1A);
        pack.essence_containers.push(label::EC_BWF_PCM);
        pack.write(&mut sink, 4).unwrap();

        let bytes = mirror.lock().unwrap().clone();
        let mut src = MediaSourceStream::new(Box::new(Cursor::new(bytes)), MediaSourceStreamOptions::default());
        let read_back = PartitionPack::read(&mut src).unwrap();
        assert_eq!(read_back.kind, PartitionKind::Header);
        assert_eq!(read_back.status, PartitionStatus::OpenIncomplete);
        assert_eq!(read_back.kag_size, 512);
        assert_eq!(read_back.essence_containers, vec![label::EC_BWF_PCM]);
    }

    #[test]
    fn verify_kag_alignment_inserts_fill() {
        let (mut sink, mirror) = mirrored_sink();
        let engine = PartitionEngine::new(512, 4, false);
        sink.write_buf(&[0u8; 10]).unwrap();
        engine.align_to_kag(&mut sink).unwrap();
        assert_eq!(sink.pos(), 512);
        assert_eq!(mirror.lock().unwrap().len(), 512);
    }

    #[test]
    fn verify_rip_roundtrip() {
        let (mut sink, mirror) = mirrored_sink();
        let mut rip = RandomIndexPack::new();
        rip.push(1, 0);
        rip.push(1, 4096);
        rip.write(&mut sink, 4).unwrap();

        let bytes = mirror.lock().unwrap().clone();
        let mut src = MediaSourceStream::new(Box::new(Cursor::new(bytes)), MediaSourceStreamOptions::default());
        let read_back = RandomIndexPack::read(&mut src).unwrap();
        assert_eq!(read_back.entries.len(), 2);
        assert_eq!(read_back.entries[1].this_partition, 4096);
    }

    #[test]
    fn verify_this_partition_reconciliation_warns_and_corrects() {
        let mut pack = PartitionPack::new(PartitionKind::Body, PartitionStatus::ClosedComplete, 512, label::OP_1A);
        pack.this_partition = 100;
        let (fixed, corrected) = reconcile_this_partition(pack, 4096);
        assert!(corrected);
        assert_eq!(fixed.this_partition, 4096);
    }
}
