// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Essence chunk bookkeeping (§4.8, component C8). Maps a single essence stream's logical byte
//! offset — continuous across every partition that carries it — onto the physical file positions
//! those bytes actually occupy, which jump around whenever header metadata, an index segment, or
//! another stream's body partition sits between two chunks of this one.
//!
//! This module does no I/O of its own: the essence reader (C9) walks partitions and essence KLVs
//! and reports chunk boundaries here as it discovers them.

use mxf_core::errors::{inconsistent, MxfError, Result};

use crate::partition::PartitionPack;

/// One contiguous run of this stream's essence bytes within a single partition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EssenceChunk {
    /// `this_partition` offset of the partition pack this chunk belongs to.
    pub this_partition: u64,
    /// File offset of the first byte of essence data in this chunk (the first essence KLV's key,
    /// not the partition pack itself).
    pub file_start: u64,
    /// File offset one past the last byte of essence data in this chunk. Equal to `file_start`
    /// until [`EssenceChunkTracker::update_last_chunk`] closes it.
    pub file_end: u64,
}

impl EssenceChunk {
    pub fn len(&self) -> u64 {
        self.file_end - self.file_start
    }

    pub fn is_empty(&self) -> bool {
        self.file_end == self.file_start
    }
}

/// Tracks every chunk of a single `body_sid`'s essence stream discovered so far, and answers
/// logical-offset-to-file-position queries over them.
#[derive(Clone, Debug)]
pub struct EssenceChunkTracker {
    body_sid: u32,
    chunks: Vec<EssenceChunk>,
    complete: bool,
}

impl EssenceChunkTracker {
    pub fn new(body_sid: u32) -> Self {
        EssenceChunkTracker { body_sid, chunks: Vec::new(), complete: false }
    }

    pub fn body_sid(&self) -> u32 {
        self.body_sid
    }

    pub fn chunks(&self) -> &[EssenceChunk] {
        &self.chunks
    }

    /// True once the footer partition has been reached, so [`Self::chunks`] is known to list
    /// every chunk the file will ever contain (§4.8 "marked complete once the footer is known").
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Total essence bytes recorded across every closed chunk.
    pub fn total_len(&self) -> u64 {
        self.chunks.iter().map(EssenceChunk::len).sum()
    }

    /// Called when the partition walker enters a new partition pack. If `pack.body_sid` matches
    /// the tracked stream, opens a new chunk starting at `essence_start` (the file offset of the
    /// first essence key in this partition, past any header metadata and index bytes). A no-op
    /// for partitions that don't carry this stream.
    ///
    /// The previously open chunk, if any, must already have been closed with
    /// [`Self::update_last_chunk`] — the reader calls that when it detects the event that ends a
    /// chunk (next partition pack, a key change belonging to a different stream, or the footer)
    /// before calling this for the partition that follows.
    pub fn enter_partition(&mut self, pack: &PartitionPack, essence_start: u64) {
        if pack.body_sid == self.body_sid && pack.body_sid != 0 {
            self.chunks.push(EssenceChunk {
                this_partition: pack.this_partition,
                file_start: essence_start,
                file_end: essence_start,
            });
        }
    }

    /// Closes the most recently opened chunk at `end_file_pos` (§4.8: "closes it when the next
    /// partition pack, a key change, or footer is encountered").
    pub fn update_last_chunk(&mut self, end_file_pos: u64) -> Result<()> {
        match self.chunks.last_mut() {
            Some(chunk) => {
                chunk.file_end = end_file_pos;
                Ok(())
            }
            None => inconsistent("no open essence chunk to close"),
        }
    }

    /// Maps a logical essence byte offset (continuous across every chunk recorded so far) to the
    /// physical file position it lives at. `OutOfRange` if the offset falls past every known
    /// chunk — the caller should only call this once the tracker is complete, or accept that an
    /// offset near the end of a still-growing file may not resolve yet.
    pub fn get_file_position(&self, essence_offset: u64) -> Result<u64> {
        let mut remaining = essence_offset;

        for chunk in &self.chunks {
            let len = chunk.len();
            if remaining < len {
                return Ok(chunk.file_start + remaining);
            }
            remaining -= len;
        }

        Err(MxfError::OutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartitionKind, PartitionStatus};
    use mxf_core::label;

    fn pack_at(this_partition: u64, body_sid: u32) -> PartitionPack {
        let mut pack = PartitionPack::new(PartitionKind::Body, PartitionStatus::OpenIncomplete, 512, label::OP_1A);
        pack.this_partition = this_partition;
        pack.body_sid = body_sid;
        pack
    }

    #[test]
    fn verify_single_chunk_roundtrip() {
        let mut tracker = EssenceChunkTracker::new(1);
        tracker.enter_partition(&pack_at(0, 1), 100);
        tracker.update_last_chunk(1100).unwrap();
        tracker.mark_complete();

        assert_eq!(tracker.total_len(), 1000);
        assert_eq!(tracker.get_file_position(0).unwrap(), 100);
        assert_eq!(tracker.get_file_position(999).unwrap(), 1099);
        assert!(tracker.get_file_position(1000).is_err());
    }

    #[test]
    fn verify_gap_across_partitions_is_transparent_to_logical_offset() {
        let mut tracker = EssenceChunkTracker::new(1);
        tracker.enter_partition(&pack_at(0, 1), 100);
        tracker.update_last_chunk(600).unwrap();

        // A second body partition for a different stream sits in between; ignored.
        tracker.enter_partition(&pack_at(600, 2), 700);

        tracker.enter_partition(&pack_at(10_000, 1), 10_100);
        tracker.update_last_chunk(10_600).unwrap();
        tracker.mark_complete();

        assert_eq!(tracker.total_len(), 1000);
        // Logical offset 499 is the last byte of the first chunk.
        assert_eq!(tracker.get_file_position(499).unwrap(), 599);
        // Logical offset 500 jumps the file gap into the second chunk.
        assert_eq!(tracker.get_file_position(500).unwrap(), 10_100);
    }

    #[test]
    fn verify_unrelated_body_sid_ignored() {
        let mut tracker = EssenceChunkTracker::new(5);
        tracker.enter_partition(&pack_at(0, 1), 100);
        assert!(tracker.chunks().is_empty());
    }
}
