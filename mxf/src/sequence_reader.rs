// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sequence / group reader (§4.10, component C10): joins multiple `FileReader`s whose packages
//! share a Material Package UID and lead-filler offset — the common shape of a card-spanning P2
//! recording, where one clip's essence is split across several single-track files.
//!
//! This module only performs the grouping, ordering, and pre-charge/rollout/extension checks;
//! callers supply each file's relevant metadata (grouping key, timecode, track summaries) rather
//! than a live `FileReader`, so the logic here stays testable without a real multi-file fixture.
//! The grouping key itself is the same `(material_package_uid, lead_filler_offset)` pair Avid's
//! `AAFSourceMobSlotMapping` resolution keys source-mob segments by (§12).

use uuid::Uuid;

use mxf_core::errors::{inconsistent, Result};
use mxf_core::label::DataDefinition;

use crate::content_package::timecode::Timecode;
use crate::descriptor::essence_type::EssenceType;

/// One material track as it appears in a single input file, summarised down to the properties
/// needed to decide whether it extends across groups (§4.10: "same essence type, sample rate,
/// descriptor-equivalent").
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialTrack {
    pub track_id: u32,
    pub data_definition: DataDefinition,
    pub essence_type: EssenceType,
    pub sample_rate: (i32, i32),
    /// Caller-supplied equality token standing in for "descriptor-equivalent" (§4.10) — two
    /// tracks with the same fingerprint are considered to share every descriptor property that
    /// matters for extension (dimensions, coding, bit depth, etc).
    pub descriptor_fingerprint: u64,
    /// This segment's own output duration in edit units (§12's AS-02 "file is a segment of the
    /// complete essence" convention): `AS02Track::GetDuration`'s `container_duration +
    /// output_end_offset`, already clamped to non-negative by the caller that built this value.
    pub duration: i64,
}

/// One `FileReader`'s contribution to a group: its grouping key, its playout timecode (if any),
/// its pre-charge/rollout sample counts, and its material tracks.
#[derive(Clone, Debug)]
pub struct GroupInput {
    pub file_id: usize,
    pub material_package_uid: Uuid,
    pub lead_filler_offset: i64,
    pub playout_timecode: Option<Timecode>,
    pub precharge: i64,
    pub rollout: i64,
    pub tracks: Vec<MaterialTrack>,
}

/// All inputs sharing one `(material_package_uid, lead_filler_offset)` key, with tracks of equal
/// data-definition read in parallel (§4.10).
#[derive(Clone, Debug)]
pub struct GroupReader {
    pub lead_filler_offset: i64,
    pub inputs: Vec<GroupInput>,
}

impl GroupReader {
    pub fn material_package_uid(&self) -> Uuid {
        self.inputs[0].material_package_uid
    }

    pub fn precharge(&self) -> i64 {
        self.inputs.iter().map(|i| i.precharge).max().unwrap_or(0)
    }

    pub fn rollout(&self) -> i64 {
        self.inputs.iter().map(|i| i.rollout).max().unwrap_or(0)
    }

    pub fn tracks_by_data_definition(&self, dd: DataDefinition) -> Vec<&MaterialTrack> {
        self.inputs.iter().flat_map(|i| i.tracks.iter()).filter(|t| t.data_definition == dd).collect()
    }

    fn playout_timecode(&self) -> Option<Timecode> {
        self.inputs.iter().find_map(|i| i.playout_timecode)
    }
}

/// One material track extended across however many groups it could be matched in, in group
/// order. `segments[0]` is always the first group's track (§4.10's "for each material track in
/// the first group").
#[derive(Clone, Debug)]
pub struct MaterialTrackExtension {
    pub material_track_id: u32,
    /// `(group_index, track)` pairs, one per group the track extends into.
    pub segments: Vec<(usize, MaterialTrack)>,
}

impl MaterialTrackExtension {
    /// True if this track extends into every group the sequence reader formed (§4.10: "segments
    /// that do not extend every group are dropped" — callers filter on this before keeping an
    /// extension).
    pub fn spans_all_groups(&self, group_count: usize) -> bool {
        self.segments.len() == group_count
    }

    /// Total duration of the complete joined essence this extension represents, the sum of every
    /// segment's own duration (§12, AS-02's "file is a segment of the complete essence"
    /// convention — `AS02Track::GetDuration` per segment, summed across segments rather than read
    /// from one file's duration item).
    pub fn total_duration(&self) -> i64 {
        self.segments.iter().map(|(_, track)| track.duration).sum()
    }

    /// Resolves `global_position` (an edit-unit offset into the complete joined essence) to the
    /// `(group_index, local_position)` pair identifying which segment holds it and the offset
    /// within that segment, walking segments in order and accumulating their durations — the same
    /// bookkeeping `AS02Track`'s `mOutputStartOffset`/container-duration pair performs for one
    /// file, generalised here across every segment a [`SequenceReader`] joined (§12). Returns
    /// `None` if `global_position` falls at or past the end of the last segment.
    pub fn resolve_position(&self, global_position: i64) -> Option<(usize, i64)> {
        let mut consumed = 0i64;
        for (group_index, track) in &self.segments {
            if global_position < consumed + track.duration {
                return Some((*group_index, global_position - consumed));
            }
            consumed += track.duration;
        }
        None
    }
}

/// Joins a flat list of `GroupInput`s into ordered, validated `GroupReader`s (§4.10).
pub struct SequenceReader {
    pub groups: Vec<GroupReader>,
    pub keep_input_order: bool,
}

fn timecode_frame_count(tc: Timecode) -> i64 {
    let base = tc.rounded_tc_base().max(1) as i64;
    ((tc.hour() as i64 * 60 + tc.min() as i64) * 60 + tc.sec() as i64) * base + tc.frame() as i64
}

impl SequenceReader {
    /// Groups `inputs` by `(material_package_uid, lead_filler_offset)`, orders the resulting
    /// groups by playout timecode (unless `keep_input_order`), and verifies the pre-charge/
    /// rollout placement invariant (§4.10).
    pub fn build(inputs: Vec<GroupInput>, keep_input_order: bool) -> Result<SequenceReader> {
        let mut groups: Vec<GroupReader> = Vec::new();

        for input in inputs {
            let existing = groups.iter_mut().find(|g| {
                g.material_package_uid() == input.material_package_uid && g.lead_filler_offset == input.lead_filler_offset
            });

            match existing {
                Some(group) => group.inputs.push(input),
                None => groups.push(GroupReader { lead_filler_offset: input.lead_filler_offset, inputs: vec![input] }),
            }
        }

        if !keep_input_order {
            groups = Self::order_by_playout_timecode(groups)?;
        }

        Self::verify_precharge_rollout_placement(&groups)?;

        Ok(SequenceReader { groups, keep_input_order })
    }

    fn order_by_playout_timecode(groups: Vec<GroupReader>) -> Result<Vec<GroupReader>> {
        let mut keyed = Vec::with_capacity(groups.len());

        for group in &groups {
            match group.playout_timecode() {
                Some(tc) => keyed.push(timecode_frame_count(tc)),
                None => {
                    return inconsistent(
                        "group ordering by playout timecode requires every group to carry one (pass keep_input_order=true to skip ordering)",
                    );
                }
            }
        }

        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by_key(|&i| keyed[i]);

        for pair in order.windows(2) {
            if keyed[pair[0]] == keyed[pair[1]] {
                return inconsistent("ambiguous group ordering: two groups share a playout timecode");
            }
        }

        let mut slots: Vec<Option<GroupReader>> = groups.into_iter().map(Some).collect();
        Ok(order.into_iter().map(|i| slots[i].take().unwrap()).collect())
    }

    fn verify_precharge_rollout_placement(groups: &[GroupReader]) -> Result<()> {
        let last = groups.len().saturating_sub(1);

        for (i, group) in groups.iter().enumerate() {
            if i != 0 && group.precharge() != 0 {
                return inconsistent("only the first group may carry pre-charge");
            }
            if i != last && group.rollout() != 0 {
                return inconsistent("only the last group may carry rollout");
            }
        }

        Ok(())
    }

    /// For each material track in the first group, attempts to extend it with a compatible track
    /// (same data-definition, essence type, sample rate, and descriptor fingerprint) in every
    /// subsequent group. Tracks that fail to extend into every group are dropped (§4.10).
    pub fn extend_material_tracks(&self) -> Vec<MaterialTrackExtension> {
        let Some(first) = self.groups.first() else {
            return Vec::new();
        };

        let mut extensions = Vec::new();

        for track in first.inputs.iter().flat_map(|i| i.tracks.iter()) {
            let mut segments = vec![(0usize, track.clone())];

            for (gi, group) in self.groups.iter().enumerate().skip(1) {
                let matched = group
                    .inputs
                    .iter()
                    .flat_map(|i| i.tracks.iter())
                    .find(|candidate| Self::tracks_compatible(track, candidate));

                match matched {
                    Some(candidate) => segments.push((gi, candidate.clone())),
                    None => break,
                }
            }

            let extension = MaterialTrackExtension { material_track_id: track.track_id, segments };
            if extension.spans_all_groups(self.groups.len()) {
                extensions.push(extension);
            }
        }

        extensions
    }

    fn tracks_compatible(a: &MaterialTrack, b: &MaterialTrack) -> bool {
        a.data_definition == b.data_definition
            && a.essence_type == b.essence_type
            && a.sample_rate == b.sample_rate
            && a.descriptor_fingerprint == b.descriptor_fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(byte: u8) -> Uuid {
        Uuid::from_bytes([byte; 16])
    }

    fn track(id: u32, dd: DataDefinition, fp: u64) -> MaterialTrack {
        track_with_duration(id, dd, fp, 0)
    }

    fn track_with_duration(id: u32, dd: DataDefinition, fp: u64, duration: i64) -> MaterialTrack {
        MaterialTrack {
            track_id: id,
            data_definition: dd,
            essence_type: EssenceType::Unknown,
            sample_rate: (25, 1),
            descriptor_fingerprint: fp,
            duration,
        }
    }

    fn input(file_id: usize, tc_frame: u16, precharge: i64, rollout: i64, tracks: Vec<MaterialTrack>) -> GroupInput {
        GroupInput {
            file_id,
            material_package_uid: uid(1),
            lead_filler_offset: 0,
            playout_timecode: Some(Timecode::new((25, 1), false, 0, 0, 0, tc_frame)),
            precharge,
            rollout,
            tracks,
        }
    }

    #[test]
    fn verify_grouping_by_material_package_and_lead_filler_offset() {
        let a = input(0, 0, 0, 0, vec![track(1, DataDefinition::Picture, 1)]);
        let mut b = input(1, 10, 0, 0, vec![track(1, DataDefinition::Picture, 1)]);
        b.material_package_uid = uid(2);

        let seq = SequenceReader::build(vec![a, b], false).unwrap();
        assert_eq!(seq.groups.len(), 2);
    }

    #[test]
    fn verify_orders_groups_by_playout_timecode() {
        let later = input(0, 100, 0, 0, vec![]);
        let mut earlier = input(1, 10, 0, 0, vec![]);
        earlier.material_package_uid = uid(2);

        let seq = SequenceReader::build(vec![later, earlier], false).unwrap();
        assert_eq!(seq.groups[0].inputs[0].file_id, 1);
        assert_eq!(seq.groups[1].inputs[0].file_id, 0);
    }

    #[test]
    fn verify_ambiguous_timecode_ordering_rejected() {
        let a = input(0, 50, 0, 0, vec![]);
        let mut b = input(1, 50, 0, 0, vec![]);
        b.material_package_uid = uid(2);

        assert!(SequenceReader::build(vec![a, b], false).is_err());
    }

    #[test]
    fn verify_interior_precharge_rejected() {
        let first = input(0, 0, 5, 0, vec![]);
        let mut second = input(1, 10, 3, 0, vec![]);
        second.material_package_uid = uid(2);

        assert!(SequenceReader::build(vec![first, second], false).is_err());
    }

    #[test]
    fn verify_track_extension_drops_tracks_missing_from_a_group() {
        let first = input(0, 0, 0, 0, vec![track(1, DataDefinition::Picture, 42), track(2, DataDefinition::Sound, 7)]);
        let mut second = input(1, 10, 0, 0, vec![track(1, DataDefinition::Picture, 42)]);
        second.material_package_uid = uid(2);

        let seq = SequenceReader::build(vec![first, second], false).unwrap();
        let extensions = seq.extend_material_tracks();

        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].material_track_id, 1);
    }

    #[test]
    fn verify_resolve_position_finds_owning_segment_and_local_offset() {
        let first = input(0, 0, 0, 0, vec![track_with_duration(1, DataDefinition::Picture, 42, 100)]);
        let mut second = input(1, 10, 0, 0, vec![track_with_duration(1, DataDefinition::Picture, 42, 50)]);
        second.material_package_uid = uid(2);

        let seq = SequenceReader::build(vec![first, second], false).unwrap();
        let extensions = seq.extend_material_tracks();
        let extension = &extensions[0];

        assert_eq!(extension.total_duration(), 150);
        assert_eq!(extension.resolve_position(0), Some((0, 0)));
        assert_eq!(extension.resolve_position(99), Some((0, 99)));
        assert_eq!(extension.resolve_position(100), Some((1, 0)));
        assert_eq!(extension.resolve_position(149), Some((1, 49)));
        assert_eq!(extension.resolve_position(150), None);
    }
}
