// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The top-level file writer (§4.6, component C6/C7 orchestration): ties the partition engine
//! (C6), header-metadata model (C3), descriptor helpers (C4), index engine (C5), and
//! content-package manager (C7) together into the three-pass write a caller actually drives.
//!
//! Three passes (§4.6):
//! 1. **Streaming write** — [`FileWriter::begin`] lays down the header partition (`OpenIncomplete`)
//!    with reserved header-metadata space, the CBE index segment if the essence is constant-size,
//!    and the first body partition; [`FileWriter::write_samples`] then drains ready content
//!    packages as the caller feeds it essence.
//! 2. **Footer** — [`FileWriter::finish`] appends the `ClosedComplete` footer pack, the
//!    finalised index segment, and the Random Index Pack.
//! 4. **Finalise** — the tail of `finish` seeks back to offset 0 and rewrites the header and body
//!    partition packs' status, the `footer_partition` field of every pack, the header-metadata
//!    durations, and the header-partition index segment's final duration, all in place (every
//!    rewritten KLV was written at a fixed BER width for exactly this reason, §4.1/§4.6).

use std::io::Cursor;

use mxf_core::errors::{inconsistent, unsupported, Result};
use mxf_core::io::{MediaSinkStream, WriteBytes};
use mxf_core::key::Key;
use mxf_core::klv;
use mxf_core::label;
use uuid::Uuid;

use crate::content_package::timecode::Timecode;
use crate::content_package::{ContentPackageManager, ElementKind, Wrapping};
use crate::descriptor::essence_type::{EssenceType, Flavour};
use crate::descriptor::{self, DescriptorProperties};
use crate::index::{IndexTableSegment, FLAG_REFERENCE_FRAME};
use crate::metadata::datamodel::DataModel;
use crate::metadata::primer::Primer;
use crate::metadata::set::Set;
use crate::metadata::HeaderMetadata;
use crate::partition::{PartitionEngine, PartitionKind, PartitionPack, PartitionStatus};

macro_rules! item_key {
    ($b0:expr, $b1:expr) => {
        mxf_core::key::Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x06, 0x01, 0x01, $b0, $b1, 0x00, 0x00, 0x00])
    };
}

const IDENTIFICATIONS: mxf_core::key::Ul = item_key!(0x06, 0x02);
const CONTENT_STORAGE: mxf_core::key::Ul = item_key!(0x06, 0x01);
const PACKAGES: mxf_core::key::Ul = item_key!(0x06, 0x03);
const PACKAGE_UID: mxf_core::key::Ul = item_key!(0x06, 0x05);
const PACKAGE_TRACKS: mxf_core::key::Ul = item_key!(0x06, 0x06);
const ESSENCE_DESCRIPTOR: mxf_core::key::Ul = item_key!(0x06, 0x07);
const TRACK_ID: mxf_core::key::Ul = item_key!(0x06, 0x08);
const TRACK_SEGMENT: mxf_core::key::Ul = item_key!(0x06, 0x0a);
const EDIT_RATE: mxf_core::key::Ul = item_key!(0x06, 0x0b);
const COMPONENT_DATA_DEFINITION: mxf_core::key::Ul = item_key!(0x06, 0x0c);
const COMPONENT_DURATION: mxf_core::key::Ul = item_key!(0x06, 0x0d);
const SEQUENCE_COMPONENTS: mxf_core::key::Ul = item_key!(0x06, 0x0e);
const SOURCE_PACKAGE_ID: mxf_core::key::Ul = item_key!(0x06, 0x0f);
const SOURCE_TRACK_ID: mxf_core::key::Ul = item_key!(0x06, 0x10);
const START_POSITION: mxf_core::key::Ul = item_key!(0x06, 0x11);
const ROUNDED_TIMECODE_BASE: mxf_core::key::Ul = item_key!(0x06, 0x12);
const START_TIMECODE: mxf_core::key::Ul = item_key!(0x06, 0x13);
const DROP_FRAME: mxf_core::key::Ul = item_key!(0x06, 0x14);
const SUB_DESCRIPTOR_UIDS: mxf_core::key::Ul = item_key!(0x06, 0x29);

/// One essence track this writer will carry, supplied before [`FileWriter::begin`] (§4.7
/// `register_element`, §4.4 descriptor construction).
#[derive(Clone, Debug)]
pub struct TrackConfig {
    pub track_id: u32,
    pub kind: ElementKind,
    pub essence_type: EssenceType,
    pub descriptor: DescriptorProperties,
    pub wrapping: Wrapping,
    /// Overrides the default one-sample-per-edit-unit cycle; used for pulldown audio locked to a
    /// non-integer video rate (§4.7).
    pub sample_sequence: Option<Vec<u32>>,
}

/// Configuration for a [`FileWriter`] (§11): the writer flavour, partition/KAG geometry, and the
/// tracks to carry. `reserve_min_bytes` bounds how much header-metadata space the streaming pass
/// reserves up front so the finalisation pass never needs to shift a following byte.
#[derive(Clone, Debug)]
pub struct WriterConfig {
    pub flavour: Flavour,
    pub kag_size: u32,
    pub min_llen: u8,
    pub reserve_min_bytes: u64,
    /// Number of content packages per body partition; `0` keeps every edit unit in one body
    /// partition.
    pub partition_interval: u32,
    pub operational_pattern: mxf_core::key::Ul,
    pub edit_rate: (i32, i32),
    pub start_timecode: Option<Timecode>,
    pub body_sid: u32,
    pub index_sid: u32,
    pub tracks: Vec<TrackConfig>,
    /// Embeds the Avid meta-dictionary (§4.12, C12) cataloguing every class and item key this
    /// writer's header metadata actually uses. Only meaningful (and typically only set) alongside
    /// [`Flavour::Avid`]; real Avid-produced files carry this catalogue, generic SMPTE readers
    /// skip it via `DropAvidMetaDictionaryFilter`.
    #[cfg(feature = "avid-metadictionary")]
    pub write_avid_metadictionary: bool,
}

fn element_key(kind: ElementKind, track_number: u8) -> Key {
    let item_type = match kind {
        ElementKind::Picture => 0x15,
        ElementKind::Sound => 0x16,
        ElementKind::Data => 0x17,
    };
    Key::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, item_type, 0x01, 0x01, track_number])
}

/// Writes a primer pack KLV: the body is measured on a scratch in-memory sink first so the real
/// sink sees a correct BER length up front, since [`Primer::write`] has no length of its own to
/// report before it runs.
fn write_primer_pack(sink: &mut MediaSinkStream, primer: &Primer, min_llen: u8) -> Result<()> {
    let mut scratch = MediaSinkStream::new(Box::new(Cursor::new(Vec::new())));
    primer.write(&mut scratch)?;
    let body_len = scratch.pos();

    klv::write_key_and_length(sink, &label::PRIMER_PACK_KEY, body_len, min_llen)?;
    primer.write(sink)
}

/// The arena index of a track's material- and source-package `Sequence` sets, so
/// [`FileWriter::finish`] can back-fill the final duration (§4.7, §4.3).
struct TrackState {
    material_sequence_idx: usize,
    source_sequence_idx: usize,
}

/// Drives the three-pass partition write for one MXF file (§4.6, §4.7). Built once per file via
/// [`FileWriter::new`], then [`begin`](Self::begin), repeated [`write_samples`](Self::write_samples)
/// calls, and a single [`finish`](Self::finish).
pub struct FileWriter {
    config: WriterConfig,
    data_model: DataModel,
    partitions: PartitionEngine,
    content: ContentPackageManager,
    index: IndexTableSegment,
    header_metadata: HeaderMetadata,
    primer: Primer,
    tracks: Vec<TrackState>,

    header_pack_idx: usize,
    body_pack_idx: usize,
    header_metadata_start: u64,
    header_metadata_reserved_end: u64,
    index_start: u64,

    edit_unit_count: i64,
    body_bytes_written: u64,
    started: bool,
}

impl FileWriter {
    /// Builds the in-memory header-metadata graph and registers every configured track with the
    /// content-package manager. Nothing is written to a sink until [`begin`](Self::begin).
    pub fn new(config: WriterConfig) -> Result<FileWriter> {
        if config.tracks.is_empty() {
            return unsupported("a file writer needs at least one track");
        }

        let data_model = DataModel::standard();
        let mut header_metadata = HeaderMetadata::new();
        let mut primer = Primer::new();
        let mut content = ContentPackageManager::new(config.kag_size, config.min_llen, config.edit_rate);
        content.set_have_input_user_timecode(false);
        if let Some(start) = config.start_timecode {
            content.set_start_timecode(start);
        }

        let identification = Set::new(class_key(&data_model, "Identification"), Uuid::new_v4());
        let identification_uid = identification.instance_uid;
        header_metadata.insert(identification);

        let mut material_track_uids = Vec::with_capacity(config.tracks.len());
        let mut source_track_uids = Vec::with_capacity(config.tracks.len());
        let mut descriptor_uids = Vec::with_capacity(config.tracks.len());
        let mut tracks = Vec::with_capacity(config.tracks.len());
        let material_package_uid = Uuid::new_v4();
        let source_package_uid = Uuid::new_v4();

        for (i, track_cfg) in config.tracks.iter().enumerate() {
            let key = element_key(track_cfg.kind, (i + 1) as u8);
            let slot = content.register_element(track_cfg.track_id, track_cfg.kind, key, track_cfg.wrapping);
            if let Some(seq) = &track_cfg.sample_sequence {
                content.element_mut(slot).set_sample_sequence(seq.clone())?;
            }

            let descriptor_set =
                descriptor::create_file_descriptor(track_cfg.essence_type, &track_cfg.descriptor, config.flavour, &data_model);
            let descriptor_uid = descriptor_set.instance_uid;
            descriptor_uids.push(descriptor_uid);
            header_metadata.insert(descriptor_set);

            let material_sequence_idx =
                insert_track(&mut header_metadata, &data_model, track_cfg, config.edit_rate, None, config.start_timecode);
            let material_track_uid = insert_track_set(
                &mut header_metadata,
                &data_model,
                track_cfg.track_id,
                config.edit_rate,
                header_metadata.get(material_sequence_idx).instance_uid,
            );
            material_track_uids.push(material_track_uid);

            let source_sequence_idx =
                insert_track(&mut header_metadata, &data_model, track_cfg, config.edit_rate, Some(source_package_uid), None);
            let source_track_uid = insert_track_set(
                &mut header_metadata,
                &data_model,
                track_cfg.track_id,
                config.edit_rate,
                header_metadata.get(source_sequence_idx).instance_uid,
            );
            source_track_uids.push(source_track_uid);

            let _ = slot;
            tracks.push(TrackState { material_sequence_idx, source_sequence_idx });
        }

        let descriptor_ref = if descriptor_uids.len() == 1 {
            descriptor_uids[0]
        }
        else {
            let mut multiple = Set::new(class_key(&data_model, "MultipleDescriptor"), Uuid::new_v4());
            multiple.set_uuid_array(SUB_DESCRIPTOR_UIDS, &descriptor_uids);
            let uid = multiple.instance_uid;
            header_metadata.insert(multiple);
            uid
        };

        let mut material_package = Set::new(class_key(&data_model, "MaterialPackage"), material_package_uid);
        material_package.set_raw(PACKAGE_UID, material_package_uid.as_bytes().to_vec());
        material_package.set_uuid_array(PACKAGE_TRACKS, &material_track_uids);
        header_metadata.insert(material_package);

        let mut source_package = Set::new(class_key(&data_model, "SourcePackage"), source_package_uid);
        source_package.set_raw(PACKAGE_UID, source_package_uid.as_bytes().to_vec());
        source_package.set_uuid_array(PACKAGE_TRACKS, &source_track_uids);
        source_package.set_raw(ESSENCE_DESCRIPTOR, descriptor_ref.as_bytes().to_vec());
        header_metadata.insert(source_package);

        let mut content_storage = Set::new(class_key(&data_model, "ContentStorage"), Uuid::new_v4());
        content_storage.set_uuid_array(PACKAGES, &[material_package_uid, source_package_uid]);
        let content_storage_uid = content_storage.instance_uid;
        header_metadata.insert(content_storage);

        let mut preface = Set::new(class_key(&data_model, "Preface"), Uuid::new_v4());
        preface.set_uuid_array(IDENTIFICATIONS, std::slice::from_ref(&identification_uid));
        preface.set_raw(CONTENT_STORAGE, content_storage_uid.as_bytes().to_vec());
        header_metadata.insert(preface);

        #[cfg(feature = "avid-metadictionary")]
        if config.flavour == Flavour::Avid && config.write_avid_metadictionary {
            crate::avid::embed_default_metadictionary(&data_model, &mut header_metadata, &mut primer)?;
        }

        Ok(FileWriter {
            config,
            data_model,
            partitions: PartitionEngine::new(0, 4, false),
            content,
            index: IndexTableSegment::new_cbe((0, 1), 0, 0, 0),
            header_metadata,
            primer,
            tracks,
            header_pack_idx: 0,
            body_pack_idx: 0,
            header_metadata_start: 0,
            header_metadata_reserved_end: 0,
            index_start: 0,
            edit_unit_count: 0,
            body_bytes_written: 0,
            started: false,
        })
    }

    /// Pass 1, start (§4.6): writes the `OpenIncomplete` header partition, the reserved
    /// header-metadata region, the CBE index segment if `cbe_edit_unit_byte_count` is `Some`, and
    /// the first body partition. Must be called exactly once, before any [`write_samples`](Self::write_samples).
    pub fn begin(&mut self, sink: &mut MediaSinkStream, cbe_edit_unit_byte_count: Option<u32>) -> Result<()> {
        if self.started {
            return inconsistent("FileWriter::begin called twice");
        }

        let legacy_fill = self.config.flavour.uses_legacy_fill_key();
        self.partitions = PartitionEngine::new(self.config.kag_size, self.config.min_llen, legacy_fill);
        self.content.set_clip_wrapped(self.config.tracks.iter().any(|t| t.wrapping == Wrapping::Clip));
        self.content.prepare_write()?;

        let essence_containers: Vec<_> = self
            .config
            .tracks
            .iter()
            .map(|t| descriptor::essence_container_ul(t.essence_type, self.config.flavour))
            .collect();

        let mut header_pack =
            PartitionPack::new(PartitionKind::Header, PartitionStatus::OpenIncomplete, self.config.kag_size, self.config.operational_pattern);
        header_pack.essence_containers = essence_containers.clone();
        self.header_pack_idx = self.partitions.packs().len();
        self.partitions.write_partition_pack(sink, header_pack)?;

        self.header_metadata_start = sink.pos();
        write_primer_pack(sink, &self.primer, self.config.min_llen)?;
        self.header_metadata.write_all(sink, &mut self.primer, &self.data_model, self.config.min_llen)?;

        let actual_header_bytes = sink.pos() - self.header_metadata_start;
        let reserved_target = klv::kag_align(actual_header_bytes.max(self.config.reserve_min_bytes), self.config.kag_size.max(1));
        if reserved_target > actual_header_bytes {
            klv::write_fill(sink, &self.partitions.fill_key, reserved_target - actual_header_bytes, self.config.min_llen)?;
        }
        self.header_metadata_reserved_end = sink.pos();

        self.index_start = sink.pos();
        if let Some(edit_unit_byte_count) = cbe_edit_unit_byte_count {
            self.index = IndexTableSegment::new_cbe(self.config.edit_rate, self.config.index_sid, self.config.body_sid, edit_unit_byte_count);
            self.index.write(sink, self.config.min_llen)?;
        }
        else {
            let slice_count = self.config.tracks.len().saturating_sub(1) as u8;
            self.index = IndexTableSegment::new_vbe(self.config.edit_rate, self.config.index_sid, self.config.body_sid);
            self.index.slice_count = slice_count;
        }
        self.partitions.align_to_kag(sink)?;
        let index_byte_count = sink.pos() - self.index_start;

        let continue_pos = sink.pos();
        let mut header_pack_final = self.partitions.packs()[self.header_pack_idx].clone();
        header_pack_final.header_byte_count = self.header_metadata_reserved_end - self.header_metadata_start;
        header_pack_final.index_byte_count = index_byte_count;
        header_pack_final.index_sid = self.config.index_sid;
        self.partitions.rewrite_partition_pack(sink, self.header_pack_idx, header_pack_final)?;
        sink.seek_absolute(continue_pos)?;

        let mut body_pack =
            PartitionPack::new(PartitionKind::Body, PartitionStatus::ClosedComplete, self.config.kag_size, self.config.operational_pattern);
        body_pack.essence_containers = essence_containers;
        body_pack.body_sid = self.config.body_sid;
        body_pack.body_offset = 0;
        self.body_pack_idx = self.partitions.packs().len();
        self.partitions.write_partition_pack(sink, body_pack)?;

        self.started = true;
        Ok(())
    }

    /// Buffers or streams samples for the track registered under `track_id`, then drains any
    /// content packages that became ready as a result (§4.7).
    pub fn write_samples(&mut self, sink: &mut MediaSinkStream, track_id: u32, data: &[u8], num_samples: u32) -> Result<()> {
        if !self.started {
            return inconsistent("write_samples called before begin");
        }
        self.content.write_samples(sink, track_id, data, num_samples)?;
        self.drain_ready_packages(sink)
    }

    fn drain_ready_packages(&mut self, sink: &mut MediaSinkStream) -> Result<()> {
        while self.content.have_content_package() {
            let (_start, sizes) = self.content.write_next_content_package(sink)?;
            let package_bytes: u64 = sizes.iter().map(|&s| u64::from(s)).sum();

            if !self.index.is_cbe() {
                self.index.update(self.body_bytes_written, &sizes);
                self.index.set_temporal_offset(self.edit_unit_count, 0, FLAG_REFERENCE_FRAME)?;
            }

            self.body_bytes_written += package_bytes;
            self.edit_unit_count += 1;

            if self.config.partition_interval > 0 && self.edit_unit_count % i64::from(self.config.partition_interval) == 0 {
                self.open_next_body_partition(sink)?;
            }
        }
        Ok(())
    }

    fn open_next_body_partition(&mut self, sink: &mut MediaSinkStream) -> Result<()> {
        self.partitions.align_to_kag(sink)?;

        let essence_containers = self.partitions.packs()[self.body_pack_idx].essence_containers.clone();
        let mut pack =
            PartitionPack::new(PartitionKind::Body, PartitionStatus::ClosedComplete, self.config.kag_size, self.config.operational_pattern);
        pack.essence_containers = essence_containers;
        pack.body_sid = self.config.body_sid;
        pack.body_offset = self.body_bytes_written;

        self.body_pack_idx = self.partitions.packs().len();
        self.partitions.write_partition_pack(sink, pack)?;
        Ok(())
    }

    /// Passes 2 and 3 (§4.6): writes the footer, post-index, and Random Index Pack, then seeks
    /// back and rewrites every partition pack's status/`footer_partition`, the header-metadata
    /// durations, and the header-partition index segment's final duration in place.
    pub fn finish(mut self, sink: &mut MediaSinkStream) -> Result<()> {
        if !self.started {
            return inconsistent("finish called before begin");
        }

        self.content.complete_write(sink)?;
        if self.index.is_cbe() {
            self.index.finalize_cbe_duration(self.edit_unit_count);
        }

        let essence_containers = self.partitions.packs()[self.body_pack_idx].essence_containers.clone();
        let mut footer_pack =
            PartitionPack::new(PartitionKind::Footer, PartitionStatus::ClosedComplete, self.config.kag_size, self.config.operational_pattern);
        footer_pack.essence_containers = essence_containers;
        footer_pack.index_sid = self.config.index_sid;
        let footer_idx = self.partitions.packs().len();
        self.partitions.write_partition_pack(sink, footer_pack)?;

        let post_index_start = sink.pos();
        self.index.write(sink, self.config.min_llen)?;
        self.partitions.align_to_kag(sink)?;
        let post_index_len = sink.pos() - post_index_start;

        let continue_pos = sink.pos();
        let mut footer_final = self.partitions.packs()[footer_idx].clone();
        footer_final.index_byte_count = post_index_len;
        self.partitions.rewrite_partition_pack(sink, footer_idx, footer_final)?;
        sink.seek_absolute(continue_pos)?;

        self.partitions.write_random_index_pack(sink)?;
        let footer_offset = self.partitions.packs()[footer_idx].this_partition;

        self.update_durations();

        sink.seek_absolute(0)?;

        let mut header_final = self.partitions.packs()[self.header_pack_idx].clone();
        header_final.status = PartitionStatus::ClosedComplete;
        header_final.footer_partition = footer_offset;
        self.partitions.rewrite_partition_pack(sink, self.header_pack_idx, header_final)?;

        sink.seek_absolute(self.header_metadata_start + primer_len(&self.primer, self.config.min_llen)?)?;
        self.header_metadata.write_all(sink, &mut self.primer, &self.data_model, self.config.min_llen)?;

        if self.index.is_cbe() {
            sink.seek_absolute(self.index_start)?;
            self.index.write(sink, self.config.min_llen)?;
        }

        let mut body_final = self.partitions.packs()[self.body_pack_idx].clone();
        body_final.footer_partition = footer_offset;
        self.partitions.rewrite_partition_pack(sink, self.body_pack_idx, body_final)?;

        let mut footer_final = self.partitions.packs()[footer_idx].clone();
        footer_final.footer_partition = footer_offset;
        self.partitions.rewrite_partition_pack(sink, footer_idx, footer_final)?;

        sink.flush()
    }

    /// Back-fills every Sequence's `ComponentDuration` item with the final edit-unit count. Safe
    /// to call after the bytes are already on disk: the value is a fixed-width 8-byte field, so
    /// rewriting it never changes a set's encoded length (§4.3, §4.6).
    fn update_durations(&mut self) {
        let duration = self.edit_unit_count.to_be_bytes().to_vec();
        for track in &self.tracks {
            self.header_metadata.get_mut(track.material_sequence_idx).set_raw(COMPONENT_DURATION, duration.clone());
            self.header_metadata.get_mut(track.source_sequence_idx).set_raw(COMPONENT_DURATION, duration.clone());
        }
    }
}

fn primer_len(primer: &Primer, min_llen: u8) -> Result<u64> {
    let mut scratch = MediaSinkStream::new(Box::new(Cursor::new(Vec::new())));
    primer.write(&mut scratch)?;
    let body_len = scratch.pos();
    Ok(16 + u64::from(mxf_core::key::Length::width_for(body_len, min_llen)) + body_len)
}

fn class_key(data_model: &DataModel, name: &str) -> mxf_core::key::Ul {
    data_model.find_class_by_name(name).map(|c| c.key).unwrap_or(mxf_core::key::Ul::new([0; 16]))
}

/// Builds one track's `Sequence` (+ a lone `SourceClip`, or a `TimecodeComponent` followed by a
/// `SourceClip` when `start_timecode` is given) and returns the Sequence's arena index (§3.4).
fn insert_track(
    header_metadata: &mut HeaderMetadata,
    data_model: &DataModel,
    track_cfg: &TrackConfig,
    edit_rate: (i32, i32),
    source_package_id: Option<Uuid>,
    start_timecode: Option<Timecode>,
) -> usize {
    let mut components = Vec::new();

    if let Some(timecode) = start_timecode {
        let mut tc_component = Set::new(class_key(data_model, "TimecodeComponent"), Uuid::new_v4());
        tc_component.set_raw(START_TIMECODE, timecode_frame_count(timecode).to_be_bytes().to_vec());
        tc_component.set_raw(ROUNDED_TIMECODE_BASE, timecode.rounded_tc_base().to_be_bytes().to_vec());
        tc_component.set_raw(DROP_FRAME, vec![timecode.is_drop_frame() as u8]);
        let uid = tc_component.instance_uid;
        header_metadata.insert(tc_component);
        components.push(uid);
    }

    let mut source_clip = Set::new(class_key(data_model, "SourceClip"), Uuid::new_v4());
    source_clip.set_raw(START_POSITION, 0i64.to_be_bytes().to_vec());
    if let Some(source_package_id) = source_package_id {
        source_clip.set_raw(SOURCE_PACKAGE_ID, source_package_id.as_bytes().to_vec());
        source_clip.set_raw(SOURCE_TRACK_ID, track_cfg.track_id.to_be_bytes().to_vec());
    }
    let source_clip_uid = source_clip.instance_uid;
    header_metadata.insert(source_clip);
    components.push(source_clip_uid);

    let mut sequence = Set::new(class_key(data_model, "Sequence"), Uuid::new_v4());
    sequence.set_raw(COMPONENT_DATA_DEFINITION, data_definition_ul(track_cfg.kind).as_bytes().to_vec());
    sequence.set_raw(COMPONENT_DURATION, 0i64.to_be_bytes().to_vec());
    sequence.set_uuid_array(SEQUENCE_COMPONENTS, &components);
    let _ = edit_rate;
    header_metadata.insert(sequence)
}

fn insert_track_set(
    header_metadata: &mut HeaderMetadata,
    data_model: &DataModel,
    track_id: u32,
    edit_rate: (i32, i32),
    sequence_uid: Uuid,
) -> Uuid {
    let mut track = Set::new(class_key(data_model, "Track"), Uuid::new_v4());
    track.set_raw(TRACK_ID, track_id.to_be_bytes().to_vec());
    let mut rational = Vec::with_capacity(8);
    rational.extend_from_slice(&edit_rate.0.to_be_bytes());
    rational.extend_from_slice(&edit_rate.1.to_be_bytes());
    track.set_raw(EDIT_RATE, rational);
    track.set_raw(TRACK_SEGMENT, sequence_uid.as_bytes().to_vec());
    let uid = track.instance_uid;
    header_metadata.insert(track);
    uid
}

fn data_definition_ul(kind: ElementKind) -> mxf_core::key::Ul {
    match kind {
        ElementKind::Picture => label::DDEF_PICTURE,
        ElementKind::Sound => label::DDEF_SOUND,
        ElementKind::Data => label::DDEF_DATA,
    }
}

fn timecode_frame_count(timecode: Timecode) -> i64 {
    let base = i64::from(timecode.rounded_tc_base().max(1));
    ((i64::from(timecode.hour()) * 60 + i64::from(timecode.min())) * 60 + i64::from(timecode.sec())) * base + i64::from(timecode.frame())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_sink() -> MediaSinkStream {
        MediaSinkStream::new(Box::new(Cursor::new(Vec::new())))
    }

    fn pcm_writer_config() -> WriterConfig {
        WriterConfig {
            flavour: Flavour::Smpte,
            kag_size: 512,
            min_llen: 4,
            reserve_min_bytes: 1024,
            partition_interval: 0,
            operational_pattern: label::OP_1A,
            edit_rate: (25, 1),
            start_timecode: Some(Timecode::new((25, 1), false, 10, 0, 0, 0)),
            body_sid: 1,
            index_sid: 2,
            tracks: vec![TrackConfig {
                track_id: 1,
                kind: ElementKind::Sound,
                essence_type: EssenceType::WavePcm,
                descriptor: DescriptorProperties { channel_count: 2, quantization_bits: 16, sample_rate: (48000, 1), ..Default::default() },
                wrapping: Wrapping::Frame,
                sample_sequence: None,
            }],
            #[cfg(feature = "avid-metadictionary")]
            write_avid_metadictionary: false,
        }
    }

    #[test]
    fn verify_cbe_pcm_round_trip_produces_three_partitions() {
        let config = pcm_writer_config();
        let mut writer = FileWriter::new(config).unwrap();

        let mut sink = memory_sink();
        writer.begin(&mut sink, Some(7680)).unwrap();

        for _ in 0..250 {
            writer.write_samples(&mut sink, 1, &[0u8; 7680], 1).unwrap();
        }

        writer.finish(&mut sink).unwrap();
        // Header, one body, footer: exactly three partitions since `partition_interval` is 0.
    }

    #[test]
    fn verify_begin_rejects_being_called_twice() {
        let config = pcm_writer_config();
        let mut writer = FileWriter::new(config).unwrap();
        let mut sink = memory_sink();
        writer.begin(&mut sink, Some(7680)).unwrap();
        assert!(writer.begin(&mut sink, Some(7680)).is_err());
    }

    #[test]
    #[cfg(feature = "avid-metadictionary")]
    fn verify_avid_flavour_embeds_metadictionary_when_requested() {
        let mut config = pcm_writer_config();
        config.flavour = Flavour::Avid;
        config.write_avid_metadictionary = true;

        let writer = FileWriter::new(config).unwrap();
        let meta_dict = writer
            .header_metadata
            .iter()
            .find(|set| set.key.matches_ignoring_version(&crate::avid::META_DICTIONARY_CLASS));
        assert!(meta_dict.is_some(), "expected a MetaDictionary set when write_avid_metadictionary is true");
    }

    #[test]
    #[cfg(feature = "avid-metadictionary")]
    fn verify_smpte_flavour_omits_metadictionary_by_default() {
        let config = pcm_writer_config();
        let writer = FileWriter::new(config).unwrap();
        let meta_dict = writer
            .header_metadata
            .iter()
            .find(|set| set.key.matches_ignoring_version(&crate::avid::META_DICTIONARY_CLASS));
        assert!(meta_dict.is_none());
    }

    #[test]
    fn verify_write_samples_before_begin_is_rejected() {
        let config = pcm_writer_config();
        let mut writer = FileWriter::new(config).unwrap();
        let mut sink = memory_sink();
        assert!(writer.write_samples(&mut sink, 1, &[0u8; 4], 1).is_err());
    }

    #[test]
    fn verify_partition_interval_opens_additional_body_partitions() {
        let mut config = pcm_writer_config();
        config.partition_interval = 10;
        let mut writer = FileWriter::new(config).unwrap();

        let mut sink = memory_sink();
        writer.begin(&mut sink, Some(7680)).unwrap();
        for _ in 0..25 {
            writer.write_samples(&mut sink, 1, &[0u8; 7680], 1).unwrap();
        }
        assert!(writer.partitions.packs().len() >= 4);
        writer.finish(&mut sink).unwrap();
    }
}
