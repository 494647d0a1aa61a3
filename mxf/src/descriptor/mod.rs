// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Descriptor helpers (§4.4, component C4): translate codec bitstream attributes to and from MXF
//! file-descriptor sets, and choose the essence-container label and wrapping for an
//! [`EssenceType`]. Every descriptor family (CDCI, RGBA, sound, multiple) shares the properties in
//! [`DescriptorProperties`]; the variant-specific fields are hoisted into that one struct rather
//! than a class hierarchy (§9 "Multiple-inheritance descriptor hierarchy").

pub mod essence_type;
pub mod table;

use mxf_core::key::Ul;
use mxf_core::label;

use crate::metadata::datamodel::DataModel;
use crate::metadata::set::Set;
use crate::metadata::HeaderMetadata;
use essence_type::{EssenceKind, EssenceType, FrameLayout, Flavour};
use table::DescriptorShape;
use uuid::Uuid;

macro_rules! item_key {
    ($b0:expr, $b1:expr) => {
        Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x06, 0x01, 0x01, $b0, $b1, 0x00, 0x00, 0x00])
    };
}

const SAMPLE_RATE: Ul = item_key!(0x30, 0x01);
const ESSENCE_CONTAINER_UL: Ul = item_key!(0x30, 0x04);
const STORED_WIDTH: Ul = item_key!(0x19, 0x00);
const STORED_HEIGHT: Ul = item_key!(0x1a, 0x00);
const ASPECT_RATIO: Ul = item_key!(0x1b, 0x00);
const FRAME_LAYOUT: Ul = item_key!(0x1c, 0x00);
const COMPONENT_DEPTH: Ul = item_key!(0x1e, 0x00);
const HORIZONTAL_SUBSAMPLING: Ul = item_key!(0x1f, 0x00);
const VERTICAL_SUBSAMPLING: Ul = item_key!(0x20, 0x00);
const IMAGE_ALIGNMENT_OFFSET: Ul = item_key!(0x21, 0x00);
const IMAGE_START_OFFSET: Ul = item_key!(0x22, 0x00);
const IMAGE_END_OFFSET: Ul = item_key!(0x23, 0x00);
const QUANTIZATION_BITS: Ul = item_key!(0x24, 0x00);
const CHANNEL_COUNT: Ul = item_key!(0x25, 0x00);
const AUDIO_SAMPLING_RATE: Ul = item_key!(0x26, 0x00);
const BLOCK_ALIGN: Ul = item_key!(0x27, 0x00);
const SUB_DESCRIPTOR_UIDS: Ul = item_key!(0x29, 0x00);
// These three match `metadata/datamodel.rs`'s own `MCAChannelID`/`MCALabelDictionaryID`/
// `MCATagSymbol` byte-for-byte (unlike this file's other item keys, which follow its own
// independent numbering), so a `MCALabelSubDescriptor` built by `append_mca_labels` below is
// classifiable by `DataModel::find_item` — needed for the Avid meta-dictionary (§4.12) to
// catalogue these properties.
const MCA_CHANNEL_ID: Ul = item_key!(0x06, 0x2d);
const MCA_LABEL_DICTIONARY_ID: Ul = item_key!(0x06, 0x2e);
const MCA_TAG_SYMBOL: Ul = item_key!(0x06, 0x2f);

/// Properties common to every descriptor family, hoisted out of a would-be class hierarchy
/// (§9). A caller populates only the fields relevant to the essence kind it is describing.
#[derive(Copy, Clone, Debug)]
pub struct DescriptorProperties {
    pub stored_width: u32,
    pub stored_height: u32,
    pub frame_layout: FrameLayout,
    pub aspect_ratio: (i32, i32),
    pub component_depth: u32,
    pub horizontal_subsampling: u32,
    pub vertical_subsampling: u32,
    pub sample_rate: (i32, i32),
    pub channel_count: u32,
    pub quantization_bits: u32,
    pub image_start_offset: u32,
    pub image_end_offset: u32,
    pub image_alignment_offset: u32,
}

impl Default for DescriptorProperties {
    fn default() -> Self {
        DescriptorProperties {
            stored_width: 0,
            stored_height: 0,
            frame_layout: FrameLayout::FullFrame,
            aspect_ratio: (16, 9),
            component_depth: 8,
            horizontal_subsampling: 2,
            vertical_subsampling: 1,
            sample_rate: (25, 1),
            channel_count: 0,
            quantization_bits: 0,
            image_start_offset: 0,
            image_end_offset: 0,
            image_alignment_offset: 0,
        }
    }
}

fn frame_layout_byte(layout: FrameLayout) -> u8 {
    match layout {
        FrameLayout::FullFrame => 0,
        FrameLayout::SeparateFields => 1,
        FrameLayout::SingleField => 2,
        FrameLayout::MixedFields => 3,
        FrameLayout::SegmentedFrame => 4,
    }
}

fn frame_layout_from_byte(byte: u8) -> FrameLayout {
    match byte {
        1 => FrameLayout::SeparateFields,
        2 => FrameLayout::SingleField,
        3 => FrameLayout::MixedFields,
        4 => FrameLayout::SegmentedFrame,
        _ => FrameLayout::FullFrame,
    }
}

/// The essence-container UL for a given `EssenceType` (§4.4). `flavour` is accepted for callers
/// that key off it uniformly across C4, but no flavour currently substitutes a different
/// container UL — Avid's quirks (§9) affect descriptor fields, not the container UL itself.
pub fn essence_container_ul(ty: EssenceType, _flavour: Flavour) -> Ul {
    use EssenceType::*;
    match ty {
        UncUyvy422 | UncV210_10Bit | UncRgba => label::EC_UNC_SD,
        Dv25 | Dv50 | Dv100_1080i | Dv100_720p => label::EC_DV,
        AvcIntra50_1080i | AvcIntra50_1080p | AvcIntra50_720p | AvcIntra100_1080i | AvcIntra100_1080p
        | AvcIntra100_720p => label::EC_AVC_INTRA,
        AvcBaseline | AvcHigh10Intra => label::EC_AVC,
        Mpeg2Mp_Ml | Mpeg2422P_Hl_1080i | Mpeg2422P_Hl_1080p | Mpeg2422P_Hl_720p | Mpeg2LgSd => label::EC_MPEG2_LG,
        Vc2Hq1080i | Vc2Hq1080p => label::EC_VC2,
        Vc3Dnxhd1080i | Vc3Dnxhd1080p | Vc3Dnxhr => label::EC_VC3_DNXHD,
        ProRes422 | ProRes422Hq | ProRes4444 => label::EC_PRORES,
        Jpeg2000Cdci | Jpeg2000Rgba => label::EC_JPEG2000,
        WavePcm => label::EC_BWF_PCM,
        Aes3Pcm => label::EC_AES3,
        Alaw => label::EC_ALAW,
        D10_30 | D10_40 | D10_50 => label::EC_MPEG2_LG,
        AnciData | Unknown => label::EC_UNC_SD,
    }
}

/// Uncompressed/PCM byte count per edit unit, used by C5/C7 to size CBE elements.
pub fn sample_size(ty: EssenceType, props: &DescriptorProperties) -> u32 {
    use EssenceType::*;
    match ty {
        WavePcm | Aes3Pcm => props.channel_count * (props.quantization_bits.div_ceil(8)),
        UncUyvy422 => props.stored_width * props.stored_height * 2,
        UncV210_10Bit => (props.stored_width.div_ceil(6) * 16) * props.stored_height,
        UncRgba => props.stored_width * props.stored_height * 4,
        _ => 0, // GOP-coded and intra-frame-but-variable-size families are VBE; no fixed size.
    }
}

/// The edit rate an `EssenceType`'s elements are counted at; for sound under frame-wrapping this
/// is always the video edit rate, not the sample rate (§3.5).
pub fn edit_rate(ty: EssenceType, video_edit_rate: (i32, i32)) -> (i32, i32) {
    match ty.kind() {
        EssenceKind::Sound | EssenceKind::Picture | EssenceKind::Data => video_edit_rate,
    }
}

/// `ImageEndOffset` with the Avid quirk from §9 applied: some Avid-flavoured CDCI descriptors omit
/// `ImageEndOffset` but carry a non-zero `ImageAlignmentOffset`, which is what the padding at the
/// end of the image actually reflects.
pub fn image_end_offset(props: &DescriptorProperties, flavour: Flavour) -> u32 {
    if props.image_end_offset != 0 {
        return props.image_end_offset;
    }
    if flavour == Flavour::Avid && props.image_alignment_offset != 0 {
        return props.image_alignment_offset;
    }
    0
}

pub fn image_start_offset(props: &DescriptorProperties) -> u32 {
    props.image_start_offset
}

fn shape_of(ty: EssenceType) -> DescriptorShape {
    use EssenceType::*;
    match ty {
        UncUyvy422 | UncV210_10Bit => DescriptorShape::Cdci,
        UncRgba => DescriptorShape::Rgba,
        Mpeg2Mp_Ml | Mpeg2422P_Hl_1080i | Mpeg2422P_Hl_1080p | Mpeg2422P_Hl_720p | Mpeg2LgSd | D10_30 | D10_40
        | D10_50 => DescriptorShape::Mpeg,
        AvcIntra50_1080i | AvcIntra50_1080p | AvcIntra50_720p | AvcIntra100_1080i | AvcIntra100_1080p
        | AvcIntra100_720p => DescriptorShape::AvcIntra,
        Vc3Dnxhd1080i | Vc3Dnxhd1080p | Vc3Dnxhr => DescriptorShape::Vc3,
        ProRes422 | ProRes422Hq | ProRes4444 => DescriptorShape::ProRes,
        Vc2Hq1080i | Vc2Hq1080p => DescriptorShape::Vc2,
        Jpeg2000Cdci | Jpeg2000Rgba => DescriptorShape::J2c,
        Dv25 | Dv50 | Dv100_1080i | Dv100_720p => DescriptorShape::Dv,
        WavePcm => DescriptorShape::Wave,
        Aes3Pcm => DescriptorShape::Aes3,
        Alaw => DescriptorShape::ALaw,
        AvcBaseline | AvcHigh10Intra => DescriptorShape::AvcIntra,
        AnciData | Unknown => DescriptorShape::Unknown,
    }
}

/// Class name of the file descriptor a given `EssenceType` should be represented by.
fn descriptor_class_name(ty: EssenceType) -> &'static str {
    match ty.kind() {
        EssenceKind::Picture => {
            if matches!(ty, EssenceType::UncRgba | EssenceType::Jpeg2000Rgba) {
                "RGBAEssenceDescriptor"
            }
            else {
                "CDCIEssenceDescriptor"
            }
        }
        EssenceKind::Sound => "WaveAudioDescriptor",
        EssenceKind::Data => "GenericDataEssenceDescriptor",
    }
}

/// Emits a new descriptor set populated from `props` (§4.4).
pub fn create_file_descriptor(ty: EssenceType, props: &DescriptorProperties, flavour: Flavour, data_model: &DataModel) -> Set {
    let class_name = descriptor_class_name(ty);
    let class_key = data_model.find_class_by_name(class_name).map(|c| c.key).unwrap_or(Ul::new([0; 16]));

    let mut set = Set::new(class_key, Uuid::new_v4());
    set.set_raw(SAMPLE_RATE, encode_rational(edit_rate(ty, (25, 1))));
    set.set_raw(ESSENCE_CONTAINER_UL, essence_container_ul(ty, flavour).as_bytes().to_vec());

    update_file_descriptor(&mut set, ty, props, flavour);
    set
}

/// Re-populates `set`'s properties after a change to `props` (§4.4 `update_file_descriptor`).
pub fn update_file_descriptor(set: &mut Set, ty: EssenceType, props: &DescriptorProperties, flavour: Flavour) {
    match ty.kind() {
        EssenceKind::Picture => {
            set.set_raw(STORED_WIDTH, props.stored_width.to_be_bytes().to_vec());
            set.set_raw(STORED_HEIGHT, props.stored_height.to_be_bytes().to_vec());
            set.set_raw(ASPECT_RATIO, encode_rational(props.aspect_ratio));
            set.set_raw(FRAME_LAYOUT, vec![frame_layout_byte(props.frame_layout)]);
            set.set_raw(COMPONENT_DEPTH, props.component_depth.to_be_bytes().to_vec());
            set.set_raw(HORIZONTAL_SUBSAMPLING, props.horizontal_subsampling.to_be_bytes().to_vec());
            set.set_raw(VERTICAL_SUBSAMPLING, props.vertical_subsampling.to_be_bytes().to_vec());
            set.set_raw(IMAGE_START_OFFSET, image_start_offset(props).to_be_bytes().to_vec());
            let end_offset = image_end_offset(props, flavour);
            if end_offset != 0 {
                set.set_raw(IMAGE_END_OFFSET, end_offset.to_be_bytes().to_vec());
            }
            if props.image_alignment_offset != 0 {
                set.set_raw(IMAGE_ALIGNMENT_OFFSET, props.image_alignment_offset.to_be_bytes().to_vec());
            }
        }
        EssenceKind::Sound => {
            set.set_raw(CHANNEL_COUNT, props.channel_count.to_be_bytes().to_vec());
            set.set_raw(QUANTIZATION_BITS, props.quantization_bits.to_be_bytes().to_vec());
            set.set_raw(AUDIO_SAMPLING_RATE, encode_rational(props.sample_rate));
            let block_align = (props.channel_count * props.quantization_bits.div_ceil(8)) as u16;
            set.set_raw(BLOCK_ALIGN, block_align.to_be_bytes().to_vec());
        }
        EssenceKind::Data => {}
    }
}

/// Inverse of [`create_file_descriptor`]: classify an existing descriptor set (§4.4
/// `infer_from_descriptor`).
pub fn infer_from_descriptor(set: &Set, data_model: &DataModel) -> EssenceType {
    let Some(class) = data_model.find_class(&set.key) else {
        return EssenceType::Unknown;
    };

    let shape = match class.name {
        "CDCIEssenceDescriptor" => {
            let ec = set.raw(&ESSENCE_CONTAINER_UL).unwrap_or(&[]);
            classify_ec_shape(ec).unwrap_or(DescriptorShape::Cdci)
        }
        "RGBAEssenceDescriptor" => DescriptorShape::Rgba,
        "WaveAudioDescriptor" => DescriptorShape::Wave,
        _ => return EssenceType::Unknown,
    };

    let props = properties_from_descriptor(set);
    table::infer(shape, &props)
}

fn classify_ec_shape(ec_bytes: &[u8]) -> Option<DescriptorShape> {
    if ec_bytes.len() != 16 {
        return None;
    }
    let ul = Ul::new(ec_bytes.try_into().ok()?);
    if label::is_mpeg_video_ec(&ul) {
        Some(DescriptorShape::Mpeg)
    }
    else if label::is_avc_ec(&ul) {
        Some(DescriptorShape::AvcIntra)
    }
    else if label::is_vc3_ec(&ul) {
        Some(DescriptorShape::Vc3)
    }
    else if label::is_prores_ec(&ul) {
        Some(DescriptorShape::ProRes)
    }
    else if label::is_vc2_ec(&ul) {
        Some(DescriptorShape::Vc2)
    }
    else if label::is_jpeg2000_ec(&ul) {
        Some(DescriptorShape::J2c)
    }
    else if label::is_dv_ec(&ul) {
        Some(DescriptorShape::Dv)
    }
    else {
        None
    }
}

fn properties_from_descriptor(set: &Set) -> DescriptorProperties {
    let mut props = DescriptorProperties::default();
    props.stored_width = set.u32(&STORED_WIDTH).unwrap_or(0);
    props.stored_height = set.u32(&STORED_HEIGHT).unwrap_or(0);
    props.frame_layout = frame_layout_from_byte(set.u8(&FRAME_LAYOUT).unwrap_or(0));
    props.aspect_ratio = set.rational(&ASPECT_RATIO).unwrap_or((16, 9));
    props.component_depth = set.u32(&COMPONENT_DEPTH).unwrap_or(8);
    props.sample_rate = set.rational(&AUDIO_SAMPLING_RATE).or_else(|| set.rational(&SAMPLE_RATE)).unwrap_or((25, 1));
    props.channel_count = set.u32(&CHANNEL_COUNT).unwrap_or(0);
    props.quantization_bits = set.u32(&QUANTIZATION_BITS).unwrap_or(0);
    props.image_start_offset = set.u32(&IMAGE_START_OFFSET).unwrap_or(0);
    props.image_end_offset = set.u32(&IMAGE_END_OFFSET).unwrap_or(0);
    props.image_alignment_offset = set.u32(&IMAGE_ALIGNMENT_OFFSET).unwrap_or(0);
    props
}

/// One channel's MCA (Multichannel Audio) label assignment (§12), supplied by the caller rather
/// than drawn from a built-in table: `AppMCALabelHelper` resolves `dict_id`/`tag_symbol` pairs
/// from an external CSV label dictionary, not compiled-in constants, so this engine's channel-
/// assignment input is shaped the same way rather than inventing registry values this crate
/// doesn't actually have.
#[derive(Clone, Debug)]
pub struct ChannelAssignment {
    pub channel_index: u32,
    pub label_dictionary_id: Uuid,
    pub tag_symbol: String,
}

/// Builds one `MCALabelSubDescriptor` set per entry in `channels` and links them onto `descriptor`
/// via `SubDescriptorUIDs` (§12). `MCAChannelID` is `channel_index + 1`: MCA channel numbering
/// starts at 1, the same off-by-one `AppMCALabelHelper::CreateTrackLabels` applies
/// (`a_desc->setMCAChannelID(c_label_line.channel_index + 1)`).
pub fn append_mca_labels(descriptor: &mut Set, header_metadata: &mut HeaderMetadata, data_model: &DataModel, channels: &[ChannelAssignment]) {
    let class_key = data_model.find_class_by_name("MCALabelSubDescriptor").map(|c| c.key).unwrap_or(Ul::new([0; 16]));

    let mut sub_descriptor_uids = descriptor.uuid_array(&SUB_DESCRIPTOR_UIDS).unwrap_or_default();
    for channel in channels {
        let mut label = Set::new(class_key, Uuid::new_v4());
        label.set_raw(MCA_CHANNEL_ID, (channel.channel_index + 1).to_be_bytes().to_vec());
        label.set_raw(MCA_LABEL_DICTIONARY_ID, channel.label_dictionary_id.as_bytes().to_vec());
        label.set_string_utf16be(MCA_TAG_SYMBOL, &channel.tag_symbol);

        sub_descriptor_uids.push(label.instance_uid);
        header_metadata.insert(label);
    }
    descriptor.set_uuid_array(SUB_DESCRIPTOR_UIDS, &sub_descriptor_uids);
}

fn encode_rational(value: (i32, i32)) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(&value.0.to_be_bytes());
    buf.extend_from_slice(&value.1.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_create_and_infer_roundtrip_for_cdci() {
        let dm = DataModel::standard();
        let props = DescriptorProperties { stored_width: 1920, stored_height: 1080, sample_rate: (25, 1), ..Default::default() };

        let set = create_file_descriptor(EssenceType::Mpeg2422P_Hl_1080i, &props, Flavour::Smpte, &dm);
        let inferred = infer_from_descriptor(&set, &dm);
        assert_eq!(inferred, EssenceType::Mpeg2422P_Hl_1080i);
    }

    #[test]
    fn verify_avid_image_end_offset_quirk() {
        let props = DescriptorProperties { image_end_offset: 0, image_alignment_offset: 256, ..Default::default() };
        assert_eq!(image_end_offset(&props, Flavour::Avid), 256);
        assert_eq!(image_end_offset(&props, Flavour::Smpte), 0);
    }

    #[test]
    fn verify_wave_sample_size() {
        let props = DescriptorProperties { channel_count: 2, quantization_bits: 16, ..Default::default() };
        assert_eq!(sample_size(EssenceType::WavePcm, &props), 4);
    }

    #[test]
    fn verify_append_mca_labels_links_one_subdescriptor_per_channel() {
        let dm = DataModel::standard();
        let mut header_metadata = HeaderMetadata::new();
        let props = DescriptorProperties { channel_count: 2, quantization_bits: 24, sample_rate: (48000, 1), ..Default::default() };
        let mut descriptor = create_file_descriptor(EssenceType::WavePcm, &props, Flavour::Smpte, &dm);

        let channels = vec![
            ChannelAssignment { channel_index: 0, label_dictionary_id: Uuid::from_bytes([1; 16]), tag_symbol: "CHAN_L".to_string() },
            ChannelAssignment { channel_index: 1, label_dictionary_id: Uuid::from_bytes([2; 16]), tag_symbol: "CHAN_R".to_string() },
        ];
        append_mca_labels(&mut descriptor, &mut header_metadata, &dm, &channels);

        let uids = descriptor.uuid_array(&SUB_DESCRIPTOR_UIDS).unwrap();
        assert_eq!(uids.len(), 2);

        let first = header_metadata.by_uid(&uids[0]).unwrap();
        assert_eq!(first.u32(&MCA_CHANNEL_ID), Some(1));
        assert_eq!(first.string_utf16be(&MCA_TAG_SYMBOL).as_deref(), Some("CHAN_L"));

        let second = header_metadata.by_uid(&uids[1]).unwrap();
        assert_eq!(second.u32(&MCA_CHANNEL_ID), Some(2));
        assert_eq!(second.string_utf16be(&MCA_TAG_SYMBOL).as_deref(), Some("CHAN_R"));
    }
}
