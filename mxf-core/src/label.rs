// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The label registry (§4.2, component C2): canonical Universal Labels for essence containers,
//! picture/sound coding, operational patterns, data-definitions, and a handful of classifier
//! predicates used to reduce a label to a small tagged enum. This module is pure data plus free
//! functions; it holds no state and performs no IO.
//!
//! Label equality for classification purposes compares all 16 octets except byte 7, the registry
//! version (§4.2, §3.1) — see [`Ul::matches_ignoring_version`].

use crate::key::Ul;

/// Builds the 16-byte SMPTE UL prefix `06.0E.2B.34` shared by every registered label.
macro_rules! ul {
    ($($b:expr),+ $(,)?) => {
        Ul::new([0x06, 0x0e, 0x2b, 0x34, $($b),+])
    };
}

// --- Operational patterns (§6, partition pack `kk`/`ss` octets live alongside these) ----------

pub const OP_ATOM: Ul = ul!(0x04, 0x01, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x10, 0x00, 0x00, 0x00);
pub const OP_1A: Ul = ul!(0x04, 0x01, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00);

// --- Data definitions (§3.4, reduced to `DataDefinition` below) -------------------------------

pub const DDEF_PICTURE: Ul = ul!(0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00);
pub const DDEF_PICTURE_LEGACY: Ul = ul!(0x01, 0x01, 0x01, 0x02, 0x01, 0x01, 0x03, 0x01, 0x00, 0x00, 0x00, 0x00);
pub const DDEF_SOUND: Ul = ul!(0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x01, 0x02, 0x00, 0x00, 0x00);
pub const DDEF_SOUND_LEGACY: Ul = ul!(0x01, 0x01, 0x01, 0x02, 0x01, 0x01, 0x03, 0x02, 0x00, 0x00, 0x00, 0x00);
pub const DDEF_TIMECODE: Ul = ul!(0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x01, 0x03, 0x00, 0x00, 0x00);
pub const DDEF_DATA: Ul = ul!(0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x01, 0x04, 0x00, 0x00, 0x00);
pub const DDEF_DM: Ul = ul!(0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x01, 0x05, 0x00, 0x00, 0x00);

/// Reduces the many data-definition labels (including legacy variants) to a small tagged enum
/// (§4.2 `mxf_get_ddef_enum`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataDefinition {
    Picture,
    Sound,
    Timecode,
    Data,
    DescriptiveMetadata,
    Unknown,
}

pub fn mxf_get_ddef_enum(label: &Ul) -> DataDefinition {
    if label.matches_ignoring_version(&DDEF_PICTURE) || label.matches_ignoring_version(&DDEF_PICTURE_LEGACY) {
        DataDefinition::Picture
    }
    else if label.matches_ignoring_version(&DDEF_SOUND) || label.matches_ignoring_version(&DDEF_SOUND_LEGACY) {
        DataDefinition::Sound
    }
    else if label.matches_ignoring_version(&DDEF_TIMECODE) {
        DataDefinition::Timecode
    }
    else if label.matches_ignoring_version(&DDEF_DATA) {
        DataDefinition::Data
    }
    else if label.matches_ignoring_version(&DDEF_DM) {
        DataDefinition::DescriptiveMetadata
    }
    else {
        DataDefinition::Unknown
    }
}

// --- Essence container labels (§4.2, §4.4) -----------------------------------------------------
//
// Every essence-container label shares the 13-octet prefix below; byte 13 onward distinguishes
// the wrapping (frame/clip) and the essence kind.

const EC_PREFIX: [u8; 9] = [0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02];

pub const EC_GENERIC_CONTAINER_PREFIX: Ul =
    ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x00, 0x00, 0x00);

pub const EC_UNC_SD: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x01, 0x01, 0x00);
pub const EC_MPEG2_LG: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x04, 0x01, 0x00);
pub const EC_DV: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x02, 0x01, 0x00);
pub const EC_AVC_INTRA: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x11, 0x01, 0x00);
pub const EC_AVC: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x16, 0x01, 0x00);
pub const EC_VC3_DNXHD: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x05, 0x01, 0x00);
pub const EC_PRORES: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x1c, 0x01, 0x00);
pub const EC_VC2: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x1b, 0x01, 0x00);
pub const EC_JPEG2000: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x0c, 0x01, 0x00);
pub const EC_BWF_PCM: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x06, 0x01, 0x00);
pub const EC_AES3: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x01, 0x02, 0x00);
pub const EC_ALAW: Ul = ul!(0x01, 0x02, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x1d, 0x01, 0x00);

pub fn is_generic_container_label(label: &Ul) -> bool {
    label.0[..9] == EC_PREFIX
}

pub fn is_mpeg_video_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_MPEG2_LG)
}

pub fn is_avc_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_AVC_INTRA) || label.matches_ignoring_version(&EC_AVC)
}

pub fn is_jpeg2000_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_JPEG2000)
}

pub fn is_vc2_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_VC2)
}

pub fn is_vc3_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_VC3_DNXHD)
}

pub fn is_prores_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_PRORES)
}

pub fn is_dv_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_DV)
}

pub fn is_pcm_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_BWF_PCM)
}

pub fn is_aes3_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_AES3)
}

pub fn is_alaw_ec(label: &Ul) -> bool {
    label.matches_ignoring_version(&EC_ALAW)
}

// --- Partition pack / primer / index-table-segment keys (§6) -----------------------------------

/// Builds a partition pack key `06.0E.2B.34.02.05.01.vv.0D.01.02.01.01.kk.ss.00` for the given
/// kind (`kk`) and status (`ss`) octets, at registry version `vv`.
pub const fn partition_pack_key(vv: u8, kk: u8, ss: u8) -> Ul {
    Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01, vv, 0x0d, 0x01, 0x02, 0x01, 0x01, kk, ss, 0x00])
}

pub const PRIMER_PACK_KEY: Ul = ul!(0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x05, 0x01, 0x00);

pub const INDEX_TABLE_SEGMENT_KEY: Ul =
    ul!(0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01, 0x00);

pub const RANDOM_INDEX_PACK_KEY: Ul =
    ul!(0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x11, 0x01, 0x00);

// --- System item (§3.5, §4.7, §6 content-package manager) --------------------------------------

/// SDTI-CP System Metadata Pack key, the first KLV of a frame-wrapped content package.
pub const SDTI_CP_SYSTEM_PACK_KEY: Ul =
    ul!(0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x04, 0x01, 0x01, 0x00);

/// Package Metadata Set key with a zero element count, written empty after the system pack.
pub const EMPTY_PACKAGE_METADATA_SET_KEY: Ul =
    ul!(0x02, 0x43, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x04, 0x01, 0x02, 0x00);

/// "Multiple wrappings" essence container label, used when a content package interleaves more
/// than one essence element under a single generic container (§6).
pub const EC_MULTIPLE_WRAPPINGS: Ul =
    ul!(0x04, 0x01, 0x01, 0x03, 0x0d, 0x01, 0x03, 0x01, 0x02, 0x7f, 0x01, 0x00);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_ddef_classification() {
        assert_eq!(mxf_get_ddef_enum(&DDEF_PICTURE), DataDefinition::Picture);
        assert_eq!(mxf_get_ddef_enum(&DDEF_SOUND_LEGACY), DataDefinition::Sound);
        assert_eq!(mxf_get_ddef_enum(&DDEF_TIMECODE), DataDefinition::Timecode);

        let unknown = Ul::new([0xff; 16]);
        assert_eq!(mxf_get_ddef_enum(&unknown), DataDefinition::Unknown);
    }

    #[test]
    fn verify_essence_container_classification() {
        assert!(is_generic_container_label(&EC_MPEG2_LG));
        assert!(is_mpeg_video_ec(&EC_MPEG2_LG));
        assert!(!is_mpeg_video_ec(&EC_DV));
        assert!(is_avc_ec(&EC_AVC_INTRA));
        assert!(is_avc_ec(&EC_AVC));
        assert!(is_pcm_ec(&EC_BWF_PCM));
        assert!(!is_pcm_ec(&EC_AES3));
    }

    #[test]
    fn verify_partition_pack_key_shape() {
        let header_closed_complete = partition_pack_key(1, 0x02, 0x04);
        assert_eq!(header_closed_complete.0[12], 0x01);
        assert_eq!(header_closed_complete.0[13], 0x02);
        assert_eq!(header_closed_complete.0[14], 0x04);
    }
}
