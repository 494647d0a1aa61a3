// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `EssenceType` enumeration (§4.4, component C4): the engine's own classification of "what
//! kind of essence is this", one step more specific than the essence-container label alone (a
//! single EC label like MPEG-2 LG covers several profile/level/resolution combinations). Table-
//! driven inference lives in [`super::table`].

/// Picture, sound, or data essence, narrowed to the families and representative resolutions this
/// engine ships support for out of the box (§9 Open Question: bmx enumerates more variants than
/// are reproduced here; additional rows are additive and don't change C4's shape).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EssenceType {
    UncUyvy422,
    UncV210_10Bit,
    UncRgba,
    D10_30,
    D10_40,
    D10_50,
    Dv25,
    Dv50,
    Dv100_1080i,
    Dv100_720p,
    AvcIntra50_1080i,
    AvcIntra50_1080p,
    AvcIntra50_720p,
    AvcIntra100_1080i,
    AvcIntra100_1080p,
    AvcIntra100_720p,
    AvcBaseline,
    AvcHigh10Intra,
    Mpeg2Mp_Ml,
    Mpeg2422P_Hl_1080i,
    Mpeg2422P_Hl_1080p,
    Mpeg2422P_Hl_720p,
    Mpeg2LgSd,
    Vc2Hq1080i,
    Vc2Hq1080p,
    Vc3Dnxhd1080i,
    Vc3Dnxhd1080p,
    Vc3Dnxhr,
    ProRes422,
    ProRes422Hq,
    ProRes4444,
    Jpeg2000Cdci,
    Jpeg2000Rgba,
    WavePcm,
    Aes3Pcm,
    Alaw,
    AnciData,
    Unknown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameLayout {
    FullFrame,
    SeparateFields,
    SingleField,
    MixedFields,
    SegmentedFrame,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EssenceKind {
    Picture,
    Sound,
    Data,
}

impl EssenceType {
    pub fn kind(self) -> EssenceKind {
        use EssenceType::*;
        match self {
            WavePcm | Aes3Pcm | Alaw => EssenceKind::Sound,
            AnciData => EssenceKind::Data,
            _ => EssenceKind::Picture,
        }
    }

    pub fn is_frame_wrapped_by_default(self) -> bool {
        !matches!(self, EssenceType::WavePcm | EssenceType::Aes3Pcm | EssenceType::Alaw)
    }
}

/// Flavour modulates label choice, wrapping, fill key variant, and default colour coding
/// equations (§4.4).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flavour {
    Smpte,
    Avid,
    As11,
    As10,
}

impl Flavour {
    pub fn uses_legacy_fill_key(self) -> bool {
        matches!(self, Flavour::Avid)
    }

    pub fn prefers_clip_wrapped_sound(self) -> bool {
        matches!(self, Flavour::Avid)
    }
}
