// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table-driven `infer_from_descriptor` (§4.4): each row names an `EssenceType` and the minimal
//! set of descriptor properties that disambiguate it from its neighbours. The first row whose
//! predicates all match wins; rows are ordered most-specific first.

use super::essence_type::EssenceType;
use super::DescriptorProperties;

struct Row {
    essence_type: EssenceType,
    shape: DescriptorShape,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<(i32, i32)>,
    quantization_bits: Option<u32>,
}

macro_rules! row {
    ($ty:expr, $shape:expr, $width:expr, $height:expr, $rate:expr, $qbits:expr) => {
        Row { essence_type: $ty, shape: $shape, width: $width, height: $height, sample_rate: $rate, quantization_bits: $qbits }
    };
}

fn rows() -> Vec<Row> {
    use DescriptorShape::*;
    use EssenceType::*;

    vec![
        row!(UncUyvy422, Cdci, None, None, None, None),
        row!(UncRgba, Rgba, None, None, None, None),
        row!(Mpeg2422P_Hl_1080i, Mpeg, Some(1920), Some(1080), None, None),
        row!(Mpeg2422P_Hl_720p, Mpeg, Some(1280), Some(720), None, None),
        row!(Mpeg2LgSd, Mpeg, Some(720), Some(576), None, None),
        row!(AvcIntra100_1080i, AvcIntra, Some(1920), Some(1080), None, None),
        row!(AvcIntra100_720p, AvcIntra, Some(1280), Some(720), None, None),
        row!(AvcIntra50_1080i, AvcIntra, Some(1440), Some(1080), None, None),
        row!(Vc3Dnxhd1080i, Vc3, Some(1920), Some(1080), None, None),
        row!(Vc3Dnxhr, Vc3, None, None, None, None),
        row!(ProRes422, ProRes, None, None, None, None),
        row!(Vc2Hq1080i, Vc2, Some(1920), Some(1080), None, None),
        row!(Jpeg2000Cdci, J2c, None, None, None, None),
        row!(Dv25, Dv, Some(720), Some(576), None, None),
        row!(Dv100_1080i, Dv, Some(1920), Some(1080), None, None),
        row!(WavePcm, Wave, None, None, None, Some(16)),
        row!(Aes3Pcm, Aes3, None, None, None, None),
        row!(Alaw, ALaw, None, None, None, None),
    ]
}

/// Essence-container family of a descriptor, resolved from its essence-container UL before the
/// table is consulted (the table then only needs to disambiguate within one family).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorShape {
    Cdci,
    Rgba,
    Mpeg,
    AvcIntra,
    Vc3,
    ProRes,
    Vc2,
    J2c,
    Dv,
    Wave,
    Aes3,
    ALaw,
    Unknown,
}

pub fn infer(shape: DescriptorShape, props: &DescriptorProperties) -> EssenceType {
    for row in rows() {
        if row.shape != shape {
            continue;
        }
        if let Some(w) = row.width {
            if props.stored_width != w {
                continue;
            }
        }
        if let Some(h) = row.height {
            if props.stored_height != h {
                continue;
            }
        }
        if let Some(rate) = row.sample_rate {
            if props.sample_rate != rate {
                continue;
            }
        }
        if let Some(qbits) = row.quantization_bits {
            if props.quantization_bits != qbits {
                continue;
            }
        }
        return row.essence_type;
    }
    EssenceType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(width: u32, height: u32) -> DescriptorProperties {
        DescriptorProperties {
            stored_width: width,
            stored_height: height,
            frame_layout: super::super::essence_type::FrameLayout::FullFrame,
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

    #[test]
    fn verify_resolution_disambiguates_mpeg_variants() {
        assert_eq!(infer(DescriptorShape::Mpeg, &props(1920, 1080)), EssenceType::Mpeg2422P_Hl_1080i);
        assert_eq!(infer(DescriptorShape::Mpeg, &props(1280, 720)), EssenceType::Mpeg2422P_Hl_720p);
        assert_eq!(infer(DescriptorShape::Mpeg, &props(720, 576)), EssenceType::Mpeg2LgSd);
    }

    #[test]
    fn verify_unknown_shape_falls_through() {
        assert_eq!(infer(DescriptorShape::Unknown, &props(1920, 1080)), EssenceType::Unknown);
    }
}
