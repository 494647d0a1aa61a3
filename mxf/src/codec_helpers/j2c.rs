// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JPEG 2000 (J2C) writer helper (§4.11, component C11): recovers the picture geometry a J2C
//! codestream's `SIZ` marker segment carries, so the descriptor layer (C4) can fill in stored
//! width/height and component depth without the caller having to supply them out of band.
//!
//! J2C frames carry no GOP structure — every frame is an independent intra-coded picture — so
//! unlike the long-GOP helpers this module has no running per-track state beyond what's needed to
//! catch a resolution or component-depth change mid-essence (§8: a descriptor's geometry must stay
//! constant for the life of a track).

use mxf_core::errors::{inconsistent, Result};

const SOC_MARKER: u16 = 0xff4f;
const SIZ_MARKER: u16 = 0xff51;

/// The subset of `SIZ` marker segment fields relevant to MXF wrapping.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodestreamGeometry {
    pub width: u32,
    pub height: u32,
    pub num_components: u16,
    /// Bit depth of the first component; J2C descriptors assume every component shares it.
    pub component_depth: u8,
    pub signed_components: bool,
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    match data.get(offset..offset + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => inconsistent("j2c codestream truncated while reading a 16-bit field"),
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    match data.get(offset..offset + 4) {
        Some(b) => Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        None => inconsistent("j2c codestream truncated while reading a 32-bit field"),
    }
}

/// Parses a J2C codestream's leading `SOC` and `SIZ` markers to recover picture geometry (§4.11).
/// `data` must start at the `SOC` marker, as every frame of frame-wrapped J2C essence does.
pub fn parse_siz(data: &[u8]) -> Result<CodestreamGeometry> {
    if read_u16(data, 0)? != SOC_MARKER {
        return inconsistent("j2c frame does not begin with an SOC marker");
    }
    if read_u16(data, 2)? != SIZ_MARKER {
        return inconsistent("j2c frame's second marker is not SIZ");
    }

    let length = read_u16(data, 4)? as usize;
    if length < 38 {
        return inconsistent("j2c SIZ marker segment is shorter than the fixed fields require");
    }

    // Layout after the 2-byte length: Rsiz(2) Xsiz(4) Ysiz(4) XOsiz(4) YOsiz(4) XTsiz(4) YTsiz(4)
    // XTOsiz(4) YTOsiz(4) Csiz(2), followed by 3 bytes per component (Ssiz, XRsiz, YRsiz).
    let siz_body = 6; // offset of Rsiz within `data`, i.e. 2 (markers done) + 2 (SIZ marker) + 2 (length)
    let x_siz = read_u32(data, siz_body + 2)?;
    let y_siz = read_u32(data, siz_body + 6)?;
    let xo_siz = read_u32(data, siz_body + 10)?;
    let yo_siz = read_u32(data, siz_body + 14)?;
    let num_components = read_u16(data, siz_body + 34)?;

    let components_offset = siz_body + 36;
    let expected_rem = 3 * num_components as usize;
    if components_offset + expected_rem > data.len() {
        return inconsistent("j2c SIZ marker segment is truncated for its declared component count");
    }
    if num_components == 0 {
        return inconsistent("j2c SIZ marker segment declares zero components");
    }

    let ssiz = data[components_offset];
    let signed_components = ssiz & 0x80 != 0;
    let component_depth = (ssiz & 0x7f) + 1;

    let width = x_siz.saturating_sub(xo_siz);
    let height = y_siz.saturating_sub(yo_siz);

    Ok(CodestreamGeometry { width, height, num_components, component_depth, signed_components })
}

/// Per-track J2C writer state: remembers the geometry of the first frame seen and flags any later
/// frame that doesn't match (§8).
#[derive(Default)]
pub struct J2cWriterHelper {
    geometry: Option<CodestreamGeometry>,
}

impl J2cWriterHelper {
    pub fn new() -> Self {
        J2cWriterHelper { geometry: None }
    }

    pub fn geometry(&self) -> Option<CodestreamGeometry> {
        self.geometry
    }

    /// Parses `frame`'s `SIZ` marker and checks it against the geometry established by the first
    /// frame on this track, if any.
    pub fn observe_frame(&mut self, frame: &[u8]) -> Result<CodestreamGeometry> {
        let geometry = parse_siz(frame)?;
        match self.geometry {
            None => {
                self.geometry = Some(geometry);
            }
            Some(established) if established != geometry => {
                return inconsistent("j2c frame geometry changed mid-track");
            }
            Some(_) => {}
        }
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(width: u32, height: u32, num_components: u16, bit_depth: u8) -> Vec<u8> {
        let mut data = SOC_MARKER.to_be_bytes().to_vec();
        data.extend_from_slice(&SIZ_MARKER.to_be_bytes());
        let length: u16 = 38 + 3 * num_components;
        data.extend_from_slice(&length.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes()); // Rsiz
        data.extend_from_slice(&width.to_be_bytes()); // Xsiz
        data.extend_from_slice(&height.to_be_bytes()); // Ysiz
        data.extend_from_slice(&0u32.to_be_bytes()); // XOsiz
        data.extend_from_slice(&0u32.to_be_bytes()); // YOsiz
        data.extend_from_slice(&width.to_be_bytes()); // XTsiz
        data.extend_from_slice(&height.to_be_bytes()); // YTsiz
        data.extend_from_slice(&0u32.to_be_bytes()); // XTOsiz
        data.extend_from_slice(&0u32.to_be_bytes()); // YTOsiz
        data.extend_from_slice(&num_components.to_be_bytes());
        for _ in 0..num_components {
            data.push(bit_depth - 1); // unsigned, Ssiz = bit_depth - 1
            data.push(1); // XRsiz
            data.push(1); // YRsiz
        }
        data
    }

    #[test]
    fn verify_parse_siz_recovers_geometry() {
        let frame = build_frame(1920, 1080, 3, 10);
        let geometry = parse_siz(&frame).unwrap();
        assert_eq!(geometry.width, 1920);
        assert_eq!(geometry.height, 1080);
        assert_eq!(geometry.num_components, 3);
        assert_eq!(geometry.component_depth, 10);
        assert!(!geometry.signed_components);
    }

    #[test]
    fn verify_parse_siz_rejects_wrong_first_marker() {
        let mut frame = build_frame(1920, 1080, 3, 10);
        frame[0] = 0x00;
        assert!(parse_siz(&frame).is_err());
    }

    #[test]
    fn verify_writer_helper_detects_geometry_change() {
        let mut helper = J2cWriterHelper::new();
        helper.observe_frame(&build_frame(1920, 1080, 3, 10)).unwrap();
        let result = helper.observe_frame(&build_frame(1280, 720, 3, 10));
        assert!(result.is_err());
    }

    #[test]
    fn verify_writer_helper_accepts_repeated_identical_geometry() {
        let mut helper = J2cWriterHelper::new();
        helper.observe_frame(&build_frame(1920, 1080, 3, 10)).unwrap();
        assert!(helper.observe_frame(&build_frame(1920, 1080, 3, 10)).is_ok());
    }
}
