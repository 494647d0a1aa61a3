// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codec writer helpers (§4.11, component C11): the per-essence-family state machines a writer
//! feeds coded frames through before they reach the content-package layer (C7). Each helper
//! inspects the bitstream it is handed — it does not transcode anything — to recover what the
//! index table (C5) and descriptor (C4) layers need but the caller may not have to hand: GOP
//! structure, temporal/key-frame offsets, sequence parameters, and (with the `shims` feature)
//! whether the stream conforms to a named delivery profile such as AS-10.
//!
//! Each essence family is gated behind its own feature flag so a build that only ever writes
//! uncompressed or PCM essence doesn't pull in bitstream parsing it will never use.

#[cfg(feature = "mpeg2lg")]
pub mod mpeg2lg;

#[cfg(feature = "avc-intra")]
pub mod avc_intra;

#[cfg(feature = "vc2")]
pub mod vc2;

#[cfg(feature = "j2c")]
pub mod j2c;

#[cfg(feature = "vc3")]
pub mod vc3;

#[cfg(feature = "prores")]
pub mod prores;

#[cfg(feature = "shims")]
pub mod shims;

/// Coded picture type within a GOP, as parsed from a bitstream's picture header. Data and sound
/// essence families have no equivalent and never construct this.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameType {
    I,
    P,
    B,
}

/// Scans `data` for 3-byte start-code prefixes (`00 00 01`) and returns each `(code_byte, offset)`
/// pair, where `offset` is the position of the byte immediately following the 4-byte start code.
/// Shared by every MPEG-style (MPEG-2, MPEG-4 part 2) bitstream helper; AVC-Intra and VC-2 have
/// their own framing and don't use this.
pub(crate) fn scan_start_codes(data: &[u8]) -> Vec<(u8, usize)> {
    let mut found = Vec::new();
    if data.len() < 4 {
        return found;
    }
    let mut i = 0;
    while i + 3 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x01 {
            found.push((data[i + 3], i + 4));
            i += 4;
        }
        else {
            i += 1;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_scan_start_codes_finds_every_marker() {
        let data = [0x00, 0x00, 0x01, 0xb3, 0x11, 0x22, 0x00, 0x00, 0x01, 0x00, 0x33];
        let found = scan_start_codes(&data);
        assert_eq!(found, vec![(0xb3, 4), (0x00, 9)]);
    }

    #[test]
    fn verify_scan_start_codes_ignores_short_input() {
        assert!(scan_start_codes(&[0x00, 0x00, 0x01]).is_empty());
    }
}
