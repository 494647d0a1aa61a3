// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Universal Labels (`Ul`) and the KLV `Key`/BER `Length` primitives shared by every layer above
//! (§3.1, §6). A `Ul` is a 16-octet SMPTE-registered identifier; in an MXF file it appears both as
//! a standalone label (essence-container UL, operational-pattern UL, picture/sound coding UL) and
//! as the first 16 octets of every KLV key.

use std::fmt;

/// A 16-octet SMPTE Universal Label, used both as a standalone label and as a KLV key.
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct Ul(pub [u8; 16]);

impl Ul {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Ul(bytes)
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Byte 7 of a SMPTE UL is the registry version. Labels that only differ in this byte
    /// identify the same semantic thing across registry revisions; the engine compares UL
    /// equality modulo this byte wherever "classify a label" predicates are used (§4.2).
    pub fn matches_ignoring_version(&self, other: &Ul) -> bool {
        self.0[..7] == other.0[..7] && self.0[8..] == other.0[8..]
    }

    /// Returns true if `self` is a prefix match of `other` over the first `len` octets. Used to
    /// recognise label families (e.g. all essence-container labels share a 13-octet prefix).
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.len() >= prefix.len() && self.0[..prefix.len()] == *prefix
    }
}

impl fmt::Debug for Ul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Ul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A KLV `Key` is just a `Ul` used to tag a set, essence element, or fill item. The type alias
/// exists so call sites read as what they mean (a key identifying a KLV triplet) rather than what
/// they are (16 bytes).
pub type Key = Ul;

/// BER-encoded length, as read from or about to be written to a KLV triplet (§3.1). The writer's
/// `min_llen` is a configuration knob of the partition engine (§4.1), not a property recovered
/// from a file; `Length` only models the decoded value plus how many octets the *encoded* form
/// that was read actually used, which the partition layer needs to compute fill sizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Length {
    /// The decoded value.
    pub value: u64,
    /// Number of octets the BER encoding occupied, including the leading length-of-length byte
    /// for long form.
    pub encoded_len: u8,
}

impl Length {
    /// The minimum number of octets a BER long-form length of `value` can be encoded in.
    pub fn min_long_form_width(value: u64) -> u8 {
        let bits = 64 - value.leading_zeros();
        let octets = bits.div_ceil(8).max(1);
        1 + octets as u8
    }

    /// Computes the width a BER length would occupy if written with at least `min_llen` octets
    /// (the partition engine's fixed-width writing contract, §4.1).
    pub fn width_for(value: u64, min_llen: u8) -> u8 {
        if min_llen <= 1 && value < 0x80 {
            return 1;
        }
        Self::min_long_form_width(value).max(min_llen)
    }
}

/// Appends the BER encoding of `length` to `buf`.
pub fn encode_ber_length(buf: &mut Vec<u8>, value: u64, width: u8) {
    if width == 1 {
        debug_assert!(value < 0x80);
        buf.push(value as u8);
        return;
    }

    let octets = width - 1;
    buf.push(0x80 | octets);

    let full = value.to_be_bytes();
    buf.extend_from_slice(&full[8 - octets as usize..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_ul_version_match() {
        let a = Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 1, 2, 3, 4, 5, 6, 7, 8]);
        let b = Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x0d, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(a.matches_ignoring_version(&b));

        let c = Ul::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 1, 2, 3, 4, 5, 6, 7, 9]);
        assert!(!a.matches_ignoring_version(&c));
    }

    #[test]
    fn verify_ber_length_width() {
        assert_eq!(Length::width_for(0x7f, 1), 1);
        assert_eq!(Length::width_for(0x80, 1), 2);
        assert_eq!(Length::width_for(0xff, 1), 2);
        assert_eq!(Length::width_for(0x1_0000, 1), 4);
        assert_eq!(Length::width_for(10, 4), 4);
    }

    #[test]
    fn verify_ber_length_encode() {
        let mut buf = Vec::new();
        encode_ber_length(&mut buf, 0x2a, 1);
        assert_eq!(buf, vec![0x2a]);

        buf.clear();
        encode_ber_length(&mut buf, 0x2a, 4);
        assert_eq!(buf, vec![0x83, 0x00, 0x00, 0x2a]);
    }
}
