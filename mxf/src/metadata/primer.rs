// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The local-tag primer pack (§3.4, §4.3): a bidirectional mapping between the 2-byte local tags
//! that appear inside header-metadata sets and the 16-byte item ULs they stand for. A primer is
//! scoped to one partition's header metadata; the writer allocates dynamic tags deterministically
//! so the same item always gets the same tag within one file.

use std::collections::HashMap;

use mxf_core::errors::{invalid_klv, Result};
use mxf_core::io::{MediaSinkStream, MediaSourceStream, ReadBytes, WriteBytes};
use mxf_core::key::Ul;

/// The first dynamic tag handed out, decrementing thereafter (§4.3: "dynamic tags starting at
/// `0xFFFF` and decrementing, avoiding collisions").
const FIRST_DYNAMIC_TAG: u16 = 0xffff;

pub struct Primer {
    tag_to_key: HashMap<u16, Ul>,
    key_to_tag: HashMap<Ul, u16>,
    next_dynamic_tag: u16,
}

impl Primer {
    pub fn new() -> Self {
        Primer { tag_to_key: HashMap::new(), key_to_tag: HashMap::new(), next_dynamic_tag: FIRST_DYNAMIC_TAG }
    }

    pub fn resolve(&self, tag: u16) -> Option<Ul> {
        self.tag_to_key.get(&tag).copied()
    }

    fn bind(&mut self, tag: u16, key: Ul) {
        self.tag_to_key.insert(tag, key);
        self.key_to_tag.insert(key, tag);
    }

    /// Returns the local tag for `key`, allocating one if this is the first time it has been
    /// seen. `fixed_tag` is the standard tag from the data model, if the item has one; items with
    /// no fixed tag (vendor extensions, dynamically-defined properties) get the next dynamic tag,
    /// skipping any value already claimed by a fixed tag.
    pub fn tag_for(&mut self, key: Ul, fixed_tag: Option<u16>) -> u16 {
        if let Some(&tag) = self.key_to_tag.get(&key) {
            return tag;
        }

        let tag = match fixed_tag {
            Some(tag) => tag,
            None => {
                while self.tag_to_key.contains_key(&self.next_dynamic_tag) {
                    self.next_dynamic_tag -= 1;
                }
                let tag = self.next_dynamic_tag;
                self.next_dynamic_tag -= 1;
                tag
            }
        };

        self.bind(tag, key);
        tag
    }

    /// Reads a primer pack: a KLV batch header (count, item length 18 = 2-byte tag + 16-byte UL)
    /// followed by `count` `(tag, key)` pairs.
    pub fn read(src: &mut MediaSourceStream) -> Result<Primer> {
        let count = src.read_be_u32()?;
        let item_len = src.read_be_u32()?;

        if item_len != 18 {
            return invalid_klv("primer pack item length must be 18");
        }

        let mut primer = Primer::new();
        for _ in 0..count {
            let tag = src.read_be_u16()?;
            let key = Ul::new(src.read_uid()?);
            primer.bind(tag, key);
        }

        Ok(primer)
    }

    /// Writes a primer pack batch in ascending tag order, for reproducible output.
    pub fn write(&self, sink: &mut MediaSinkStream) -> Result<()> {
        let mut entries: Vec<(u16, Ul)> = self.tag_to_key.iter().map(|(&t, &k)| (t, k)).collect();
        entries.sort_by_key(|&(tag, _)| tag);

        sink.write_be_u32(entries.len() as u32)?;
        sink.write_be_u32(18)?;

        for (tag, key) in entries {
            sink.write_be_u16(tag)?;
            sink.write_uid(key.as_bytes())?;
        }

        Ok(())
    }
}

impl Default for Primer {
    fn default() -> Self {
        Primer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Ul {
        Ul::new([byte; 16])
    }

    #[test]
    fn verify_fixed_tag_reused() {
        let mut primer = Primer::new();
        let tag_a = primer.tag_for(key(1), Some(0x3c0a));
        let tag_b = primer.tag_for(key(1), Some(0x3c0a));
        assert_eq!(tag_a, tag_b);
        assert_eq!(tag_a, 0x3c0a);
    }

    #[test]
    fn verify_dynamic_tags_decrement_without_collision() {
        let mut primer = Primer::new();
        primer.bind(0xffff, key(9));

        let dyn_tag = primer.tag_for(key(2), None);
        assert_eq!(dyn_tag, 0xfffe);

        let dyn_tag2 = primer.tag_for(key(3), None);
        assert_eq!(dyn_tag2, 0xfffd);
    }

    #[test]
    fn verify_resolve_roundtrip() {
        let mut primer = Primer::new();
        let tag = primer.tag_for(key(7), None);
        assert_eq!(primer.resolve(tag), Some(key(7)));
        assert_eq!(primer.resolve(tag + 1), None);
    }
}
