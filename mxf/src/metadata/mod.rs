// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The header-metadata model (§3.4, §4.3, component C3). A `HeaderMetadata` is an arena of
//! [`Set`]s plus a `instance_uid → index` map (§9 "Cycles and ownership"): strong references are
//! child identities recorded on the owning set and resolved through this same map, so the engine
//! never needs reference-counted cycles to represent the set graph.

pub mod datamodel;
pub mod filters;
pub mod packages;
pub mod primer;
pub mod set;

use std::collections::HashMap;

use mxf_core::errors::{invalid_klv, Result};
use mxf_core::io::{MediaSinkStream, MediaSourceStream, ReadBytes, WriteBytes};
use mxf_core::klv::{self, FILL_KEY_COMPLIANT, FILL_KEY_LEGACY};
use uuid::Uuid;

use self::datamodel::DataModel;
use self::filters::{FilterAction, ReadFilter};
use self::primer::Primer;
use self::set::Set;

pub struct HeaderMetadata {
    sets: Vec<Set>,
    index: HashMap<Uuid, usize>,
}

impl HeaderMetadata {
    pub fn new() -> Self {
        HeaderMetadata { sets: Vec::new(), index: HashMap::new() }
    }

    /// Adds a set to the arena and registers its `instance_uid`, returning the arena index.
    pub fn insert(&mut self, set: Set) -> usize {
        let idx = self.sets.len();
        self.index.insert(set.instance_uid, idx);
        self.sets.push(set);
        idx
    }

    pub fn get(&self, idx: usize) -> &Set {
        &self.sets[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Set {
        &mut self.sets[idx]
    }

    pub fn by_uid(&self, uid: &Uuid) -> Option<&Set> {
        self.index.get(uid).map(|&idx| &self.sets[idx])
    }

    pub fn index_of(&self, uid: &Uuid) -> Option<usize> {
        self.index.get(uid).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Set> {
        self.sets.iter()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Resolves a strong or weak reference item on `set` to its target, by identity lookup (§3.4:
    /// structurally both kinds are an `instance_uid` lookup; the distinction between them is
    /// ownership, which matters to the writer's traversal order, not to read-time resolution).
    pub fn resolve_ref(&self, set: &Set, item_key: &mxf_core::key::Ul) -> Option<&Set> {
        self.by_uid(&set.uuid(item_key)?)
    }

    pub fn resolve_ref_array(&self, set: &Set, item_key: &mxf_core::key::Ul) -> Vec<&Set> {
        set.uuid_array(item_key)
            .unwrap_or_default()
            .iter()
            .filter_map(|uid| self.by_uid(uid))
            .collect()
    }

    /// Reads every top-level KLV from the current position until `header_byte_count` bytes have
    /// been consumed, skipping fill and honouring `filter` (§4.3).
    pub fn read_all(
        src: &mut MediaSourceStream,
        header_byte_count: u64,
        primer: &Primer,
        filter: &mut dyn ReadFilter,
    ) -> Result<HeaderMetadata> {
        let end = src.pos() + header_byte_count;
        let mut md = HeaderMetadata::new();

        while src.pos() < end {
            let key = klv::read_key(src)?;
            let length = klv::read_length(src)?;

            if key.matches_ignoring_version(&FILL_KEY_COMPLIANT) || key.matches_ignoring_version(&FILL_KEY_LEGACY) {
                klv::skip(src, length.value)?;
                continue;
            }

            if filter.before_set_read(&key) == FilterAction::Skip {
                klv::skip(src, length.value)?;
                continue;
            }

            let mut set = read_set_body(src, key, length.value, primer)?;
            filter.after_set_read(&mut set);
            md.insert(set);
        }

        Ok(md)
    }

    /// Writes every set in arena order (§4.3 "Writing is the inverse"). Strong-owned sets should
    /// already appear in the arena in the order the writer wants them on disk (depth-first from
    /// `Preface`, by convention); this function does not reorder them.
    pub fn write_all(&self, sink: &mut MediaSinkStream, primer: &mut Primer, data_model: &DataModel, min_llen: u8) -> Result<()> {
        for set in &self.sets {
            write_set(sink, set, primer, data_model, min_llen)?;
        }
        Ok(())
    }
}

impl Default for HeaderMetadata {
    fn default() -> Self {
        HeaderMetadata::new()
    }
}

fn read_set_body(src: &mut MediaSourceStream, class_key: mxf_core::key::Ul, length: u64, primer: &Primer) -> Result<Set> {
    let end = src.pos() + length;
    let mut raw_items = Vec::new();
    let mut instance_uid = Uuid::nil();

    while src.pos() < end {
        let tag = src.read_be_u16()?;
        let item_len = src.read_be_u16()? as usize;
        let mut value = vec![0u8; item_len];
        src.read_buf_exact(&mut value)?;

        let item_key = match primer.resolve(tag) {
            Some(key) => key,
            None => return invalid_klv("local tag not present in primer pack"),
        };

        if item_key.matches_ignoring_version(&datamodel::INSTANCE_UID_ITEM) {
            if let Ok(uid) = Uuid::from_slice(&value) {
                instance_uid = uid;
            }
        }

        raw_items.push((item_key, value));
    }

    let mut set = Set::new(class_key, instance_uid);
    for (key, value) in raw_items {
        set.set_raw(key, value);
    }
    Ok(set)
}

fn write_set(sink: &mut MediaSinkStream, set: &Set, primer: &mut Primer, data_model: &DataModel, min_llen: u8) -> Result<()> {
    let mut body = Vec::new();

    for (item_key, value) in set.items() {
        let fixed_tag = data_model.find_item(item_key).and_then(|def| def.local_tag);
        let tag = primer.tag_for(*item_key, fixed_tag);
        body.extend_from_slice(&tag.to_be_bytes());
        body.extend_from_slice(&(value.len() as u16).to_be_bytes());
        body.extend_from_slice(value);
    }

    klv::write_key_and_length(sink, &set.key, body.len() as u64, min_llen)?;
    sink.write_buf(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxf_core::io::{MediaSink, MediaSourceStreamOptions};
    use mxf_core::key::Ul;
    use std::io::{Cursor, Seek, SeekFrom, Write};
    use std::sync::{Arc, Mutex};

    fn class(byte: u8) -> Ul {
        Ul::new([byte; 16])
    }

    /// Mirrors every write into a shared buffer so the test can inspect the bytes after the
    /// `MediaSinkStream` (which owns the boxed sink) is done with it.
    struct SharedSink {
        cursor: Cursor<Vec<u8>>,
        mirror: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let written = self.cursor.write(buf)?;
            let mut mirror = self.mirror.lock().unwrap();
            let pos = self.cursor.position() as usize - written;
            if mirror.len() < pos + written {
                mirror.resize(pos + written, 0);
            }
            mirror[pos..pos + written].copy_from_slice(&buf[..written]);
            Ok(written)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for SharedSink {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.cursor.seek(pos)
        }
    }

    impl MediaSink for SharedSink {}

    #[test]
    fn verify_set_roundtrip_through_primer_and_klv() {
        let data_model = DataModel::standard();
        let mut primer = Primer::new();

        let mut set = Set::new(class(0x11), Uuid::from_bytes([5; 16]));
        set.set_raw(class(0x22), vec![0, 0, 0, 7]);

        let mirror = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink { cursor: Cursor::new(Vec::new()), mirror: mirror.clone() };
        let mut sink = MediaSinkStream::new(Box::new(sink));
        write_set(&mut sink, &set, &mut primer, &data_model, 4).unwrap();

        let written = mirror.lock().unwrap().clone();
        let mut src = MediaSourceStream::new(Box::new(Cursor::new(written)), MediaSourceStreamOptions::default());
        let key = klv::read_key(&mut src).unwrap();
        assert_eq!(key, class(0x11));
        let length = klv::read_length(&mut src).unwrap();

        let read_back = read_set_body(&mut src, key, length.value, &primer).unwrap();
        assert_eq!(read_back.raw(&class(0x22)), Some(&[0, 0, 0, 7][..]));
        assert_eq!(read_back.instance_uid, Uuid::from_bytes([5; 16]));
    }
}
