// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A header-metadata `Set` (§3.4): a class UL plus an ordered sequence of items, each stored as
//! raw bytes against its item UL. Typed decoding happens lazily on access (§4.3 point 3) rather
//! than at parse time, so a consumer that only cares about three properties of a descriptor never
//! pays to decode the rest.

use mxf_core::key::Ul;
use uuid::Uuid;

use super::datamodel::INSTANCE_UID_ITEM;

#[derive(Clone, Debug)]
pub struct Set {
    pub key: Ul,
    pub instance_uid: Uuid,
    items: Vec<(Ul, Vec<u8>)>,
}

impl Set {
    pub fn new(key: Ul, instance_uid: Uuid) -> Self {
        let mut set = Set { key, instance_uid, items: Vec::new() };
        set.set_raw(INSTANCE_UID_ITEM, instance_uid.as_bytes().to_vec());
        set
    }

    pub fn set_raw(&mut self, item_key: Ul, value: Vec<u8>) {
        if let Some(slot) = self.items.iter_mut().find(|(k, _)| *k == item_key) {
            slot.1 = value;
        }
        else {
            self.items.push((item_key, value));
        }
    }

    pub fn raw(&self, item_key: &Ul) -> Option<&[u8]> {
        self.items.iter().find(|(k, _)| k.matches_ignoring_version(item_key)).map(|(_, v)| v.as_slice())
    }

    pub fn items(&self) -> impl Iterator<Item = &(Ul, Vec<u8>)> {
        self.items.iter()
    }

    pub fn u8(&self, item_key: &Ul) -> Option<u8> {
        self.raw(item_key).and_then(|v| v.first().copied())
    }

    pub fn u16(&self, item_key: &Ul) -> Option<u16> {
        self.raw(item_key).and_then(|v| v.try_into().ok()).map(u16::from_be_bytes)
    }

    pub fn u32(&self, item_key: &Ul) -> Option<u32> {
        self.raw(item_key).and_then(|v| v.try_into().ok()).map(u32::from_be_bytes)
    }

    pub fn u64(&self, item_key: &Ul) -> Option<u64> {
        self.raw(item_key).and_then(|v| v.try_into().ok()).map(u64::from_be_bytes)
    }

    pub fn i32(&self, item_key: &Ul) -> Option<i32> {
        self.raw(item_key).and_then(|v| v.try_into().ok()).map(i32::from_be_bytes)
    }

    pub fn i64(&self, item_key: &Ul) -> Option<i64> {
        self.raw(item_key).and_then(|v| v.try_into().ok()).map(i64::from_be_bytes)
    }

    /// Two big-endian `i32`s: numerator then denominator (the MXF `rational` type used for edit
    /// rates, sample rates, and aspect ratio, §3.2/§3.3).
    pub fn rational(&self, item_key: &Ul) -> Option<(i32, i32)> {
        let v = self.raw(item_key)?;
        if v.len() != 8 {
            return None;
        }
        let num = i32::from_be_bytes(v[0..4].try_into().ok()?);
        let den = i32::from_be_bytes(v[4..8].try_into().ok()?);
        Some((num, den))
    }

    /// A single 16-byte identity value: `InstanceUID`, a strong reference, or a weak reference are
    /// all stored this way (§3.4).
    pub fn uuid(&self, item_key: &Ul) -> Option<Uuid> {
        let v = self.raw(item_key)?;
        Uuid::from_slice(v).ok()
    }

    /// A batch of 16-byte identity values: a `StrongRefArray`/`WeakRefArray` item, stored as a
    /// 4-byte count, 4-byte element length (16), then `count` 16-byte values.
    pub fn uuid_array(&self, item_key: &Ul) -> Option<Vec<Uuid>> {
        let v = self.raw(item_key)?;
        if v.len() < 8 {
            return None;
        }
        let count = u32::from_be_bytes(v[0..4].try_into().ok()?) as usize;
        let elem_len = u32::from_be_bytes(v[4..8].try_into().ok()?) as usize;
        if elem_len != 16 || v.len() < 8 + count * 16 {
            return None;
        }
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let start = 8 + i * 16;
            out.push(Uuid::from_slice(&v[start..start + 16]).ok()?);
        }
        Some(out)
    }

    pub fn set_uuid_array(&mut self, item_key: Ul, values: &[Uuid]) {
        let mut buf = Vec::with_capacity(8 + values.len() * 16);
        buf.extend_from_slice(&(values.len() as u32).to_be_bytes());
        buf.extend_from_slice(&16u32.to_be_bytes());
        for v in values {
            buf.extend_from_slice(v.as_bytes());
        }
        self.set_raw(item_key, buf);
    }

    /// UTF-16BE string, as used for `PackageName`/`URLString`-style text properties.
    pub fn string_utf16be(&self, item_key: &Ul) -> Option<String> {
        let v = self.raw(item_key)?;
        if v.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = v.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
        String::from_utf16(&units).ok()
    }

    pub fn set_string_utf16be(&mut self, item_key: Ul, value: &str) {
        let mut buf = Vec::with_capacity(value.len() * 2);
        for unit in value.encode_utf16() {
            buf.extend_from_slice(&unit.to_be_bytes());
        }
        self.set_raw(item_key, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(byte: u8) -> Ul {
        Ul::new([byte; 16])
    }

    #[test]
    fn verify_raw_overwrite_keeps_single_slot() {
        let mut set = Set::new(item(1), Uuid::nil());
        set.set_raw(item(2), vec![1]);
        set.set_raw(item(2), vec![2, 3]);
        assert_eq!(set.raw(&item(2)), Some(&[2, 3][..]));
        assert_eq!(set.items().count(), 1);
    }

    #[test]
    fn verify_typed_accessors() {
        let mut set = Set::new(item(1), Uuid::nil());
        set.set_raw(item(3), 42u32.to_be_bytes().to_vec());
        assert_eq!(set.u32(&item(3)), Some(42));

        set.set_raw(item(4), [0, 0, 0x0e, 0xe8, 0, 0, 0, 1].to_vec());
        assert_eq!(set.rational(&item(4)), Some((3816, 1)));

        set.set_string_utf16be(item(5), "reel");
        assert_eq!(set.string_utf16be(&item(5)).as_deref(), Some("reel"));

        let ids = [Uuid::from_bytes([7; 16]), Uuid::from_bytes([8; 16])];
        set.set_uuid_array(item(6), &ids);
        assert_eq!(set.uuid_array(&item(6)), Some(ids.to_vec()));
    }
}
