// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! KLV primitives (§4.1, component C1): read/write keys and BER lengths, emit KLV fill, and move
//! a cursor over a seekable byte source. Everything above this layer (partition, header-metadata,
//! index, content-package, essence reader) is built exclusively out of these operations; nothing
//! else in the crate touches a `MediaSourceStream`/`MediaSinkStream` directly at the byte level.
//!
//! Contract: all writes of a KLV that the partition layer will later rewrite in place use a fixed
//! `min_llen`, so the in-place update never shifts any following byte (§4.1).

use crate::errors::{MxfError, Result};
use crate::io::{MediaSinkStream, MediaSourceStream, ReadBytes, WriteBytes};
use crate::key::{encode_ber_length, Key, Length};

/// The Universal Label of the KLV fill item under the SMPTE-compliant flavour (§6).
pub const FILL_KEY_COMPLIANT: Key =
    Key::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00, 0x00]);

/// The legacy KLV fill key emitted under Avid flavour (§6, §9 "global mutable state" note: this
/// crate never mutates a process-wide key, the active variant is an explicit field on the
/// writer).
pub const FILL_KEY_LEGACY: Key =
    Key::new([0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00, 0x00]);

/// Reads a 16-octet key from `src`.
pub fn read_key(src: &mut MediaSourceStream) -> Result<Key> {
    Ok(Key::new(src.read_uid()?))
}

/// Reads a BER length. Short form is a single byte with the high bit clear; long form is
/// `0x80 | n` followed by `n` big-endian octets. Declared lengths wider than 8 octets, or that
/// decode beyond `u64`, are rejected as malformed (§4.1).
pub fn read_length(src: &mut MediaSourceStream) -> Result<Length> {
    let first = src.read_byte()?;

    if first & 0x80 == 0 {
        return Ok(Length { value: u64::from(first), encoded_len: 1 });
    }

    let octets = first & 0x7f;

    if octets == 0 || octets > 8 {
        return Err(MxfError::InvalidKlv("BER long-form length has an invalid octet count"));
    }

    let mut value = 0u64;
    for _ in 0..octets {
        value = (value << 8) | u64::from(src.read_byte()?);
    }

    Ok(Length { value, encoded_len: 1 + octets })
}

/// Reads a BER length known to have been written with a fixed minimum width (`min_llen`), as
/// every partition pack, index-table segment, and rewritable local-set length is (§4.1, §4.6).
/// This is functionally identical to [`read_length`]; it exists as a distinct call so the two
/// use sites (opportunistic parse vs. rewrite-contract parse) read differently at the call site
/// and so a future tightening (e.g. asserting `encoded_len == min_llen`) has one place to land.
pub fn read_fixed_length(src: &mut MediaSourceStream, min_llen: u8) -> Result<Length> {
    let length = read_length(src)?;

    if min_llen > 1 && length.encoded_len != min_llen {
        return Err(MxfError::InvalidKlv("fixed-width length did not use its declared width"));
    }

    Ok(length)
}

/// Writes a key followed by a BER length of at least `min_llen` octets.
pub fn write_key_and_length(sink: &mut MediaSinkStream, key: &Key, length: u64, min_llen: u8) -> Result<()> {
    sink.write_uid(key.as_bytes())?;

    let width = Length::width_for(length, min_llen);
    let mut buf = Vec::with_capacity(width as usize);
    encode_ber_length(&mut buf, length, width);
    sink.write_buf(&buf)
}

/// Writes a KLV fill item whose total on-disk length (key + length + value) is at least
/// `target_len`. The fill payload is padded so the *fill KLV itself* can later be rewritten in
/// place if `target_len` needs to grow, which is why the minimum requested size is
/// `mxfKey_extlen + min_llen` rather than zero (§4.6).
pub fn write_fill(sink: &mut MediaSinkStream, fill_key: &Key, target_len: u64, min_llen: u8) -> Result<()> {
    const KEY_LEN: u64 = 16;
    let overhead = KEY_LEN + u64::from(Length::width_for(0, min_llen));
    let value_len = target_len.saturating_sub(overhead);

    write_key_and_length(sink, fill_key, value_len, min_llen)?;
    write_zeros(sink, value_len)
}

fn write_zeros(sink: &mut MediaSinkStream, mut len: u64) -> Result<()> {
    const CHUNK: usize = 4096;
    let zeros = [0u8; CHUNK];

    while len > 0 {
        let n = len.min(CHUNK as u64) as usize;
        sink.write_buf(&zeros[..n])?;
        len -= n as u64;
    }

    Ok(())
}

/// Skips `len` bytes forward on a source stream without reading them into a caller buffer.
pub fn skip(src: &mut MediaSourceStream, len: u64) -> Result<()> {
    src.ignore_bytes(len)
}

/// Returns the current absolute byte offset of a source stream.
pub fn tell(src: &MediaSourceStream) -> u64 {
    src.pos()
}

/// Seeks a source stream to an absolute byte offset.
pub fn seek(src: &mut MediaSourceStream, pos: u64) -> Result<u64> {
    src.seek_absolute(pos)
}

/// Rounds `offset` up to the next multiple of `kag_size`, used by the partition engine to compute
/// KAG-aligned fill sizes (§3.2, §4.6, invariant 5 in §8). `kag_size` of 0 or 1 disables
/// alignment (every offset is already "aligned").
pub fn kag_align(offset: u64, kag_size: u32) -> u64 {
    if kag_size <= 1 {
        return offset;
    }

    let kag = u64::from(kag_size);
    let rem = offset % kag;

    if rem == 0 {
        offset
    }
    else {
        offset + (kag - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MediaSourceStream, MediaSourceStreamOptions};
    use std::io::Cursor;

    fn stream_of(bytes: Vec<u8>) -> MediaSourceStream {
        MediaSourceStream::new(Box::new(Cursor::new(bytes)), MediaSourceStreamOptions::default())
    }

    #[test]
    fn verify_read_short_form_length() {
        let mut src = stream_of(vec![0x2a]);
        let len = read_length(&mut src).unwrap();
        assert_eq!(len.value, 0x2a);
        assert_eq!(len.encoded_len, 1);
    }

    #[test]
    fn verify_read_long_form_length() {
        let mut src = stream_of(vec![0x84, 0x00, 0x01, 0x00, 0x00]);
        let len = read_length(&mut src).unwrap();
        assert_eq!(len.value, 0x1_0000);
        assert_eq!(len.encoded_len, 5);
    }

    #[test]
    fn verify_invalid_long_form_rejected() {
        let mut src = stream_of(vec![0x89]);
        assert!(matches!(read_length(&mut src), Err(MxfError::InvalidKlv(_))));
    }

    #[test]
    fn verify_kag_align() {
        assert_eq!(kag_align(0, 512), 0);
        assert_eq!(kag_align(1, 512), 512);
        assert_eq!(kag_align(512, 512), 512);
        assert_eq!(kag_align(513, 512), 1024);
        assert_eq!(kag_align(100, 0), 100);
    }
}
