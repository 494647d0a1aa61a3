// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io;
use std::io::{IoSliceMut, Read, Seek, SeekFrom};
use std::ops::Sub;

use crate::errors::{MxfError, Result};

use super::{FiniteStream, MediaSource, ReadBytes};

/// `MediaSourceStreamOptions` specifies the buffering behaviour of a `MediaSourceStream`.
pub struct MediaSourceStreamOptions {
    /// The maximum buffer size. Must be a power of 2. Must be > 32kB.
    pub buffer_len: usize,
}

impl Default for MediaSourceStreamOptions {
    fn default() -> Self {
        MediaSourceStreamOptions { buffer_len: 64 * 1024 }
    }
}

/// A `MediaSourceStream` is the common reader type used throughout this crate family. It wraps
/// any [`MediaSource`] (a file, or an in-memory cursor) behind one concrete type, so that the
/// partition engine, index engine, and essence reader can all be written against a single byte
/// source abstraction regardless of what is backing the file on disk.
///
/// To minimize system call overhead, and to amortize that overhead over many bytes,
/// `MediaSourceStream` implements an exponentially growing read-ahead buffer. The read-ahead
/// length starts at 1kB and doubles as more sequential reads are performed, up to 32kB. Growing
/// the read-ahead length over time reduces the excess data buffered on consecutive `seek()`
/// calls, which matter here: partition walking and RIP-assisted seeks both jump around the file
/// far more than a typical linear demuxer would.
///
/// A configurable backtracking window is also kept so that a caller — most often the KLV key/BER
/// length reader probing for the next triplet — can rewind a short distance without an absolute
/// seek. A true `seek()` always invalidates the buffer and re-fills from the new position.
pub struct MediaSourceStream {
    inner: Box<dyn MediaSource>,
    ring: Box<[u8]>,
    ring_mask: usize,
    read_pos: usize,
    write_pos: usize,
    read_block_len: usize,
    abs_pos: u64,
    rel_pos: u64,
}

impl MediaSourceStream {
    const MIN_BLOCK_LEN: usize = 1024;
    const MAX_BLOCK_LEN: usize = 32 * 1024;

    pub fn new(source: Box<dyn MediaSource>, options: MediaSourceStreamOptions) -> Self {
        assert!(options.buffer_len.count_ones() == 1);
        assert!(options.buffer_len > Self::MAX_BLOCK_LEN);

        MediaSourceStream {
            inner: source,
            ring: vec![0; options.buffer_len].into_boxed_slice(),
            ring_mask: options.buffer_len - 1,
            read_pos: 0,
            write_pos: 0,
            read_block_len: Self::MIN_BLOCK_LEN,
            abs_pos: 0,
            rel_pos: 0,
        }
    }

    /// Returns the total length of the underlying source in bytes, if known.
    pub fn byte_len(&self) -> Option<u64> {
        self.inner.byte_len()
    }

    /// Seeks the underlying source to an absolute byte offset, invalidating the read-ahead
    /// buffer. Every partition jump, RIP-assisted random-access seek, and index-table-driven
    /// essence seek goes through this.
    pub fn seek_absolute(&mut self, pos: u64) -> Result<u64> {
        let new_pos = self.inner.seek(SeekFrom::Start(pos))?;
        self.reset(new_pos);
        Ok(new_pos)
    }

    /// Gets the number of bytes buffered but not yet read. This is the maximum number of bytes
    /// that can be seeked forwards within the buffer.
    pub fn unread_buffer_len(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        }
        else {
            self.write_pos + (self.ring.len() - self.read_pos)
        }
    }

    /// Gets the number of bytes buffered and already read. This is the maximum number of bytes
    /// that can be seeked backwards within the buffer.
    pub fn read_buffer_len(&self) -> usize {
        let unread_len = self.unread_buffer_len();
        cmp::min(self.ring.len(), self.rel_pos as usize) - unread_len
    }

    /// Seeks within the buffered data relative to the current position. The seekable range is
    /// `[-read_buffer_len(), unread_buffer_len()]`.
    pub fn seek_buffered_rel(&mut self, delta: isize) -> u64 {
        if delta < 0 {
            let abs_delta = cmp::min((-delta) as usize, self.read_buffer_len());
            self.read_pos = (self.read_pos + self.ring.len() - abs_delta) & self.ring_mask;
        }
        else if delta > 0 {
            let abs_delta = cmp::min(delta as usize, self.unread_buffer_len());
            self.read_pos = (self.read_pos + abs_delta) & self.ring_mask;
        }

        self.pos()
    }

    #[inline(always)]
    fn is_buffer_exhausted(&self) -> bool {
        self.read_pos == self.write_pos
    }

    fn fetch(&mut self) -> io::Result<()> {
        if self.is_buffer_exhausted() {
            let (vec1, vec0) = self.ring.split_at_mut(self.write_pos);

            let actual_read_len = if vec0.len() >= self.read_block_len {
                self.inner.read(&mut vec0[..self.read_block_len])?
            }
            else {
                let rem = self.read_block_len - vec0.len();
                let ring_vectors = &mut [IoSliceMut::new(vec0), IoSliceMut::new(&mut vec1[..rem])];
                self.inner.read_vectored(ring_vectors)?
            };

            self.write_pos = (self.write_pos + actual_read_len) & self.ring_mask;
            self.abs_pos += actual_read_len as u64;
            self.rel_pos += actual_read_len as u64;
            self.read_block_len = cmp::min(self.read_block_len << 1, Self::MAX_BLOCK_LEN);
        }

        Ok(())
    }

    fn fetch_or_eof(&mut self) -> Result<()> {
        self.fetch()?;

        if self.is_buffer_exhausted() {
            return Err(MxfError::UnexpectedEof);
        }

        Ok(())
    }

    #[inline(always)]
    fn consume(&mut self, len: usize) {
        self.read_pos = (self.read_pos + len) & self.ring_mask;
    }

    #[inline(always)]
    fn contiguous_buf(&self) -> &[u8] {
        if self.write_pos >= self.read_pos {
            &self.ring[self.read_pos..self.write_pos]
        }
        else {
            &self.ring[self.read_pos..]
        }
    }

    fn reset(&mut self, pos: u64) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.read_block_len = Self::MIN_BLOCK_LEN;
        self.abs_pos = pos;
        self.rel_pos = 0;
    }

    fn read_into(&mut self, mut buf: &mut [u8]) -> io::Result<usize> {
        let read_len = buf.len();

        while !buf.is_empty() {
            self.fetch()?;

            match self.contiguous_buf().read(buf) {
                Ok(0) => break,
                Ok(count) => {
                    buf = &mut buf[count..];
                    self.consume(count);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        Ok(read_len - buf.len())
    }
}

impl ReadBytes for MediaSourceStream {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        if self.is_buffer_exhausted() {
            self.fetch_or_eof()?;
        }

        let value = self.ring[self.read_pos];
        self.consume(1);

        Ok(value)
    }

    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        let mut bytes = [0u8; 2];
        let buf = self.contiguous_buf();

        if buf.len() >= 2 {
            bytes.copy_from_slice(&buf[..2]);
            self.consume(2);
        }
        else {
            for byte in bytes.iter_mut() {
                *byte = self.read_byte()?;
            }
        }

        Ok(bytes)
    }

    fn read_triple_bytes(&mut self) -> Result<[u8; 3]> {
        let mut bytes = [0u8; 3];
        let buf = self.contiguous_buf();

        if buf.len() >= 3 {
            bytes.copy_from_slice(&buf[..3]);
            self.consume(3);
        }
        else {
            for byte in bytes.iter_mut() {
                *byte = self.read_byte()?;
            }
        }

        Ok(bytes)
    }

    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        let mut bytes = [0u8; 4];
        let buf = self.contiguous_buf();

        if buf.len() >= 4 {
            bytes.copy_from_slice(&buf[..4]);
            self.consume(4);
        }
        else {
            for byte in bytes.iter_mut() {
                *byte = self.read_byte()?;
            }
        }

        Ok(bytes)
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = self.read_into(buf)?;

        if !buf.is_empty() && read == 0 {
            Err(MxfError::UnexpectedEof)
        }
        else {
            Ok(read)
        }
    }

    fn read_buf_exact(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read_into(buf) {
                Ok(0) => break,
                Ok(count) => buf = &mut buf[count..],
                Err(e) => return Err(e.into()),
            }
        }

        if !buf.is_empty() {
            Err(MxfError::UnexpectedEof)
        }
        else {
            Ok(())
        }
    }

    fn scan_bytes_aligned<'a>(
        &mut self,
        _pattern: &[u8],
        _align: usize,
        _buf: &'a mut [u8],
    ) -> Result<&'a mut [u8]> {
        unimplemented!("pattern scanning is not needed over a random-access MXF source")
    }

    fn ignore_bytes(&mut self, mut count: u64) -> Result<()> {
        let ring_len = self.ring.len() as u64;

        while count >= 2 * ring_len {
            let delta = count.clamp(0, i64::MAX as u64).sub(ring_len);
            self.seek_absolute(self.abs_pos - self.unread_buffer_len() as u64 + delta)?;
            count -= delta;
        }

        while count > 0 {
            self.fetch_or_eof()?;
            let discard_count = cmp::min(self.unread_buffer_len() as u64, count);
            self.consume(discard_count as usize);
            count -= discard_count;
        }

        Ok(())
    }

    fn pos(&self) -> u64 {
        self.abs_pos - self.unread_buffer_len() as u64
    }
}

impl FiniteStream for MediaSourceStream {
    fn byte_len(&self) -> u64 {
        self.inner.byte_len().unwrap_or(u64::MAX)
    }

    fn bytes_read(&self) -> u64 {
        self.pos()
    }

    fn bytes_available(&self) -> u64 {
        self.byte_len().saturating_sub(self.pos())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{MediaSourceStream, ReadBytes};

    fn generate_random_bytes(len: usize) -> Box<[u8]> {
        let mut lcg: u32 = 0xec57c4bf;
        let mut bytes = vec![0; len];

        for quad in bytes.chunks_mut(4) {
            lcg = lcg.wrapping_mul(1664525).wrapping_add(1013904223);
            for (src, dest) in quad.iter_mut().zip(&lcg.to_ne_bytes()) {
                *src = *dest;
            }
        }

        bytes.into_boxed_slice()
    }

    #[test]
    fn verify_mss_read() {
        let data = generate_random_bytes(5 * 96 * 1024);
        let ms = Cursor::new(data.clone());
        let mut mss = MediaSourceStream::new(Box::new(ms), Default::default());

        let mut buf = &data[..];

        for byte in &buf[..96 * 1024] {
            assert_eq!(*byte, mss.read_byte().unwrap());
        }

        mss.ignore_bytes(11).unwrap();
        buf = &buf[11 + (96 * 1024)..];

        for bytes in buf[..2 * 48 * 1024].chunks_exact(2) {
            assert_eq!(bytes, &mss.read_double_bytes().unwrap());
        }

        mss.ignore_bytes(33).unwrap();
        buf = &buf[33 + (2 * 48 * 1024)..];

        for bytes in buf[..3 * 32 * 1024].chunks_exact(3) {
            assert_eq!(bytes, &mss.read_triple_bytes().unwrap());
        }

        mss.ignore_bytes(55).unwrap();
        buf = &buf[55 + (3 * 32 * 1024)..];

        for bytes in buf[..4 * 24 * 1024].chunks_exact(4) {
            assert_eq!(bytes, &mss.read_quad_bytes().unwrap());
        }
    }

    #[test]
    fn verify_mss_seek_absolute() {
        let data = generate_random_bytes(1024 * 1024);
        let ms = Cursor::new(data.clone());
        let mut mss = MediaSourceStream::new(Box::new(ms), Default::default());

        mss.ignore_bytes(5122).unwrap();
        assert_eq!(5122, mss.pos());

        let expected = data[200_000];
        mss.seek_absolute(200_000).unwrap();
        assert_eq!(mss.pos(), 200_000);
        assert_eq!(mss.read_byte().unwrap(), expected);
    }

    #[test]
    fn verify_mss_seek_buffered() {
        let data = generate_random_bytes(1024 * 1024);
        let ms = Cursor::new(data.clone());
        let mut mss = MediaSourceStream::new(Box::new(ms), Default::default());

        assert_eq!(mss.read_buffer_len(), 0);
        assert_eq!(mss.unread_buffer_len(), 0);

        mss.ignore_bytes(5122).unwrap();

        assert_eq!(5122, mss.pos());
        assert_eq!(mss.read_buffer_len(), 5122);

        let upper = mss.read_byte().unwrap();

        assert_eq!(mss.seek_buffered_rel(-1000), 4123);
        assert_eq!(mss.pos(), 4123);
        assert_eq!(mss.read_buffer_len(), 4123);

        assert_eq!(mss.seek_buffered_rel(999), 5122);
        assert_eq!(mss.pos(), 5122);
        assert_eq!(mss.read_buffer_len(), 5122);

        assert_eq!(upper, mss.read_byte().unwrap());
    }
}
