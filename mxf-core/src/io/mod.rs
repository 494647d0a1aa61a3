// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements composable bit- and byte-level I/O.
//!
//! The following nomenclature is used to denote where the data being read is sourced from:
//!  * A `Stream` consumes any source implementing [`ReadBytes`] one byte at a time.
//!  * A `Reader` consumes a `&[u8]`.
//!
//! The sole exception is [`MediaSourceStream`], which consumes sources implementing
//! [`MediaSource`] (`std::io::Read + std::io::Seek`). Unlike a general purpose media demuxer, MXF
//! partition, index, and essence-chunk handling all depend on absolute random-access seeks, so
//! seekability is mandatory here rather than an optional capability queried at runtime.
//!
//! All `Reader`s and `Stream`s operating a byte at a time implement [`ReadBytes`] (or, on the
//! write side, [`WriteBytes`]). Bitstream analysers in the codec-writer-helper layer additionally
//! use [`ReadBitsLtr`] to pull header fields out of MPEG-2, AVC-Intra, and VC-2 bitstreams.

use std::mem;

use crate::errors::{MxfError, Result};

mod bit;
mod buf_reader;
mod media_sink_stream;
mod media_source_stream;
mod scoped_stream;

pub use bit::{BitReaderLtr, BitStreamLtr, FiniteBitStream, ReadBitsLtr};
pub use buf_reader::BufReader;
pub use media_sink_stream::MediaSinkStream;
pub use media_source_stream::{MediaSourceStream, MediaSourceStreamOptions};
pub use scoped_stream::ScopedStream;

#[inline(always)]
pub(crate) fn underrun_error<T>() -> Result<T> {
    Err(MxfError::UnexpectedEof)
}

/// A `MediaSource` is a composite trait of [`std::io::Read`] and [`std::io::Seek`]. Every reader
/// source must implement it.
pub trait MediaSource: std::io::Read + std::io::Seek + Send {
    /// Returns the length in bytes of the source, if cheaply available.
    fn byte_len(&self) -> Option<u64>;
}

impl MediaSource for std::fs::File {
    fn byte_len(&self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len())
    }
}

impl<T: AsRef<[u8]> + Send> MediaSource for std::io::Cursor<T> {
    fn byte_len(&self) -> Option<u64> {
        Some(self.get_ref().as_ref().len() as u64)
    }
}

/// A `MediaSink` is a composite trait of [`std::io::Write`] and [`std::io::Seek`]. Every writer
/// sink must implement it: the partition engine seeks backwards to rewrite partition packs and
/// header metadata at finalisation (§4.6).
pub trait MediaSink: std::io::Write + std::io::Seek + Send {}

impl MediaSink for std::fs::File {}
impl MediaSink for std::io::Cursor<Vec<u8>> {}

/// `ReadBytes` provides methods to read bytes and interpret them as little- or big-endian
/// unsigned integers. MXF is big-endian throughout; the `read_be_*` family is used almost
/// exclusively. The little-endian family exists for symmetry and is occasionally needed when a
/// descriptor helper mirrors fields out of a foreign little-endian structure.
pub trait ReadBytes {
    /// Reads a single byte from the stream and returns it or an error.
    fn read_byte(&mut self) -> Result<u8>;

    /// Reads two bytes from the stream and returns them in read-order or an error.
    fn read_double_bytes(&mut self) -> Result<[u8; 2]>;

    /// Reads three bytes from the stream and returns them in read-order or an error.
    fn read_triple_bytes(&mut self) -> Result<[u8; 3]>;

    /// Reads four bytes from the stream and returns them in read-order or an error.
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]>;

    /// Reads up-to the number of bytes required to fill `buf` or returns an error.
    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reads exactly the number of bytes required to fill the provided buffer or returns an
    /// error.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads bytes from a stream into a supplied buffer until a byte pattern is matched on an
    /// aligned byte boundary. Returns a mutable slice to the valid region of the provided buffer.
    fn scan_bytes_aligned<'a>(
        &mut self,
        pattern: &[u8],
        align: usize,
        buf: &'a mut [u8],
    ) -> Result<&'a mut [u8]>;

    /// Ignores the specified number of bytes from the stream or returns an error.
    fn ignore_bytes(&mut self, count: u64) -> Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;

    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8> {
        self.read_byte()
    }

    #[inline(always)]
    fn read_be_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_double_bytes()?))
    }

    #[inline(always)]
    fn read_be_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_double_bytes()?))
    }

    #[inline(always)]
    fn read_be_u24(&mut self) -> Result<u32> {
        let mut buf = [0u8; mem::size_of::<u32>()];
        buf[1..4].clone_from_slice(&self.read_triple_bytes()?);
        Ok(u32::from_be_bytes(buf))
    }

    #[inline(always)]
    fn read_be_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_quad_bytes()?))
    }

    #[inline(always)]
    fn read_be_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_quad_bytes()?))
    }

    #[inline(always)]
    fn read_be_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; mem::size_of::<u64>()];
        self.read_buf_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    #[inline(always)]
    fn read_be_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; mem::size_of::<i64>()];
        self.read_buf_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// Reads exactly 16 bytes, the width of every MXF Universal Label and `instance_uid`.
    #[inline(always)]
    fn read_uid(&mut self) -> Result<[u8; 16]> {
        let mut buf = [0u8; 16];
        self.read_buf_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads up-to the number of bytes requested, and returns a boxed slice of the data or an
    /// error.
    fn read_boxed_slice(&mut self, len: usize) -> Result<Box<[u8]>> {
        let mut buf = vec![0u8; len];
        let actual_len = self.read_buf(&mut buf)?;
        buf.truncate(actual_len);
        Ok(buf.into_boxed_slice())
    }

    /// Reads exactly the number of bytes requested, and returns a boxed slice of the data or an
    /// error.
    fn read_boxed_slice_exact(&mut self, len: usize) -> Result<Box<[u8]>> {
        let mut buf = vec![0u8; len];
        self.read_buf_exact(&mut buf)?;
        Ok(buf.into_boxed_slice())
    }
}

/// `WriteBytes` is the write-side counterpart of [`ReadBytes`]. MXF partition packs, index
/// segments, and header-metadata sets are always written big-endian.
pub trait WriteBytes {
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    fn write_buf(&mut self, buf: &[u8]) -> Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;

    #[inline(always)]
    fn write_be_u16(&mut self, value: u16) -> Result<()> {
        self.write_buf(&value.to_be_bytes())
    }

    #[inline(always)]
    fn write_be_u24(&mut self, value: u32) -> Result<()> {
        self.write_buf(&value.to_be_bytes()[1..4])
    }

    #[inline(always)]
    fn write_be_u32(&mut self, value: u32) -> Result<()> {
        self.write_buf(&value.to_be_bytes())
    }

    #[inline(always)]
    fn write_be_u64(&mut self, value: u64) -> Result<()> {
        self.write_buf(&value.to_be_bytes())
    }

    #[inline(always)]
    fn write_uid(&mut self, uid: &[u8; 16]) -> Result<()> {
        self.write_buf(uid)
    }
}

/// A `FiniteStream` is a stream that has a known length in bytes.
pub trait FiniteStream {
    /// Returns the length of the stream in bytes.
    fn byte_len(&self) -> u64;

    /// Returns the number of bytes that have been read.
    fn bytes_read(&self) -> u64;

    /// Returns the number of bytes available for reading.
    fn bytes_available(&self) -> u64;
}

impl<'b, R: ReadBytes> ReadBytes for &'b mut R {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        (**self).read_double_bytes()
    }

    #[inline(always)]
    fn read_triple_bytes(&mut self) -> Result<[u8; 3]> {
        (**self).read_triple_bytes()
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        (**self).read_quad_bytes()
    }

    #[inline(always)]
    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_buf(buf)
    }

    #[inline(always)]
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_buf_exact(buf)
    }

    #[inline(always)]
    fn scan_bytes_aligned<'a>(
        &mut self,
        pattern: &[u8],
        align: usize,
        buf: &'a mut [u8],
    ) -> Result<&'a mut [u8]> {
        (**self).scan_bytes_aligned(pattern, align, buf)
    }

    #[inline(always)]
    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        (**self).ignore_bytes(count)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        (**self).pos()
    }
}

impl<'b, F: FiniteStream> FiniteStream for &'b mut F {
    fn byte_len(&self) -> u64 {
        (**self).byte_len()
    }

    fn bytes_read(&self) -> u64 {
        (**self).bytes_read()
    }

    fn bytes_available(&self) -> u64 {
        (**self).bytes_available()
    }
}
