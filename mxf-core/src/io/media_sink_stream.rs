// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{Seek, SeekFrom, Write};

use crate::errors::Result;

use super::{MediaSink, WriteBytes};

/// A `MediaSinkStream` is the common writer type used by the partition, index, and
/// content-package layers. It wraps any [`MediaSink`] (a file, or an in-memory cursor) behind one
/// concrete type and tracks the absolute byte position independently of the sink, since not every
/// `Seek::stream_position` implementation is cheap to call on every write.
///
/// Three-pass partition writing (§4.6) depends on this type's `seek_absolute`/`pos` pair: the
/// finaliser seeks back to offset 0 to rewrite the header partition pack and header metadata
/// after the footer has been written.
pub struct MediaSinkStream {
    inner: Box<dyn MediaSink>,
    pos: u64,
}

impl MediaSinkStream {
    pub fn new(sink: Box<dyn MediaSink>) -> Self {
        MediaSinkStream { inner: sink, pos: 0 }
    }

    /// Seeks the underlying sink to an absolute byte offset.
    pub fn seek_absolute(&mut self, pos: u64) -> Result<u64> {
        let new_pos = self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    /// Flushes any buffering performed by the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Consumes the stream, returning the underlying sink.
    pub fn into_inner(self) -> Box<dyn MediaSink> {
        self.inner
    }
}

impl WriteBytes for MediaSinkStream {
    #[inline(always)]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.inner.write_all(&[byte])?;
        self.pos += 1;
        Ok(())
    }

    #[inline(always)]
    fn write_buf(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// A sink that mirrors every write into a shared buffer so the test can inspect the final
    /// bytes after the `MediaSinkStream` (which owns the boxed sink) is done with it.
    struct SharedSink {
        cursor: Cursor<Vec<u8>>,
        mirror: Arc<Mutex<Vec<u8>>>,
    }

    impl std::io::Write for SharedSink {
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

    impl std::io::Seek for SharedSink {
        fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
            self.cursor.seek(pos)
        }
    }

    impl super::MediaSink for SharedSink {}

    #[test]
    fn verify_write_and_seek_back() {
        let mirror = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink { cursor: Cursor::new(Vec::new()), mirror: mirror.clone() };
        let mut stream = MediaSinkStream::new(Box::new(sink));

        stream.write_be_u32(0xdead_beef).unwrap();
        assert_eq!(stream.pos(), 4);

        stream.write_buf(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(stream.pos(), 9);

        stream.seek_absolute(0).unwrap();
        assert_eq!(stream.pos(), 0);
        stream.write_be_u32(0x1234_5678).unwrap();

        let bytes = mirror.lock().unwrap();
        assert_eq!(&bytes[0..4], &0x1234_5678u32.to_be_bytes());
        assert_eq!(&bytes[4..9], &[1, 2, 3, 4, 5]);
    }
}
