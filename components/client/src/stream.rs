// Copyright 2026 hikari-fs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp::min;

use bytes::Bytes;
use hikari_storage::PinnedBlock;
use snafu::ensure;

use crate::err::{
    InvalidBufferRangeSnafu, NegativeSeekPositionSnafu, Result, SeekPastBufferLimitSnafu,
    StreamClosedSnafu,
};

/// One open read cursor over a single block.
///
/// The variant is chosen once, at open time, and never re-evaluated:
/// a zero-length block reads as [`Empty`], a cache-resident block as
/// [`Local`] (holding a pin on the cache entry for the stream's
/// lifetime), anything else as [`Remote`] over bytes the under-store
/// produced.
///
/// An instance is not internally synchronized; callers must not share
/// one stream across concurrent tasks. Streams of the same block may
/// interleave freely across callers.
///
/// [`Empty`]: BlockInStream::Empty
/// [`Local`]: BlockInStream::Local
/// [`Remote`]: BlockInStream::Remote
#[derive(Debug)]
pub enum BlockInStream {
    Empty(EmptyBlockInStream),
    Local(LocalBlockInStream),
    Remote(RemoteBlockInStream),
}

impl BlockInStream {
    /// Read the next byte, or `None` once the cursor sits at the end of
    /// the block.
    pub fn read_byte(&mut self) -> Result<Option<u8>> { self.cursor_mut().read_byte() }

    /// Fill as much of `buf` as the block still has, returning the count
    /// (0 at end of stream).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> { self.cursor_mut().read(buf) }

    /// Like [`read`], restricted to `max_len` bytes placed at
    /// `buf[offset..]`. The sub-range must lie within `buf`.
    ///
    /// [`read`]: BlockInStream::read
    pub fn read_range(&mut self, buf: &mut [u8], offset: usize, max_len: usize) -> Result<usize> {
        self.cursor_mut().read_range(buf, offset, max_len)
    }

    /// Reposition the cursor. `pos == length` is legal and makes the
    /// next read report end-of-stream; anything negative or past the
    /// block length is refused.
    pub fn seek(&mut self, pos: i64) -> Result<()> { self.cursor_mut().seek(pos) }

    /// Advance by at most `n` bytes, clamped to the bytes remaining,
    /// returning the distance actually moved. Non-positive `n` is a
    /// no-op.
    pub fn skip(&mut self, n: i64) -> Result<u64> { self.cursor_mut().skip(n) }

    /// Close the stream and release any pin it holds. Idempotent; every
    /// other operation fails after the first close.
    pub fn close(&mut self) {
        if let BlockInStream::Local(s) = self {
            s.pin.take();
        }
        self.cursor_mut().close();
    }

    pub fn length(&self) -> u64 { self.cursor().length() }

    pub fn position(&self) -> u64 { self.cursor().position }

    pub fn is_closed(&self) -> bool { self.cursor().closed }

    fn cursor(&self) -> &ByteCursor {
        match self {
            BlockInStream::Empty(s) => &s.cursor,
            BlockInStream::Local(s) => &s.cursor,
            BlockInStream::Remote(s) => &s.cursor,
        }
    }

    fn cursor_mut(&mut self) -> &mut ByteCursor {
        match self {
            BlockInStream::Empty(s) => &mut s.cursor,
            BlockInStream::Local(s) => &mut s.cursor,
            BlockInStream::Remote(s) => &mut s.cursor,
        }
    }
}

/// Stream over a zero-length block; every read is end-of-stream.
#[derive(Debug)]
pub struct EmptyBlockInStream {
    cursor: ByteCursor,
}

impl EmptyBlockInStream {
    pub(crate) fn new() -> Self {
        Self {
            cursor: ByteCursor::new(Bytes::new()),
        }
    }
}

/// Stream over a cache-resident block. Holds the entry pinned until
/// closed or dropped.
#[derive(Debug)]
pub struct LocalBlockInStream {
    pin: Option<PinnedBlock>,
    cursor: ByteCursor,
}

impl LocalBlockInStream {
    pub(crate) fn new(pin: PinnedBlock) -> Self {
        let data = pin.data().clone();
        Self {
            pin: Some(pin),
            cursor: ByteCursor::new(data),
        }
    }
}

/// Stream over bytes the under-store produced for a non-resident block.
#[derive(Debug)]
pub struct RemoteBlockInStream {
    cursor: ByteCursor,
}

impl RemoteBlockInStream {
    pub(crate) fn new(data: Bytes) -> Self {
        Self {
            cursor: ByteCursor::new(data),
        }
    }
}

#[derive(Debug)]
struct ByteCursor {
    data: Bytes,
    // next byte offset to read; 0 <= position <= data.len()
    position: u64,
    closed: bool,
}

impl ByteCursor {
    fn new(data: Bytes) -> Self {
        Self {
            data,
            position: 0,
            closed: false,
        }
    }

    fn length(&self) -> u64 { self.data.len() as u64 }

    fn remaining(&self) -> u64 { self.length() - self.position }

    fn ensure_open(&self) -> Result<()> {
        ensure!(!self.closed, StreamClosedSnafu);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.ensure_open()?;
        if self.position == self.length() {
            return Ok(None);
        }
        let byte = self.data[self.position as usize];
        self.position += 1;
        Ok(Some(byte))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let n = min(buf.len() as u64, self.remaining()) as usize;
        let start = self.position as usize;
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn read_range(&mut self, buf: &mut [u8], offset: usize, max_len: usize) -> Result<usize> {
        self.ensure_open()?;
        let valid = offset
            .checked_add(max_len)
            .map(|end| end <= buf.len())
            .unwrap_or(false);
        ensure!(
            valid,
            InvalidBufferRangeSnafu {
                offset,
                len: max_len,
                buf_len: buf.len(),
            }
        );
        self.read(&mut buf[offset..offset + max_len])
    }

    fn seek(&mut self, pos: i64) -> Result<()> {
        self.ensure_open()?;
        ensure!(pos >= 0, NegativeSeekPositionSnafu { pos });
        let pos = pos as u64;
        ensure!(
            pos <= self.length(),
            SeekPastBufferLimitSnafu {
                pos,
                limit: self.length(),
            }
        );
        self.position = pos;
        Ok(())
    }

    fn skip(&mut self, n: i64) -> Result<u64> {
        self.ensure_open()?;
        if n <= 0 {
            return Ok(0);
        }
        let n = min(n as u64, self.remaining());
        self.position += n;
        Ok(n)
    }

    fn close(&mut self) { self.closed = true; }
}

#[cfg(test)]
mod tests {
    use crate::err::Error;

    use super::*;

    fn increasing(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| i as u8).collect::<Vec<_>>())
    }

    fn remote(len: usize) -> BlockInStream {
        BlockInStream::Remote(RemoteBlockInStream::new(increasing(len)))
    }

    #[test]
    fn read_byte_drains_in_order() {
        let mut stream = remote(200);
        let mut drained = Vec::new();
        while let Some(byte) = stream.read_byte().unwrap() {
            drained.push(byte);
        }
        assert_eq!(Bytes::from(drained), increasing(200));
        // stays at end of stream
        assert_eq!(stream.read_byte().unwrap(), None);
        assert_eq!(stream.position(), 200);
    }

    #[test]
    fn bulk_read_is_bounded_by_remaining() {
        let mut stream = remote(100);
        let mut buf = vec![0u8; 64];
        assert_eq!(stream.read(&mut buf).unwrap(), 64);
        assert_eq!(&buf[..], &increasing(100)[..64]);
        assert_eq!(stream.read(&mut buf).unwrap(), 36);
        assert_eq!(&buf[..36], &increasing(100)[64..]);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn ranged_read_validates_the_sub_range() {
        let mut stream = remote(100);
        let mut buf = vec![0u8; 10];
        assert_eq!(stream.read_range(&mut buf, 2, 5).unwrap(), 5);
        assert_eq!(&buf[2..7], &increasing(100)[..5]);

        assert!(matches!(
            stream.read_range(&mut buf, 8, 5),
            Err(Error::InvalidBufferRange { .. })
        ));
        assert!(matches!(
            stream.read_range(&mut buf, usize::MAX, 2),
            Err(Error::InvalidBufferRange { .. })
        ));
        // a rejected range consumes nothing
        assert_eq!(stream.position(), 5);
    }

    #[test]
    fn seek_boundaries() {
        for k in [1usize, 33, 255] {
            let mut stream = remote(k);
            assert!(matches!(
                stream.seek(-1),
                Err(Error::NegativeSeekPosition { .. })
            ));

            let err = stream.seek(k as i64 + 1).unwrap_err();
            assert!(matches!(err, Error::SeekPastBufferLimit { .. }));
            assert!(err.to_string().contains("past buffer limit"));

            // seeking exactly to the end is legal
            stream.seek(k as i64).unwrap();
            assert_eq!(stream.read_byte().unwrap(), None);

            stream.seek(k as i64 / 2).unwrap();
            assert_eq!(stream.read_byte().unwrap(), Some((k / 2) as u8));
        }
    }

    #[test]
    fn skip_clamps_and_reports() {
        let mut stream = remote(100);
        assert_eq!(stream.skip(-5).unwrap(), 0);
        assert_eq!(stream.skip(0).unwrap(), 0);
        assert_eq!(stream.skip(40).unwrap(), 40);
        assert_eq!(stream.read_byte().unwrap(), Some(40));
        // only 59 bytes remain
        assert_eq!(stream.skip(1000).unwrap(), 59);
        assert_eq!(stream.read_byte().unwrap(), None);
    }

    #[test]
    fn two_skips_then_read() {
        let t = 33i64;
        let mut stream = remote(255);
        assert_eq!(stream.skip(t).unwrap(), t as u64);
        assert_eq!(stream.skip(t).unwrap(), t as u64);
        assert_eq!(stream.read_byte().unwrap(), Some((2 * t) as u8));

        // with a read between the skips, the cursor sits one byte further
        let mut stream = remote(255);
        assert_eq!(stream.skip(t).unwrap(), t as u64);
        assert_eq!(stream.read_byte().unwrap(), Some(t as u8));
        assert_eq!(stream.skip(t).unwrap(), t as u64);
        assert_eq!(stream.read_byte().unwrap(), Some((2 * t + 1) as u8));
    }

    #[test]
    fn close_is_idempotent_and_latches() {
        let mut stream = remote(10);
        stream.close();
        stream.close();
        assert!(stream.is_closed());
        let mut buf = vec![0u8; 4];
        assert!(matches!(stream.read_byte(), Err(Error::StreamClosed { .. })));
        assert!(matches!(
            stream.read(&mut buf),
            Err(Error::StreamClosed { .. })
        ));
        assert!(matches!(stream.seek(0), Err(Error::StreamClosed { .. })));
        assert!(matches!(stream.skip(1), Err(Error::StreamClosed { .. })));
    }

    #[test]
    fn empty_stream_is_always_at_end() {
        let mut stream = BlockInStream::Empty(EmptyBlockInStream::new());
        assert_eq!(stream.length(), 0);
        assert_eq!(stream.read_byte().unwrap(), None);
        let mut buf = vec![0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert_eq!(stream.skip(10).unwrap(), 0);
        stream.seek(0).unwrap();
        assert!(matches!(
            stream.seek(1),
            Err(Error::SeekPastBufferLimit { .. })
        ));
    }
}
