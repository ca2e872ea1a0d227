use std::io::{self, Read, Seek, SeekFrom, Write};

use super::store::RandomAccess;
use crate::error::{Error, Result};

/// Bounded, read-only stream over `[offset, offset + size)` of a store.
///
/// The stream keeps its own cursor and addresses the store by absolute
/// offset, so any number of ranges may be open over one store. It never
/// closes or truncates the store.
pub struct RangeStream<R: RandomAccess> {
    store: R,
    start: u64,
    end: u64,
    cursor: u64,
}

impl<R: RandomAccess> RangeStream<R> {
    pub fn new(store: R, offset: u64, size: u64) -> Result<Self> {
        let len = store.len()?;
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= len)
            .ok_or_else(|| {
                Error::out_of_range(format!(
                    "available size of store ({len}) < offset ({offset}) + size ({size})"
                ))
            })?;
        Ok(Self {
            store,
            start: offset,
            end,
            cursor: offset,
        })
    }

    /// Bytes left before the end of the range.
    pub fn remaining(&self) -> u64 {
        self.end - self.cursor
    }

    /// Position relative to the start of the range.
    pub fn position(&self) -> u64 {
        self.cursor - self.start
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    /// Reads the next byte, or `None` at the end of the range.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.cursor == self.end {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        if self.store.read_at(self.cursor, &mut byte)? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "store shrank below range",
            )));
        }
        self.cursor += 1;
        Ok(Some(byte[0]))
    }

    /// Reads up to `buf.len()` bytes, clipped to the range. Returns 0 at the end.
    pub fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = self.remaining().min(buf.len() as u64) as usize;
        if len == 0 {
            return Ok(0);
        }
        let n = self.store.read_at(self.cursor, &mut buf[..len])?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "store shrank below range",
            )));
        }
        self.cursor += n as u64;
        Ok(n)
    }

    /// Advances by up to `n` bytes and returns how far it moved.
    pub fn skip(&mut self, n: u64) -> u64 {
        let step = n.min(self.remaining());
        self.cursor += step;
        step
    }

    pub fn into_inner(self) -> R {
        self.store
    }
}

impl<R: RandomAccess> Read for RangeStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bulk(buf)?)
    }
}

impl<R: RandomAccess> Seek for RangeStream<R> {
    /// Seeks relative to the range; the target is clamped to its end.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => self.size().checked_add_signed(p),
            SeekFrom::Current(p) => self.position().checked_add_signed(p),
        };
        let Some(target) = target else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Seek before 0"));
        };
        self.cursor = self.start + target.min(self.size());
        Ok(self.position())
    }
}

/// Copies `[offset, offset + size)` of `store` into `sink`.
pub fn copy_range<R, W>(store: R, offset: u64, size: u64, sink: &mut W) -> Result<u64>
where
    R: RandomAccess,
    W: Write + ?Sized,
{
    let mut range = RangeStream::new(store, offset, size)?;
    Ok(io::copy(&mut range, sink)?)
}
