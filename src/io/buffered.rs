//! Single-window write-back cache over a random-access store.
//!
//! [`BufferedStore`] keeps one block of `2^bits` bytes in memory, aligned to
//! the block size. Byte-at-a-time and small-chunk access inside that block
//! never touches the underlying store; leaving the block writes it back
//! (if modified) and loads the block containing the new position.
//!
//! The store tracks a logical end of data separately from the underlying
//! length, so bytes appended into the window are readable before they are
//! flushed. Writes may land anywhere in `[0, end]`; a write past the end
//! would leave a gap and is rejected.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::store::RandomAccess;
use crate::error::{Error, Result};

/// Default window of 4096 bytes.
pub const DEFAULT_WINDOW_BITS: u32 = 12;
pub const MIN_WINDOW_BITS: u32 = 1;
pub const MAX_WINDOW_BITS: u32 = 30;

/// Placement of the cached block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    /// Offset of the first cached byte; a multiple of the window size.
    start: u64,
    /// Number of valid bytes in the block.
    used: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Empty,
    Clean(Frame),
    Dirty(Frame),
}

impl Window {
    fn frame(self) -> Option<Frame> {
        match self {
            Window::Empty => None,
            Window::Clean(f) | Window::Dirty(f) => Some(f),
        }
    }
}

/// Write-back buffered view of a [`RandomAccess`] store.
///
/// Not thread-safe. Call [`close`](Self::close) to flush and sync; dropping
/// a store with unflushed data attempts a best-effort flush and logs on
/// failure.
pub struct BufferedStore<S: RandomAccess> {
    inner: S,
    bits: u32,
    buf: Box<[u8]>,
    window: Window,
    pos: u64,
    end: u64,
}

impl BufferedStore<File> {
    /// Open a file with the given window size.
    ///
    /// Read-only stores require the file to exist; writable stores create it.
    pub fn open(path: impl AsRef<Path>, writable: bool, bits: u32) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .create(writable)
            .truncate(false)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::NotFound(format!("No such file: {}", path.display())),
                _ => Error::Io(e),
            })?;
        Self::with_window_bits(file, bits)
    }
}

impl<S: RandomAccess> BufferedStore<S> {
    pub fn new(inner: S) -> Result<Self> {
        Self::with_window_bits(inner, DEFAULT_WINDOW_BITS)
    }

    pub fn with_window_bits(inner: S, bits: u32) -> Result<Self> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits) {
            return Err(Error::out_of_range(format!(
                "window bits {bits} not in {MIN_WINDOW_BITS}..={MAX_WINDOW_BITS}"
            )));
        }
        let end = inner.len()?;
        Ok(Self {
            inner,
            bits,
            buf: vec![0u8; 1 << bits].into_boxed_slice(),
            window: Window::Empty,
            pos: 0,
            end,
        })
    }

    pub fn window_size(&self) -> usize {
        1 << self.bits
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Length of the data: the larger of the logical end and the underlying length.
    pub fn length(&self) -> Result<u64> {
        Ok(self.end.max(self.inner.len()?))
    }

    /// Returns true if the cached window holds unflushed writes.
    pub fn is_dirty(&self) -> bool {
        matches!(self.window, Window::Dirty(_))
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Reads the byte at `pos` and leaves the cursor there.
    /// Returns `None` at or past the end of data.
    pub fn read_byte_at(&mut self, pos: u64) -> Result<Option<u8>> {
        if pos >= self.end {
            return Ok(None);
        }
        let frame = self.frame_for(pos)?;
        self.pos = pos;
        Ok(Some(self.buf[(pos - frame.start) as usize]))
    }

    /// Reads the byte under the cursor and advances past it.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let pos = self.pos;
        let byte = self.read_byte_at(pos)?;
        if byte.is_some() {
            self.pos = pos + 1;
        }
        Ok(byte)
    }

    /// Writes one byte at `pos`, which may be anywhere up to and including
    /// the append position. Leaves the cursor at `pos`.
    pub fn write_byte_at(&mut self, pos: u64, byte: u8) -> Result<()> {
        if pos > self.end {
            return Err(Error::out_of_range(format!(
                "write at {pos} past append position {}",
                self.end
            )));
        }
        let mut frame = self.frame_for(pos)?;
        let offset = (pos - frame.start) as usize;
        self.buf[offset] = byte;
        frame.used = frame.used.max(offset + 1);
        self.window = Window::Dirty(frame);
        self.end = self.end.max(pos + 1);
        self.pos = pos;
        Ok(())
    }

    /// Writes one byte under the cursor and advances past it.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        let pos = self.pos;
        self.write_byte_at(pos, byte)?;
        self.pos = pos + 1;
        Ok(())
    }

    /// Writes one byte at the append position.
    pub fn append(&mut self, byte: u8) -> Result<()> {
        self.write_byte_at(self.end, byte)
    }

    /// Moves the cursor, swapping the window if `pos` leaves it.
    pub fn seek_to(&mut self, pos: u64) -> Result<u64> {
        self.locate(pos)?;
        self.pos = pos;
        Ok(pos)
    }

    /// Reads into `out` from the cursor, clipped to the end of data.
    /// Returns 0 at end of data.
    pub fn read_bulk(&mut self, out: &mut [u8]) -> Result<usize> {
        let pos = self.pos;
        if pos >= self.end || out.is_empty() {
            return Ok(0);
        }
        let len = (self.end - pos).min(out.len() as u64) as usize;

        self.locate(pos)?;
        if let Some(frame) = self.window.frame()
            && self.fits(frame, pos, len)
        {
            let offset = (pos - frame.start) as usize;
            out[..len].copy_from_slice(&self.buf[offset..offset + len]);
            self.pos = pos + len as u64;
            return Ok(len);
        }

        tracing::debug!(pos, len, "unbuffered bulk read");
        self.flush_window()?;
        let n = self.inner.read_full_at(pos, &mut out[..len])?;
        self.pos = pos + n as u64;
        self.locate(self.pos)?;
        Ok(n)
    }

    /// Writes all of `data` at the cursor, extending the end of data if needed.
    pub fn write_bulk(&mut self, data: &[u8]) -> Result<usize> {
        let pos = self.pos;
        if data.is_empty() {
            return Ok(0);
        }
        if pos > self.end {
            return Err(Error::out_of_range(format!(
                "write at {pos} past append position {}",
                self.end
            )));
        }
        let len = data.len();

        self.locate(pos)?;
        match self.window.frame() {
            Some(mut frame) if self.fits(frame, pos, len) => {
                let offset = (pos - frame.start) as usize;
                self.buf[offset..offset + len].copy_from_slice(data);
                frame.used = frame.used.max(offset + len);
                self.window = Window::Dirty(frame);
                self.end = self.end.max(pos + len as u64);
                self.pos = pos + len as u64;
            }
            _ => {
                tracing::debug!(pos, len, "unbuffered bulk write");
                self.flush_window()?;
                // The write may overlap the cached block.
                self.window = Window::Empty;
                self.inner.write_at(pos, data)?;
                self.end = self.end.max(pos + len as u64);
                self.pos = pos + len as u64;
                self.locate(self.pos)?;
            }
        }
        Ok(len)
    }

    /// Truncates or extends the data to `len` bytes.
    pub fn set_length(&mut self, len: u64) -> Result<()> {
        self.flush_window()?;
        self.window = Window::Empty;
        self.inner.set_len(len)?;
        self.end = len;
        Ok(())
    }

    /// Writes the window back if it holds unflushed data.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_window()
    }

    /// Flushes pending writes and syncs the underlying store.
    pub fn close(mut self) -> Result<()> {
        self.flush_window()?;
        self.inner.sync()?;
        Ok(())
    }

    fn fits(&self, frame: Frame, pos: u64, len: usize) -> bool {
        pos >= frame.start
            && (pos - frame.start)
                .checked_add(len as u64)
                .is_some_and(|end| end <= self.window_size() as u64)
    }

    fn covers(&self, pos: u64) -> Option<Frame> {
        self.window.frame().filter(|f| self.fits(*f, pos, 1))
    }

    /// Frame holding `pos`, loading it if needed. Only valid for `pos <= end`.
    fn frame_for(&mut self, pos: u64) -> Result<Frame> {
        self.locate(pos)?;
        self.covers(pos)
            .ok_or_else(|| Error::InvalidState(format!("no window loaded for offset {pos}")))
    }

    fn locate(&mut self, pos: u64) -> Result<()> {
        if self.covers(pos).is_some() {
            return Ok(());
        }
        self.flush_window()?;
        if pos <= self.end {
            self.load_window(pos)
        } else {
            self.window = Window::Empty;
            Ok(())
        }
    }

    fn load_window(&mut self, pos: u64) -> Result<()> {
        let start = pos & !(self.window_size() as u64 - 1);
        let available = (self.end - start).min(self.window_size() as u64) as usize;
        let n = self.inner.read_full_at(start, &mut self.buf[..available])?;
        // Treat a short underlying store as a sparse, zero-filled one.
        self.buf[n..available].fill(0);
        tracing::trace!(start, used = available, "window loaded");
        self.window = Window::Clean(Frame {
            start,
            used: available,
        });
        Ok(())
    }

    fn flush_window(&mut self) -> Result<()> {
        if let Window::Dirty(frame) = self.window {
            tracing::trace!(start = frame.start, used = frame.used, "window flushed");
            self.inner
                .write_at(frame.start, &self.buf[..frame.used])?;
            self.window = Window::Clean(frame);
        }
        Ok(())
    }
}

impl<S: RandomAccess> Drop for BufferedStore<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush_window() {
            tracing::warn!(error = %e, "failed to flush buffered store on drop");
        }
    }
}

impl<S: RandomAccess> RandomAccess for BufferedStore<S> {
    fn len(&self) -> io::Result<u64> {
        Ok(self.length()?)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.seek_to(offset)?;
        Ok(self.read_bulk(buf)?)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        if offset > self.end {
            self.set_length(offset)?;
        }
        self.seek_to(offset)?;
        self.write_bulk(buf)?;
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        Ok(self.set_length(len)?)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flush_window()?;
        self.inner.sync()
    }
}

impl<S: RandomAccess> Read for BufferedStore<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bulk(buf)?)
    }
}

impl<S: RandomAccess> Write for BufferedStore<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bulk(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_window()?)
    }
}

impl<S: RandomAccess> Seek for BufferedStore<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => self.length()?.checked_add_signed(p),
            SeekFrom::Current(p) => self.pos.checked_add_signed(p),
        };
        let Some(target) = target else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Seek before 0"));
        };
        Ok(self.seek_to(target)?)
    }
}
