use super::store::{RandomAccess, StoreRef};
use std::io::{self, Read, Seek, SeekFrom};

/// Cursor over a shared store, so the ZIP central directory can be scanned
/// without taking the store away from the archive that keeps it.
pub struct StoreCursor {
    inner: StoreRef,
    position: u64,
}

impl StoreCursor {
    pub fn new(inner: StoreRef) -> Self {
        Self { inner, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Read for StoreCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read_at(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for StoreCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => self.inner.len()?.checked_add_signed(p),
            SeekFrom::Current(p) => self.position.checked_add_signed(p),
        };

        let Some(new_pos) = new_pos else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Seek before 0"));
        };

        self.position = new_pos;
        Ok(self.position)
    }
}
