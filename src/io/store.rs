use std::cell::RefCell;
use std::fs::File;
use std::io;
#[cfg(all(not(unix), not(windows)))]
use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;

/// A random-access byte store addressed by absolute offset.
///
/// Unlike `Read + Seek`, every call names its own offset, so several
/// readers can share one store without fighting over a cursor. Stores are
/// single-threaded; wrap them in [`StoreRef`] to share.
pub trait RandomAccess {
    /// Current length of the store in bytes.
    fn len(&self) -> io::Result<u64>;

    /// Returns true if the store holds no bytes.
    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads up to `buf.len()` bytes starting at `offset`.
    /// Returns the number of bytes read; 0 means `offset` is at or past the end.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `buf` starting at `offset`, growing the store if needed.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Truncates or zero-extends the store to `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Pushes buffered data down to durable storage.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Fills `buf` from `offset`, stopping early only at end of data.
    fn read_full_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_at(offset + filled as u64, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Shared, single-threaded handle to a store.
///
/// Range handles and archive entries hold one of these so that many
/// descriptors can address the same underlying bytes.
pub type StoreRef = Rc<RefCell<dyn RandomAccess>>;

/// Wraps a store into a [`StoreRef`].
pub fn share<S: RandomAccess + 'static>(store: S) -> StoreRef {
    Rc::new(RefCell::new(store))
}

// --- Implementation: Local File ---

#[cfg(unix)]
impl RandomAccess for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt; // Enables pread
        FileExt::read_at(self, buf, offset)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.write_all_at(buf, offset)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

#[cfg(windows)]
impl RandomAccess for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.seek_read(buf, offset)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut written = 0;
        while written < buf.len() {
            let n = self.seek_write(&buf[written..], offset + written as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            written += n;
        }
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

#[cfg(all(not(unix), not(windows)))]
impl RandomAccess for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.read(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

// --- Implementation: In-Memory ---

impl RandomAccess for Vec<u8> {
    fn len(&self) -> io::Result<u64> {
        Ok(Vec::len(self) as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let len = Vec::len(self) as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(Vec::len(self) - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds memory"))?;
        let end = start + buf.len();
        if end > Vec::len(self) {
            self.resize(end, 0);
        }
        self[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds memory"))?;
        self.resize(len, 0);
        Ok(())
    }
}

// --- Forwarding ---

impl<T: RandomAccess + ?Sized> RandomAccess for &mut T {
    fn len(&self) -> io::Result<u64> {
        (**self).len()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

impl<T: RandomAccess + ?Sized> RandomAccess for Rc<RefCell<T>> {
    fn len(&self) -> io::Result<u64> {
        self.borrow().len()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.borrow_mut().read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.borrow_mut().write_at(offset, buf)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.borrow_mut().set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.borrow_mut().sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_at() {
        let mut store = b"hello world".to_vec();
        let mut buf = [0u8; 5];
        let read = RandomAccess::read_at(&mut store, 6, &mut buf).unwrap();
        assert_eq!(read, 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_memory_read_past_end() {
        let mut store = b"abc".to_vec();
        let mut buf = [0u8; 8];
        assert_eq!(RandomAccess::read_at(&mut store, 1, &mut buf).unwrap(), 2);
        assert_eq!(RandomAccess::read_at(&mut store, 3, &mut buf).unwrap(), 0);
        assert_eq!(RandomAccess::read_at(&mut store, 99, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_write_zero_fills_gap() {
        let mut store = b"ab".to_vec();
        store.write_at(4, b"xy").unwrap();
        assert_eq!(store, b"ab\0\0xy");
        RandomAccess::set_len(&mut store, 3).unwrap();
        assert_eq!(store, b"ab\0");
    }

    #[test]
    fn test_file_store() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_at(0, b"0123456789").unwrap();
        assert_eq!(RandomAccess::len(&file).unwrap(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(file.read_full_at(3, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"3456");
        assert_eq!(file.read_full_at(8, &mut buf).unwrap(), 2);

        RandomAccess::set_len(&mut file, 4).unwrap();
        assert_eq!(RandomAccess::len(&file).unwrap(), 4);
    }

    #[test]
    fn test_shared_store_sees_writes() {
        let shared = share(b"aaaa".to_vec());
        let mut other = shared.clone();
        other.write_at(1, b"bb").unwrap();

        let mut buf = [0u8; 4];
        shared.borrow_mut().read_full_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abba");
    }
}
