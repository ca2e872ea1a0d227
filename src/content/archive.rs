//! Shared ZIP archive handle.
//!
//! The central directory is scanned once on open and entry locations are
//! cached. Entry streams read compressed data straight from the shared
//! store through a [`RangeStream`], inflating on the fly, so no entry is
//! ever buffered whole. Closing the archive drops the store and index;
//! every handle derived from it then fails with `InvalidState`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::rc::Rc;

use flate2::read::DeflateDecoder;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::io::{RangeStream, StoreCursor, StoreRef, share};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Stored,
    Deflated,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct EntryLoc {
    data_offset: u64,
    compressed_size: u64,
    size: u64,
    compression: Compression,
}

struct ArchiveState {
    store: StoreRef,
    index: HashMap<String, EntryLoc>,
    /// Entry names in central-directory order.
    names: Vec<String>,
}

struct ArchiveInner {
    name: String,
    state: RefCell<Option<ArchiveState>>,
}

/// Reference-counted handle to an open ZIP archive.
///
/// Clones share the same reader and the same open/closed state.
#[derive(Clone)]
pub struct Archive {
    inner: Rc<ArchiveInner>,
}

impl Archive {
    /// Open a ZIP file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("No such file: {}", path.display())),
            _ => Error::Io(e),
        })?;
        Self::from_store(path.to_string_lossy(), share(file))
    }

    /// Open a ZIP archive held in memory.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        Self::from_store(name, share(data))
    }

    /// Open a ZIP archive over any shared store.
    pub fn from_store(name: impl Into<String>, store: StoreRef) -> Result<Self> {
        let name = name.into();
        let mut archive = ZipArchive::new(StoreCursor::new(store.clone()))?;

        let mut index = HashMap::new();
        let mut names = Vec::new();
        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let entry = file.name().to_string();
            index.insert(
                entry.clone(),
                EntryLoc {
                    data_offset: file.data_start(),
                    compressed_size: file.compressed_size(),
                    size: file.size(),
                    compression: match file.compression() {
                        zip::CompressionMethod::Stored => Compression::Stored,
                        zip::CompressionMethod::Deflated => Compression::Deflated,
                        _ => Compression::Other,
                    },
                },
            );
            names.push(entry);
        }
        tracing::debug!(archive = %name, entries = names.len(), "opened archive");

        Ok(Self {
            inner: Rc::new(ArchiveInner {
                name,
                state: RefCell::new(Some(ArchiveState {
                    store,
                    index,
                    names,
                })),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Entry names in archive order, directories excluded.
    pub fn entries(&self) -> Result<Vec<String>> {
        self.with_state(|state| Ok(state.names.clone()))
    }

    pub fn contains(&self, entry: &str) -> Result<bool> {
        self.with_state(|state| Ok(state.index.contains_key(entry)))
    }

    /// Uncompressed size of `entry`.
    pub fn entry_size(&self, entry: &str) -> Result<u64> {
        self.locate(entry).map(|(_, loc)| loc.size)
    }

    /// Release the reader. All handles derived from this archive become invalid.
    pub fn close(&self) {
        if self.inner.state.borrow_mut().take().is_some() {
            tracing::debug!(archive = %self.inner.name, "closed archive");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.borrow().is_none()
    }

    /// Returns true if both handles refer to the same open archive.
    pub fn ptr_eq(&self, other: &Archive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stream the uncompressed bytes of `entry`.
    pub(crate) fn open_entry(&self, entry: &str) -> Result<Box<dyn Read>> {
        let (store, loc) = self.locate(entry)?;
        let raw = RangeStream::new(store, loc.data_offset, loc.compressed_size)?;
        match loc.compression {
            Compression::Stored => Ok(Box::new(raw)),
            Compression::Deflated => Ok(Box::new(DeflateDecoder::new(raw))),
            Compression::Other => Err(Error::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Unsupported compression method for entry: {entry}"),
            ))),
        }
    }

    fn locate(&self, entry: &str) -> Result<(StoreRef, EntryLoc)> {
        self.with_state(|state| {
            let loc = state.index.get(entry).ok_or_else(|| {
                Error::NotFound(format!("No such entry in ZIP: {entry}"))
            })?;
            Ok((state.store.clone(), *loc))
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&ArchiveState) -> Result<T>) -> Result<T> {
        match self.inner.state.borrow().as_ref() {
            Some(state) => f(state),
            None => Err(Error::InvalidState(format!(
                "archive {} has been closed",
                self.inner.name
            ))),
        }
    }
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.inner.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}
