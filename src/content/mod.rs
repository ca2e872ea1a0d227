//! Content handles: one addressable byte source, whatever its origin.
//!
//! A [`ContentHandle`] pairs a name and an optional declared MIME type with
//! one of five [`Source`] kinds. Handles are validated when they are built
//! and are cheap to clone; they own no I/O resources beyond shared
//! references to an [`Archive`] or a [`StoreRef`].

mod archive;

pub use archive::Archive;

use std::cell::OnceCell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{Error, Result};
use crate::io::{RandomAccess, RangeStream, StoreRef, copy_range};
use crate::paths;

/// A fresh read cursor over a handle's content.
pub type ByteStream = Box<dyn Read>;

/// Name given to in-memory placeholder content.
pub const EMPTY_NAME: &str = "_empty_";

const PREALLOC_LIMIT: u64 = 1 << 20;

/// Where a handle's bytes live.
#[derive(Clone)]
pub enum Source {
    /// A regular file on disk.
    File(PathBuf),
    /// A named entry inside a ZIP archive.
    ArchiveEntry { archive: Archive, entry: String },
    /// A contiguous span of a larger store.
    Range {
        store: StoreRef,
        offset: u64,
        size: u64,
    },
    /// A resource fetched over HTTP(S).
    Remote(Url),
    /// Bytes held in memory.
    Memory(Rc<[u8]>),
}

impl Source {
    fn scheme(&self) -> &'static str {
        match self {
            Source::File(_) => "file",
            Source::ArchiveEntry { .. } => "zip",
            Source::Range { .. } => "block",
            Source::Remote(_) => "remote",
            Source::Memory(_) => "bytes",
        }
    }
}

/// Uniform, immutable reference to a byte source.
#[derive(Clone)]
pub struct ContentHandle {
    name: String,
    declared_mime: Option<String>,
    source: Source,
    mime: OnceCell<String>,
}

impl ContentHandle {
    fn with_source(name: String, mime: Option<&str>, source: Source) -> Self {
        Self {
            name,
            declared_mime: mime.map(str::to_string),
            source,
            mime: OnceCell::new(),
        }
    }

    /// Handle over a regular file. Fails with `NotFound` if `path` is
    /// missing or is a directory.
    pub fn file(path: impl AsRef<Path>, mime: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("No such file: {}", path.display())),
            _ => Error::Io(e),
        })?;
        if meta.is_dir() {
            return Err(Error::NotFound(format!(
                "Require file but found directory: {}",
                path.display()
            )));
        }
        Ok(Self::with_source(
            path.to_string_lossy().into_owned(),
            mime,
            Source::File(path.to_path_buf()),
        ))
    }

    /// Handle over an entry of an open archive. Fails with `NotFound` if the
    /// entry is absent and `InvalidState` if the archive is closed.
    pub fn archive_entry(archive: &Archive, entry: &str, mime: Option<&str>) -> Result<Self> {
        if !archive.contains(entry)? {
            return Err(Error::NotFound(format!("No such entry in ZIP: {entry}")));
        }
        Ok(Self::with_source(
            entry.to_string(),
            mime,
            Source::ArchiveEntry {
                archive: archive.clone(),
                entry: entry.to_string(),
            },
        ))
    }

    /// Handle over `[offset, offset + size)` of `store`. Fails with
    /// `OutOfRange` if the span does not fit in the store.
    pub fn range(
        name: impl Into<String>,
        store: StoreRef,
        offset: u64,
        size: u64,
        mime: Option<&str>,
    ) -> Result<Self> {
        check_span(store.len()?, offset, size)?;
        Ok(Self::with_source(
            name.into(),
            mime,
            Source::Range {
                store,
                offset,
                size,
            },
        ))
    }

    /// Handle over a remote resource. Only the URL syntax is checked here;
    /// the resource is fetched when the content is first streamed.
    pub fn remote(url: &str, mime: Option<&str>) -> Result<Self> {
        let url = Url::parse(url)?;
        let name = percent_decode_str(url.path()).decode_utf8_lossy().into_owned();
        Ok(Self::with_source(name, mime, Source::Remote(url)))
    }

    /// Handle over bytes held in memory.
    pub fn memory(name: impl Into<String>, data: impl Into<Rc<[u8]>>, mime: Option<&str>) -> Self {
        Self::with_source(name.into(), mime, Source::Memory(data.into()))
    }

    /// One-byte placeholder content.
    pub fn empty(mime: Option<&str>) -> Self {
        Self::memory(EMPTY_NAME, vec![0u8], mime)
    }

    /// Identifying label: a path, entry name, URL path, or given name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The declared MIME type if non-empty, else the one derived from the
    /// name's extension. Computed on first call and cached.
    pub fn mime(&self) -> &str {
        self.mime
            .get_or_init(|| paths::mime_or_detect(&self.name, self.declared_mime.as_deref()))
    }

    /// Size in bytes when known without reading the content.
    pub fn size_hint(&self) -> Option<u64> {
        match &self.source {
            Source::File(path) => std::fs::metadata(path).ok().map(|m| m.len()),
            Source::ArchiveEntry { archive, entry } => archive.entry_size(entry).ok(),
            Source::Range { size, .. } => Some(*size),
            Source::Remote(_) => None,
            Source::Memory(data) => Some(data.len() as u64),
        }
    }

    /// A new, independent cursor at the start of the content.
    pub fn open_stream(&self) -> Result<ByteStream> {
        match &self.source {
            Source::File(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            Source::ArchiveEntry { archive, entry } => archive.open_entry(entry),
            Source::Range {
                store,
                offset,
                size,
            } => Ok(Box::new(RangeStream::new(store.clone(), *offset, *size)?)),
            Source::Remote(url) => open_remote(url),
            Source::Memory(data) => Ok(Box::new(Cursor::new(data.clone()))),
        }
    }

    /// The whole content as a byte vector.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            Source::File(path) => Ok(std::fs::read(path)?),
            Source::Range {
                store,
                offset,
                size,
            } => {
                check_span(store.len()?, *offset, *size)?;
                let mut buf = vec![0u8; usize::try_from(*size).map_err(|_| {
                    Error::out_of_range(format!("range of {size} bytes exceeds memory"))
                })?];
                let n = store.borrow_mut().read_full_at(*offset, &mut buf)?;
                if n < buf.len() {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "store shrank below range",
                    )));
                }
                Ok(buf)
            }
            Source::Memory(data) => Ok(data.to_vec()),
            Source::ArchiveEntry { .. } | Source::Remote(_) => {
                let mut buf = Vec::with_capacity(initial_capacity(self.size_hint()));
                self.open_stream()?.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }

    /// Copy the content into `sink` without holding it all in memory.
    /// Returns the number of bytes copied.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> Result<u64> {
        match &self.source {
            Source::File(path) => Ok(io::copy(&mut File::open(path)?, sink)?),
            Source::Range {
                store,
                offset,
                size,
            } => copy_range(store.clone(), *offset, *size, sink),
            Source::Memory(data) => {
                sink.write_all(data)?;
                Ok(data.len() as u64)
            }
            Source::ArchiveEntry { .. } | Source::Remote(_) => {
                Ok(io::copy(&mut self.open_stream()?, sink)?)
            }
        }
    }
}

/// Buffer space to reserve for content of `hint` bytes. Archive entries
/// report the size their header declares, so the hint is capped.
pub(crate) fn initial_capacity(hint: Option<u64>) -> usize {
    hint.unwrap_or(0).min(PREALLOC_LIMIT) as usize
}

fn check_span(len: u64, offset: u64, size: u64) -> Result<()> {
    if offset.checked_add(size).is_none_or(|end| end > len) {
        return Err(Error::out_of_range(format!(
            "available size of store ({len}) < offset ({offset}) + size ({size})"
        )));
    }
    Ok(())
}

#[cfg(feature = "remote")]
fn open_remote(url: &Url) -> Result<ByteStream> {
    tracing::debug!(%url, "fetching remote content");
    let response = reqwest::blocking::get(url.clone())?.error_for_status()?;
    Ok(Box::new(response))
}

#[cfg(not(feature = "remote"))]
fn open_remote(url: &Url) -> Result<ByteStream> {
    Err(Error::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("remote content is disabled in this build: {url}"),
    )))
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, mime) = (self.name(), self.mime());
        match &self.source {
            Source::File(_) => write!(f, "{name};mime={mime}"),
            Source::ArchiveEntry { archive, .. } => write!(f, "zip://{archive}!{name};mime={mime}"),
            Source::Range { offset, size, .. } => {
                write!(f, "block://{name};mime={mime};offset={offset};size={size}")
            }
            Source::Remote(url) => write!(f, "{url};mime={mime}"),
            Source::Memory(_) => write!(f, "bytes://{name};mime={mime}"),
        }
    }
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHandle")
            .field("name", &self.name)
            .field("declared_mime", &self.declared_mime)
            .field("source", &self.source.scheme())
            .finish()
    }
}
